//! Represents a volume - a per-account container for entries.

use super::key;
use crate::errors::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A named container of entries owned by a single account.
///
/// Names are unique per account, not globally.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Volume {
    id: Uuid,
    account_id: Uuid,
    name: String,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Volume {
    /// Build a fresh volume with a new id, validating the name.
    pub fn new(account_id: Uuid, name: &str, is_public: bool) -> StoreResult<Self> {
        if account_id.is_nil() {
            return Err(StoreError::RequiredAccountId);
        }

        let now = Utc::now();
        let mut volume = Self {
            id: Uuid::new_v4(),
            account_id,
            name: String::new(),
            is_public,
            created_at: now,
            updated_at: now,
        };
        volume.set_name(name)?;
        volume.updated_at = volume.created_at;
        Ok(volume)
    }

    /// Rehydrate a volume from persisted state. No validation is applied.
    pub fn restore(
        id: Uuid,
        account_id: Uuid,
        name: String,
        is_public: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            name,
            is_public,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_name(&mut self, name: &str) -> StoreResult<()> {
        self.name = key::validate_name(name)?;
        self.touch();
        Ok(())
    }

    pub fn set_public(&mut self, is_public: bool) {
        self.is_public = is_public;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;

    #[test]
    fn new_volume_has_matching_fields() {
        let account = Uuid::new_v4();
        let volume = Volume::new(account, "docs", false).unwrap();
        assert!(!volume.id().is_nil());
        assert_eq!(volume.account_id(), account);
        assert_eq!(volume.name(), "docs");
        assert!(!volume.is_public());
        assert_eq!(volume.created_at(), volume.updated_at());
    }

    #[test]
    fn nil_account_is_required() {
        assert!(matches!(
            Volume::new(Uuid::nil(), "docs", false),
            Err(StoreError::RequiredAccountId)
        ));
    }

    #[test]
    fn names_cannot_contain_separator() {
        let mut volume = Volume::new(Uuid::new_v4(), "docs", false).unwrap();
        let err = volume.set_name("docs/archive").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::InvalidCharacters { field: "name" })
        ));
        assert_eq!(volume.name(), "docs");
    }

    #[test]
    fn setters_bump_updated_at() {
        let mut volume = Volume::new(Uuid::new_v4(), "docs", false).unwrap();
        let before = volume.updated_at();
        volume.set_public(true);
        assert!(volume.is_public());
        assert!(volume.updated_at() >= before);
    }
}
