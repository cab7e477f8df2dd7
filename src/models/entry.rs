//! Represents a file or folder stored in a volume.

use super::key::{self, SEPARATOR};
use crate::errors::{StoreError, StoreResult, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Type discriminator stored for folders. Files store their MIME type instead.
pub const FOLDER_TYPE: &str = "folder";

/// A single file or folder row within a volume.
///
/// Entries live in a flat table; hierarchy is expressed only through the
/// key prefix. Folder keys always end in `/`.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Entry {
    id: Uuid,
    account_id: Uuid,
    volume_id: Uuid,
    key: String,
    size: i64,
    #[serde(rename = "type")]
    entry_type: String,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entry {
    /// Build a fresh entry with a new id, validating every field.
    pub fn new(
        account_id: Uuid,
        volume_id: Uuid,
        key: &str,
        entry_type: &str,
        size: i64,
        is_public: bool,
    ) -> StoreResult<Self> {
        if account_id.is_nil() {
            return Err(StoreError::RequiredAccountId);
        }
        if volume_id.is_nil() {
            return Err(StoreError::RequiredVolumeId);
        }

        let now = Utc::now();
        let mut entry = Self {
            id: Uuid::new_v4(),
            account_id,
            volume_id,
            key: String::new(),
            size: 0,
            entry_type: entry_type.to_string(),
            is_public,
            created_at: now,
            updated_at: now,
        };
        entry.set_key(key)?;
        entry.set_size(size)?;
        entry.updated_at = entry.created_at;
        Ok(entry)
    }

    /// Shortcut for a zero-size folder entry.
    pub fn folder(account_id: Uuid, volume_id: Uuid, key: &str, is_public: bool) -> StoreResult<Self> {
        Self::new(account_id, volume_id, key, FOLDER_TYPE, 0, is_public)
    }

    /// Rehydrate an entry from persisted state. No validation is applied.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        account_id: Uuid,
        volume_id: Uuid,
        key: String,
        size: i64,
        entry_type: String,
        is_public: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            volume_id,
            key,
            size,
            entry_type,
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

    pub fn volume_id(&self) -> Uuid {
        self.volume_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
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

    pub fn is_folder(&self) -> bool {
        self.entry_type == FOLDER_TYPE
    }

    /// Last path component of the key, without the folder separator.
    pub fn name(&self) -> &str {
        let trimmed = self.key.trim_end_matches(SEPARATOR);
        trimmed
            .rsplit_once(SEPARATOR)
            .map(|(_, name)| name)
            .unwrap_or(trimmed)
    }

    /// Validate and assign a new key. Folders get a trailing `/` appended.
    pub fn set_key(&mut self, key: &str) -> StoreResult<()> {
        self.key = key::validate_key(key, self.is_folder())?;
        self.touch();
        Ok(())
    }

    pub fn set_size(&mut self, size: i64) -> StoreResult<()> {
        if size < 0 {
            return Err(ValidationError::Negative { field: "size" }.into());
        }
        self.size = size;
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
