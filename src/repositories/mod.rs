//! Persistence contracts consumed by the services.
//!
//! Every repository call takes the caller's open transaction handle, so a
//! whole use case reads and writes through one unit of work. A missing row is
//! always reported as [`StoreError::NotFound`](crate::errors::StoreError::NotFound).

pub mod body;
#[cfg(test)]
pub mod memory;
pub mod sqlite;

use crate::{
    errors::StoreResult,
    models::{Entry, Volume},
};
use async_trait::async_trait;
use uuid::Uuid;

/// Filter for listing the entries of a volume.
#[derive(Clone, Debug, Default)]
pub struct EntryQuery<'a> {
    /// Only keys starting with this prefix. Empty matches everything.
    pub prefix: &'a str,
    /// Only keys sorting strictly after this one.
    pub start_after: Option<&'a str>,
    /// Maximum number of rows returned.
    pub limit: Option<i64>,
}

impl<'a> EntryQuery<'a> {
    pub fn prefix(prefix: &'a str) -> Self {
        Self {
            prefix,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Transaction handle threaded through every call.
    type Tx: Send;

    async fn create(&self, tx: &mut Self::Tx, entry: &Entry) -> StoreResult<()>;

    async fn update(&self, tx: &mut Self::Tx, entry: &Entry) -> StoreResult<()>;

    async fn delete(&self, tx: &mut Self::Tx, entry: &Entry) -> StoreResult<()>;

    async fn find_one_by_key_and_volume_id(
        &self,
        tx: &mut Self::Tx,
        key: &str,
        volume_id: Uuid,
    ) -> StoreResult<Entry>;

    /// Entries of a volume ordered by key.
    async fn find_by_volume_id_and_account_id(
        &self,
        tx: &mut Self::Tx,
        volume_id: Uuid,
        account_id: Uuid,
        query: &EntryQuery<'_>,
    ) -> StoreResult<Vec<Entry>>;
}

#[async_trait]
pub trait VolumeRepository: Send + Sync {
    type Tx: Send;

    async fn create(&self, tx: &mut Self::Tx, volume: &Volume) -> StoreResult<()>;

    async fn update(&self, tx: &mut Self::Tx, volume: &Volume) -> StoreResult<()>;

    async fn delete(&self, tx: &mut Self::Tx, volume: &Volume) -> StoreResult<()>;

    /// Oldest volume carrying this name across all accounts.
    async fn find_one_by_name(&self, tx: &mut Self::Tx, name: &str) -> StoreResult<Volume>;

    async fn find_one_by_name_and_account_id(
        &self,
        tx: &mut Self::Tx,
        name: &str,
        account_id: Uuid,
    ) -> StoreResult<Volume>;

    async fn find_one_by_id_and_account_id(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<Volume>;

    /// Volumes of an account ordered by name.
    async fn find_by_account_id(&self, tx: &mut Self::Tx, account_id: Uuid) -> StoreResult<Vec<Volume>>;
}

/// Opens and finishes units of work.
///
/// Dropping an open transaction without committing rolls it back.
#[async_trait]
pub trait TransactionObject: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()>;
}
