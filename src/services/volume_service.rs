//! Volume-level guards: name conflicts and deletion of non-empty volumes.

use crate::{
    errors::{StoreError, StoreResult},
    models::Volume,
    repositories::{EntryQuery, EntryRepository, VolumeRepository},
};
use std::sync::Arc;

pub struct VolumeService<V, E> {
    volumes: Arc<V>,
    entries: Arc<E>,
}

impl<V, E> Clone for VolumeService<V, E> {
    fn clone(&self) -> Self {
        Self {
            volumes: self.volumes.clone(),
            entries: self.entries.clone(),
        }
    }
}

impl<V, E> VolumeService<V, E>
where
    V: VolumeRepository,
    E: EntryRepository<Tx = V::Tx>,
{
    pub fn new(volumes: Arc<V>, entries: Arc<E>) -> Self {
        Self { volumes, entries }
    }

    /// Succeeds when the owning account has no other volume with this name.
    pub async fn exists(&self, tx: &mut V::Tx, volume: Option<&Volume>) -> StoreResult<()> {
        let volume = volume.ok_or(StoreError::RequiredVolume)?;
        match self
            .volumes
            .find_one_by_name_and_account_id(tx, volume.name(), volume.account_id())
            .await
        {
            Ok(_) => Err(StoreError::VolumeAlreadyExists(volume.name().to_string())),
            Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Succeeds only when the volume holds no entries.
    pub async fn can_delete(&self, tx: &mut V::Tx, volume: Option<&Volume>) -> StoreResult<()> {
        let volume = volume.ok_or(StoreError::RequiredVolume)?;
        let query = EntryQuery {
            limit: Some(1),
            ..Default::default()
        };
        let found = self
            .entries
            .find_by_volume_id_and_account_id(tx, volume.id(), volume.account_id(), &query)
            .await?;
        if !found.is_empty() {
            return Err(StoreError::VolumeHasEntries(volume.name().to_string()));
        }
        Ok(())
    }
}
