//! src/services/storage_service.rs
//!
//! StorageService - the use cases behind the HTTP API. Each public method
//! opens one SQLite transaction, drives the entry/volume services through
//! it, applies the matching body change on disk, and commits. Any error
//! before the commit rolls the transaction back; body changes made before a
//! failed commit are compensated best-effort.

use crate::{
    errors::{StoreError, StoreResult},
    models::{Entry, FOLDER_TYPE, Volume},
    repositories::{
        EntryQuery, EntryRepository, TransactionObject, VolumeRepository,
        body::{BodyInfo, BodyRepository, DiskBodyRepository, body_path},
        sqlite::{SqliteEntryRepository, SqliteTransactor, SqliteTx, SqliteVolumeRepository},
    },
    services::{
        entry_service::{EntryService, ancestor_keys},
        volume_service::VolumeService,
    },
};
use bytes::Bytes;
use futures::Stream;
use sqlx::SqlitePool;
use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs::File;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug, Default)]
pub struct ListEntriesParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: usize,
}

#[derive(Debug)]
pub struct ListEntriesResult {
    pub entries: Vec<Entry>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
    pub key_count: usize,
}

/// Requested changes to an entry. `None` leaves the field alone.
#[derive(Clone, Debug, Default)]
pub struct EntryPatch {
    pub key: Option<String>,
    pub is_public: Option<bool>,
}

/// Requested changes to a volume. `None` leaves the field alone.
#[derive(Clone, Debug, Default)]
pub struct VolumePatch {
    pub name: Option<String>,
    pub is_public: Option<bool>,
}

/// StorageService wires the repositories and domain services together.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct StorageService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,
    transactor: SqliteTransactor,
    volumes: Arc<SqliteVolumeRepository>,
    entries: Arc<SqliteEntryRepository>,
    entry_service: EntryService<SqliteEntryRepository>,
    volume_service: VolumeService<SqliteVolumeRepository, SqliteEntryRepository>,
    /// Body store for file contents.
    pub bodies: DiskBodyRepository,
}

impl StorageService {
    /// Create a new StorageService backed by the provided SQLite pool and
    /// using `base_path` as the root directory for entry bodies.
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>, copy_limit: usize) -> Self {
        let volumes = Arc::new(SqliteVolumeRepository);
        let entries = Arc::new(SqliteEntryRepository);
        Self {
            transactor: SqliteTransactor::new(db.clone()),
            entry_service: EntryService::new(entries.clone(), copy_limit),
            volume_service: VolumeService::new(volumes.clone(), entries.clone()),
            volumes,
            entries,
            db,
            bodies: DiskBodyRepository::new(base_path),
        }
    }

    // --- Volumes ---

    pub async fn create_volume(&self, account_id: Uuid, name: &str, is_public: bool) -> StoreResult<Volume> {
        let mut tx = self.transactor.begin().await?;
        let result = self.create_volume_in(&mut tx, account_id, name, is_public).await;
        let volume = self.finish(tx, result).await?;
        info!("created volume {} for account {}", volume.name(), account_id);
        Ok(volume)
    }

    async fn create_volume_in(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        name: &str,
        is_public: bool,
    ) -> StoreResult<Volume> {
        let volume = Volume::new(account_id, name, is_public)?;
        let path = body_path(volume.account_id(), volume.name(), "")?;
        self.volume_service.exists(tx, Some(&volume)).await?;
        self.volumes.create(tx, &volume).await?;
        self.bodies.create(&path, None::<EmptyBody>).await?;
        Ok(volume)
    }

    pub async fn list_volumes(&self, account_id: Uuid) -> StoreResult<Vec<Volume>> {
        let mut tx = self.transactor.begin().await?;
        let result = self.volumes.find_by_account_id(&mut tx, account_id).await;
        self.finish(tx, result).await
    }

    pub async fn get_volume(&self, account_id: Uuid, name: &str) -> StoreResult<Volume> {
        let mut tx = self.transactor.begin().await?;
        let result = self.find_volume(&mut tx, account_id, name).await;
        self.finish(tx, result).await
    }

    pub async fn get_volume_by_id(&self, account_id: Uuid, id: Uuid) -> StoreResult<Volume> {
        let mut tx = self.transactor.begin().await?;
        let result = self
            .volumes
            .find_one_by_id_and_account_id(&mut tx, id, account_id)
            .await
            .map_err(|err| volume_not_found(err, &id.to_string()));
        self.finish(tx, result).await
    }

    /// Rename a volume and/or change its visibility. A rename moves the body directory.
    pub async fn update_volume(&self, account_id: Uuid, name: &str, patch: VolumePatch) -> StoreResult<Volume> {
        let mut tx = self.transactor.begin().await?;
        let result = self.update_volume_in(&mut tx, account_id, name, patch).await;
        let (tx, (volume, moved)) = self.abort_on_error(tx, result).await?;
        if let Err(err) = self.transactor.commit(tx).await {
            if let Some((old_path, new_path)) = moved {
                self.restore_body(&new_path, &old_path).await;
            }
            return Err(err);
        }
        Ok(volume)
    }

    async fn update_volume_in(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        name: &str,
        patch: VolumePatch,
    ) -> StoreResult<(Volume, Option<(PathBuf, PathBuf)>)> {
        let mut volume = self.find_volume(tx, account_id, name).await?;
        let mut moved = None;
        if let Some(new_name) = patch.name.as_deref() {
            if new_name != volume.name() {
                let old_path = body_path(volume.account_id(), volume.name(), "")?;
                volume.set_name(new_name)?;
                let new_path = body_path(volume.account_id(), volume.name(), "")?;
                self.volume_service.exists(tx, Some(&volume)).await?;
                moved = Some((old_path, new_path));
            }
        }
        if let Some(is_public) = patch.is_public {
            volume.set_public(is_public);
        }
        self.volumes.update(tx, &volume).await?;
        if let Some((old_path, new_path)) = &moved {
            self.bodies.update(old_path, new_path).await?;
        }
        Ok((volume, moved))
    }

    /// Delete an empty volume and its body directory.
    pub async fn delete_volume(&self, account_id: Uuid, name: &str) -> StoreResult<Volume> {
        let mut tx = self.transactor.begin().await?;
        let result = self.delete_volume_in(&mut tx, account_id, name).await;
        let volume = self.finish(tx, result).await?;

        if let Ok(path) = body_path(volume.account_id(), volume.name(), "") {
            self.discard_body(&path).await;
        }
        info!("deleted volume {} for account {}", volume.name(), account_id);
        Ok(volume)
    }

    async fn delete_volume_in(&self, tx: &mut SqliteTx, account_id: Uuid, name: &str) -> StoreResult<Volume> {
        let volume = self.find_volume(tx, account_id, name).await?;
        self.volume_service.can_delete(tx, Some(&volume)).await?;
        self.volumes.delete(tx, &volume).await?;
        Ok(volume)
    }

    // --- Entries ---

    /// Stream a new file into `key`, materializing any missing ancestor folders.
    ///
    /// Fails with `EntryAlreadyExists` when the key is taken; nothing is
    /// overwritten.
    pub async fn upload_file<S>(
        &self,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StoreResult<(Entry, BodyInfo)>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let content_type = content_type
            .filter(|t| !t.is_empty() && t != FOLDER_TYPE)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut tx = self.transactor.begin().await?;
        let result = self
            .upload_file_in(&mut tx, account_id, volume_name, key, &content_type, stream)
            .await;
        let (tx, (entry, info, path)) = self.abort_on_error(tx, result).await?;
        if let Err(err) = self.transactor.commit(tx).await {
            self.discard_body(&path).await;
            return Err(err);
        }
        debug!("uploaded {} ({} bytes) to {}", entry.key(), info.size, volume_name);
        Ok((entry, info))
    }

    async fn upload_file_in<S>(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
        content_type: &str,
        stream: S,
    ) -> StoreResult<(Entry, BodyInfo, PathBuf)>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let volume = self.find_volume(tx, account_id, volume_name).await?;
        let mut entry = Entry::new(account_id, volume.id(), key, content_type, 0, volume.is_public())?;
        let path = body_path(volume.account_id(), volume.name(), entry.key())?;
        self.entry_service.exists(tx, Some(&entry)).await?;
        self.ensure_disk_names_free(tx, &volume, entry.key()).await?;
        self.entry_service.create_ancestors(tx, &entry).await?;

        let info = self.bodies.create(&path, Some(stream)).await?;
        if let Err(err) = self.insert_sized(tx, &mut entry, info.size).await {
            self.discard_body(&path).await;
            return Err(err);
        }
        Ok((entry, info, path))
    }

    async fn insert_sized(&self, tx: &mut SqliteTx, entry: &mut Entry, size: i64) -> StoreResult<()> {
        entry.set_size(size)?;
        self.entries.create(tx, entry).await
    }

    /// Create an explicit folder. Ancestors are materialized like for uploads.
    pub async fn create_folder(&self, account_id: Uuid, volume_name: &str, key: &str) -> StoreResult<Entry> {
        let mut tx = self.transactor.begin().await?;
        let result = self.create_folder_in(&mut tx, account_id, volume_name, key).await;
        self.finish(tx, result).await
    }

    async fn create_folder_in(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
    ) -> StoreResult<Entry> {
        let volume = self.find_volume(tx, account_id, volume_name).await?;
        let folder = Entry::folder(account_id, volume.id(), key, volume.is_public())?;
        let path = body_path(volume.account_id(), volume.name(), folder.key())?;
        self.entry_service.exists(tx, Some(&folder)).await?;
        self.ensure_disk_names_free(tx, &volume, folder.key()).await?;
        self.entry_service.create_ancestors(tx, &folder).await?;
        self.entries.create(tx, &folder).await?;
        self.bodies.create(&path, None::<EmptyBody>).await?;
        Ok(folder)
    }

    pub async fn get_entry(&self, account_id: Uuid, volume_name: &str, key: &str) -> StoreResult<Entry> {
        let mut tx = self.transactor.begin().await?;
        let result = match self.find_volume(&mut tx, account_id, volume_name).await {
            Ok(volume) => self.find_entry(&mut tx, &volume, key).await,
            Err(err) => Err(err),
        };
        self.finish(tx, result).await
    }

    /// Metadata plus, for files, an open body handle. Folders come back without one.
    ///
    /// The entry is looked up once, so the body always belongs to the
    /// returned metadata.
    pub async fn get_entry_body(
        &self,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
    ) -> StoreResult<(Entry, Option<File>)> {
        let entry = self.get_entry(account_id, volume_name, key).await?;
        if entry.is_folder() {
            return Ok((entry, None));
        }
        let (entry, file) = self.open_body(volume_name, entry).await?;
        Ok((entry, Some(file)))
    }

    /// Metadata and an open body handle for a file entry.
    pub async fn get_entry_reader(
        &self,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
    ) -> StoreResult<(Entry, File)> {
        match self.get_entry_body(account_id, volume_name, key).await? {
            (entry, Some(file)) => Ok((entry, file)),
            (entry, None) => Err(entry_not_found(volume_name, entry.key())),
        }
    }

    /// Read a file without authentication. The owning account is part of the
    /// address because volume names are only unique per account.
    ///
    /// The volume or the entry itself must be public; private entries are
    /// reported as missing.
    pub async fn get_public_reader(
        &self,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
    ) -> StoreResult<(Entry, File)> {
        let mut tx = self.transactor.begin().await?;
        let result = self.find_public_entry(&mut tx, account_id, volume_name, key).await;
        let entry = self.finish(tx, result).await?;
        self.open_body(volume_name, entry).await
    }

    async fn find_public_entry(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
    ) -> StoreResult<Entry> {
        let volume = self.find_volume(tx, account_id, volume_name).await?;
        let entry = self.find_entry(tx, &volume, key).await?;
        if !(volume.is_public() || entry.is_public()) {
            return Err(entry_not_found(volume_name, key));
        }
        Ok(entry)
    }

    /// List entries in key order with optional delimiter grouping.
    ///
    /// Supports prefix filtering, continuation tokens (the last key of the
    /// previous page) and common prefixes for the delimiter.
    pub async fn list_entries(
        &self,
        account_id: Uuid,
        volume_name: &str,
        params: ListEntriesParams,
    ) -> StoreResult<ListEntriesResult> {
        let max_keys = params.max_keys.clamp(1, 1000);
        let fetch_limit = max_keys + 1;
        let query = EntryQuery {
            prefix: params.prefix.as_deref().unwrap_or(""),
            start_after: params.continuation_token.as_deref(),
            limit: Some(fetch_limit as i64),
        };

        let mut tx = self.transactor.begin().await?;
        let result = match self.find_volume(&mut tx, account_id, volume_name).await {
            Ok(volume) => {
                self.entries
                    .find_by_volume_id_and_account_id(&mut tx, volume.id(), account_id, &query)
                    .await
            }
            Err(err) => Err(err),
        };
        let mut rows = self.finish(tx, result).await?;

        let mut is_truncated = false;
        let mut next_continuation_token = None;
        if rows.len() == fetch_limit {
            rows.pop();
            next_continuation_token = rows.last().map(|e| e.key().to_string());
            is_truncated = true;
        }

        let mut entries = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        for entry in rows {
            if let Some(delim) = params.delimiter.as_deref().filter(|d| !d.is_empty()) {
                if let Some(prefix) = compute_common_prefix(entry.key(), params.prefix.as_deref(), delim) {
                    common_prefixes.insert(prefix);
                    continue;
                }
            }
            entries.push(entry);
        }

        let key_count = entries.len() + common_prefixes.len();

        Ok(ListEntriesResult {
            entries,
            common_prefixes: common_prefixes.into_iter().collect(),
            is_truncated,
            next_continuation_token,
            key_count,
        })
    }

    /// Rename/move an entry and/or change its visibility.
    ///
    /// Renaming a folder rewrites every descendant key and moves the body
    /// directory; missing ancestors of the new key are materialized.
    pub async fn update_entry(
        &self,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
        patch: EntryPatch,
    ) -> StoreResult<Entry> {
        let mut tx = self.transactor.begin().await?;
        let result = self
            .update_entry_in(&mut tx, account_id, volume_name, key, patch)
            .await;
        let (tx, (entry, moved)) = self.abort_on_error(tx, result).await?;
        if let Err(err) = self.transactor.commit(tx).await {
            if let Some((old_path, new_path)) = moved {
                self.restore_body(&new_path, &old_path).await;
            }
            return Err(err);
        }
        Ok(entry)
    }

    async fn update_entry_in(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
        patch: EntryPatch,
    ) -> StoreResult<(Entry, Option<(PathBuf, PathBuf)>)> {
        let volume = self.find_volume(tx, account_id, volume_name).await?;
        let mut entry = self.find_entry(tx, &volume, key).await?;
        if let Some(is_public) = patch.is_public {
            entry.set_public(is_public);
        }

        let old_key = entry.key().to_string();
        if let Some(new_key) = patch.key.as_deref() {
            entry.set_key(new_key)?;
        }
        if entry.key() == old_key {
            self.entries.update(tx, &entry).await?;
            return Ok((entry, None));
        }

        if entry.is_folder() && entry.key().starts_with(&old_key) {
            return Err(StoreError::InvalidMove {
                from: old_key,
                to: entry.key().to_string(),
            });
        }
        let old_path = body_path(volume.account_id(), volume.name(), &old_key)?;
        let new_path = body_path(volume.account_id(), volume.name(), entry.key())?;
        self.entry_service.exists(tx, Some(&entry)).await?;
        self.ensure_disk_names_free(tx, &volume, entry.key()).await?;
        self.entry_service.create_ancestors(tx, &entry).await?;
        self.entries.update(tx, &entry).await?;
        self.entry_service.update_descendants(tx, &entry, &old_key).await?;
        self.bodies.update(&old_path, &new_path).await?;
        Ok((entry, Some((old_path, new_path))))
    }

    /// Copy an entry next to itself under a `" copy"` name, including folder contents.
    pub async fn copy_entry(&self, account_id: Uuid, volume_name: &str, key: &str) -> StoreResult<Entry> {
        let mut tx = self.transactor.begin().await?;
        let result = self.copy_entry_in(&mut tx, account_id, volume_name, key).await;
        let (tx, (copy, copy_path)) = self.abort_on_error(tx, result).await?;
        if let Err(err) = self.transactor.commit(tx).await {
            self.discard_body(&copy_path).await;
            return Err(err);
        }
        debug!("copied {} to {} in {}", key, copy.key(), volume_name);
        Ok(copy)
    }

    async fn copy_entry_in(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
    ) -> StoreResult<(Entry, PathBuf)> {
        let volume = self.find_volume(tx, account_id, volume_name).await?;
        let source = self.find_entry(tx, &volume, key).await?;
        let copy = self.entry_service.copy(tx, &source).await?;
        self.ensure_disk_names_free(tx, &volume, copy.key()).await?;
        let copy_path = body_path(volume.account_id(), volume.name(), copy.key())?;
        self.entries.create(tx, &copy).await?;
        let pairs = self.entry_service.copy_descendants(tx, &copy, source.key()).await?;

        if let Err(err) = self.copy_bodies(volume.name(), &source, &copy, &pairs).await {
            self.discard_body(&copy_path).await;
            return Err(err);
        }
        Ok((copy, copy_path))
    }

    /// Delete an entry; folders take all their descendants with them.
    pub async fn delete_entry(&self, account_id: Uuid, volume_name: &str, key: &str) -> StoreResult<Entry> {
        let mut tx = self.transactor.begin().await?;
        let result = self.delete_entry_in(&mut tx, account_id, volume_name, key).await;
        let (entry, path) = self.finish(tx, result).await?;

        self.discard_body(&path).await;
        Ok(entry)
    }

    async fn delete_entry_in(
        &self,
        tx: &mut SqliteTx,
        account_id: Uuid,
        volume_name: &str,
        key: &str,
    ) -> StoreResult<(Entry, PathBuf)> {
        let volume = self.find_volume(tx, account_id, volume_name).await?;
        let entry = self.find_entry(tx, &volume, key).await?;
        let path = body_path(volume.account_id(), volume.name(), entry.key())?;
        self.entry_service.delete_descendants(tx, &entry).await?;
        self.entries.delete(tx, &entry).await?;
        Ok((entry, path))
    }

    // --- Helpers ---

    async fn find_volume(&self, tx: &mut SqliteTx, account_id: Uuid, name: &str) -> StoreResult<Volume> {
        self.volumes
            .find_one_by_name_and_account_id(tx, name, account_id)
            .await
            .map_err(|err| volume_not_found(err, name))
    }

    async fn find_entry(&self, tx: &mut SqliteTx, volume: &Volume, key: &str) -> StoreResult<Entry> {
        self.entries
            .find_one_by_key_and_volume_id(tx, key, volume.id())
            .await
            .map_err(|err| match err {
                StoreError::NotFound => entry_not_found(volume.name(), key),
                other => other,
            })
    }

    /// A file `a` and a folder `a/` would share one body path, so a key is
    /// refused while the opposite kind exists for it or for any of its ancestors.
    async fn ensure_disk_names_free(&self, tx: &mut SqliteTx, volume: &Volume, key: &str) -> StoreResult<()> {
        for candidate in ancestor_keys(key).into_iter().chain(std::iter::once(key)) {
            let counterpart = match candidate.strip_suffix('/') {
                Some(file_key) => file_key.to_string(),
                None => format!("{}/", candidate),
            };
            match self
                .entries
                .find_one_by_key_and_volume_id(tx, &counterpart, volume.id())
                .await
            {
                Ok(_) => return Err(StoreError::EntryAlreadyExists(counterpart)),
                Err(StoreError::NotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn open_body(&self, volume_name: &str, entry: Entry) -> StoreResult<(Entry, File)> {
        if entry.is_folder() {
            return Err(entry_not_found(volume_name, entry.key()));
        }
        let path = body_path(entry.account_id(), volume_name, entry.key())?;
        let file = self.bodies.open(&path).await.map_err(|err| match err {
            StoreError::NotFound => entry_not_found(volume_name, entry.key()),
            other => other,
        })?;
        Ok((entry, file))
    }

    async fn copy_bodies(
        &self,
        volume_name: &str,
        source: &Entry,
        copy: &Entry,
        pairs: &[(Entry, Entry)],
    ) -> StoreResult<()> {
        let account_id = copy.account_id();
        let copy_path = body_path(account_id, volume_name, copy.key())?;
        if !source.is_folder() {
            return self
                .bodies
                .copy(&body_path(account_id, volume_name, source.key())?, &copy_path)
                .await;
        }

        self.bodies.create(&copy_path, None::<EmptyBody>).await?;
        for (from, to) in pairs {
            let to_path = body_path(account_id, volume_name, to.key())?;
            if to.is_folder() {
                self.bodies.create(&to_path, None::<EmptyBody>).await?;
            } else {
                self.bodies
                    .copy(&body_path(account_id, volume_name, from.key())?, &to_path)
                    .await?;
            }
        }
        Ok(())
    }

    /// Commit on success, roll back on error.
    async fn finish<T>(&self, tx: SqliteTx, result: StoreResult<T>) -> StoreResult<T> {
        let (tx, value) = self.abort_on_error(tx, result).await?;
        self.transactor.commit(tx).await?;
        Ok(value)
    }

    /// Roll back and return the error, or hand the open transaction back with the value.
    async fn abort_on_error<T>(&self, tx: SqliteTx, result: StoreResult<T>) -> StoreResult<(SqliteTx, T)> {
        match result {
            Ok(value) => Ok((tx, value)),
            Err(err) => {
                if let Err(rollback_err) = self.transactor.rollback(tx).await {
                    warn!("rollback failed after {}: {}", err, rollback_err);
                }
                Err(err)
            }
        }
    }

    async fn discard_body(&self, path: &Path) {
        if let Err(err) = self.bodies.delete(path).await {
            warn!("failed to remove body {}: {}", path.display(), err);
        }
    }

    async fn restore_body(&self, from: &Path, to: &Path) {
        if let Err(err) = self.bodies.update(from, to).await {
            warn!(
                "failed to move body {} back to {}: {}",
                from.display(),
                to.display(),
                err
            );
        }
    }
}

/// Stream type used when creating folder bodies.
type EmptyBody = futures::stream::Empty<io::Result<Bytes>>;

fn volume_not_found(err: StoreError, name: &str) -> StoreError {
    match err {
        StoreError::NotFound => StoreError::VolumeNotFound(name.to_string()),
        other => other,
    }
}

fn entry_not_found(volume: &str, key: &str) -> StoreError {
    StoreError::EntryNotFound {
        volume: volume.to_string(),
        key: key.to_string(),
    }
}

/// Compute a synthetic "common prefix" for delimiter listings.
///
/// Returns Some(prefix) if the key belongs to a grouped prefix, otherwise None.
fn compute_common_prefix(key: &str, requested_prefix: Option<&str>, delimiter: &str) -> Option<String> {
    let prefix = requested_prefix.unwrap_or("");
    let after_prefix = key.strip_prefix(prefix)?;

    after_prefix.find(delimiter).map(|pos| {
        let mut combined = String::from(prefix);
        combined.push_str(&after_prefix[..pos + delimiter.len()]);
        combined
    })
}
