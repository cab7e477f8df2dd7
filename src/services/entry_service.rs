//! Tree semantics over the flat, prefix-keyed entry table.
//!
//! A folder is an entry whose key ends in `/`; its descendants are every
//! entry whose key starts with that key. This service is the only place
//! that knows about that convention. It never opens a transaction: every
//! method works on the handle the caller passes in, so a whole use case
//! commits or rolls back as one unit.

use crate::{
    errors::{StoreError, StoreResult},
    models::{Entry, key::SEPARATOR},
    repositories::{EntryQuery, EntryRepository},
};
use std::sync::Arc;
use tracing::debug;

/// Default number of `" copy"` suffixes tried before giving up.
pub const DEFAULT_COPY_LIMIT: usize = 100;

const COPY_SUFFIX: &str = " copy";

pub struct EntryService<R> {
    entries: Arc<R>,
    copy_limit: usize,
}

impl<R> Clone for EntryService<R> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            copy_limit: self.copy_limit,
        }
    }
}

impl<R: EntryRepository> EntryService<R> {
    pub fn new(entries: Arc<R>, copy_limit: usize) -> Self {
        Self {
            entries,
            copy_limit: copy_limit.max(1),
        }
    }

    /// Succeeds when no entry with the same key exists in the entry's volume.
    pub async fn exists(&self, tx: &mut R::Tx, entry: Option<&Entry>) -> StoreResult<()> {
        let entry = entry.ok_or(StoreError::RequiredEntry)?;
        match self
            .entries
            .find_one_by_key_and_volume_id(tx, entry.key(), entry.volume_id())
            .await
        {
            Ok(_) => Err(StoreError::EntryAlreadyExists(entry.key().to_string())),
            Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Persist every missing ancestor folder of `entry`, root first.
    ///
    /// Ancestors that already exist are skipped.
    pub async fn create_ancestors(&self, tx: &mut R::Tx, entry: &Entry) -> StoreResult<()> {
        for key in ancestor_keys(entry.key()) {
            let folder = Entry::folder(entry.account_id(), entry.volume_id(), key, entry.is_public())?;
            match self.exists(tx, Some(&folder)).await {
                Ok(()) => {
                    debug!("materializing ancestor {}", folder.key());
                    self.entries.create(tx, &folder).await?;
                }
                Err(StoreError::EntryAlreadyExists(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Rewrite the keys below a renamed folder from `old_prefix` to its new key.
    pub async fn update_descendants(
        &self,
        tx: &mut R::Tx,
        entry: &Entry,
        old_prefix: &str,
    ) -> StoreResult<()> {
        if !entry.is_folder() {
            return Ok(());
        }

        for mut descendant in self.descendants(tx, entry, old_prefix).await? {
            let key = descendant.key().replacen(old_prefix, entry.key(), 1);
            descendant.set_key(&key)?;
            self.entries.update(tx, &descendant).await?;
        }
        Ok(())
    }

    /// Delete everything below a folder. The folder row itself is left to the caller.
    pub async fn delete_descendants(&self, tx: &mut R::Tx, entry: &Entry) -> StoreResult<()> {
        if !entry.is_folder() {
            return Ok(());
        }

        for descendant in self.descendants(tx, entry, entry.key()).await? {
            self.entries.delete(tx, &descendant).await?;
        }
        Ok(())
    }

    /// Build an unpersisted sibling of `entry` under the first free `" copy"` name.
    ///
    /// `report.pdf` becomes `report copy.pdf`, then `report copy copy.pdf`, and
    /// so on until a free key is found or the copy limit is reached.
    pub async fn copy(&self, tx: &mut R::Tx, entry: &Entry) -> StoreResult<Entry> {
        let mut key = entry.key().to_string();
        for _ in 0..self.copy_limit {
            key = copy_key(&key);
            let candidate = Entry::new(
                entry.account_id(),
                entry.volume_id(),
                &key,
                entry.entry_type(),
                entry.size(),
                entry.is_public(),
            )?;
            match self.exists(tx, Some(&candidate)).await {
                Ok(()) => return Ok(candidate),
                Err(StoreError::EntryAlreadyExists(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::CopyLimitExceeded {
            key: entry.key().to_string(),
            attempts: self.copy_limit,
        })
    }

    /// Create a copy of everything below `old_prefix` under the copied folder's key.
    ///
    /// Returns `(source, copy)` pairs in key order. The destination is assumed
    /// to be fresh, so no existence checks are made.
    pub async fn copy_descendants(
        &self,
        tx: &mut R::Tx,
        entry: &Entry,
        old_prefix: &str,
    ) -> StoreResult<Vec<(Entry, Entry)>> {
        if !entry.is_folder() {
            return Ok(Vec::new());
        }

        let mut copies = Vec::new();
        for source in self.descendants(tx, entry, old_prefix).await? {
            let key = source.key().replacen(old_prefix, entry.key(), 1);
            let copy = Entry::new(
                entry.account_id(),
                entry.volume_id(),
                &key,
                source.entry_type(),
                source.size(),
                source.is_public(),
            )?;
            self.entries.create(tx, &copy).await?;
            copies.push((source, copy));
        }
        Ok(copies)
    }

    /// Entries strictly below `prefix` in the folder's volume, excluding the folder row.
    async fn descendants(&self, tx: &mut R::Tx, folder: &Entry, prefix: &str) -> StoreResult<Vec<Entry>> {
        let found = self
            .entries
            .find_by_volume_id_and_account_id(
                tx,
                folder.volume_id(),
                folder.account_id(),
                &EntryQuery::prefix(prefix),
            )
            .await?;
        Ok(found
            .into_iter()
            .filter(|e| e.id() != folder.id() && e.key() != prefix)
            .collect())
    }
}

/// Folder keys above `key`, root first: `a/b/c.txt` gives `a/`, `a/b/`.
pub fn ancestor_keys(key: &str) -> Vec<&str> {
    let body = key.strip_suffix(SEPARATOR).unwrap_or(key);
    body.match_indices(SEPARATOR)
        .map(|(idx, _)| &key[..=idx])
        .collect()
}

/// Insert `" copy"` before the extension of the last path component.
///
/// Folders keep their trailing separator and dotfiles keep their leading dot.
pub fn copy_key(key: &str) -> String {
    let (body, trailing) = match key.strip_suffix(SEPARATOR) {
        Some(body) => (body, "/"),
        None => (key, ""),
    };
    let (dir, name) = match body.rfind(SEPARATOR) {
        Some(idx) => body.split_at(idx + 1),
        None => ("", body),
    };
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 && trailing.is_empty() => name.split_at(idx),
        _ => (name, ""),
    };
    format!("{dir}{stem}{COPY_SUFFIX}{ext}{trailing}")
}
