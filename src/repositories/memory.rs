//! In-memory repositories for service tests.
//!
//! Every call is appended to a shared log so tests can assert exactly which
//! repository operations a service issued, and in what order.

use super::{EntryQuery, EntryRepository, VolumeRepository};
use crate::{
    errors::{StoreError, StoreResult},
    models::{Entry, Volume},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Default)]
pub struct MemoryEntryRepository {
    pub rows: Arc<Mutex<Vec<Entry>>>,
    pub calls: CallLog,
    /// When set, every call fails with a connection error.
    pub broken: Arc<Mutex<bool>>,
}

impl MemoryEntryRepository {
    pub fn with_rows(rows: Vec<Entry>) -> Self {
        let repo = Self::default();
        *repo.rows.lock().unwrap() = rows;
        repo
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.key().to_string())
            .collect();
        keys.sort();
        keys
    }

    fn record(&self, call: String) -> StoreResult<()> {
        self.calls.lock().unwrap().push(call);
        if *self.broken.lock().unwrap() {
            return Err(StoreError::Sqlx(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl EntryRepository for MemoryEntryRepository {
    type Tx = ();

    async fn create(&self, _tx: &mut (), entry: &Entry) -> StoreResult<()> {
        self.record(format!("create {}", entry.key()))?;
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|e| e.volume_id() == entry.volume_id() && e.key() == entry.key())
        {
            return Err(StoreError::EntryAlreadyExists(entry.key().to_string()));
        }
        rows.push(entry.clone());
        Ok(())
    }

    async fn update(&self, _tx: &mut (), entry: &Entry) -> StoreResult<()> {
        self.record(format!("update {}", entry.key()))?;
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|e| e.id() == entry.id()) {
            Some(row) => {
                *row = entry.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, _tx: &mut (), entry: &Entry) -> StoreResult<()> {
        self.record(format!("delete {}", entry.key()))?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| e.id() != entry.id());
        if rows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_one_by_key_and_volume_id(
        &self,
        _tx: &mut (),
        key: &str,
        volume_id: Uuid,
    ) -> StoreResult<Entry> {
        self.record(format!("find {}", key))?;
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.key() == key && e.volume_id() == volume_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_volume_id_and_account_id(
        &self,
        _tx: &mut (),
        volume_id: Uuid,
        account_id: Uuid,
        query: &EntryQuery<'_>,
    ) -> StoreResult<Vec<Entry>> {
        self.record(format!("list {}", query.prefix))?;
        let mut found: Vec<Entry> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.volume_id() == volume_id && e.account_id() == account_id)
            .filter(|e| e.key().starts_with(query.prefix))
            .filter(|e| query.start_after.is_none_or(|after| e.key() > after))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key().cmp(b.key()));
        if let Some(limit) = query.limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }
}

#[derive(Clone, Default)]
pub struct MemoryVolumeRepository {
    pub rows: Arc<Mutex<Vec<Volume>>>,
    pub calls: CallLog,
}

impl MemoryVolumeRepository {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn find(&self, predicate: impl Fn(&Volume) -> bool) -> StoreResult<Volume> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|v| predicate(v))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl VolumeRepository for MemoryVolumeRepository {
    type Tx = ();

    async fn create(&self, _tx: &mut (), volume: &Volume) -> StoreResult<()> {
        self.record(format!("create {}", volume.name()));
        self.rows.lock().unwrap().push(volume.clone());
        Ok(())
    }

    async fn update(&self, _tx: &mut (), volume: &Volume) -> StoreResult<()> {
        self.record(format!("update {}", volume.name()));
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|v| v.id() == volume.id()) {
            Some(row) => {
                *row = volume.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, _tx: &mut (), volume: &Volume) -> StoreResult<()> {
        self.record(format!("delete {}", volume.name()));
        self.rows.lock().unwrap().retain(|v| v.id() != volume.id());
        Ok(())
    }

    async fn find_one_by_name(&self, _tx: &mut (), name: &str) -> StoreResult<Volume> {
        self.record(format!("find {}", name));
        self.find(|v| v.name() == name)
    }

    async fn find_one_by_name_and_account_id(
        &self,
        _tx: &mut (),
        name: &str,
        account_id: Uuid,
    ) -> StoreResult<Volume> {
        self.record(format!("find {}", name));
        self.find(|v| v.name() == name && v.account_id() == account_id)
    }

    async fn find_one_by_id_and_account_id(
        &self,
        _tx: &mut (),
        id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<Volume> {
        self.record(format!("find {}", id));
        self.find(|v| v.id() == id && v.account_id() == account_id)
    }

    async fn find_by_account_id(&self, _tx: &mut (), account_id: Uuid) -> StoreResult<Vec<Volume>> {
        self.record(format!("list {}", account_id));
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.account_id() == account_id)
            .cloned()
            .collect())
    }
}
