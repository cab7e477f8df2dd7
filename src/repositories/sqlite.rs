//! SQLite-backed repositories.
//!
//! Repositories are stateless; the connection comes from the transaction the
//! caller passes in. Unique constraint violations surface as the same
//! conflict errors the services raise, so the schema acts as a backstop for
//! concurrent writers that both passed an existence check.

use super::{EntryQuery, EntryRepository, TransactionObject, VolumeRepository};
use crate::{
    errors::{StoreError, StoreResult},
    models::{Entry, Volume},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use uuid::Uuid;

/// Open SQLite transaction shared by every repository call of one use case.
pub type SqliteTx = Transaction<'static, Sqlite>;

/// Schema applied by `--migrate` and by tests against `sqlite::memory:`.
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const ENTRY_COLUMNS: &str =
    "id, account_id, volume_id, key, size, type, is_public, created_at, updated_at";
const VOLUME_COLUMNS: &str = "id, account_id, name, is_public, created_at, updated_at";

#[derive(FromRow)]
struct EntryRecord {
    id: Uuid,
    account_id: Uuid,
    volume_id: Uuid,
    key: String,
    size: i64,
    #[sqlx(rename = "type")]
    entry_type: String,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EntryRecord> for Entry {
    fn from(row: EntryRecord) -> Self {
        Entry::restore(
            row.id,
            row.account_id,
            row.volume_id,
            row.key,
            row.size,
            row.entry_type,
            row.is_public,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(FromRow)]
struct VolumeRecord {
    id: Uuid,
    account_id: Uuid,
    name: String,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VolumeRecord> for Volume {
    fn from(row: VolumeRecord) -> Self {
        Volume::restore(
            row.id,
            row.account_id,
            row.name,
            row.is_public,
            row.created_at,
            row.updated_at,
        )
    }
}

/// Run the embedded schema statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> anyhow::Result<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

/// Hands out transactions from a shared pool.
#[derive(Clone)]
pub struct SqliteTransactor {
    pool: Arc<SqlitePool>,
}

impl SqliteTransactor {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionObject for SqliteTransactor {
    type Tx = SqliteTx;

    async fn begin(&self) -> StoreResult<SqliteTx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: SqliteTx) -> StoreResult<()> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: SqliteTx) -> StoreResult<()> {
        Ok(tx.rollback().await?)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteEntryRepository;

#[async_trait]
impl EntryRepository for SqliteEntryRepository {
    type Tx = SqliteTx;

    async fn create(&self, tx: &mut SqliteTx, entry: &Entry) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO entries (id, account_id, volume_id, key, size, type, is_public, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id())
        .bind(entry.account_id())
        .bind(entry.volume_id())
        .bind(entry.key())
        .bind(entry.size())
        .bind(entry.entry_type())
        .bind(entry.is_public())
        .bind(entry.created_at())
        .bind(entry.updated_at())
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::EntryAlreadyExists(entry.key().to_string()))
            }
            Err(err) => Err(StoreError::Sqlx(err)),
        }
    }

    async fn update(&self, tx: &mut SqliteTx, entry: &Entry) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE entries SET key = ?, size = ?, type = ?, is_public = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(entry.key())
        .bind(entry.size())
        .bind(entry.entry_type())
        .bind(entry.is_public())
        .bind(entry.updated_at())
        .bind(entry.id())
        .execute(&mut **tx)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::NotFound),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::EntryAlreadyExists(entry.key().to_string()))
            }
            Err(err) => Err(StoreError::Sqlx(err)),
        }
    }

    async fn delete(&self, tx: &mut SqliteTx, entry: &Entry) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(entry.id())
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_one_by_key_and_volume_id(
        &self,
        tx: &mut SqliteTx,
        key: &str,
        volume_id: Uuid,
    ) -> StoreResult<Entry> {
        let sql = format!(
            "SELECT {} FROM entries WHERE key = ? AND volume_id = ?",
            ENTRY_COLUMNS
        );
        sqlx::query_as::<_, EntryRecord>(&sql)
            .bind(key)
            .bind(volume_id)
            .fetch_one(&mut **tx)
            .await
            .map(Entry::from)
            .map_err(not_found)
    }

    async fn find_by_volume_id_and_account_id(
        &self,
        tx: &mut SqliteTx,
        volume_id: Uuid,
        account_id: Uuid,
        query: &EntryQuery<'_>,
    ) -> StoreResult<Vec<Entry>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM entries WHERE volume_id = ",
            ENTRY_COLUMNS
        ));
        builder.push_bind(volume_id);
        builder.push(" AND account_id = ");
        builder.push_bind(account_id);

        // LIKE is case-insensitive and treats `%`/`_` as wildcards; both are valid key characters.
        if !query.prefix.is_empty() {
            builder.push(" AND substr(key, 1, ");
            builder.push_bind(query.prefix.chars().count() as i64);
            builder.push(") = ");
            builder.push_bind(query.prefix.to_string());
        }

        if let Some(after) = query.start_after {
            builder.push(" AND key > ");
            builder.push_bind(after.to_string());
        }

        builder.push(" ORDER BY key ASC");

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        let rows: Vec<EntryRecord> = builder.build_query_as().fetch_all(&mut **tx).await?;
        Ok(rows.into_iter().map(Entry::from).collect())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteVolumeRepository;

#[async_trait]
impl VolumeRepository for SqliteVolumeRepository {
    type Tx = SqliteTx;

    async fn create(&self, tx: &mut SqliteTx, volume: &Volume) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO volumes (id, account_id, name, is_public, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(volume.id())
        .bind(volume.account_id())
        .bind(volume.name())
        .bind(volume.is_public())
        .bind(volume.created_at())
        .bind(volume.updated_at())
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::VolumeAlreadyExists(volume.name().to_string()))
            }
            Err(err) => Err(StoreError::Sqlx(err)),
        }
    }

    async fn update(&self, tx: &mut SqliteTx, volume: &Volume) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE volumes SET name = ?, is_public = ?, updated_at = ? WHERE id = ?",
        )
        .bind(volume.name())
        .bind(volume.is_public())
        .bind(volume.updated_at())
        .bind(volume.id())
        .execute(&mut **tx)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::NotFound),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::VolumeAlreadyExists(volume.name().to_string()))
            }
            Err(err) => Err(StoreError::Sqlx(err)),
        }
    }

    async fn delete(&self, tx: &mut SqliteTx, volume: &Volume) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM volumes WHERE id = ?")
            .bind(volume.id())
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_one_by_name(&self, tx: &mut SqliteTx, name: &str) -> StoreResult<Volume> {
        let sql = format!(
            "SELECT {} FROM volumes WHERE name = ? ORDER BY created_at ASC LIMIT 1",
            VOLUME_COLUMNS
        );
        sqlx::query_as::<_, VolumeRecord>(&sql)
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map(Volume::from)
            .map_err(not_found)
    }

    async fn find_one_by_name_and_account_id(
        &self,
        tx: &mut SqliteTx,
        name: &str,
        account_id: Uuid,
    ) -> StoreResult<Volume> {
        let sql = format!(
            "SELECT {} FROM volumes WHERE name = ? AND account_id = ?",
            VOLUME_COLUMNS
        );
        sqlx::query_as::<_, VolumeRecord>(&sql)
            .bind(name)
            .bind(account_id)
            .fetch_one(&mut **tx)
            .await
            .map(Volume::from)
            .map_err(not_found)
    }

    async fn find_one_by_id_and_account_id(
        &self,
        tx: &mut SqliteTx,
        id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<Volume> {
        let sql = format!(
            "SELECT {} FROM volumes WHERE id = ? AND account_id = ?",
            VOLUME_COLUMNS
        );
        sqlx::query_as::<_, VolumeRecord>(&sql)
            .bind(id)
            .bind(account_id)
            .fetch_one(&mut **tx)
            .await
            .map(Volume::from)
            .map_err(not_found)
    }

    async fn find_by_account_id(&self, tx: &mut SqliteTx, account_id: Uuid) -> StoreResult<Vec<Volume>> {
        let sql = format!(
            "SELECT {} FROM volumes WHERE account_id = ? ORDER BY name ASC",
            VOLUME_COLUMNS
        );
        let rows = sqlx::query_as::<_, VolumeRecord>(&sql)
            .bind(account_id)
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows.into_iter().map(Volume::from).collect())
    }
}

fn not_found(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Sqlx(other),
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
