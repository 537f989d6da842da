use crate::error::{ErrorKind, Result};
use crate::models::{AccountRow, BadgeStatRow, DatasetRow};
use crate::{Database, RecordStore, check_contiguous};
use async_trait::async_trait;
use exn::ResultExt;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{AccountRecord, BadgeKey, BadgeStats, DatasetMetadata};
use sqlx::SqlitePool;
use tracing::instrument;

/// [`RecordStore`] backed by a SQLite database.
///
/// Each write operation runs in its own transaction; reads go straight to
/// the pool and may run concurrently with a write.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl From<&Database> for SqliteStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convenience for tests and tools: a fresh, migrated in-memory store.
    pub async fn connect_in_memory() -> Result<Self> {
        Ok(Self::from(&Database::connect_in_memory().await?))
    }
}

// SQLite integers are signed; indices beyond i64 can't exist in the table.
fn index_bound(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get_metadata(&self, identity: &DatasetIdentity) -> Result<Option<DatasetMetadata>> {
        let row: Option<DatasetRow> = sqlx::query_as(include_str!("../queries/get_metadata.sql"))
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(DatasetMetadata::try_from).transpose()
    }

    #[instrument(skip_all, fields(identity = %metadata.identity.short()))]
    async fn put_metadata(&self, metadata: &DatasetMetadata) -> Result<()> {
        let row = DatasetRow::try_from(metadata)?;
        sqlx::query(include_str!("../queries/put_metadata.sql"))
            .bind(row.identity)
            .bind(row.display_name)
            .bind(row.byte_size)
            .bind(row.ingested_at)
            .bind(row.account_count)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    #[instrument(skip(self, records), fields(identity = %identity.short(), count = records.len()))]
    async fn put_account_range(&self, identity: &DatasetIdentity, start: usize, records: &[AccountRecord])
    -> Result<()> {
        check_contiguous(start, records)?;
        let rows = records.iter().map(AccountRow::try_from).collect::<Result<Vec<_>>>()?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for row in rows {
            sqlx::query(include_str!("../queries/put_account.sql"))
                .bind(identity.as_str())
                .bind(row.idx)
                .bind(row.username)
                .bind(row.badges)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn get_account_range(&self, identity: &DatasetIdentity, start: usize, end: usize)
    -> Result<Vec<AccountRecord>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let rows: Vec<AccountRow> = sqlx::query_as(include_str!("../queries/get_account_range.sql"))
            .bind(identity.as_str())
            .bind(index_bound(start))
            .bind(index_bound(end))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(AccountRecord::try_from).collect()
    }

    async fn get_badge_stats(&self, identity: &DatasetIdentity) -> Result<Option<BadgeStats>> {
        let rows: Vec<BadgeStatRow> = sqlx::query_as(include_str!("../queries/get_badge_stats.sql"))
            .bind(identity.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let pairs = rows.into_iter().map(<(BadgeKey, u64)>::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Some(pairs.into_iter().collect()))
    }

    #[instrument(skip_all, fields(identity = %identity.short()))]
    async fn put_badge_stats(&self, identity: &DatasetIdentity, stats: &BadgeStats) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for (badge, count) in stats.iter() {
            sqlx::query(include_str!("../queries/put_badge_stat.sql"))
                .bind(identity.as_str())
                .bind(badge.as_str())
                .bind(i64::try_from(count).or_raise(|| ErrorKind::InvalidData("badge count"))?)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetMetadata>> {
        let rows: Vec<DatasetRow> = sqlx::query_as(include_str!("../queries/list_datasets.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(DatasetMetadata::try_from).collect()
    }

    #[instrument(skip_all, fields(identity = %identity.short()))]
    async fn delete_dataset(&self, identity: &DatasetIdentity) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        // Metadata first: the dataset stops being visible before its records go.
        for query in [
            include_str!("../queries/delete_dataset.sql"),
            include_str!("../queries/delete_badge_stats.sql"),
            include_str!("../queries/delete_accounts.sql"),
        ] {
            sqlx::query(query).bind(identity.as_str()).execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
