//! SQLite thread store implementation.
//!
//! Implements `ThreadStore` from `visor-core` over two tables: the
//! `agent_threads` mapping (one row per agent) and the `thread_meta`
//! metadata blobs. Timestamps are stored as fixed-width RFC 3339 UTC
//! strings so lexicographic comparison in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use visor_core::thread::store::ThreadStore;
use visor_types::error::StoreError;
use visor_types::thread::ThreadRecord;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ThreadStore`.
pub struct SqliteThreadStore {
    pool: DatabasePool,
}

impl SqliteThreadStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ThreadRow {
    thread_id: String,
    agent_id: String,
    created_at: String,
    last_used_at: String,
    message_count: i64,
    custom_data: String,
}

impl ThreadRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            thread_id: row.try_get("thread_id")?,
            agent_id: row.try_get("agent_id")?,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
            message_count: row.try_get("message_count")?,
            custom_data: row.try_get("custom_data")?,
        })
    }

    fn into_record(self) -> Result<ThreadRecord, StoreError> {
        let custom_data: serde_json::Value = serde_json::from_str(&self.custom_data)
            .map_err(|e| StoreError::Query(format!("invalid custom_data JSON: {e}")))?;
        Ok(ThreadRecord {
            thread_id: self.thread_id,
            agent_id: self.agent_id,
            created_at: parse_datetime(&self.created_at)?,
            last_used_at: parse_datetime(&self.last_used_at)?,
            message_count: self.message_count as u32,
            custom_data,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC formatting keeps string ordering chronological.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// ThreadStore implementation
// ---------------------------------------------------------------------------

impl ThreadStore for SqliteThreadStore {
    async fn active_thread(&self, agent_id: &str) -> Result<Option<ThreadRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT m.thread_id, m.agent_id, m.created_at, m.last_used_at, \
                    m.message_count, m.custom_data \
             FROM agent_threads a \
             JOIN thread_meta m ON m.thread_id = a.thread_id \
             WHERE a.agent_id = ?",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => {
                let record = ThreadRow::from_row(&row).map_err(query_err)?.into_record()?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn put_thread(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            "INSERT INTO agent_threads (agent_id, thread_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(agent_id) DO UPDATE SET \
               thread_id = excluded.thread_id, created_at = excluded.created_at",
        )
        .bind(&record.agent_id)
        .bind(&record.thread_id)
        .bind(format_datetime(&record.created_at))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        let custom_data = serde_json::to_string(&record.custom_data)
            .map_err(|e| StoreError::Query(format!("unserializable custom_data: {e}")))?;
        sqlx::query(
            "INSERT INTO thread_meta \
               (thread_id, agent_id, created_at, last_used_at, message_count, custom_data) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(thread_id) DO UPDATE SET \
               agent_id = excluded.agent_id, created_at = excluded.created_at, \
               last_used_at = excluded.last_used_at, message_count = excluded.message_count, \
               custom_data = excluded.custom_data",
        )
        .bind(&record.thread_id)
        .bind(&record.agent_id)
        .bind(format_datetime(&record.created_at))
        .bind(format_datetime(&record.last_used_at))
        .bind(i64::from(record.message_count))
        .bind(custom_data)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)
    }

    async fn remove_thread(&self, agent_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            "DELETE FROM thread_meta WHERE thread_id IN \
               (SELECT thread_id FROM agent_threads WHERE agent_id = ?)",
        )
        .bind(agent_id)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        sqlx::query("DELETE FROM agent_threads WHERE agent_id = ?")
            .bind(agent_id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        tx.commit().await.map_err(query_err)
    }

    async fn record_exchange(&self, thread_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE thread_meta \
             SET message_count = message_count + 1, last_used_at = ? \
             WHERE thread_id = ?",
        )
        .bind(format_datetime(&at))
        .bind(thread_id)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn remove_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = format_datetime(&cutoff);
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let removed = sqlx::query("DELETE FROM thread_meta WHERE created_at < ?")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?
            .rows_affected();

        sqlx::query("DELETE FROM agent_threads WHERE created_at < ?")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        Ok(removed)
    }

    async fn all_threads(&self) -> Result<Vec<ThreadRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT thread_id, agent_id, created_at, last_used_at, message_count, custom_data \
             FROM thread_meta ORDER BY last_used_at DESC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| -> Result<ThreadRecord, StoreError> {
                ThreadRow::from_row(row).map_err(query_err)?.into_record()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::database_url;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn store(tmp: &TempDir) -> SqliteThreadStore {
        let pool = DatabasePool::new(&database_url(tmp.path())).await.unwrap();
        SqliteThreadStore::new(pool)
    }

    fn record(thread_id: &str, agent_id: &str, created_at: DateTime<Utc>) -> ThreadRecord {
        ThreadRecord::new(thread_id, agent_id, created_at)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        let original = record("thread_1", "asst_guide", Utc::now());
        store.put_thread(&original).await.unwrap();

        let loaded = store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(loaded.thread_id, "thread_1");
        assert_eq!(loaded.agent_id, "asst_guide");
        assert_eq!(loaded.message_count, 0);
    }

    #[tokio::test]
    async fn put_replaces_the_agent_mapping() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        store
            .put_thread(&record("thread_1", "asst_guide", Utc::now()))
            .await
            .unwrap();
        store
            .put_thread(&record("thread_2", "asst_guide", Utc::now()))
            .await
            .unwrap();

        let loaded = store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(loaded.thread_id, "thread_2");
    }

    #[tokio::test]
    async fn record_exchange_bumps_count_and_usage() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        let created = Utc::now() - Duration::minutes(10);
        store
            .put_thread(&record("thread_1", "asst_guide", created))
            .await
            .unwrap();

        store.record_exchange("thread_1", Utc::now()).await.unwrap();
        store.record_exchange("thread_1", Utc::now()).await.unwrap();

        let loaded = store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(loaded.message_count, 2);
        assert!(loaded.last_used_at > created);
    }

    #[tokio::test]
    async fn record_exchange_on_unknown_thread_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        let err = store
            .record_exchange("thread_missing", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn remove_thread_clears_mapping_and_meta() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        store
            .put_thread(&record("thread_1", "asst_guide", Utc::now()))
            .await
            .unwrap();
        store.remove_thread("asst_guide").await.unwrap();

        assert!(store.active_thread("asst_guide").await.unwrap().is_none());
        assert!(store.all_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_removes_only_records_past_the_cutoff() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        store
            .put_thread(&record(
                "thread_old",
                "asst_a",
                Utc::now() - Duration::hours(30),
            ))
            .await
            .unwrap();
        store
            .put_thread(&record("thread_fresh", "asst_b", Utc::now()))
            .await
            .unwrap();

        let removed = store
            .remove_created_before(Utc::now() - Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.active_thread("asst_a").await.unwrap().is_none());
        assert!(store.active_thread("asst_b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn records_survive_reopening_the_database() {
        let tmp = TempDir::new().unwrap();

        {
            let store = store(&tmp).await;
            store
                .put_thread(&record("thread_1", "asst_guide", Utc::now()))
                .await
                .unwrap();
        }

        // Fresh pool over the same file -- a simulated process restart.
        let reopened = store(&tmp).await;
        let loaded = reopened.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(loaded.thread_id, "thread_1");
    }
}
