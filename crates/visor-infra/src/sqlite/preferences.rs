//! SQLite preference store implementation.
//!
//! Implements `PreferenceStore` from `visor-core`. Values are stored as
//! JSON text in a single key-value table; the only key today is the global
//! audio-response flag.

use chrono::{SecondsFormat, Utc};
use sqlx::Row;

use visor_core::thread::store::PreferenceStore;
use visor_types::error::StoreError;

use super::pool::DatabasePool;

const AUDIO_RESPONSE_KEY: &str = "audio_response_enabled";

/// SQLite-backed implementation of `PreferenceStore`.
pub struct SqlitePreferenceStore {
    pool: DatabasePool,
}

impl SqlitePreferenceStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let row = sqlx::query("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row
                    .try_get("value")
                    .map_err(|e| StoreError::Query(e.to_string()))?;
                let value: bool = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Query(format!("invalid preference JSON: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET \
               value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    async fn audio_response_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.get_bool(AUDIO_RESPONSE_KEY).await?.unwrap_or(false))
    }

    async fn set_audio_response_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.set_bool(AUDIO_RESPONSE_KEY, enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::database_url;
    use tempfile::TempDir;

    async fn store(tmp: &TempDir) -> SqlitePreferenceStore {
        let pool = DatabasePool::new(&database_url(tmp.path())).await.unwrap();
        SqlitePreferenceStore::new(pool)
    }

    #[tokio::test]
    async fn defaults_to_disabled() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        assert!(!store.audio_response_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        store.set_audio_response_enabled(true).await.unwrap();
        assert!(store.audio_response_enabled().await.unwrap());

        store.set_audio_response_enabled(false).await.unwrap();
        assert!(!store.audio_response_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn value_survives_reopening_the_database() {
        let tmp = TempDir::new().unwrap();

        {
            let store = store(&tmp).await;
            store.set_audio_response_enabled(true).await.unwrap();
        }

        let reopened = store(&tmp).await;
        assert!(reopened.audio_response_enabled().await.unwrap());
    }
}
