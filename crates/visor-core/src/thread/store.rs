//! Persistence traits for thread records and user preferences.
//!
//! Defines the interface for the only persistent shared state in the
//! client: the agent-to-thread mapping with its metadata, and the global
//! audio-response flag. Uses RPITIT (native async fn in traits, Rust 2024
//! edition). Implementations live in visor-infra.

use chrono::{DateTime, Utc};

use visor_types::error::StoreError;
use visor_types::thread::ThreadRecord;

/// Persistent store for the agent-to-thread mapping and thread metadata.
///
/// At most one record exists per agent; storing a record for an agent
/// replaces its previous mapping.
pub trait ThreadStore: Send + Sync {
    /// The persisted record for an agent's active thread, if any.
    /// Returns the raw record -- expiry is the caller's concern.
    fn active_thread(
        &self,
        agent_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ThreadRecord>, StoreError>> + Send;

    /// Persist a record, replacing any existing mapping for its agent.
    fn put_thread(
        &self,
        record: &ThreadRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Remove the mapping and metadata for an agent. No-op when absent.
    fn remove_thread(
        &self,
        agent_id: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Bump `message_count` and `last_used_at` for a thread after a
    /// successful exchange.
    fn record_exchange(
        &self,
        thread_id: &str,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete every record created strictly before `cutoff`; returns the
    /// number removed. Used by the advisory cleanup sweep.
    fn remove_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    /// All persisted records, in no particular order.
    fn all_threads(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ThreadRecord>, StoreError>> + Send;
}

/// Persistent store for the single global audio-response preference.
///
/// Deliberately a lone boolean keyed by nothing else -- the toggle is
/// global, not per-thread.
pub trait PreferenceStore: Send + Sync {
    /// Current value; `false` when never set.
    fn audio_response_enabled(
        &self,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    fn set_audio_response_enabled(
        &self,
        enabled: bool,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
