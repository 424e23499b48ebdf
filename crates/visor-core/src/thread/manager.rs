//! Thread lifecycle manager.
//!
//! Owns the durable conversation-thread identifier for each agent:
//! creation through the gateway, persistence, lazy TTL expiry, and the
//! metadata bumps after successful exchanges. Expiry is only ever checked
//! on read -- an expired record is silently replaced with a fresh thread,
//! which is an expected recoverable condition, not an error.
//!
//! Generic over the gateway and store traits so the core never depends on
//! infrastructure.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;

use visor_types::error::ThreadError;
use visor_types::thread::ThreadRecord;

use crate::gateway::ConversationGateway;
use crate::thread::store::ThreadStore;

/// Manages the agent-to-thread mapping and thread metadata.
pub struct ThreadManager<G, S> {
    gateway: Arc<G>,
    store: Arc<S>,
    ttl: Duration,
}

impl<G: ConversationGateway, S: ThreadStore> ThreadManager<G, S> {
    pub fn new(gateway: Arc<G>, store: Arc<S>, ttl: Duration) -> Self {
        Self { gateway, store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current valid thread for `agent_id`, creating one when none
    /// exists or the persisted one has expired. Never returns an expired
    /// thread.
    ///
    /// On creation failure the prior persisted state is left untouched and
    /// the error propagates -- callers must treat it as "cannot proceed".
    pub async fn ensure_active_thread(&self, agent_id: &str) -> Result<String, ThreadError> {
        if let Some(record) = self.store.active_thread(agent_id).await? {
            if !record.is_expired(Utc::now(), self.ttl) {
                return Ok(record.thread_id);
            }
            debug!(agent_id, thread_id = %record.thread_id, "thread expired, replacing");
        }
        self.create_and_persist(agent_id).await
    }

    /// Unconditionally discard any existing thread for `agent_id` and
    /// start a fresh one. Used for explicit "new conversation" requests.
    pub async fn create_new_thread(&self, agent_id: &str) -> Result<String, ThreadError> {
        self.create_and_persist(agent_id).await
    }

    /// Remove the persisted mapping without contacting the remote system.
    pub async fn clear_active_thread(&self, agent_id: &str) -> Result<(), ThreadError> {
        self.store.remove_thread(agent_id).await?;
        Ok(())
    }

    /// Bump usage metadata after a successful exchange.
    pub async fn record_exchange(&self, thread_id: &str) -> Result<(), ThreadError> {
        self.store.record_exchange(thread_id, Utc::now()).await?;
        Ok(())
    }

    /// Advisory housekeeping: remove every persisted record older than the
    /// TTL. Safe to call at any time, or never -- expiry is also enforced
    /// lazily on every read.
    pub async fn cleanup_expired(&self) -> Result<u64, ThreadError> {
        let cutoff = Utc::now() - self.ttl;
        let removed = self.store.remove_created_before(cutoff).await?;
        if removed > 0 {
            debug!(removed, "swept expired threads");
        }
        Ok(removed)
    }

    /// Create the remote thread first, then replace the local mapping.
    /// Ordering matters: a remote failure leaves prior state intact.
    async fn create_and_persist(&self, agent_id: &str) -> Result<String, ThreadError> {
        let thread_id = self.gateway.create_thread().await?;
        self.store.remove_thread(agent_id).await?;
        let record = ThreadRecord::new(thread_id.clone(), agent_id, Utc::now());
        self.store.put_thread(&record).await?;
        debug!(agent_id, %thread_id, "created thread");
        Ok(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeGateway, MemoryThreadStore};
    use visor_types::thread::default_ttl;

    fn manager(
        gateway: Arc<FakeGateway>,
        store: Arc<MemoryThreadStore>,
    ) -> ThreadManager<FakeGateway, MemoryThreadStore> {
        ThreadManager::new(gateway, store, default_ttl())
    }

    #[tokio::test]
    async fn ensure_twice_returns_same_thread_without_second_create() {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryThreadStore::default());
        let mgr = manager(gateway.clone(), store);

        let first = mgr.ensure_active_thread("asst_guide").await.unwrap();
        let second = mgr.ensure_active_thread("asst_guide").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.create_thread_calls(), 1);
    }

    #[tokio::test]
    async fn ensure_replaces_expired_thread() {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryThreadStore::default());

        // Seed a record well past the TTL.
        let stale = ThreadRecord::new(
            "thread_old",
            "asst_guide",
            Utc::now() - Duration::hours(25),
        );
        store.seed(stale);

        let mgr = manager(gateway.clone(), store.clone());
        let id = mgr.ensure_active_thread("asst_guide").await.unwrap();

        assert_ne!(id, "thread_old");
        assert_eq!(gateway.create_thread_calls(), 1);
        // The stale mapping is gone, replaced by the new record.
        let current = store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(current.thread_id, id);
    }

    #[tokio::test]
    async fn create_new_thread_discards_existing() {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryThreadStore::default());
        let mgr = manager(gateway.clone(), store.clone());

        let first = mgr.ensure_active_thread("asst_guide").await.unwrap();
        let second = mgr.create_new_thread("asst_guide").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(gateway.create_thread_calls(), 2);
        let current = store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(current.thread_id, second);
    }

    #[tokio::test]
    async fn creation_failure_leaves_prior_state_untouched() {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryThreadStore::default());
        let mgr = manager(gateway.clone(), store.clone());

        let existing = mgr.ensure_active_thread("asst_guide").await.unwrap();

        gateway.fail_create_thread();
        assert!(mgr.create_new_thread("asst_guide").await.is_err());

        let current = store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(current.thread_id, existing);
    }

    #[tokio::test]
    async fn cleanup_removes_only_records_past_ttl() {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryThreadStore::default());

        store.seed(ThreadRecord::new(
            "thread_old",
            "asst_a",
            Utc::now() - Duration::hours(30),
        ));
        store.seed(ThreadRecord::new("thread_fresh", "asst_b", Utc::now()));

        let mgr = manager(gateway, store.clone());
        let removed = mgr.cleanup_expired().await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.active_thread("asst_a").await.unwrap().is_none());
        assert!(store.active_thread("asst_b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn record_exchange_bumps_metadata() {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryThreadStore::default());
        let mgr = manager(gateway, store.clone());

        let id = mgr.ensure_active_thread("asst_guide").await.unwrap();
        mgr.record_exchange(&id).await.unwrap();
        mgr.record_exchange(&id).await.unwrap();

        let record = store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(record.message_count, 2);
    }
}
