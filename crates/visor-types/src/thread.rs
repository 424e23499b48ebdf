//! Conversation thread records.
//!
//! A `ThreadRecord` is the locally persisted view of one durable remote
//! conversation context. The remote system issues the opaque `thread_id`;
//! everything else is client-side metadata. A record expires once its age
//! exceeds the configured TTL -- expiry is checked lazily on read, never by
//! a background timer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default thread time-to-live in hours.
pub const DEFAULT_THREAD_TTL_HOURS: i64 = 24;

/// Locally persisted metadata for one remote conversation thread.
///
/// A thread belongs to exactly one agent at a time. `message_count` and
/// `last_used_at` are bumped after every successful exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: String,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub message_count: u32,
    /// Freeform client data attached to the thread.
    #[serde(default)]
    pub custom_data: serde_json::Value,
}

impl ThreadRecord {
    /// Create a fresh record for a newly issued remote thread id.
    pub fn new(thread_id: impl Into<String>, agent_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            thread_id: thread_id.into(),
            agent_id: agent_id.into(),
            created_at: now,
            last_used_at: now,
            message_count: 0,
            custom_data: serde_json::Value::Null,
        }
    }

    /// Whether this thread has outlived the TTL.
    ///
    /// Expiry is strict: a thread aged exactly `ttl` is still valid;
    /// one second past it is not.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }

    /// Record a completed exchange: bump the message count and usage time.
    pub fn record_exchange(&mut self, now: DateTime<Utc>) {
        self.message_count += 1;
        self.last_used_at = now;
    }
}

/// The default TTL as a chrono duration.
pub fn default_ttl() -> Duration {
    Duration::hours(DEFAULT_THREAD_TTL_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_created_at(created: DateTime<Utc>) -> ThreadRecord {
        ThreadRecord::new("thread_abc", "asst_guide", created)
    }

    #[test]
    fn fresh_record_starts_at_zero_messages() {
        let now = Utc::now();
        let record = record_created_at(now);
        assert_eq!(record.message_count, 0);
        assert_eq!(record.created_at, record.last_used_at);
    }

    #[test]
    fn is_expired_boundary() {
        let ttl = default_ttl();
        let created = Utc::now();
        let record = record_created_at(created);

        // One second shy of the TTL: still valid.
        assert!(!record.is_expired(created + ttl - Duration::seconds(1), ttl));
        // Exactly at the TTL: still valid (expiry is strictly greater-than).
        assert!(!record.is_expired(created + ttl, ttl));
        // One second past: expired.
        assert!(record.is_expired(created + ttl + Duration::seconds(1), ttl));
    }

    #[test]
    fn record_exchange_bumps_count_and_usage() {
        let created = Utc::now();
        let mut record = record_created_at(created);
        let later = created + Duration::minutes(5);

        record.record_exchange(later);
        record.record_exchange(later);

        assert_eq!(record.message_count, 2);
        assert_eq!(record.last_used_at, later);
        // Creation time is untouched -- expiry is measured from creation.
        assert_eq!(record.created_at, created);
    }
}
