//! Bounded in-memory interaction log.
//!
//! Records are append-only and write-once; the only read path is the
//! recent-N slice backing `/user/{id}/context`. Nothing survives a process
//! restart.

use aria_types::InteractionRecord;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

/// Records kept per user.
const PER_USER_CAP: usize = 100;

/// User count that triggers opportunistic eviction on append.
const USER_EVICTION_THRESHOLD: usize = 10_000;

/// Users whose newest record is older than this are evictable.
const USER_IDLE_TTL_SECS: i64 = 3600;

#[derive(Clone, Default)]
pub struct InteractionStore {
    inner: Arc<RwLock<HashMap<String, VecDeque<InteractionRecord>>>>,
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record, trimming the user's ring to the cap.
    pub fn append(&self, record: InteractionRecord) {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("interaction store lock poisoned, recovering");
                poisoned.into_inner()
            }
        };

        if inner.len() > USER_EVICTION_THRESHOLD {
            let cutoff = Utc::now() - ChronoDuration::seconds(USER_IDLE_TTL_SECS);
            inner.retain(|_, records| {
                records
                    .back()
                    .map(|r| r.timestamp > cutoff)
                    .unwrap_or(false)
            });
        }

        let records = inner.entry(record.user_id.clone()).or_default();
        records.push_back(record);
        while records.len() > PER_USER_CAP {
            records.pop_front();
        }
    }

    /// The most recent `limit` records for a user, oldest first.
    pub fn recent(&self, user_id: &str, limit: usize) -> Vec<InteractionRecord> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner
            .get(user_id)
            .map(|records| {
                records
                    .iter()
                    .rev()
                    .take(limit)
                    .cloned()
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total records across all users (for the maintenance log line).
    pub fn len(&self) -> usize {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops users whose newest record is older than `cutoff`. Returns the
    /// number of users evicted.
    pub fn evict_idle_users(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = inner.len();
        inner.retain(|_, records| {
            records
                .back()
                .map(|r| r.timestamp > cutoff)
                .unwrap_or(false)
        });
        before - inner.len()
    }
}
