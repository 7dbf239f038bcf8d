//! In-memory job repository keyed by request fingerprint.
//!
//! [`JobStore`] owns the only shared mutable state in the system: the map
//! from [`Fingerprint`] to the current [`JobRecord`]. It is created empty at
//! process start, lives for the process lifetime, and is never persisted or
//! evicted (unbounded growth is an accepted limitation of the design).
//!
//! Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
//! shared between request handlers and background fulfillment tasks.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::RwLock;

use synthpop_core::{Fingerprint, JobRecord, JobStatus};

/// Concurrent fingerprint → job record map.
///
/// Two guarantees matter here:
///
/// 1. **Atomic check-and-reserve.** [`get_or_insert_with`] performs the
///    existence check and the insert under a single write-lock acquisition,
///    so concurrent submissions for one fingerprint can never both decide
///    to start work.
/// 2. **Monotonic records.** [`finish`] installs a terminal record only
///    while the current record is still pending, so a completed job can
///    never be overwritten or regressed, and a background write can never
///    be lost behind a stale request-path write.
///
/// [`get_or_insert_with`]: JobStore::get_or_insert_with
/// [`finish`]: JobStore::finish
pub struct JobStore {
    jobs: RwLock<HashMap<Fingerprint, JobRecord>>,
}

impl JobStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot the current record for a fingerprint, if any.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<JobRecord> {
        self.jobs.read().await.get(fingerprint).cloned()
    }

    /// Return the existing record for `fingerprint`, or insert the record
    /// produced by `make` and return that.
    ///
    /// The boolean reports whether this call inserted. `make` runs at most
    /// once, and only while holding the write lock, which makes
    /// "check if present" and "reserve a slot" one atomic step; it must
    /// therefore be fast and must not block.
    pub async fn get_or_insert_with<F>(&self, fingerprint: &Fingerprint, make: F) -> (JobRecord, bool)
    where
        F: FnOnce() -> JobRecord,
    {
        let mut jobs = self.jobs.write().await;
        match jobs.entry(fingerprint.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => (entry.insert(make()).clone(), true),
        }
    }

    /// Install a terminal record for a pending job.
    ///
    /// Returns `true` if the record was applied. The write is refused when
    /// no record exists for the fingerprint (fulfillment must always be
    /// preceded by a reservation) or when the current record is already
    /// terminal, keeping every observer's view of the state machine
    /// monotonic.
    pub async fn finish(&self, fingerprint: &Fingerprint, record: JobRecord) -> bool {
        debug_assert!(record.is_terminal(), "finish takes a terminal record");

        let mut jobs = self.jobs.write().await;
        match jobs.get(fingerprint) {
            Some(current) if current.status == JobStatus::Pending => {
                jobs.insert(fingerprint.clone(), record);
                true
            }
            Some(current) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    current_status = ?current.status,
                    "Refusing to replace a terminal job record"
                );
                false
            }
            None => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    "Refusing to finish a job that was never reserved"
                );
                false
            }
        }
    }

    /// Number of jobs currently tracked.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
