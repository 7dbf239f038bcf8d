//! The job record state machine.
//!
//! A [`JobRecord`] is an immutable snapshot of what is known about one
//! fingerprint's job. State transitions replace the stored record; fields
//! are never mutated in place. Valid histories are
//! `pending → ready`, `pending → failed`, or `ready` on the fast path;
//! `ready` and `failed` are terminal.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a dataset job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Fulfillment is running in the background.
    Pending,

    /// The dataset is available.
    Ready,

    /// Fulfillment gave up after its retry budget.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal. Terminal records are never replaced.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// JobResult
// ---------------------------------------------------------------------------

/// The outcome of a completed synthesis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Number of synthetic individuals generated, in `[0, requested)`.
    pub synthetic_population: u64,

    /// Verification score in `[0.0, 100.0)`.
    pub verification_score: f64,
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// Everything known about one fingerprint's job.
///
/// Exactly one of `estimated_duration_secs`, `result`, or `failure_reason`
/// is populated, determined by `status`. The constructors are the only way
/// to build a record, which keeps that invariant total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub status: JobStatus,

    /// Estimated time to completion. Populated iff `status == Pending`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,

    /// The synthesis outcome. Populated iff `status == Ready`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,

    /// Why fulfillment gave up. Populated iff `status == Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// When this snapshot was created (UTC).
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// A job whose fulfillment is running in the background.
    pub fn pending(estimated: Duration) -> Self {
        Self {
            status: JobStatus::Pending,
            estimated_duration_secs: Some(estimated.as_secs()),
            result: None,
            failure_reason: None,
            updated_at: chrono::Utc::now(),
        }
    }

    /// A job that completed successfully.
    pub fn ready(result: JobResult) -> Self {
        Self {
            status: JobStatus::Ready,
            estimated_duration_secs: None,
            result: Some(result),
            failure_reason: None,
            updated_at: chrono::Utc::now(),
        }
    }

    /// A job whose fulfillment failed permanently.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            estimated_duration_secs: None,
            result: None,
            failure_reason: Some(reason.into()),
            updated_at: chrono::Utc::now(),
        }
    }

    /// Whether this record is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
