//! The fulfillment backend behind dataset jobs.
//!
//! [`Simulator`] is the seam between the orchestration engine and whatever
//! actually produces a dataset. The shipped implementation,
//! [`RandomSimulator`], stands in for a compute-heavy synthesis backend:
//! it resolves a share of requests immediately and defers the rest behind
//! a simulated multi-minute run. Tests substitute their own implementations
//! to count, fail, or stall fulfillment on demand.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::job::JobResult;
use crate::request::DatasetRequest;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Share of requests resolved immediately, without a background run.
pub const DEFAULT_READY_PROBABILITY: f64 = 0.30;

/// Lower bound (inclusive) of the simulated run estimate, in seconds.
pub const ESTIMATE_MIN_SECS: u64 = 30 * 60;

/// Upper bound (exclusive) of the simulated run estimate, in seconds.
pub const ESTIMATE_MAX_SECS: u64 = 90 * 60;

/// Verification scores are drawn from `[0.0, VERIFICATION_SCORE_MAX)`.
pub const VERIFICATION_SCORE_MAX: f64 = 100.0;

/// Population ceiling used when a request's population field does not parse.
/// Requests are validated before they reach the simulator, so this only
/// matters when the simulator is driven directly.
pub const FALLBACK_POPULATION_CEILING: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// Initial disposition of a newly fingerprinted request.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// The dataset happens to be available right away.
    Ready(JobResult),

    /// The dataset must be synthesized in the background.
    Deferred {
        /// How long the run is expected to take.
        estimated: Duration,
    },
}

// ---------------------------------------------------------------------------
// SimulationError
// ---------------------------------------------------------------------------

/// Failure of a synthesis run.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Synthesis backend failure: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Simulator trait
// ---------------------------------------------------------------------------

/// A fulfillment backend.
///
/// `dispose` is called exactly once per fingerprint, inside the store's
/// reservation step, and must be fast and non-blocking. `fulfill` runs on a
/// background task and may take as long as it needs; it receives the
/// estimate that `dispose` promised so the two stay consistent.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Decide the initial disposition for a request.
    fn dispose(&self, request: &DatasetRequest) -> Disposition;

    /// Perform (or simulate) the full synthesis run for a deferred request.
    async fn fulfill(
        &self,
        request: &DatasetRequest,
        estimated: Duration,
    ) -> Result<JobResult, SimulationError>;
}

// ---------------------------------------------------------------------------
// RandomSimulator
// ---------------------------------------------------------------------------

/// The stand-in backend: random outcomes, simulated waits.
///
/// With probability `ready_probability` a request resolves immediately;
/// otherwise it is deferred behind an estimate drawn uniformly from
/// `[ESTIMATE_MIN_SECS, ESTIMATE_MAX_SECS)`. Synthetic population counts
/// are drawn from `[0, requested population)` and verification scores from
/// `[0.0, 100.0)`.
///
/// Seedable for deterministic tests; `time_scale` compresses the simulated
/// wait (the *reported* estimate is never scaled) so local runs finish in
/// seconds instead of an hour.
pub struct RandomSimulator {
    ready_probability: f64,
    time_scale: f64,
    rng: Mutex<StdRng>,
}

impl RandomSimulator {
    /// A simulator seeded from the operating system.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// A deterministically seeded simulator, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            ready_probability: DEFAULT_READY_PROBABILITY,
            time_scale: 1.0,
            rng: Mutex::new(rng),
        }
    }

    /// Override the fast-path probability. Clamped to `[0.0, 1.0]`.
    pub fn with_ready_probability(mut self, probability: f64) -> Self {
        self.ready_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Scale the simulated wait, e.g. `0.001` to turn minutes into tens of
    /// milliseconds for local runs. Clamped to be non-negative.
    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale.max(0.0);
        self
    }

    /// Draw a result for the given request.
    fn draw_result(&self, request: &DatasetRequest) -> JobResult {
        let ceiling = request
            .parsed_population()
            .unwrap_or(FALLBACK_POPULATION_CEILING);
        let mut rng = self.rng.lock().expect("simulator rng lock");
        JobResult {
            synthetic_population: rng.random_range(0..ceiling),
            verification_score: rng.random::<f64>() * VERIFICATION_SCORE_MAX,
        }
    }
}

impl Default for RandomSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Simulator for RandomSimulator {
    fn dispose(&self, request: &DatasetRequest) -> Disposition {
        let fast_path = {
            let mut rng = self.rng.lock().expect("simulator rng lock");
            rng.random_bool(self.ready_probability)
        };
        if fast_path {
            Disposition::Ready(self.draw_result(request))
        } else {
            let estimate_secs = {
                let mut rng = self.rng.lock().expect("simulator rng lock");
                rng.random_range(ESTIMATE_MIN_SECS..ESTIMATE_MAX_SECS)
            };
            Disposition::Deferred {
                estimated: Duration::from_secs(estimate_secs),
            }
        }
    }

    async fn fulfill(
        &self,
        request: &DatasetRequest,
        estimated: Duration,
    ) -> Result<JobResult, SimulationError> {
        tokio::time::sleep(estimated.mul_f64(self.time_scale)).await;
        Ok(self.draw_result(request))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
