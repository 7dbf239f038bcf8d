//! Submission handling and background fulfillment.
//!
//! [`Orchestrator::submit`] is the single entry point for dataset requests.
//! It validates, fingerprints, and atomically reserves a job record; a new
//! pending record gets exactly one background fulfillment task, regardless
//! of how many concurrent or repeated submissions arrive for the same
//! fingerprint. Fulfillment tasks are tracked for graceful shutdown and
//! never hold a store lock while waiting on the simulated run.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use synthpop_core::simulation::Disposition;
use synthpop_core::{CoreError, DatasetRequest, Fingerprint, JobRecord, Simulator};
use synthpop_events::{EventBus, JobEvent, EVENT_JOB_FAILED, EVENT_JOB_READY};
use synthpop_store::JobStore;

use crate::config::EngineConfig;

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Deduplicating job orchestrator.
///
/// Shared via `Arc` between the API handlers and the binary entrypoint.
/// All job state lives in the [`JobStore`]; the orchestrator itself only
/// owns the task registry and the collaborator handles.
pub struct Orchestrator {
    store: Arc<JobStore>,
    simulator: Arc<dyn Simulator>,
    event_bus: Arc<EventBus>,
    config: EngineConfig,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create a new orchestrator over the given collaborators.
    pub fn new(
        store: Arc<JobStore>,
        simulator: Arc<dyn Simulator>,
        event_bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            simulator,
            event_bus,
            config,
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Submit a dataset request.
    ///
    /// Returns the current job record for the request's fingerprint —
    /// freshly created for a first submission, unchanged for a duplicate.
    /// Never blocks on fulfillment; a `Pending` record is returned while
    /// the background run is still going.
    ///
    /// Malformed requests are rejected with a validation error before the
    /// fingerprint is computed and never touch the store.
    pub async fn submit(&self, request: DatasetRequest) -> Result<JobRecord, CoreError> {
        request.validate()?;
        let fingerprint = Fingerprint::of(&request);

        // The disposition decision runs inside the store's reservation
        // step, so concurrent duplicates observe the reservation instead
        // of each rolling their own disposition.
        let mut deferred_estimate = None;
        let (record, inserted) = self
            .store
            .get_or_insert_with(&fingerprint, || match self.simulator.dispose(&request) {
                Disposition::Ready(result) => JobRecord::ready(result),
                Disposition::Deferred { estimated } => {
                    deferred_estimate = Some(estimated);
                    JobRecord::pending(estimated)
                }
            })
            .await;

        if !inserted {
            tracing::debug!(
                fingerprint = %fingerprint,
                status = ?record.status,
                "Duplicate submission observed existing job"
            );
            return Ok(record);
        }

        match deferred_estimate {
            Some(estimated) => {
                tracing::info!(
                    fingerprint = %fingerprint,
                    estimated_secs = estimated.as_secs(),
                    "Dataset job deferred; fulfillment scheduled"
                );
                self.spawn_fulfillment(fingerprint, request, estimated);
            }
            None => {
                tracing::info!(fingerprint = %fingerprint, "Dataset resolved on the fast path");
            }
        }

        Ok(record)
    }

    /// Spawn the single background fulfillment task for a new pending job.
    fn spawn_fulfillment(
        &self,
        fingerprint: Fingerprint,
        request: DatasetRequest,
        estimated: Duration,
    ) {
        let task = FulfillmentTask {
            store: Arc::clone(&self.store),
            simulator: Arc::clone(&self.simulator),
            event_bus: Arc::clone(&self.event_bus),
            cancel: self.cancel.clone(),
            max_attempts: self.config.max_attempts,
        };
        self.tasks.spawn(task.run(fingerprint, request, estimated));
    }

    /// Stop accepting new fulfillment work and wait for in-flight tasks.
    ///
    /// In-flight simulated runs observe the cancellation at their next
    /// suspension point and exit, leaving their records `Pending`; the
    /// store dies with the process, so nothing stale survives.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}

// ---------------------------------------------------------------------------
// FulfillmentTask
// ---------------------------------------------------------------------------

/// One background fulfillment run, from pending reservation to terminal
/// record and notification event.
struct FulfillmentTask {
    store: Arc<JobStore>,
    simulator: Arc<dyn Simulator>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    max_attempts: u32,
}

impl FulfillmentTask {
    async fn run(self, fingerprint: Fingerprint, request: DatasetRequest, estimated: Duration) {
        for attempt in 1..=self.max_attempts {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(fingerprint = %fingerprint, "Fulfillment stopped by shutdown");
                    return;
                }
                outcome = self.simulator.fulfill(&request, estimated) => outcome,
            };

            match outcome {
                Ok(result) => {
                    let payload = serde_json::to_value(&result).unwrap_or_default();
                    if self.store.finish(&fingerprint, JobRecord::ready(result)).await {
                        tracing::info!(fingerprint = %fingerprint, attempt, "Dataset ready");
                        self.event_bus.publish(
                            JobEvent::new(
                                EVENT_JOB_READY,
                                fingerprint.clone(),
                                request.contact_address.clone(),
                            )
                            .with_payload(payload),
                        );
                    }
                    return;
                }
                Err(error) if attempt < self.max_attempts => {
                    tracing::warn!(
                        fingerprint = %fingerprint,
                        attempt,
                        error = %error,
                        "Fulfillment attempt failed; retrying"
                    );
                }
                Err(error) => {
                    let reason = format!(
                        "Fulfillment failed after {} attempts: {error}",
                        self.max_attempts
                    );
                    if self
                        .store
                        .finish(&fingerprint, JobRecord::failed(reason.clone()))
                        .await
                    {
                        tracing::error!(
                            fingerprint = %fingerprint,
                            error = %error,
                            "Dataset job failed permanently"
                        );
                        self.event_bus.publish(
                            JobEvent::new(
                                EVENT_JOB_FAILED,
                                fingerprint.clone(),
                                request.contact_address.clone(),
                            )
                            .with_payload(serde_json::json!({ "reason": reason })),
                        );
                    }
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use synthpop_core::simulation::{SimulationError, VERIFICATION_SCORE_MAX};
    use synthpop_core::{JobResult, JobStatus, RandomSimulator};

    /// What the stub's `fulfill` does after being called.
    enum StubBehavior {
        /// Return a fixed result immediately.
        Succeed,
        /// Return a backend error immediately.
        Fail,
        /// Sleep far longer than any test runs.
        Stall,
    }

    /// Counting fulfillment stub. Always defers with a fixed estimate.
    struct StubSimulator {
        behavior: StubBehavior,
        dispose_calls: AtomicUsize,
        fulfill_calls: AtomicUsize,
    }

    impl StubSimulator {
        fn new(behavior: StubBehavior) -> Self {
            Self {
                behavior,
                dispose_calls: AtomicUsize::new(0),
                fulfill_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Simulator for StubSimulator {
        fn dispose(&self, _request: &DatasetRequest) -> Disposition {
            self.dispose_calls.fetch_add(1, Ordering::SeqCst);
            Disposition::Deferred {
                estimated: Duration::from_secs(1800),
            }
        }

        async fn fulfill(
            &self,
            _request: &DatasetRequest,
            _estimated: Duration,
        ) -> Result<JobResult, SimulationError> {
            self.fulfill_calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                StubBehavior::Succeed => Ok(JobResult {
                    synthetic_population: 4242,
                    verification_score: 73.5,
                }),
                StubBehavior::Fail => {
                    Err(SimulationError::Backend("synthesis node offline".into()))
                }
                StubBehavior::Stall => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("stalled fulfillment must be cancelled, not completed")
                }
            }
        }
    }

    fn request() -> DatasetRequest {
        DatasetRequest {
            region: "EU".to_string(),
            year: "2024".to_string(),
            population: "1000000".to_string(),
            contact_address: "analyst@example.org".to_string(),
        }
    }

    fn orchestrator(simulator: Arc<dyn Simulator>) -> (Arc<Orchestrator>, Arc<JobStore>) {
        let store = Arc::new(JobStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            simulator,
            Arc::new(EventBus::default()),
            EngineConfig::default(),
        ));
        (orchestrator, store)
    }

    /// Poll the store until the record for `fingerprint` is terminal.
    async fn wait_for_terminal(store: &JobStore, fingerprint: &Fingerprint) -> JobRecord {
        for _ in 0..200 {
            if let Some(record) = store.get(fingerprint).await {
                if record.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    // -- deduplication --------------------------------------------------------

    #[tokio::test]
    async fn concurrent_submissions_schedule_exactly_one_fulfillment() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Succeed));
        let (orchestrator, store) = orchestrator(Arc::clone(&simulator) as Arc<dyn Simulator>);
        let fingerprint = Fingerprint::of(&request());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let orchestrator = Arc::clone(&orchestrator);
            handles.push(tokio::spawn(
                async move { orchestrator.submit(request()).await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        wait_for_terminal(&store, &fingerprint).await;
        assert_eq!(simulator.dispose_calls.load(Ordering::SeqCst), 1);
        assert_eq!(simulator.fulfill_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_submissions_observe_the_same_pending_record() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Stall));
        let (orchestrator, _store) = orchestrator(Arc::clone(&simulator) as Arc<dyn Simulator>);

        let first = orchestrator.submit(request()).await.unwrap();
        let second = orchestrator.submit(request()).await.unwrap();

        assert_eq!(first.status, JobStatus::Pending);
        assert_eq!(first, second);
        assert_eq!(
            first.estimated_duration_secs,
            second.estimated_duration_secs
        );
        assert_eq!(simulator.dispose_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_record_is_returned_unchanged_on_resubmit() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Succeed));
        let (orchestrator, store) = orchestrator(Arc::clone(&simulator) as Arc<dyn Simulator>);
        let fingerprint = Fingerprint::of(&request());

        orchestrator.submit(request()).await.unwrap();
        let terminal = wait_for_terminal(&store, &fingerprint).await;

        let resubmitted = orchestrator.submit(request()).await.unwrap();
        assert_eq!(terminal, resubmitted);
        assert_eq!(simulator.dispose_calls.load(Ordering::SeqCst), 1);
        assert_eq!(simulator.fulfill_calls.load(Ordering::SeqCst), 1);
    }

    // -- fast path ------------------------------------------------------------

    #[tokio::test]
    async fn fast_path_returns_ready_with_in_range_result() {
        let simulator = Arc::new(RandomSimulator::seeded(5).with_ready_probability(1.0));
        let (orchestrator, _store) = orchestrator(simulator);

        let record = orchestrator.submit(request()).await.unwrap();
        assert_eq!(record.status, JobStatus::Ready);

        let result = record.result.expect("ready record carries a result");
        assert!(result.synthetic_population < 1_000_000);
        assert!(result.verification_score >= 0.0);
        assert!(result.verification_score < VERIFICATION_SCORE_MAX);
    }

    // -- failure path ---------------------------------------------------------

    #[tokio::test]
    async fn failing_fulfillment_settles_at_failed_with_a_reason() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Fail));
        let (orchestrator, store) = orchestrator(Arc::clone(&simulator) as Arc<dyn Simulator>);
        let fingerprint = Fingerprint::of(&request());

        let submitted = orchestrator.submit(request()).await.unwrap();
        assert_eq!(submitted.status, JobStatus::Pending);

        let record = wait_for_terminal(&store, &fingerprint).await;
        assert_eq!(record.status, JobStatus::Failed);
        let reason = record.failure_reason.expect("failed record carries a reason");
        assert!(reason.contains("after 3 attempts"));
        assert_eq!(simulator.fulfill_calls.load(Ordering::SeqCst), 3);
    }

    // -- validation -----------------------------------------------------------

    #[tokio::test]
    async fn invalid_request_never_reaches_the_store() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Succeed));
        let (orchestrator, store) = orchestrator(Arc::clone(&simulator) as Arc<dyn Simulator>);

        let mut bad = request();
        bad.year = "not-a-year".to_string();

        assert_matches!(
            orchestrator.submit(bad).await,
            Err(CoreError::Validation(_))
        );
        assert!(store.is_empty().await);
        assert_eq!(simulator.dispose_calls.load(Ordering::SeqCst), 0);
    }

    // -- events ---------------------------------------------------------------

    #[tokio::test]
    async fn exactly_one_ready_event_is_published() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Succeed));
        let store = Arc::new(JobStore::new());
        let event_bus = Arc::new(EventBus::default());
        let mut rx = event_bus.subscribe();
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            simulator,
            Arc::clone(&event_bus),
            EngineConfig::default(),
        );
        let fingerprint = Fingerprint::of(&request());

        orchestrator.submit(request()).await.unwrap();
        orchestrator.submit(request()).await.unwrap();
        wait_for_terminal(&store, &fingerprint).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_JOB_READY);
        assert_eq!(event.fingerprint, fingerprint);
        assert_eq!(event.contact_address, "analyst@example.org");

        // No second terminal event may ever arrive for the same job.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_event_carries_the_reason() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Fail));
        let store = Arc::new(JobStore::new());
        let event_bus = Arc::new(EventBus::default());
        let mut rx = event_bus.subscribe();
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            simulator,
            Arc::clone(&event_bus),
            EngineConfig::default(),
        );
        let fingerprint = Fingerprint::of(&request());

        orchestrator.submit(request()).await.unwrap();
        wait_for_terminal(&store, &fingerprint).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_JOB_FAILED);
        assert!(event.payload["reason"]
            .as_str()
            .unwrap()
            .contains("synthesis node offline"));
    }

    // -- shutdown -------------------------------------------------------------

    #[tokio::test]
    async fn shutdown_cancels_inflight_fulfillment() {
        let simulator = Arc::new(StubSimulator::new(StubBehavior::Stall));
        let (orchestrator, store) = orchestrator(Arc::clone(&simulator) as Arc<dyn Simulator>);
        let fingerprint = Fingerprint::of(&request());

        orchestrator.submit(request()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), orchestrator.shutdown())
            .await
            .expect("shutdown must not hang on a stalled run");

        // The abandoned job stays pending; the store dies with the process.
        let record = store.get(&fingerprint).await.unwrap();
        assert_eq!(record.status, JobStatus::Pending);
    }
}
