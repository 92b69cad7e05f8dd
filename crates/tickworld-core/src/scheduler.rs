//! The tick scheduler: admission entry point and per-tick batch protocol.
//!
//! A [`TickScheduler`] is bound to exactly one world. It owns the world's
//! [`AdmissionQueue`], its [`ExecutionEngine`], and a fixed-interval timer
//! task. Submitters call [`admit`](TickScheduler::admit) from anywhere;
//! once per interval the timer task runs one tick:
//!
//! 1. Increment the tick counter (even if nothing is queued).
//! 2. Flush the queue, committing every drained nonce.
//! 3. Execute the batch in admission order, one engine call per action.
//!    Engine errors, panics, and exceeded deadlines are recorded as that
//!    action's failure and never stop the rest of the batch.
//! 4. Hand the ordered [`TickReport`] to the [`TickSink`].
//!
//! # Timing
//!
//! The first tick fires one interval after [`start`](TickScheduler::start).
//! Ticks never overlap: they run one at a time on the timer task, and a tick
//! that overruns the interval causes the firings it missed to be dropped;
//! the next tick fires one full interval after the overrun tick finished.
//!
//! # Lifecycle
//!
//! `Idle --start--> Running --stop--> Idle`. Stopping prevents further
//! ticks but lets a tick already executing run to completion;
//! [`shutdown`](TickScheduler::shutdown) additionally waits for it.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt as _;
use tickworld_types::{
    ActionOutcome, ActionReport, AgentAddress, SignedAction, TickReport, WorldId,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::TickConfig;
use crate::engine::{EXECUTE_METHOD, ExecutionEngine, ExecutionError, ExecutionRequest};
use crate::queue::{AdmissionQueue, QueueError};
use crate::signature::SignatureVerifier;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons an action is refused at admission. Nothing refused is queued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The signature does not verify for the claimed agent.
    #[error("invalid signature")]
    InvalidSignature,

    /// The action is addressed to a different world.
    #[error("action for wrong world: {actual} != {expected}")]
    WorldMismatch {
        /// The world this scheduler is bound to.
        expected: WorldId,
        /// The world named by the action.
        actual: WorldId,
    },

    /// The nonce was committed by an earlier tick.
    #[error("duplicate nonce {nonce} for agent {agent}")]
    DuplicateNonce {
        /// The submitting agent.
        agent: AgentAddress,
        /// The replayed nonce.
        nonce: u64,
    },
}

impl From<QueueError> for AdmissionError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::DuplicateNonce { agent, nonce } => Self::DuplicateNonce { agent, nonce },
        }
    }
}

/// Lifecycle misuse. Fatal to the call, not to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// `start` was called while the timer task is running.
    #[error("tick scheduler already running")]
    AlreadyRunning,

    /// The operation needs a running timer task.
    #[error("tick scheduler not running")]
    NotRunning,
}

/// Failures of a tick as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    /// The tick counter would exceed `u64::MAX`.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Why a single action's execution failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionExecutionFailure {
    /// The engine returned an error.
    #[error(transparent)]
    Engine(#[from] ExecutionError),

    /// The engine call exceeded the configured deadline.
    #[error("execution timed out after {limit_ms}ms")]
    TimedOut {
        /// The deadline in milliseconds.
        limit_ms: u128,
    },

    /// The engine panicked while executing the action.
    #[error("engine panicked: {0}")]
    Panicked(String),
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Receives the report of every tick that executed a non-empty batch.
///
/// Implementations forward reports to clients, logs, or storage. They are
/// called on the timer task and should not block.
pub trait TickSink: Send + Sync {
    /// Called once per non-empty tick, after the whole batch has executed.
    fn on_tick(&self, report: &TickReport);
}

/// A sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl TickSink for NoOpSink {
    fn on_tick(&self, _report: &TickReport) {}
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Timing parameters for a [`TickScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Wall-clock period between ticks. Must be non-zero.
    pub tick_interval: Duration,
    /// Optional per-action execution deadline.
    pub execution_timeout: Option<Duration>,
}

impl From<&TickConfig> for SchedulerConfig {
    fn from(config: &TickConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            execution_timeout: config.execution_timeout(),
        }
    }
}

/// Receipt for an admitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Queue length right after the action was appended.
    pub queue_size: usize,
    /// The tick expected to execute the action.
    pub next_tick: u64,
}

struct Shared<E> {
    world_id: WorldId,
    queue: AdmissionQueue,
    engine: E,
    sink: Arc<dyn TickSink>,
    config: SchedulerConfig,
    tick_count: AtomicU64,
    tick_gate: tokio::sync::Mutex<()>,
}

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Admission entry point and fixed-interval executor for one world.
pub struct TickScheduler<E> {
    shared: Arc<Shared<E>>,
    running: Mutex<Option<RunningLoop>>,
}

impl<E: ExecutionEngine> TickScheduler<E> {
    /// Create an idle scheduler bound to `world_id`.
    pub fn new(
        world_id: WorldId,
        engine: E,
        sink: Arc<dyn TickSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                world_id,
                queue: AdmissionQueue::new(),
                engine,
                sink,
                config,
                tick_count: AtomicU64::new(0),
                tick_gate: tokio::sync::Mutex::new(()),
            }),
            running: Mutex::new(None),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Verify an action and queue it for the next tick.
    ///
    /// Checks run in order: signature, world binding, nonce.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidSignature`],
    /// [`AdmissionError::WorldMismatch`], or
    /// [`AdmissionError::DuplicateNonce`]. A rejected action is never queued.
    pub fn admit(&self, action: SignedAction) -> Result<Admission, AdmissionError> {
        let agent = action.agent_address;
        let nonce = action.nonce;

        if !SignatureVerifier::verify(&action) {
            warn!(%agent, nonce, "rejected action: invalid signature");
            return Err(AdmissionError::InvalidSignature);
        }

        if action.world_id != self.shared.world_id {
            warn!(
                %agent,
                nonce,
                world_id = %action.world_id,
                bound_world = %self.shared.world_id,
                "rejected action: wrong world"
            );
            return Err(AdmissionError::WorldMismatch {
                expected: self.shared.world_id.clone(),
                actual: action.world_id,
            });
        }

        // Read under the queue lock: ticks advance the counter inside the
        // flush critical section, so this is the tick that will take it.
        let (queue_size, ticks_before) = self
            .shared
            .queue
            .push_with(action, || self.tick_count())
            .map_err(|err| {
                warn!(%agent, nonce, "rejected action: duplicate nonce");
                AdmissionError::from(err)
            })?;

        let next_tick = ticks_before.saturating_add(1);
        debug!(%agent, nonce, queue_size, next_tick, "action admitted");
        Ok(Admission {
            queue_size,
            next_tick,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the timer task. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the timer task is
    /// already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut running = self.running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(Arc::clone(&self.shared), stop_rx));
        *running = Some(RunningLoop { stop_tx, handle });

        info!(
            world_id = %self.shared.world_id,
            tick_interval_ms = self.shared.config.tick_interval.as_millis(),
            "tick scheduler started"
        );
        Ok(())
    }

    /// Stop firing ticks. A tick already executing runs to completion in
    /// the background. No-op when idle.
    pub fn stop(&self) {
        if let Some(running) = self.running().take() {
            signal_stop(&self.shared.world_id, &running);
            info!(world_id = %self.shared.world_id, "tick scheduler stopping");
        }
    }

    /// Stop firing ticks and wait for any in-flight tick to finish.
    ///
    /// Returns the final tick count.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if the scheduler is idle.
    pub async fn shutdown(&self) -> Result<u64, SchedulerError> {
        let running = self.running().take().ok_or(SchedulerError::NotRunning)?;
        signal_stop(&self.shared.world_id, &running);
        if let Err(e) = running.handle.await {
            error!(world_id = %self.shared.world_id, error = %e, "tick task ended abnormally");
        }
        Ok(self.tick_count())
    }

    /// Whether the timer task is running.
    pub fn is_running(&self) -> bool {
        self.running()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// Run one tick immediately, outside the timer.
    ///
    /// Serialized with timer-driven ticks. Returns the report, or `None` if
    /// the batch was empty.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::TickOverflow`] if the counter is exhausted.
    pub async fn run_tick(&self) -> Result<Option<TickReport>, TickError> {
        self.shared.run_tick().await
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// The world this scheduler accepts actions for.
    pub fn world_id(&self) -> &WorldId {
        &self.shared.world_id
    }

    /// Number of ticks run so far, including empty ones.
    pub fn tick_count(&self) -> u64 {
        self.shared.tick_count.load(Ordering::Acquire)
    }

    /// Number of actions waiting for the next tick.
    pub fn queue_size(&self) -> usize {
        self.shared.queue.size()
    }

    /// Number of nonces committed so far.
    pub fn committed_nonce_count(&self) -> usize {
        self.shared.queue.committed_nonce_count()
    }

    /// The engine actions are executed against.
    pub fn engine(&self) -> &E {
        &self.shared.engine
    }

    /// Drop queued actions and the nonce ledger. World teardown only.
    pub fn clear(&self) {
        self.shared.queue.clear();
    }
}

impl<E> core::fmt::Debug for TickScheduler<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("world_id", &self.shared.world_id)
            .field("tick_count", &self.shared.tick_count.load(Ordering::Relaxed))
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

fn signal_stop(world_id: &WorldId, running: &RunningLoop) {
    if running.stop_tx.send(true).is_err() {
        debug!(%world_id, "tick task already exited");
    }
}

async fn run_loop<E: ExecutionEngine>(shared: Arc<Shared<E>>, mut stop_rx: watch::Receiver<bool>) {
    let period = shared.config.tick_interval;
    let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut interval = time::interval_at(first, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        match AssertUnwindSafe(shared.run_tick()).catch_unwind().await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(world_id = %shared.world_id, error = %e, "tick failed"),
            Err(payload) => error!(
                world_id = %shared.world_id,
                panic = %panic_message(&*payload),
                "tick panicked"
            ),
        }
        if started.elapsed() >= period {
            debug!(
                world_id = %shared.world_id,
                elapsed_ms = started.elapsed().as_millis(),
                "tick overran interval, skipping missed firings"
            );
            interval.reset();
        }
    }

    info!(
        world_id = %shared.world_id,
        ticks = shared.tick_count.load(Ordering::Acquire),
        "tick scheduler stopped"
    );
}

impl<E: ExecutionEngine> Shared<E> {
    fn advance_tick(&self) -> Result<u64, TickError> {
        self.tick_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1))
            .map_err(|_current| TickError::TickOverflow)?
            .checked_add(1)
            .ok_or(TickError::TickOverflow)
    }

    async fn run_tick(&self) -> Result<Option<TickReport>, TickError> {
        let _gate = self.tick_gate.lock().await;
        let (tick, batch) = self.queue.flush_with(|| self.advance_tick())?;

        if batch.is_empty() {
            debug!(world_id = %self.world_id, tick, "empty tick");
            return Ok(None);
        }

        info!(world_id = %self.world_id, tick, actions = batch.len(), "processing batch");

        let mut results = Vec::with_capacity(batch.len());
        for action in batch {
            let outcome = match self.execute_one(&action).await {
                Ok(result) => ActionOutcome::Success { result },
                Err(failure) => {
                    warn!(
                        world_id = %self.world_id,
                        tick,
                        agent = %action.agent_address,
                        action = %action.action_name,
                        nonce = action.nonce,
                        error = %failure,
                        "action failed"
                    );
                    ActionOutcome::Failure {
                        error: failure.to_string(),
                    }
                }
            };
            results.push(ActionReport { action, outcome });
        }

        let report = TickReport {
            tick,
            world_id: self.world_id.clone(),
            completed_at: Utc::now(),
            results,
        };

        info!(
            world_id = %self.world_id,
            tick,
            succeeded = report.succeeded(),
            failed = report.failed(),
            committed_nonces = self.queue.committed_nonce_count(),
            "tick complete"
        );

        let sink = Arc::clone(&self.sink);
        if std::panic::catch_unwind(AssertUnwindSafe(|| sink.on_tick(&report))).is_err() {
            error!(world_id = %self.world_id, tick, "tick sink panicked");
        }

        Ok(Some(report))
    }

    async fn execute_one(
        &self,
        action: &SignedAction,
    ) -> Result<serde_json::Value, ActionExecutionFailure> {
        let request = ExecutionRequest {
            agent: &action.agent_address,
            action: &action.action_name,
            method: EXECUTE_METHOD,
            params: &action.params,
        };
        // The call itself goes inside the guard: engines may do their work,
        // and panic, before returning a future.
        let call = AssertUnwindSafe(async move { self.engine.execute(request).await })
            .catch_unwind();

        let caught = match self.config.execution_timeout {
            Some(limit) => time::timeout(limit, call).await.map_err(|_elapsed| {
                ActionExecutionFailure::TimedOut {
                    limit_ms: limit.as_millis(),
                }
            })?,
            None => call.await,
        };

        match caught {
            Ok(result) => result.map_err(ActionExecutionFailure::from),
            Err(payload) => Err(ActionExecutionFailure::Panicked(panic_message(&*payload))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::future::Future;

    use serde_json::{Value, json};
    use tickworld_types::ParamValue;

    use super::*;
    use crate::engine::ActionRegistry;
    use crate::signature::ActionSigner;

    const WORLD: &str = "w1";

    /// Engine whose behavior is chosen by the action name.
    #[derive(Default)]
    struct ScriptedEngine {
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ExecutionEngine for ScriptedEngine {
        fn execute(
            &self,
            request: ExecutionRequest<'_>,
        ) -> impl Future<Output = Result<Value, ExecutionError>> + Send {
            let name = request.action.to_owned();
            assert_eq!(request.method, EXECUTE_METHOD);
            self.calls.lock().unwrap().push(name.clone());
            async move {
                match name.as_str() {
                    "Fail" => Err(ExecutionError::Reverted("scripted failure".to_owned())),
                    "Panic" => panic!("scripted panic"),
                    "Slow" => {
                        time::sleep(Duration::from_millis(350)).await;
                        Ok(json!("slow"))
                    }
                    _ => Ok(json!(name)),
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<TickReport>>,
    }

    impl RecordingSink {
        fn reports(&self) -> Vec<TickReport> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl TickSink for RecordingSink {
        fn on_tick(&self, report: &TickReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }

    fn scheduler_with(
        config: SchedulerConfig,
    ) -> (TickScheduler<ScriptedEngine>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = TickScheduler::new(
            WorldId::from(WORLD),
            ScriptedEngine::default(),
            Arc::clone(&sink) as Arc<dyn TickSink>,
            config,
        );
        (scheduler, sink)
    }

    fn scheduler() -> (TickScheduler<ScriptedEngine>, Arc<RecordingSink>) {
        scheduler_with(SchedulerConfig {
            tick_interval: Duration::from_millis(100),
            execution_timeout: None,
        })
    }

    fn signed(signer: &ActionSigner, name: &str, nonce: u64) -> SignedAction {
        signer
            .sign(
                WorldId::from(WORLD),
                name,
                vec![ParamValue::Integer(1)],
                nonce,
                0,
            )
            .unwrap()
    }

    fn names(report: &TickReport) -> Vec<String> {
        report
            .results
            .iter()
            .map(|r| r.action.action_name.clone())
            .collect()
    }

    // -- admission ----------------------------------------------------------

    #[tokio::test]
    async fn valid_action_is_queued() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);

        let admission = scheduler.admit(signed(&signer, "Move", 0)).unwrap();
        assert_eq!(admission, Admission { queue_size: 1, next_tick: 1 });
        assert_eq!(scheduler.queue_size(), 1);
    }

    #[tokio::test]
    async fn invalid_signature_is_never_queued() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        let mut action = signed(&signer, "Move", 0);
        action.nonce = 1;

        assert_eq!(scheduler.admit(action), Err(AdmissionError::InvalidSignature));
        assert_eq!(scheduler.queue_size(), 0);
    }

    #[tokio::test]
    async fn wrong_world_is_never_queued() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        let action = signer
            .sign(WorldId::from("elsewhere"), "Move", Vec::new(), 0, 0)
            .unwrap();

        let err = scheduler.admit(action).unwrap_err();
        assert_eq!(
            err,
            AdmissionError::WorldMismatch {
                expected: WorldId::from(WORLD),
                actual: WorldId::from("elsewhere"),
            }
        );
        assert_eq!(scheduler.queue_size(), 0);
    }

    #[tokio::test]
    async fn signature_is_checked_before_world() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        let mut action = signer
            .sign(WorldId::from("elsewhere"), "Move", Vec::new(), 0, 0)
            .unwrap();
        action.signature = String::from("garbage");

        assert_eq!(scheduler.admit(action), Err(AdmissionError::InvalidSignature));
    }

    #[tokio::test]
    async fn replay_after_tick_is_rejected() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        let action = signed(&signer, "Move", 9);

        scheduler.admit(action.clone()).unwrap();
        scheduler.run_tick().await.unwrap();

        assert_eq!(
            scheduler.admit(action),
            Err(AdmissionError::DuplicateNonce {
                agent: signer.address(),
                nonce: 9,
            })
        );
    }

    #[tokio::test]
    async fn same_window_duplicate_executes_twice() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        let action = signed(&signer, "Move", 9);

        scheduler.admit(action.clone()).unwrap();
        scheduler.admit(action).unwrap();

        let report = scheduler.run_tick().await.unwrap().unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(scheduler.engine().calls(), ["Move", "Move"]);
    }

    // -- batch protocol -----------------------------------------------------

    #[tokio::test]
    async fn batch_executes_in_admission_order() {
        let (scheduler, sink) = scheduler();
        let alice = ActionSigner::from_secret([1; 32]);
        let bob = ActionSigner::from_secret([2; 32]);

        scheduler.admit(signed(&alice, "A", 0)).unwrap();
        scheduler.admit(signed(&bob, "B", 0)).unwrap();
        scheduler.admit(signed(&alice, "C", 1)).unwrap();

        let report = scheduler.run_tick().await.unwrap().unwrap();
        assert_eq!(names(&report), ["A", "B", "C"]);
        assert_eq!(scheduler.engine().calls(), ["A", "B", "C"]);
        assert_eq!(sink.reports(), vec![report]);
        assert_eq!(scheduler.queue_size(), 0);
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_batch() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);

        scheduler.admit(signed(&signer, "A", 0)).unwrap();
        scheduler.admit(signed(&signer, "Fail", 1)).unwrap();
        scheduler.admit(signed(&signer, "C", 2)).unwrap();

        let report = scheduler.run_tick().await.unwrap().unwrap();
        assert_eq!(report.results.len(), 3);
        let outcomes: Vec<&ActionOutcome> = report.results.iter().map(|r| &r.outcome).collect();
        assert_eq!(
            outcomes,
            [
                &ActionOutcome::Success { result: json!("A") },
                &ActionOutcome::Failure {
                    error: "action reverted: scripted failure".to_owned()
                },
                &ActionOutcome::Success { result: json!("C") },
            ]
        );
    }

    #[tokio::test]
    async fn engine_panic_is_isolated() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);

        scheduler.admit(signed(&signer, "Panic", 0)).unwrap();
        scheduler.admit(signed(&signer, "After", 1)).unwrap();

        let report = scheduler.run_tick().await.unwrap().unwrap();
        assert_eq!(
            report.results.first().map(|r| r.outcome.clone()),
            Some(ActionOutcome::Failure {
                error: "engine panicked: scripted panic".to_owned()
            })
        );
        assert!(report.results.get(1).is_some_and(|r| r.outcome.is_success()));
    }

    #[tokio::test(start_paused = true)]
    async fn handler_panic_before_future_keeps_loop_alive() {
        let registry = ActionRegistry::with_receipts(["After"]).with_handler(
            "Boom",
            Arc::new(|_: &ExecutionRequest<'_>| -> Result<Value, ExecutionError> {
                panic!("handler exploded")
            }),
        );
        let sink = Arc::new(RecordingSink::default());
        let scheduler = TickScheduler::new(
            WorldId::from(WORLD),
            registry,
            Arc::clone(&sink) as Arc<dyn TickSink>,
            SchedulerConfig {
                tick_interval: Duration::from_millis(100),
                execution_timeout: None,
            },
        );
        let signer = ActionSigner::from_secret([1; 32]);
        scheduler.admit(signed(&signer, "Boom", 0)).unwrap();
        scheduler.admit(signed(&signer, "After", 1)).unwrap();
        scheduler.start().unwrap();

        time::sleep(Duration::from_millis(550)).await;
        assert_eq!(scheduler.tick_count(), 5);
        assert!(scheduler.is_running());

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        let outcomes: Vec<ActionOutcome> = reports
            .iter()
            .flat_map(|r| r.results.iter().map(|a| a.outcome.clone()))
            .collect();
        assert_eq!(
            outcomes.first(),
            Some(&ActionOutcome::Failure {
                error: "engine panicked: handler exploded".to_owned()
            })
        );
        assert!(outcomes.get(1).is_some_and(ActionOutcome::is_success));
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn tick_overflow_leaves_queue_uncommitted() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        scheduler.shared.tick_count.store(u64::MAX, Ordering::Release);

        let admission = scheduler.admit(signed(&signer, "Move", 0)).unwrap();
        assert_eq!(admission.next_tick, u64::MAX);

        assert_eq!(scheduler.run_tick().await, Err(TickError::TickOverflow));
        assert_eq!(scheduler.queue_size(), 1);
        assert_eq!(scheduler.committed_nonce_count(), 0);
        assert!(scheduler.engine().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn execution_deadline_fails_slow_actions() {
        let (scheduler, _) = scheduler_with(SchedulerConfig {
            tick_interval: Duration::from_millis(100),
            execution_timeout: Some(Duration::from_millis(50)),
        });
        let signer = ActionSigner::from_secret([1; 32]);

        scheduler.admit(signed(&signer, "Slow", 0)).unwrap();
        scheduler.admit(signed(&signer, "Quick", 1)).unwrap();

        let report = scheduler.run_tick().await.unwrap().unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.results.first().map(|r| r.outcome.clone()),
            Some(ActionOutcome::Failure {
                error: "execution timed out after 50ms".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn empty_tick_counts_but_reports_nothing() {
        let (scheduler, sink) = scheduler();

        assert!(scheduler.run_tick().await.unwrap().is_none());
        assert!(scheduler.run_tick().await.unwrap().is_none());
        assert_eq!(scheduler.tick_count(), 2);
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn clear_forgets_committed_nonces() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        let action = signed(&signer, "Move", 0);

        scheduler.admit(action.clone()).unwrap();
        scheduler.run_tick().await.unwrap();
        assert_eq!(scheduler.committed_nonce_count(), 1);

        scheduler.clear();
        assert_eq!(scheduler.committed_nonce_count(), 0);
        assert!(scheduler.admit(action).is_ok());
    }

    // -- lifecycle and timing -----------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn second_start_fails() {
        let (scheduler, _) = scheduler();
        scheduler.start().unwrap();
        assert_eq!(scheduler.start(), Err(SchedulerError::AlreadyRunning));
        assert!(scheduler.is_running());
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn stop_when_idle_is_noop_and_shutdown_errors() {
        let (scheduler, _) = scheduler();
        scheduler.stop();
        assert_eq!(scheduler.shutdown().await, Err(SchedulerError::NotRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_count_tracks_timer_firings() {
        let (scheduler, sink) = scheduler();
        scheduler.start().unwrap();

        // Fires at 100, 200, 300; all batches empty.
        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(scheduler.tick_count(), 3);
        assert!(sink.reports().is_empty());

        assert_eq!(scheduler.shutdown().await, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_future_ticks() {
        let (scheduler, _) = scheduler();
        scheduler.start().unwrap();

        time::sleep(Duration::from_millis(250)).await;
        scheduler.stop();
        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(scheduler.tick_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_resumes_counting() {
        let (scheduler, _) = scheduler();
        scheduler.start().unwrap();
        time::sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await.unwrap();

        scheduler.start().unwrap();
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.shutdown().await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_lets_in_flight_tick_finish() {
        let (scheduler, sink) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        scheduler.admit(signed(&signer, "Slow", 0)).unwrap();
        scheduler.start().unwrap();

        // Tick 1 starts at 100 and is mid-execution until 450.
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.tick_count(), 1);
        assert!(sink.reports().is_empty());

        assert_eq!(scheduler.shutdown().await, Ok(1));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports.iter().all(|r| r.failed() == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn admission_stays_open_during_execution() {
        let (scheduler, sink) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        scheduler.admit(signed(&signer, "Slow", 0)).unwrap();
        scheduler.start().unwrap();

        time::sleep(Duration::from_millis(150)).await;
        let admission = scheduler.admit(signed(&signer, "Late", 1)).unwrap();
        assert_eq!(admission.queue_size, 1);
        assert_eq!(admission.next_tick, 2);

        time::sleep(Duration::from_millis(1_000)).await;
        scheduler.shutdown().await.unwrap();

        let reports = sink.reports();
        let batches: Vec<Vec<String>> = reports.iter().map(names).collect();
        assert_eq!(batches, [vec!["Slow".to_owned()], vec!["Late".to_owned()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_skips_missed_firings() {
        let (scheduler, _) = scheduler();
        let signer = ActionSigner::from_secret([1; 32]);
        scheduler.admit(signed(&signer, "Slow", 0)).unwrap();
        scheduler.start().unwrap();

        // Tick 1 runs 100..450; firings at 200, 300, 400 are dropped and
        // the next tick fires at 550.
        time::sleep(Duration::from_millis(520)).await;
        assert_eq!(scheduler.tick_count(), 1);

        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(scheduler.tick_count(), 2);
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_sink_does_not_stop_ticking() {
        struct PanickingSink;
        impl TickSink for PanickingSink {
            fn on_tick(&self, _report: &TickReport) {
                panic!("sink exploded");
            }
        }

        let scheduler = TickScheduler::new(
            WorldId::from(WORLD),
            ScriptedEngine::default(),
            Arc::new(PanickingSink),
            SchedulerConfig {
                tick_interval: Duration::from_millis(100),
                execution_timeout: None,
            },
        );
        let signer = ActionSigner::from_secret([1; 32]);
        scheduler.admit(signed(&signer, "Move", 0)).unwrap();
        scheduler.start().unwrap();

        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(scheduler.tick_count(), 3);
        assert!(scheduler.is_running());
        scheduler.shutdown().await.unwrap();
    }
}
