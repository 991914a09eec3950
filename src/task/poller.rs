//! Polling state machine for one research task.
//!
//! A [`Poller`] drives a single task from submission to a terminal state:
//!
//! ```text
//! Idle ──run()──▶ Polling ──▶ Completed | Failed | Cancelled
//! ```
//!
//! **Interval policy:** polls are spaced by the current interval, which starts
//! at the policy's base, grows by the backoff factor after every failed call
//! (capped at the maximum) and snaps back to base after any success. After
//! `max_consecutive_failures` failed calls in a row the task fails with a
//! connectivity error and nothing further is scheduled.
//!
//! **Ordering:** every status request is stamped with a sequence number. A
//! response older than the newest applied one is dropped. A response whose
//! view (stage, progress and agents) matches the last delivered view produces
//! no event, so observers see progress in non-decreasing order without
//! duplicates, while agent changes at a steady percentage still come through.
//!
//! **Cancellation model:** a [`PollerHandle`] flips the shared state to
//! `Cancelled` and fires a [`CancellationToken`]. The loop stops waiting
//! immediately, discards any in-flight response, and tells the executor to
//! cancel on a best-effort basis.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::backend::ResearchBackend;
use super::progress::{AgentRoster, ProgressView, progress_view};
use super::scheduler::Scheduler;
use super::types::{ResultPayload, Stage, StatusSnapshot, TaskId, TaskRequest};
use crate::config::AppConfig;
use crate::error::{BackendError, PollerError};

/// Timing and retry limits for the poll loop.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: f64,
    pub max_consecutive_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(2000),
            max_interval: Duration::from_millis(10_000),
            backoff_factor: 1.5,
            max_consecutive_failures: 3,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_interval: Duration::from_millis(config.poll_base_interval_ms),
            max_interval: Duration::from_millis(config.poll_max_interval_ms),
            backoff_factor: config.poll_backoff_factor,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

/// Interval and consecutive-failure bookkeeping.
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: PollPolicy,
    interval: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: PollPolicy) -> Self {
        let interval = policy.base_interval;
        Self {
            policy,
            interval,
            failures: 0,
        }
    }

    /// Delay before the next status call.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_success(&mut self) {
        self.interval = self.policy.base_interval;
        self.failures = 0;
    }

    /// Grow the interval and count the failure. Returns `true` once the retry
    /// ceiling is reached.
    pub fn record_failure(&mut self) -> bool {
        self.failures += 1;
        let grown_ms = (self.interval.as_millis() as f64 * self.policy.backoff_factor).round();
        let max_ms = self.policy.max_interval.as_millis() as f64;
        self.interval = Duration::from_millis(grown_ms.min(max_ms) as u64);
        self.failures >= self.policy.max_consecutive_failures
    }
}

/// Verdict on a status response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Newer than anything applied; apply it.
    Fresh,
    /// Older than an already-applied response.
    Stale,
    /// Progress went backwards within a live stage.
    Regressed,
}

/// Sequence stamping for status responses, plus suppression of views that
/// would repeat what observers already have.
#[derive(Debug, Default)]
pub struct SnapshotGate {
    issued: u64,
    applied: u64,
    last: Option<(Stage, u8)>,
    last_view: Option<ProgressView>,
}

impl SnapshotGate {
    /// Stamp a new outgoing request.
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn admit(&mut self, seq: u64, snapshot: &StatusSnapshot) -> Admission {
        if seq <= self.applied {
            return Admission::Stale;
        }
        self.applied = seq;

        let current = (snapshot.stage, snapshot.progress_percent.min(100));
        if snapshot.stage.is_terminal() {
            self.last = Some(current);
            return Admission::Fresh;
        }

        match self.last {
            Some((_, last_pct)) if current.1 < last_pct => Admission::Regressed,
            _ => {
                self.last = Some(current);
                Admission::Fresh
            }
        }
    }

    /// Whether `view` is identical to the last view handed to observers.
    /// A view that differs in any way, agents included, becomes the new last.
    pub fn is_repeat(&mut self, view: &ProgressView) -> bool {
        if self.last_view.as_ref() == Some(view) {
            return true;
        }
        self.last_view = Some(view.clone());
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

impl PollerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Notifications delivered to observers. Exactly one terminal event
/// (`Completed`, `Failed` or `Cancelled`) is sent per run.
#[derive(Clone, Debug)]
pub enum PollerEvent {
    Started { task_id: TaskId },
    Progress(ProgressView),
    Completed(ResultPayload),
    Failed(PollerError),
    Cancelled,
}

/// How a run ended.
#[derive(Clone, Debug)]
pub enum TaskOutcome {
    Completed(ResultPayload),
    Failed(PollerError),
    Cancelled,
}

#[derive(Debug)]
struct Shared {
    state: PollerState,
    task_id: Option<TaskId>,
    last_view: Option<ProgressView>,
}

/// Cloneable view onto a running poller, usable from other tasks.
#[derive(Clone)]
pub struct PollerHandle {
    shared: Arc<Mutex<Shared>>,
    cancel_token: CancellationToken,
}

impl PollerHandle {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PollerState {
        self.lock().state
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.lock().task_id.clone()
    }

    /// The most recent progress view delivered to observers.
    pub fn last_view(&self) -> Option<ProgressView> {
        self.lock().last_view.clone()
    }

    /// Request cancellation. Only valid while polling; returns whether the
    /// request was accepted.
    pub fn cancel(&self) -> bool {
        let mut shared = self.lock();
        if shared.state != PollerState::Polling {
            tracing::debug!(state = ?shared.state, "Ignoring cancel outside of polling");
            return false;
        }
        shared.state = PollerState::Cancelled;
        self.cancel_token.cancel();
        true
    }
}

/// Observes one task until it reaches a terminal state.
pub struct Poller {
    backend: Arc<dyn ResearchBackend>,
    scheduler: Arc<dyn Scheduler>,
    policy: PollPolicy,
    event_tx: Option<UnboundedSender<PollerEvent>>,
    handle: PollerHandle,
}

impl Poller {
    pub fn new(
        backend: Arc<dyn ResearchBackend>,
        scheduler: Arc<dyn Scheduler>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            backend,
            scheduler,
            policy,
            event_tx: None,
            handle: PollerHandle {
                shared: Arc::new(Mutex::new(Shared {
                    state: PollerState::Idle,
                    task_id: None,
                    last_view: None,
                })),
                cancel_token: CancellationToken::new(),
            },
        }
    }

    /// Attach an observer channel.
    pub fn with_events(mut self, event_tx: UnboundedSender<PollerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn handle(&self) -> PollerHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> PollerState {
        self.handle.state()
    }

    fn emit(&self, event: PollerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Move from `Polling` to a terminal state. Fails if the handle already
    /// cancelled, in which case the caller must take the cancellation path.
    fn transition(&self, to: PollerState) -> bool {
        let mut shared = self.handle.lock();
        if shared.state != PollerState::Polling {
            return false;
        }
        shared.state = to;
        true
    }

    async fn fail(&self, error: PollerError) -> TaskOutcome {
        let was_cancelled = {
            let mut shared = self.handle.lock();
            let was_cancelled = shared.state == PollerState::Cancelled;
            if !was_cancelled {
                shared.state = PollerState::Failed;
            }
            was_cancelled
        };
        if was_cancelled {
            return self.cancelled().await;
        }
        tracing::error!(error = %error, "Research task failed");
        self.emit(PollerEvent::Failed(error.clone()));
        TaskOutcome::Failed(error)
    }

    async fn cancelled(&self) -> TaskOutcome {
        let task_id = {
            let mut shared = self.handle.lock();
            shared.state = PollerState::Cancelled;
            shared.task_id.clone()
        };
        if let Some(id) = task_id {
            if let Err(e) = self.backend.cancel_task(&id).await {
                tracing::warn!(task_id = %id, error = %e, "Remote cancel failed; cancelled locally");
            }
            tracing::info!(task_id = %id, "Research task cancelled");
        }
        self.emit(PollerEvent::Cancelled);
        TaskOutcome::Cancelled
    }

    /// Submit `request` and poll until a terminal state is reached.
    ///
    /// Consumes the poller: one instance observes exactly one task.
    pub async fn run(self, request: &TaskRequest) -> TaskOutcome {
        if let Err(message) = request.validate() {
            self.handle.lock().state = PollerState::Failed;
            let error = PollerError::Validation(message);
            tracing::warn!(error = %error, "Rejected research request");
            self.emit(PollerEvent::Failed(error.clone()));
            return TaskOutcome::Failed(error);
        }

        self.handle.lock().state = PollerState::Polling;
        let token = self.handle.cancel_token.clone();

        // The start call is never raced against cancellation: its task id is
        // needed to cancel remotely.
        let task_id = match self.backend.start_task(request).await {
            Ok(id) => id,
            Err(BackendError::Validation(message)) => {
                return self.fail(PollerError::Validation(message)).await;
            }
            Err(e) => return self.fail(PollerError::Start(e)).await,
        };

        self.handle.lock().task_id = Some(task_id.clone());
        tracing::info!(task_id = %task_id, query = %request.query, "Research task started");
        self.emit(PollerEvent::Started {
            task_id: task_id.clone(),
        });

        if token.is_cancelled() {
            return self.cancelled().await;
        }

        let mut backoff = Backoff::new(self.policy.clone());
        let mut gate = SnapshotGate::default();
        let mut roster = AgentRoster::new();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return self.cancelled().await,
                _ = self.scheduler.wait(backoff.interval()) => {}
            }

            let seq = gate.issue();
            let response = tokio::select! {
                biased;
                _ = token.cancelled() => return self.cancelled().await,
                r = self.backend.get_status(&task_id) => r,
            };

            let snapshot = match response {
                Ok(snapshot) => {
                    backoff.record_success();
                    snapshot
                }
                Err(BackendError::NotFound { task_id }) => {
                    return self.fail(PollerError::NotFound { task_id }).await;
                }
                Err(e) => {
                    // Rejections count toward the ceiling too; a status call
                    // that keeps being refused is as good as unreachable.
                    let exhausted = backoff.record_failure();
                    let transient = e.is_transient();
                    tracing::warn!(
                        task_id = %task_id,
                        attempt = backoff.failures(),
                        transient,
                        next_interval_ms = backoff.interval().as_millis() as u64,
                        error = %e,
                        "{}",
                        if transient { "Status poll failed" } else { "Status poll rejected" }
                    );
                    if exhausted {
                        return self.fail(PollerError::Connectivity {
                            attempts: backoff.failures(),
                            last: e,
                        }).await;
                    }
                    continue;
                }
            };

            match gate.admit(seq, &snapshot) {
                Admission::Fresh => {}
                other => {
                    tracing::debug!(seq, admission = ?other, "Snapshot not applied");
                    continue;
                }
            }

            let agents = roster.merge(&snapshot.agent_activities);
            let view = progress_view(&StatusSnapshot {
                agent_activities: agents,
                ..snapshot.clone()
            });
            if gate.is_repeat(&view) {
                tracing::debug!(seq, "Snapshot unchanged; no event");
                continue;
            }
            let still_polling = {
                let mut shared = self.handle.lock();
                let polling = shared.state == PollerState::Polling;
                if polling {
                    shared.last_view = Some(view.clone());
                }
                polling
            };
            if !still_polling {
                return self.cancelled().await;
            }
            self.emit(PollerEvent::Progress(view));

            match snapshot.stage {
                Stage::Completed => return self.fetch_result(&task_id, &token).await,
                Stage::Failed => {
                    return self.fail(PollerError::ExecutionFailure(snapshot.message)).await;
                }
                _ => {}
            }
        }
    }

    /// Exactly one result fetch per completed task.
    async fn fetch_result(&self, task_id: &str, token: &CancellationToken) -> TaskOutcome {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return self.cancelled().await,
            r = self.backend.get_result(task_id) => r,
        };

        match result {
            Ok(payload) => {
                if !self.transition(PollerState::Completed) {
                    return self.cancelled().await;
                }
                tracing::info!(
                    task_id = %task_id,
                    sources = payload.sources_used.len(),
                    tokens = payload.total_tokens_used,
                    "Research task completed"
                );
                self.emit(PollerEvent::Completed(payload.clone()));
                TaskOutcome::Completed(payload)
            }
            Err(e) => self.fail(PollerError::ResultFetch(e)).await,
        }
    }
}
