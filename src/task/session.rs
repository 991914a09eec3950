//! Glue between a poller run and the local history.
//!
//! A [`ResearchSession`] owns the collaborators a poller needs plus the shared
//! history store. When a run reaches its terminal state the session records it
//! exactly once: completed tasks with their analytics-derived facts, failed
//! tasks (that were assigned an id) with what is known. Cancelled runs and
//! requests that never started leave no record.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;

use super::backend::ResearchBackend;
use super::poller::{PollPolicy, Poller, TaskOutcome};
use super::scheduler::Scheduler;
use super::types::TaskRequest;
use crate::history::{HistoryRecord, HistoryStore};
use crate::report::Analytics;

/// Everything a finished run produced.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub outcome: TaskOutcome,
    pub analytics: Option<Analytics>,
    pub record: Option<HistoryRecord>,
}

pub struct ResearchSession {
    backend: Arc<dyn ResearchBackend>,
    scheduler: Arc<dyn Scheduler>,
    policy: PollPolicy,
    history: Arc<Mutex<HistoryStore>>,
}

impl ResearchSession {
    pub fn new(
        backend: Arc<dyn ResearchBackend>,
        scheduler: Arc<dyn Scheduler>,
        policy: PollPolicy,
        history: Arc<Mutex<HistoryStore>>,
    ) -> Self {
        Self {
            backend,
            scheduler,
            policy,
            history,
        }
    }

    /// A fresh poller wired to this session's collaborators. Attach observers
    /// and take a handle before passing it to [`run`](Self::run).
    pub fn poller(&self) -> Poller {
        Poller::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.scheduler),
            self.policy.clone(),
        )
    }

    pub fn history(&self) -> Arc<Mutex<HistoryStore>> {
        Arc::clone(&self.history)
    }

    /// Drive `poller` to completion and record the outcome.
    pub async fn run(&self, poller: Poller, request: &TaskRequest) -> SessionReport {
        let handle = poller.handle();
        let started_at = Utc::now();
        let clock = Instant::now();

        let outcome = poller.run(request).await;

        let (analytics, record) = match &outcome {
            TaskOutcome::Completed(payload) => (
                Some(Analytics::from_payload(payload)),
                Some(HistoryRecord::completed(payload, &request.query)),
            ),
            TaskOutcome::Failed(_) => {
                let record = handle.task_id().map(|task_id| {
                    HistoryRecord::failed(
                        &task_id,
                        &request.query,
                        started_at,
                        clock.elapsed().as_secs_f64(),
                        u32::from(request.max_agents),
                    )
                });
                (None, record)
            }
            TaskOutcome::Cancelled => (None, None),
        };

        if let Some(record) = &record {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.append(record.clone());
            if history.is_dirty() {
                tracing::warn!(id = %record.id, "Task recorded in memory only; history is not being saved");
            }
        }

        SessionReport {
            outcome,
            analytics,
            record,
        }
    }
}
