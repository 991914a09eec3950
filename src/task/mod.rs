//! Research task monitoring.
//!
//! Provides the [`poller::Poller`] state machine that observes one remote task
//! through the [`backend::ResearchBackend`] contract, the pure
//! [`progress`] model that turns snapshots into display state, and the
//! [`session::ResearchSession`] that records terminal outcomes in history.

pub mod backend;
pub mod poller;
pub mod progress;
pub mod scheduler;
pub mod session;
pub mod types;

pub use backend::{HttpBackend, ResearchBackend};
pub use poller::{PollPolicy, Poller, PollerEvent, PollerHandle, PollerState, TaskOutcome};
pub use progress::{ProgressView, progress_view};
pub use scheduler::{RecordingScheduler, Scheduler, TokioScheduler};
pub use session::{ResearchSession, SessionReport};
