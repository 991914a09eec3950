//! Durable, client-local history of research tasks.
//!
//! Provides the [`store::HistoryStore`] along with the [`record`] type it
//! holds, the [`medium`] it persists to, and the [`tags`] vocabulary used to
//! label records from their query text.

pub mod medium;
pub mod record;
pub mod seed;
pub mod store;
pub mod tags;

pub use medium::{FileMedium, MemoryMedium, PersistenceMedium};
pub use record::{HistoryRecord, RecordStatus};
pub use store::{
    HISTORY_KEY, HistoryQuery, HistoryStats, HistoryStore, LoadState, SortKey, SortOrder,
};
pub use tags::infer_tags;
