//! Client-local history of terminal research tasks.
//!
//! [`HistoryStore`] is the single writer to its [`PersistenceMedium`]. It keeps
//! the full record list in memory, most recent first, and rewrites the whole
//! serialized list under [`HISTORY_KEY`] after every mutation.
//!
//! **Degraded mode:** persistence failures never block a caller. The in-memory
//! view is updated first; if the write fails the store is marked dirty, the
//! error is logged and kept in [`HistoryStore::last_error`], and the next
//! mutation (or an explicit [`HistoryStore::flush`]) writes the full list
//! again. Because every write is the complete list, a retried write can never
//! resurrect a deleted record or drop part of a bulk delete.
//!
//! **Immutability:** records are handed out as clones. The only in-place
//! change the store makes to an existing record is flipping `favorite`.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;

use super::medium::PersistenceMedium;
use super::record::{HistoryRecord, RecordStatus};
use super::seed::example_records;
use crate::error::PersistenceError;

/// Key under which the serialized record list is stored.
pub const HISTORY_KEY: &str = "research_history";

/// What the store found when it was initialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// `init` has not been called yet, or nothing was ever stored and seeding
    /// is disabled.
    Uninitialized,
    /// Storage exists and holds no records: the user's own empty history.
    Empty,
    /// Records were loaded from storage or an external loader.
    Loaded(usize),
    /// Nothing was ever stored; example records were written.
    Seeded(usize),
    /// Stored content was unreadable and has been treated as empty.
    Recovered,
    /// The medium could not be read at all. The store runs in memory and
    /// merges with the stored list before its first successful write.
    Unavailable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Timestamp,
    Duration,
    Sources,
    Query,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timestamp" | "date" => Ok(Self::Timestamp),
            "duration" => Ok(Self::Duration),
            "sources" => Ok(Self::Sources),
            "query" => Ok(Self::Query),
            other => Err(format!(
                "unknown sort key '{other}'. Expected 'timestamp', 'duration', 'sources', or 'query'"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(format!("unknown sort order '{other}'. Expected 'asc' or 'desc'")),
        }
    }
}

/// Filter and sort options for [`HistoryStore::query`]. The default returns
/// every record, newest first.
#[derive(Clone, Debug, Default)]
pub struct HistoryQuery {
    /// Case-insensitive substring match against the query text.
    pub search: Option<String>,
    pub status: Option<RecordStatus>,
    pub favorites_only: bool,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

impl HistoryQuery {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if self.favorites_only && !record.favorite {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => record
                .query
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        }
    }

    /// Ordering for two records under this query's key and direction.
    /// Ties always fall back to newest first.
    fn compare(&self, a: &HistoryRecord, b: &HistoryRecord) -> Ordering {
        let primary = match self.sort_key {
            SortKey::Timestamp => a.timestamp.cmp(&b.timestamp),
            SortKey::Duration => a.duration_seconds.total_cmp(&b.duration_seconds),
            SortKey::Sources => a.sources_count.cmp(&b.sources_count),
            SortKey::Query => a.query.to_lowercase().cmp(&b.query.to_lowercase()),
        };
        let primary = match self.sort_order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| b.timestamp.cmp(&a.timestamp))
    }
}

/// Aggregate figures over the whole history.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    pub favorites: usize,
    pub total_sources: usize,
    pub total_tokens: u64,
    pub average_duration_seconds: f64,
}

pub struct HistoryStore {
    medium: Box<dyn PersistenceMedium>,
    records: Vec<HistoryRecord>,
    load_state: LoadState,
    seed_examples: bool,
    dirty: bool,
    last_error: Option<String>,
    /// The stored list has not been read yet; writing now would clobber it.
    detached: bool,
}

impl HistoryStore {
    /// Create an uninitialized store over `medium`. Call [`init`](Self::init)
    /// or [`init_with`](Self::init_with) before use.
    pub fn new(medium: Box<dyn PersistenceMedium>) -> Self {
        Self {
            medium,
            records: Vec::new(),
            load_state: LoadState::Uninitialized,
            seed_examples: true,
            dirty: false,
            last_error: None,
            detached: false,
        }
    }

    /// Whether `init` writes example records into a never-used medium.
    pub fn with_seed_examples(mut self, seed: bool) -> Self {
        self.seed_examples = seed;
        self
    }

    /// Reload from the persistence medium, discarding the in-memory view.
    pub fn init(&mut self) -> LoadState {
        self.records.clear();
        self.dirty = false;
        self.detached = false;

        let bytes = match self.medium.read(HISTORY_KEY) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "History unavailable; continuing in memory only");
                self.last_error = Some(e.to_string());
                self.detached = true;
                self.load_state = LoadState::Unavailable;
                return self.load_state;
            }
        };

        self.load_state = match bytes {
            None if self.seed_examples => {
                self.records = example_records(Utc::now());
                self.persist();
                tracing::info!(count = self.records.len(), "Seeded history with examples");
                LoadState::Seeded(self.records.len())
            }
            None => LoadState::Uninitialized,
            Some(bytes) => match serde_json::from_slice::<Vec<HistoryRecord>>(&bytes) {
                Ok(records) if records.is_empty() => LoadState::Empty,
                Ok(records) => {
                    self.records = records;
                    tracing::debug!(count = self.records.len(), "Loaded history");
                    LoadState::Loaded(self.records.len())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stored history is corrupt; treating as empty");
                    LoadState::Recovered
                }
            },
        };
        self.load_state
    }

    /// Initialize from an external loader instead of the medium. Never seeds.
    pub fn init_with(&mut self, records: Vec<HistoryRecord>) -> LoadState {
        self.records = records;
        self.records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.dirty = false;
        self.detached = false;
        self.load_state = if self.records.is_empty() {
            LoadState::Empty
        } else {
            LoadState::Loaded(self.records.len())
        };
        self.load_state
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// True while the persisted copy lags the in-memory view.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The most recent persistence failure, cleared by the next good write.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<HistoryRecord> {
        self.records.iter().find(|r| r.id == id).cloned()
    }

    /// Insert `record` at the head. Ignored if a record with the same id
    /// already exists; returns whether it was inserted.
    pub fn append(&mut self, record: HistoryRecord) -> bool {
        if self.records.iter().any(|r| r.id == record.id) {
            tracing::warn!(id = %record.id, "History already holds this task; ignoring append");
            return false;
        }
        let mut record = record;
        record.tags.truncate(super::tags::MAX_TAGS);
        tracing::debug!(id = %record.id, status = record.status.as_str(), "Appending history record");
        self.records.insert(0, record);
        self.persist();
        true
    }

    /// Remove one record. No-op if absent.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Remove every record whose id is in `ids`, returning how many were
    /// removed. The in-memory view changes in one step; a single full write
    /// follows, retried later if it fails.
    pub fn bulk_delete(&mut self, ids: &HashSet<String>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let before = self.records.len();
        let retained: Vec<HistoryRecord> = self
            .records
            .iter()
            .filter(|r| !ids.contains(&r.id))
            .cloned()
            .collect();
        let removed = before - retained.len();
        if removed > 0 {
            self.records = retained;
            self.persist();
        }
        removed
    }

    /// Flip `favorite` on one record and return the new value, or `None` if
    /// no such record exists. The change is kept even if the write fails.
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let record = self.records.iter_mut().find(|r| r.id == id)?;
        record.favorite = !record.favorite;
        let favorite = record.favorite;
        self.persist();
        Some(favorite)
    }

    /// Remove every record, leaving an explicitly empty history.
    pub fn clear(&mut self) {
        // An explicit clear replaces whatever is stored, read or not.
        self.detached = false;
        self.records.clear();
        self.load_state = LoadState::Empty;
        self.persist();
    }

    /// Filtered, sorted copy of the history. Never mutates the store.
    pub fn query(&self, query: &HistoryQuery) -> Vec<HistoryRecord> {
        let mut out: Vec<HistoryRecord> = self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| query.compare(a, b));
        out
    }

    pub fn stats(&self) -> HistoryStats {
        let total = self.records.len();
        let count = |status: RecordStatus| self.records.iter().filter(|r| r.status == status).count();
        let total_duration: f64 = self.records.iter().map(|r| r.duration_seconds).sum();

        HistoryStats {
            total,
            completed: count(RecordStatus::Completed),
            failed: count(RecordStatus::Failed),
            running: count(RecordStatus::Running),
            favorites: self.records.iter().filter(|r| r.favorite).count(),
            total_sources: self.records.iter().map(|r| r.sources_count).sum(),
            total_tokens: self.records.iter().map(|r| r.tokens_used).sum(),
            average_duration_seconds: if total == 0 {
                0.0
            } else {
                total_duration / total as f64
            },
        }
    }

    /// Retry a pending write. A no-op when nothing is pending.
    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        if !self.dirty {
            return Ok(());
        }
        self.write_all()
    }

    /// Fold the stored list back in after a failed initial read. Records
    /// created in memory win on id collisions; the result is newest first.
    fn reattach(&mut self) -> Result<(), PersistenceError> {
        let stored = match self.medium.read(HISTORY_KEY)? {
            None => Vec::new(),
            Some(bytes) => match serde_json::from_slice::<Vec<HistoryRecord>>(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored history is corrupt; keeping in-memory records only");
                    Vec::new()
                }
            },
        };

        let merged = stored.len();
        for record in stored {
            if !self.records.iter().any(|r| r.id == record.id) {
                self.records.push(record);
            }
        }
        self.records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.detached = false;
        self.load_state = LoadState::Loaded(self.records.len());
        tracing::info!(stored = merged, total = self.records.len(), "History readable again; merged stored records");
        Ok(())
    }

    fn write_all(&mut self) -> Result<(), PersistenceError> {
        if self.detached {
            if let Err(e) = self.reattach() {
                self.dirty = true;
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        }
        let result = serde_json::to_vec(&self.records)
            .map_err(PersistenceError::from)
            .and_then(|bytes| self.medium.write(HISTORY_KEY, &bytes));
        match &result {
            Ok(()) => {
                self.dirty = false;
                self.last_error = None;
            }
            Err(e) => {
                self.dirty = true;
                self.last_error = Some(e.to_string());
            }
        }
        result
    }

    /// Write the full list, logging rather than surfacing failure.
    fn persist(&mut self) {
        if let Err(e) = self.write_all() {
            tracing::warn!(error = %e, records = self.records.len(), "History write failed; keeping changes in memory");
        }
    }
}
