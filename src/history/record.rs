//! The durable summary kept for each terminal task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tags::infer_tags;
use crate::task::types::ResultPayload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    Failed,
    Running,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Running => "running",
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "running" => Ok(Self::Running),
            other => Err(format!(
                "unknown status '{other}'. Expected 'completed', 'failed', or 'running'"
            )),
        }
    }
}

/// One entry in the local history.
///
/// Everything except `favorite` is fixed at creation. The store only hands
/// out clones and exposes no setter other than
/// [`super::store::HistoryStore::toggle_favorite`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// The executor's task id, or a generated UUID for records without one.
    pub id: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub status: RecordStatus,
    #[serde(default)]
    pub sources_count: usize,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub agent_count: u32,
    #[serde(default)]
    pub favorite: bool,
    /// At most three, in vocabulary order.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl HistoryRecord {
    /// Record for a task that completed and whose result was retrieved.
    pub fn completed(payload: &ResultPayload, query: &str) -> Self {
        let query = if payload.query.trim().is_empty() {
            query
        } else {
            payload.query.as_str()
        };
        Self {
            id: payload.task_id.clone(),
            query: query.to_string(),
            timestamp: payload.created_at,
            status: RecordStatus::Completed,
            sources_count: payload.sources_used.len(),
            duration_seconds: payload.execution_time_seconds.max(0.0),
            tokens_used: payload.total_tokens_used,
            agent_count: payload.agent_count,
            favorite: false,
            tags: infer_tags(query),
        }
    }

    /// Record for a task that obtained an id and then failed.
    pub fn failed(
        task_id: &str,
        query: &str,
        timestamp: DateTime<Utc>,
        duration_seconds: f64,
        agent_count: u32,
    ) -> Self {
        Self {
            id: task_id.to_string(),
            query: query.to_string(),
            timestamp,
            status: RecordStatus::Failed,
            sources_count: 0,
            duration_seconds: duration_seconds.max(0.0),
            tokens_used: 0,
            agent_count,
            favorite: false,
            tags: infer_tags(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::types::Source;

    fn payload() -> ResultPayload {
        ResultPayload {
            task_id: "task-42".to_string(),
            query: "AI in diagnostics".to_string(),
            report: "report".to_string(),
            sources_used: vec![Source {
                title: "Paper".to_string(),
                url: "https://example.org/paper".to_string(),
                snippet: String::new(),
                relevance_score: 0.9,
                date: None,
            }],
            citations: Vec::new(),
            total_tokens_used: 5400,
            execution_time_seconds: 84.5,
            agent_count: 3,
            created_at: "2026-03-01T12:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn completed_record_copies_payload_facts() {
        let record = HistoryRecord::completed(&payload(), "ignored");
        assert_eq!(record.id, "task-42");
        assert_eq!(record.query, "AI in diagnostics");
        assert_eq!(record.status, RecordStatus::Completed);
        assert_eq!(record.sources_count, 1);
        assert_eq!(record.tokens_used, 5400);
        assert_eq!(record.agent_count, 3);
        assert!(!record.favorite);
        assert_eq!(record.tags, vec!["AI", "Healthcare"]);
    }

    #[test]
    fn completed_record_falls_back_to_request_query() {
        let mut p = payload();
        p.query = String::new();
        let record = HistoryRecord::completed(&p, "solar battery storage");
        assert_eq!(record.query, "solar battery storage");
        assert_eq!(record.tags, vec!["Energy"]);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Completed".parse::<RecordStatus>(), Ok(RecordStatus::Completed));
        assert!("done".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RecordStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }
}
