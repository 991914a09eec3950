//! Illustrative records shown the first time history is opened on a machine
//! that has never stored any.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::record::{HistoryRecord, RecordStatus};
use super::tags::infer_tags;

struct Example {
    query: &'static str,
    hours_ago: i64,
    status: RecordStatus,
    sources: usize,
    duration: f64,
    tokens: u64,
    agents: u32,
    favorite: bool,
}

const EXAMPLES: &[Example] = &[
    Example {
        query: "Latest advances in AI-assisted medical diagnostics",
        hours_ago: 2,
        status: RecordStatus::Completed,
        sources: 14,
        duration: 142.0,
        tokens: 18_450,
        agents: 3,
        favorite: true,
    },
    Example {
        query: "Impact of carbon pricing on renewable energy investment",
        hours_ago: 26,
        status: RecordStatus::Completed,
        sources: 11,
        duration: 118.5,
        tokens: 15_230,
        agents: 3,
        favorite: false,
    },
    Example {
        query: "Quantum computing threats to modern encryption",
        hours_ago: 50,
        status: RecordStatus::Completed,
        sources: 9,
        duration: 97.2,
        tokens: 12_880,
        agents: 2,
        favorite: false,
    },
    Example {
        query: "Regulation of cryptocurrency markets in the EU",
        hours_ago: 75,
        status: RecordStatus::Failed,
        sources: 0,
        duration: 31.0,
        tokens: 0,
        agents: 4,
        favorite: false,
    },
    Example {
        query: "Effectiveness of online learning platforms for university students",
        hours_ago: 120,
        status: RecordStatus::Completed,
        sources: 16,
        duration: 201.3,
        tokens: 22_010,
        agents: 5,
        favorite: true,
    },
];

/// Build the example records relative to `now`, most recent first.
pub fn example_records(now: DateTime<Utc>) -> Vec<HistoryRecord> {
    EXAMPLES
        .iter()
        .map(|e| HistoryRecord {
            id: Uuid::new_v4().to_string(),
            query: e.query.to_string(),
            timestamp: now - Duration::hours(e.hours_ago),
            status: e.status,
            sources_count: e.sources,
            duration_seconds: e.duration,
            tokens_used: e.tokens,
            agent_count: e.agents,
            favorite: e.favorite,
            tags: infer_tags(e.query),
        })
        .collect()
}
