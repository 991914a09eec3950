//! Data contracts exchanged with the remote research executor.
//!
//! These types carry no behavior beyond validation and small accessors. They
//! are the shared vocabulary between the [`super::backend`] transport, the
//! [`super::poller`] state machine, the progress model, and the history and
//! report modules. Field names serialize as snake_case JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the executor when a task is started.
pub type TaskId = String;

pub const MIN_AGENTS: u8 = 1;
pub const MAX_AGENTS: u8 = 5;
pub const MIN_ITERATIONS: u8 = 2;
pub const MAX_ITERATIONS: u8 = 10;

/// A research request as submitted by the user. Immutable once submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub query: String,
    pub max_agents: u8,
    pub max_iterations: u8,
}

impl TaskRequest {
    pub fn new(query: impl Into<String>, max_agents: u8, max_iterations: u8) -> Self {
        Self {
            query: query.into(),
            max_agents,
            max_iterations,
        }
    }

    /// Check the request against the executor's documented limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if !(MIN_AGENTS..=MAX_AGENTS).contains(&self.max_agents) {
            return Err(format!(
                "max_agents must be between {MIN_AGENTS} and {MAX_AGENTS}, got {}",
                self.max_agents
            ));
        }
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(format!(
                "max_iterations must be between {MIN_ITERATIONS} and {MAX_ITERATIONS}, got {}",
                self.max_iterations
            ));
        }
        Ok(())
    }
}

impl Default for TaskRequest {
    fn default() -> Self {
        Self::new(String::new(), 3, 3)
    }
}

/// Response body of the start call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub task_id: TaskId,
}

/// Coarse execution phase reported by the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Started,
    Planning,
    Executing,
    Synthesizing,
    Citing,
    Completed,
    Failed,
}

impl Stage {
    /// Whether no further polling should follow a snapshot in this stage.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Synthesizing => "synthesizing",
            Self::Citing => "citing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// What an individual agent is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Waiting,
    Searching,
    Analyzing,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentActivity {
    pub agent_id: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub current_task: String,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub tokens_used: u64,
}

/// A point-in-time status report. Transient: overwritten on every poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub task_id: TaskId,
    pub stage: Stage,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub agent_activities: Vec<AgentActivity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub times_cited: u32,
}

/// The final product of a successfully completed task. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub task_id: TaskId,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub sources_used: Vec<Source>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub total_tokens_used: u64,
    #[serde(default)]
    pub execution_time_seconds: f64,
    #[serde(default)]
    pub agent_count: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}
