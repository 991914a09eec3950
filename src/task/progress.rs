//! Mapping from executor snapshots to a stable, renderable progress model.
//!
//! [`progress_view`] is a pure function: same snapshot in, same view out. The
//! executor's seven stages collapse into five display slots, and each agent is
//! bucketed into one slot for grouping. Bucketing never influences
//! [`ProgressView::progress_percent`], which is taken from the snapshot
//! (forced to 0 for a failed task).
//!
//! [`AgentRoster`] is the one stateful helper here. It lives in the poller and
//! remembers agents across snapshots so that an agent which disappears is
//! shown as completed rather than silently dropped.

use serde::Serialize;

use super::types::{AgentActivity, AgentStatus, Stage, StatusSnapshot, TaskId};

/// Display slots, in order.
pub const STAGE_SLOTS: [Stage; 5] = [
    Stage::Planning,
    Stage::Executing,
    Stage::Synthesizing,
    Stage::Citing,
    Stage::Completed,
];

/// Nominal completion percentage for each stage.
pub fn stage_anchor(stage: Stage) -> u8 {
    match stage {
        Stage::Started => 10,
        Stage::Planning => 20,
        Stage::Executing => 40,
        Stage::Synthesizing => 80,
        Stage::Citing => 90,
        Stage::Completed => 100,
        Stage::Failed => 0,
    }
}

fn slot_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Started | Stage::Planning => "Planning research",
        Stage::Executing => "Searching sources",
        Stage::Synthesizing => "Synthesizing findings",
        Stage::Citing => "Adding citations",
        Stage::Completed => "Complete",
        Stage::Failed => "Failed",
    }
}

/// Index of the slot a stage belongs to. `started` shares the planning slot.
fn slot_index(stage: Stage) -> usize {
    match stage {
        Stage::Started | Stage::Planning | Stage::Failed => 0,
        Stage::Executing => 1,
        Stage::Synthesizing => 2,
        Stage::Citing => 3,
        Stage::Completed => 4,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Pending,
    Active,
    Done,
    /// The task failed; no slot can be considered reached or in progress.
    Halted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageSlot {
    pub stage: Stage,
    pub label: &'static str,
    pub anchor_percent: u8,
    pub state: SlotState,
    pub agents: Vec<AgentActivity>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub task_id: TaskId,
    pub stage: Stage,
    /// Authoritative progress: the snapshot's value, or 0 when failed.
    pub progress_percent: u8,
    /// The stage's nominal percentage, for UIs that want a stepped bar.
    pub anchor_percent: u8,
    pub message: String,
    pub slots: Vec<StageSlot>,
}

impl ProgressView {
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Total agents across all slots.
    pub fn agent_count(&self) -> usize {
        self.slots.iter().map(|s| s.agents.len()).sum()
    }

    pub fn active_slot(&self) -> Option<&StageSlot> {
        self.slots.iter().find(|s| s.state == SlotState::Active)
    }
}

/// Slot an agent is grouped under. Failed agents stay with the current stage.
fn agent_slot(agent: &AgentActivity, current: usize) -> usize {
    match agent.status {
        AgentStatus::Waiting => 0,
        AgentStatus::Searching => 1,
        AgentStatus::Analyzing => 2,
        AgentStatus::Completed => 4,
        AgentStatus::Failed => current,
    }
}

/// Build the display model for one snapshot.
pub fn progress_view(snapshot: &StatusSnapshot) -> ProgressView {
    let current = slot_index(snapshot.stage);

    let mut slots: Vec<StageSlot> = STAGE_SLOTS
        .iter()
        .enumerate()
        .map(|(i, &stage)| {
            let state = match snapshot.stage {
                Stage::Failed => SlotState::Halted,
                Stage::Completed => SlotState::Done,
                _ if i < current => SlotState::Done,
                _ if i == current => SlotState::Active,
                _ => SlotState::Pending,
            };
            StageSlot {
                stage,
                label: slot_label(stage),
                anchor_percent: stage_anchor(stage),
                state,
                agents: Vec::new(),
            }
        })
        .collect();

    for agent in &snapshot.agent_activities {
        slots[agent_slot(agent, current)].agents.push(agent.clone());
    }

    let progress_percent = match snapshot.stage {
        Stage::Failed => 0,
        _ => snapshot.progress_percent.min(100),
    };

    ProgressView {
        task_id: snapshot.task_id.clone(),
        stage: snapshot.stage,
        progress_percent,
        anchor_percent: stage_anchor(snapshot.stage),
        message: snapshot.message.clone(),
        slots,
    }
}

/// Remembers every agent seen during one polling session.
#[derive(Debug, Default, Clone)]
pub struct AgentRoster {
    agents: Vec<AgentActivity>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the latest activities in and return the full roster in
    /// first-seen order. Agents missing from `latest` are marked completed.
    pub fn merge(&mut self, latest: &[AgentActivity]) -> Vec<AgentActivity> {
        for known in &mut self.agents {
            match latest.iter().find(|a| a.agent_id == known.agent_id) {
                Some(current) => *known = current.clone(),
                None => {
                    if known.status != AgentStatus::Completed {
                        tracing::debug!(agent_id = %known.agent_id, "Agent vanished from snapshot, marking completed");
                    }
                    known.status = AgentStatus::Completed;
                    known.progress_percent = 100;
                }
            }
        }

        for agent in latest {
            if !self.agents.iter().any(|a| a.agent_id == agent.agent_id) {
                self.agents.push(agent.clone());
            }
        }

        self.agents.clone()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, status: AgentStatus) -> AgentActivity {
        AgentActivity {
            agent_id: id.to_string(),
            status,
            current_task: format!("task for {id}"),
            progress_percent: 50,
            tokens_used: 120,
        }
    }

    fn snapshot(stage: Stage, percent: u8, agents: Vec<AgentActivity>) -> StatusSnapshot {
        StatusSnapshot {
            task_id: "t1".to_string(),
            stage,
            progress_percent: percent,
            message: format!("{stage}"),
            agent_activities: agents,
        }
    }

    #[test]
    fn failed_snapshot_reports_zero_progress() {
        for percent in [0, 37, 90, 100] {
            let view = progress_view(&snapshot(Stage::Failed, percent, vec![]));
            assert_eq!(view.progress_percent, 0);
            assert!(view.slots.iter().all(|s| s.state == SlotState::Halted));
        }
    }

    #[test]
    fn percent_comes_from_snapshot_not_anchor() {
        let view = progress_view(&snapshot(Stage::Executing, 55, vec![]));
        assert_eq!(view.progress_percent, 55);
        assert_eq!(view.anchor_percent, 40);
    }

    #[test]
    fn percent_is_capped_at_100() {
        let view = progress_view(&snapshot(Stage::Citing, 250, vec![]));
        assert_eq!(view.progress_percent, 100);
    }

    #[test]
    fn anchors_match_stage_table() {
        let expected = [
            (Stage::Started, 10),
            (Stage::Planning, 20),
            (Stage::Executing, 40),
            (Stage::Synthesizing, 80),
            (Stage::Citing, 90),
            (Stage::Completed, 100),
            (Stage::Failed, 0),
        ];
        for (stage, anchor) in expected {
            assert_eq!(stage_anchor(stage), anchor, "{stage}");
        }
    }

    #[test]
    fn slots_progress_through_stages() {
        let view = progress_view(&snapshot(Stage::Synthesizing, 80, vec![]));
        let states: Vec<SlotState> = view.slots.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                SlotState::Done,
                SlotState::Done,
                SlotState::Active,
                SlotState::Pending,
                SlotState::Pending
            ]
        );
        assert_eq!(view.active_slot().map(|s| s.stage), Some(Stage::Synthesizing));
    }

    #[test]
    fn started_shares_planning_slot() {
        let view = progress_view(&snapshot(Stage::Started, 10, vec![]));
        assert_eq!(view.slots[0].state, SlotState::Active);
        assert_eq!(view.slots[0].stage, Stage::Planning);
    }

    #[test]
    fn agents_are_bucketed_by_status() {
        let view = progress_view(&snapshot(
            Stage::Executing,
            40,
            vec![
                agent("a", AgentStatus::Waiting),
                agent("b", AgentStatus::Searching),
                agent("c", AgentStatus::Analyzing),
                agent("d", AgentStatus::Completed),
                agent("e", AgentStatus::Failed),
            ],
        ));
        let ids = |i: usize| -> Vec<&str> {
            view.slots[i].agents.iter().map(|a| a.agent_id.as_str()).collect()
        };
        assert_eq!(ids(0), vec!["a"]);
        assert_eq!(ids(1), vec!["b", "e"]);
        assert_eq!(ids(2), vec!["c"]);
        assert!(ids(3).is_empty());
        assert_eq!(ids(4), vec!["d"]);
        assert_eq!(view.agent_count(), 5);
        assert_eq!(view.progress_percent, 40);
    }

    #[test]
    fn view_is_referentially_transparent() {
        let snap = snapshot(Stage::Citing, 91, vec![agent("a", AgentStatus::Analyzing)]);
        assert_eq!(progress_view(&snap), progress_view(&snap));
    }

    #[test]
    fn roster_marks_vanished_agents_completed() {
        let mut roster = AgentRoster::new();
        roster.merge(&[agent("a", AgentStatus::Searching), agent("b", AgentStatus::Searching)]);

        let merged = roster.merge(&[agent("b", AgentStatus::Analyzing)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].agent_id, "a");
        assert_eq!(merged[0].status, AgentStatus::Completed);
        assert_eq!(merged[0].progress_percent, 100);
        assert_eq!(merged[1].status, AgentStatus::Analyzing);
    }

    #[test]
    fn roster_appends_new_agents_in_first_seen_order() {
        let mut roster = AgentRoster::new();
        roster.merge(&[agent("a", AgentStatus::Waiting)]);
        let merged = roster.merge(&[agent("c", AgentStatus::Waiting), agent("a", AgentStatus::Searching)]);
        let ids: Vec<&str> = merged.iter().map(|a| a.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(roster.len(), 2);
    }
}
