//! Ordered goal list with a single active pointer.
//!
//! Goals complete strictly in list order: only the currently active goal can
//! be completed, after which the next pending goal becomes active. Once no
//! pending goal remains the tracker is finished and stays finished.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    pub status: GoalStatus,
    #[serde(default)]
    pub completion_cues: Vec<String>,
    #[serde(default)]
    pub movement_only: bool,
}

impl Goal {
    pub fn new(id: &str, description: &str, cues: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            status: GoalStatus::Pending,
            completion_cues: cues.iter().map(|c| c.to_string()).collect(),
            movement_only: false,
        }
    }

    pub fn movement_only(mut self) -> Self {
        self.movement_only = true;
        self
    }
}

/// Result of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed {
        completed: String,
        next: Option<String>,
    },
    /// The requested id was not the active goal; nothing changed.
    Rejected {
        requested: String,
        active: Option<String>,
    },
}

impl CompletionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalTracker {
    goals: Vec<Goal>,
    active: Option<usize>,
}

impl GoalTracker {
    /// Builds a tracker, keeping the first `active` goal and demoting any others.
    pub fn new(mut goals: Vec<Goal>) -> Self {
        let mut active = None;
        for (idx, goal) in goals.iter_mut().enumerate() {
            if goal.status == GoalStatus::Active {
                if active.is_none() {
                    active = Some(idx);
                } else {
                    goal.status = GoalStatus::Pending;
                }
            }
        }
        Self { goals, active }
    }

    /// Builds a tracker from persisted goals, honoring a stored active id.
    ///
    /// Goals complete in list order, so every goal ahead of the stored one is
    /// taken as completed.
    pub fn restore(mut goals: Vec<Goal>, active_id: Option<&str>) -> Self {
        let wanted = active_id.and_then(|id| {
            goals
                .iter()
                .position(|g| g.id == id && g.status != GoalStatus::Completed)
        });
        if let Some(idx) = wanted {
            for (i, goal) in goals.iter_mut().enumerate() {
                goal.status = match i.cmp(&idx) {
                    Ordering::Less => GoalStatus::Completed,
                    Ordering::Equal => GoalStatus::Active,
                    Ordering::Greater if goal.status == GoalStatus::Active => GoalStatus::Pending,
                    Ordering::Greater => goal.status,
                };
            }
        }
        Self::new(goals)
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Active goal without activating anything.
    pub fn current(&self) -> Option<&Goal> {
        self.active.and_then(|idx| self.goals.get(idx))
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current().map(|g| g.id.as_str())
    }

    /// Returns the active goal, activating the first pending goal past the
    /// last completed one if none is active.
    pub fn get_active_goal(&mut self) -> Option<&Goal> {
        if self.active.is_none() {
            self.active = self.next_pending(self.frontier());
            if let Some(idx) = self.active {
                self.goals[idx].status = GoalStatus::Active;
            }
        }
        self.current()
    }

    /// Completes the active goal if and only if `id` is that goal's id.
    pub fn complete_current_goal(&mut self, id: &str) -> CompletionOutcome {
        let current = self.get_active_goal().map(|g| g.id.clone());
        let idx = match (self.active, current.as_deref()) {
            (Some(idx), Some(active_id)) if active_id == id => idx,
            _ => {
                return CompletionOutcome::Rejected {
                    requested: id.to_string(),
                    active: current,
                };
            }
        };

        self.goals[idx].status = GoalStatus::Completed;
        self.active = self.next_pending(idx + 1);
        if let Some(next) = self.active {
            self.goals[next].status = GoalStatus::Active;
        }
        CompletionOutcome::Completed {
            completed: id.to_string(),
            next: self.current_id().map(str::to_string),
        }
    }

    /// True once every goal is completed or no pending goal remains.
    pub fn is_finished(&self) -> bool {
        self.active.is_none() && self.next_pending(self.frontier()).is_none()
    }

    pub fn completed_count(&self) -> usize {
        self.goals
            .iter()
            .filter(|g| g.status == GoalStatus::Completed)
            .count()
    }

    /// Index just past the last completed goal; activation never looks behind it.
    fn frontier(&self) -> usize {
        self.goals
            .iter()
            .rposition(|g| g.status == GoalStatus::Completed)
            .map_or(0, |idx| idx + 1)
    }

    fn next_pending(&self, from: usize) -> Option<usize> {
        self.goals
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, g)| g.status == GoalStatus::Pending)
            .map(|(idx, _)| idx)
    }
}

/// Structural checks on a goal list; returns one message per violation.
pub fn validate_goals(goals: &[Goal]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for goal in goals {
        if goal.id.trim().is_empty() {
            errors.push("goal id must be non-empty".to_string());
        }
        if !seen.insert(goal.id.as_str()) {
            errors.push(format!("duplicate goal id '{}'", goal.id));
        }
    }
    let active = goals
        .iter()
        .filter(|g| g.status == GoalStatus::Active)
        .count();
    if active > 1 {
        errors.push(format!("{active} goals are active (at most one allowed)"));
    }
    errors
}
