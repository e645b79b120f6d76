//! Subtask execution state tracking
//!
//! Tracks the subtasks a workforce derives from a task and their
//! execution states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Subtask Execution State
// ─────────────────────────────────────────────────────────────────

/// What a subtask asks its worker to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskKind {
    /// Gather background context with the search tools
    Research,
    /// Score the project from one judge's perspective
    Evaluate,
}

impl std::fmt::Display for SubtaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtaskKind::Research => write!(f, "research"),
            SubtaskKind::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// State of a subtask being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskState {
    /// Waiting for a worker slot
    #[default]
    Queued,
    /// Worker is producing output
    Running,
    /// Worker returned output
    Completed,
    /// Worker errored or timed out
    Failed,
}

// ─────────────────────────────────────────────────────────────────
// Subtask
// ─────────────────────────────────────────────────────────────────

/// One unit of work assigned to exactly one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    /// `<task_id>.<n>`, numbered in dispatch order
    pub id: String,

    /// Instruction handed to the worker
    pub content: String,

    /// Display name of the assigned worker
    pub assignee: String,

    pub kind: SubtaskKind,

    pub state: SubtaskState,

    /// Worker output, once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Error message if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Subtask {
    pub fn new(
        task_id: &str,
        index: usize,
        kind: SubtaskKind,
        assignee: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("{}.{}", task_id, index),
            content: content.into(),
            assignee: assignee.into(),
            kind,
            state: SubtaskState::Queued,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark the subtask as running
    pub fn mark_running(&mut self) {
        self.state = SubtaskState::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the subtask as completed with the worker's output
    pub fn mark_completed(&mut self, output: String) {
        self.state = SubtaskState::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(output);
    }

    /// Mark the subtask as failed
    pub fn mark_failed(&mut self, error: String) {
        self.state = SubtaskState::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SubtaskState::Completed | SubtaskState::Failed)
    }

    /// Get execution time in milliseconds
    pub fn execution_time_ms(&self) -> u64 {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
            (Some(start), None) => (Utc::now() - start).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
