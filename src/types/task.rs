//! Evaluation task definitions
//!
//! A `Task` is created by the caller, mutated in place by the workforce as
//! subtasks complete, and becomes terminal once a result or a failure is set.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::workforce::Subtask;

// ─────────────────────────────────────────────────────────────────
// Status & Phase
// ─────────────────────────────────────────────────────────────────

/// Coarse task status as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Failed,
}

/// Orchestration phase of a task
///
/// `Pending → Decomposed → Dispatched → Synthesized`, with `Failed` reachable
/// from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Pending,
    Decomposed,
    Dispatched,
    Synthesized,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Synthesized | TaskPhase::Failed)
    }

    /// Whether `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: TaskPhase) -> bool {
        match (self, next) {
            (TaskPhase::Pending, TaskPhase::Decomposed) => true,
            (TaskPhase::Decomposed, TaskPhase::Dispatched) => true,
            (TaskPhase::Dispatched, TaskPhase::Synthesized) => true,
            (from, TaskPhase::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            TaskPhase::Pending => TaskStatus::Pending,
            TaskPhase::Decomposed | TaskPhase::Dispatched => TaskStatus::InProgress,
            TaskPhase::Synthesized => TaskStatus::Done,
            TaskPhase::Failed => TaskStatus::Failed,
        }
    }
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPhase::Pending => write!(f, "pending"),
            TaskPhase::Decomposed => write!(f, "decomposed"),
            TaskPhase::Dispatched => write!(f, "dispatched"),
            TaskPhase::Synthesized => write!(f, "synthesized"),
            TaskPhase::Failed => write!(f, "failed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Worker Failure
// ─────────────────────────────────────────────────────────────────

/// A worker that did not contribute output, recorded instead of aborting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerFailure {
    /// Display name of the worker (e.g. "Critical John")
    pub worker: String,
    pub subtask_id: String,
    /// Error code of the underlying failure (e.g. "E300")
    pub code: String,
    pub message: String,
}

impl WorkerFailure {
    pub fn from_error(worker: &str, subtask_id: &str, error: &Error) -> Self {
        Self {
            worker: worker.to_string(),
            subtask_id: subtask_id.to_string(),
            code: error.code().as_str(),
            message: error.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────

/// The unit of work processed by the workforce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Instruction text
    pub content: String,
    /// Attached payload (the project description)
    pub additional_info: String,
    /// Synthesized narrative, set once the task reaches `Synthesized`
    pub result: Option<String>,
    pub status: TaskStatus,
    pub phase: TaskPhase,
    /// Subtasks created by decomposition, in dispatch order
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    /// Workers that failed without aborting the task
    #[serde(default)]
    pub failures: Vec<WorkerFailure>,
    /// Reason the task reached `Failed`
    #[serde(default)]
    pub error: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        additional_info: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            additional_info: additional_info.into(),
            result: None,
            status: TaskStatus::Pending,
            phase: TaskPhase::Pending,
            subtasks: Vec::new(),
            failures: Vec::new(),
            error: None,
        }
    }

    /// Advance to `next`, rejecting illegal transitions
    pub fn advance(&mut self, next: TaskPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "task {} cannot move from {} to {}",
                self.id, self.phase, next
            )));
        }
        self.phase = next;
        self.status = next.status();
        Ok(())
    }

    /// Commit the synthesized narrative and finish the task
    pub fn complete(&mut self, narrative: String) -> Result<()> {
        self.advance(TaskPhase::Synthesized)?;
        self.result = Some(narrative);
        Ok(())
    }

    /// Record an unrecoverable failure
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.phase.is_terminal() {
            self.phase = TaskPhase::Failed;
            self.status = TaskStatus::Failed;
        }
        self.error = Some(reason.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new("0", "Evaluate", "A project");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.phase, TaskPhase::Pending);
        assert!(task.result.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = Task::new("0", "Evaluate", "A project");
        task.advance(TaskPhase::Decomposed).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        task.advance(TaskPhase::Dispatched).unwrap();
        task.complete("narrative".into()).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.result.as_deref(), Some("narrative"));
        assert!(task.is_terminal());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut task = Task::new("0", "Evaluate", "A project");
        assert!(task.advance(TaskPhase::Dispatched).is_err());
        assert!(task.complete("x".into()).is_err());
        assert!(task.result.is_none());
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut task = Task::new("0", "Evaluate", "A project");
        task.advance(TaskPhase::Decomposed).unwrap();
        task.fail("no judges");
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(!task.phase.can_transition_to(TaskPhase::Dispatched));
        assert_eq!(task.error.as_deref(), Some("no judges"));
    }

    #[test]
    fn test_worker_failure_from_error() {
        let err = Error::backend_unavailable("openai", "rate limited");
        let failure = WorkerFailure::from_error("Critical John", "0.2", &err);
        assert_eq!(failure.code, "E300");
        assert!(failure.message.contains("rate limited"));
    }
}
