//! Worker registrations
//!
//! A worker is an evaluator agent registered under a role description such as
//! `"Critical John (Judge), an experienced engineer and a perfectionist."`.
//! The description decides what the worker is routed.

use serde::Serialize;

use crate::agent::EvaluatorAgent;

/// Routing class of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Scores the project; contributes one opinion
    Judge,
    /// Gathers context for the judges; never contributes an opinion
    Helper,
}

impl WorkerKind {
    /// Classify a role description
    ///
    /// An explicit `(Judge)` or `(Helper)` marker wins. Without one, an agent
    /// bound to tools is a helper and any other agent is a judge.
    pub fn classify(role_description: &str, has_tools: bool) -> Self {
        let lower = role_description.to_lowercase();
        if lower.contains("(judge)") {
            WorkerKind::Judge
        } else if lower.contains("(helper)") {
            WorkerKind::Helper
        } else if has_tools {
            WorkerKind::Helper
        } else {
            WorkerKind::Judge
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerKind::Judge => write!(f, "judge"),
            WorkerKind::Helper => write!(f, "helper"),
        }
    }
}

/// Display name of a worker: the text before its `(Judge)`/`(Helper)` marker,
/// or before the first comma when there is none
pub fn display_name(role_description: &str) -> String {
    let trimmed = role_description.trim();
    let cut = trimmed
        .find(" (")
        .or_else(|| trimmed.find(','))
        .unwrap_or(trimmed.len());
    let name = trimmed[..cut].trim();
    if name.is_empty() {
        trimmed.to_string()
    } else {
        name.to_string()
    }
}

/// Role description and routing data of one registered worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerRegistration {
    pub role_description: String,
    pub name: String,
    pub kind: WorkerKind,
}

/// A registration together with the agent it binds
pub struct Worker {
    pub registration: WorkerRegistration,
    pub agent: EvaluatorAgent,
}

impl Worker {
    pub fn new(role_description: String, agent: EvaluatorAgent) -> Self {
        let kind = WorkerKind::classify(&role_description, agent.has_tools());
        let name = display_name(&role_description);
        Self {
            registration: WorkerRegistration {
                role_description,
                name,
                kind,
            },
            agent,
        }
    }

    pub fn name(&self) -> &str {
        &self.registration.name
    }

    pub fn kind(&self) -> WorkerKind {
        self.registration.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_markers() {
        assert_eq!(
            WorkerKind::classify("Critical John (Judge), an engineer", false),
            WorkerKind::Judge
        );
        assert_eq!(
            WorkerKind::classify("Researcher Rachel (Helper), a researcher", true),
            WorkerKind::Helper
        );
        // Marker beats tool binding
        assert_eq!(
            WorkerKind::classify("Tooled Tina (Judge), uses a calculator", true),
            WorkerKind::Judge
        );
    }

    #[test]
    fn test_classify_without_marker() {
        assert_eq!(WorkerKind::classify("A web researcher", true), WorkerKind::Helper);
        assert_eq!(WorkerKind::classify("A product critic", false), WorkerKind::Judge);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            display_name("Visionary Veronica (Judge), a venture capitalist who is obsessed"),
            "Visionary Veronica"
        );
        assert_eq!(display_name("Plain Paula, a critic"), "Plain Paula");
        assert_eq!(display_name("  Solo  "), "Solo");
    }
}
