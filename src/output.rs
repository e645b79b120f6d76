//! Artifact persistence
//!
//! `<dir>/<project_id>.json` holds the Feedback record, pretty-printed with a
//! 4-space indent in declared key order. An optional `<project_id>.run.json`
//! run report keeps the orchestration trace next to it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Feedback, Task, TaskStatus, WorkerFailure};
use crate::workforce::Subtask;

const MAX_PROJECT_ID_LEN: usize = 128;

// ─────────────────────────────────────────────────────────────────
// Project ids
// ─────────────────────────────────────────────────────────────────

/// Check that a project id is usable as a file name
pub fn validate_project_id(id: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidProjectId {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    if id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if id.len() > MAX_PROJECT_ID_LEN {
        return Err(invalid("must be at most 128 characters"));
    }
    if id.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(&format!("character '{}' is not allowed", c)));
    }
    Ok(())
}

pub fn feedback_path(dir: &Path, project_id: &str) -> PathBuf {
    dir.join(format!("{}.json", project_id))
}

pub fn report_path(dir: &Path, project_id: &str) -> PathBuf {
    dir.join(format!("{}.run.json", project_id))
}

// ─────────────────────────────────────────────────────────────────
// Feedback artifact
// ─────────────────────────────────────────────────────────────────

/// Write the Feedback artifact, returning its path
pub fn write_feedback(dir: &Path, project_id: &str, feedback: &Feedback, create_dir: bool) -> Result<PathBuf> {
    validate_project_id(project_id)?;
    let path = feedback_path(dir, project_id);
    write_pretty(dir, &path, feedback, create_dir)?;
    info!(path = %path.display(), opinions = feedback.opinions.len(), "Feedback written");
    Ok(path)
}

/// Read a Feedback artifact back
pub fn read_feedback(path: &Path) -> Result<Feedback> {
    let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| Error::Persistence {
        path: path.to_path_buf(),
        message: format!("not a feedback document: {}", e),
    })
}

fn write_pretty<T: Serialize>(dir: &Path, path: &Path, value: &T, create_dir: bool) -> Result<()> {
    if !dir.is_dir() {
        if !create_dir {
            return Err(Error::Persistence {
                path: path.to_path_buf(),
                message: format!("output directory {} does not exist", dir.display()),
            });
        }
        fs::create_dir_all(dir).map_err(|e| Error::Persistence {
            path: path.to_path_buf(),
            message: format!("cannot create {}: {}", dir.display(), e),
        })?;
        debug!(dir = %dir.display(), "Created output directory");
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');

    fs::write(path, buf).map_err(|e| Error::Persistence {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────
// Run report
// ─────────────────────────────────────────────────────────────────

/// Orchestration trace of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub project_id: String,
    pub task_id: String,
    pub workforce: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub subtasks: Vec<Subtask>,
    pub failures: Vec<WorkerFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Hex SHA-256 of the narrative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f32>,
    pub version: String,
}

impl RunReport {
    pub fn new(
        project_id: &str,
        workforce: &str,
        task: &Task,
        feedback: Option<&Feedback>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            task_id: task.id.clone(),
            workforce: workforce.to_string(),
            status: task.status,
            started_at,
            finished_at: Utc::now(),
            subtasks: task.subtasks.clone(),
            failures: task.failures.clone(),
            narrative: task.result.clone(),
            narrative_sha256: task.result.as_deref().map(sha256_hex),
            average_score: feedback.and_then(Feedback::average_score),
            version: crate::version::build_info().full_version(),
        }
    }
}

pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Write the run report, returning its path
pub fn write_run_report(dir: &Path, report: &RunReport, create_dir: bool) -> Result<PathBuf> {
    validate_project_id(&report.project_id)?;
    let path = report_path(dir, &report.project_id);
    write_pretty(dir, &path, report, create_dir)?;
    debug!(path = %path.display(), run_id = %report.run_id, "Run report written");
    Ok(path)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
