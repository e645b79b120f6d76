//! Common test utilities and fixtures
//!
//! Every command runs inside a scratch directory with an explicit offline
//! configuration, so no real model endpoint or search engine is contacted.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Environment variables that would otherwise leak host settings into a run
const HOST_VARS: &[&str] = &[
    "JUDGE_PANEL_CONFIG",
    "JUDGE_PANEL_MODEL_BACKEND",
    "JUDGE_PANEL_OUTPUT_DIR",
    "JUDGE_PANEL_PERSONA_DIR",
    "JUDGE_PANEL_WRITE_REPORT",
    "JUDGE_PANEL_LOG_LEVEL",
    "JUDGE_PANEL_LOG_FILE",
    "JUDGE_PANEL_LOG_JSON",
    "RUST_LOG",
];

/// Get a command for the judge-panel binary
pub fn panel_cmd() -> Command {
    let mut cmd = Command::cargo_bin("judge-panel").unwrap();
    for var in HOST_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Path to the bundled demo project description
pub fn demo_description() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("goodheart.txt")
}

/// Scratch workspace holding a configuration file and an output directory
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    /// Workspace configured for the offline backend with search disabled
    pub fn offline() -> Self {
        Self::with_extra("")
    }

    /// Offline workspace with additional TOML appended to the config
    pub fn with_extra(extra: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let ws = Self { dir };
        ws.write_config(&format!("{}\n{}", offline_config(&ws.output_dir()), extra));
        ws
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("judge-panel.toml")
    }

    pub fn config_arg(&self) -> String {
        self.config_path().display().to_string()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("output")
    }

    pub fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).unwrap();
    }

    /// Command running inside the workspace with its config
    pub fn cmd(&self) -> Command {
        let mut cmd = panel_cmd();
        cmd.current_dir(self.path()).arg("--config").arg(self.config_arg());
        cmd
    }

    pub fn read_artifact(&self, project_id: &str) -> serde_json::Value {
        let path = self.output_dir().join(format!("{}.json", project_id));
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }
}

/// Offline configuration writing into `output_dir`
pub fn offline_config(output_dir: &Path) -> String {
    format!(
        r#"[model]
backend = "mock"

[search]
enable_google = false
enable_duckduckgo = false

[output]
dir = "{}"
"#,
        output_dir.display()
    )
}
