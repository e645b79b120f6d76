//! Configuration system for judge-panel
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (JUDGE_PANEL_* prefix, plus OPENAI_API_KEY,
//!    GOOGLE_API_KEY and SEARCH_ENGINE_ID as fallbacks for credentials)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::BackendKind;
use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Model backend used by every agent and the extractor
    pub model: ModelSettings,

    /// Search providers bound to the research agent
    pub search: SearchSettings,

    /// Orchestration limits
    pub workforce: WorkforceSettings,

    /// Judge panel source
    pub panel: PanelSettings,

    /// Artifact output
    pub output: OutputSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Model backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Backend kind: "openai" or "mock"
    pub backend: String,

    /// API base URL of an OpenAI-compatible endpoint
    pub base_url: String,

    /// API key (empty for local servers)
    pub api_key: String,

    /// Model used by judges, researcher and coordinator
    pub model: String,

    /// Model used for schema-constrained extraction
    pub extraction_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    pub max_retries: u32,

    /// Sampling temperature (unset = backend default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens per completion (unset = backend default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Scripted behavior of the offline backend
    pub mock: MockSettings,
}

/// Offline backend behavior, keyed by agent label
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// Agents whose calls fail as if the endpoint were down
    pub fail_agents: Vec<String>,

    /// Agents that answer without a score
    pub unscored_agents: Vec<String>,

    /// Fixed scores (1-4) per agent
    pub scores: std::collections::HashMap<String, u8>,
}

/// Search provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Bind the Google Custom Search tool
    pub enable_google: bool,

    /// Bind the DuckDuckGo tool
    pub enable_duckduckgo: bool,

    /// Google Custom Search API key
    pub google_api_key: String,

    /// Google Programmable Search Engine id
    pub google_engine_id: String,

    /// Google Custom Search endpoint
    pub google_endpoint: String,

    /// DuckDuckGo HTML endpoint
    pub duckduckgo_endpoint: String,

    /// Results returned per query
    pub max_results: usize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Total time budget for retrying one query, in seconds
    pub max_retry_secs: u64,
}

/// Workforce orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkforceSettings {
    /// Workforce display name
    pub name: String,

    /// Time budget for a single subtask in seconds
    pub subtask_timeout_secs: u64,

    /// Judges evaluated concurrently
    pub max_concurrent_judges: usize,

    /// Tool-call rounds an agent may take before it must answer
    pub max_tool_rounds: u32,
}

/// Judge panel settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// Directory of persona TOML files (unset = bundled panel)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_dir: Option<String>,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory receiving `<project_id>.json`
    pub dir: String,

    /// Create the directory when missing
    pub create_dir: bool,

    /// Also write `<project_id>.run.json` with orchestration details
    pub write_report: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            extraction_model: "gpt-4o-2024-08-06".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            temperature: None,
            max_tokens: None,
            mock: MockSettings::default(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enable_google: true,
            enable_duckduckgo: true,
            google_api_key: String::new(),
            google_engine_id: String::new(),
            google_endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            duckduckgo_endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_results: 5,
            timeout_secs: 20,
            max_retry_secs: 30,
        }
    }
}

impl Default for WorkforceSettings {
    fn default() -> Self {
        Self {
            name: "Hackathon Judges".to_string(),
            subtask_timeout_secs: 300,
            max_concurrent_judges: 4,
            max_tool_rounds: 6,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
            create_dir: true,
            write_report: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl EvalConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            PathBuf::from("judge-panel.toml"),
            dirs::config_dir()
                .map(|p| p.join("judge-panel").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".judge-panel").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/judge-panel/config.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Model settings
        if let Ok(val) = std::env::var("JUDGE_PANEL_MODEL_BACKEND") {
            self.model.backend = val;
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_BASE_URL") {
            self.model.base_url = val;
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_API_KEY") {
            self.model.api_key = val;
        } else if self.model.api_key.is_empty() {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                self.model.api_key = val;
            }
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_MODEL") {
            self.model.model = val;
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_EXTRACTION_MODEL") {
            self.model.extraction_model = val;
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.model.timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                self.model.max_retries = n;
            }
        }

        // Search settings
        if let Ok(val) = std::env::var("JUDGE_PANEL_GOOGLE_API_KEY") {
            self.search.google_api_key = val;
        } else if self.search.google_api_key.is_empty() {
            if let Ok(val) = std::env::var("GOOGLE_API_KEY") {
                self.search.google_api_key = val;
            }
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_GOOGLE_ENGINE_ID") {
            self.search.google_engine_id = val;
        } else if self.search.google_engine_id.is_empty() {
            if let Ok(val) = std::env::var("SEARCH_ENGINE_ID") {
                self.search.google_engine_id = val;
            }
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_SEARCH_MAX_RESULTS") {
            if let Ok(n) = val.parse() {
                self.search.max_results = n;
            }
        }

        // Workforce settings
        if let Ok(val) = std::env::var("JUDGE_PANEL_SUBTASK_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.workforce.subtask_timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_MAX_CONCURRENT_JUDGES") {
            if let Ok(n) = val.parse() {
                self.workforce.max_concurrent_judges = n;
            }
        }

        // Panel and output
        if let Ok(val) = std::env::var("JUDGE_PANEL_PERSONA_DIR") {
            self.panel.persona_dir = Some(val);
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_OUTPUT_DIR") {
            self.output.dir = val;
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_WRITE_REPORT") {
            self.output.write_report = val.to_lowercase() == "true" || val == "1";
        }

        // Logging settings
        if let Ok(val) = std::env::var("JUDGE_PANEL_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("JUDGE_PANEL_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and environment variables in paths
    fn expand_paths(&mut self) {
        self.output.dir = expand_path(&self.output.dir);
        if let Some(ref dir) = self.panel.persona_dir {
            self.panel.persona_dir = Some(expand_path(dir));
        }
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let kind = BackendKind::parse(&self.model.backend).ok_or_else(|| {
            Error::config_field_invalid(
                "model.backend",
                format!(
                    "Unknown backend '{}'. Must be one of: openai, mock",
                    self.model.backend
                ),
            )
        })?;

        if kind == BackendKind::OpenAi {
            if !self.model.base_url.starts_with("http://")
                && !self.model.base_url.starts_with("https://")
            {
                return Err(Error::config_field_invalid(
                    "model.base_url",
                    "Model base URL must start with http:// or https://",
                ));
            }
            if self.model.model.is_empty() || self.model.extraction_model.is_empty() {
                return Err(Error::config_field_invalid(
                    "model.model",
                    "Model identifiers cannot be empty",
                ));
            }
        }

        if self.model.timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "model.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }

        if let Some(t) = self.model.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::config_field_invalid(
                    "model.temperature",
                    "temperature must be between 0.0 and 2.0",
                ));
            }
        }

        if let Some((agent, score)) = self
            .model
            .mock
            .scores
            .iter()
            .find(|(_, s)| !(1..=4).contains(*s))
        {
            return Err(Error::config_field_invalid(
                "model.mock.scores",
                format!("score {} for '{}' must be between 1 and 4", score, agent),
            ));
        }

        if self.search.max_results == 0 || self.search.max_results > 10 {
            return Err(Error::config_field_invalid(
                "search.max_results",
                "max_results must be between 1 and 10",
            ));
        }

        if self.workforce.subtask_timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "workforce.subtask_timeout_secs",
                "subtask_timeout_secs must be greater than 0",
            ));
        }
        if self.workforce.max_concurrent_judges == 0 {
            return Err(Error::config_field_invalid(
                "workforce.max_concurrent_judges",
                "max_concurrent_judges must be at least 1",
            ));
        }
        if self.workforce.max_tool_rounds == 0 {
            return Err(Error::config_field_invalid(
                "workforce.max_tool_rounds",
                "max_tool_rounds must be at least 1",
            ));
        }

        if self.output.dir.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "output.dir",
                "Output directory cannot be empty",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Parsed backend kind (validated in `validate`)
    pub fn backend_kind(&self) -> BackendKind {
        BackendKind::parse(&self.model.backend).unwrap_or(BackendKind::OpenAi)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.dir)
    }

    pub fn persona_dir(&self) -> Option<PathBuf> {
        self.panel.persona_dir.as_ref().map(PathBuf::from)
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".judge-panel")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# judge-panel configuration

[model]
# Backend kind: "openai" (any OpenAI-compatible endpoint) or "mock" (offline)
backend = "openai"

# API base URL (OpenAI, Azure proxy, Ollama, vLLM, ...)
base_url = "https://api.openai.com/v1"

# API key (falls back to OPENAI_API_KEY when empty)
api_key = ""

# Model used by judges, the researcher and the coordinator
model = "gpt-4o"

# Model used for schema-constrained extraction of the final feedback
extraction_model = "gpt-4o-2024-08-06"

# Request timeout in seconds
timeout_secs = 120

# Maximum retries on rate limits, server errors and timeouts
max_retries = 2

[search]
# Search tools bound to the research agent
enable_google = true
enable_duckduckgo = true

# Google Custom Search credentials (fall back to GOOGLE_API_KEY / SEARCH_ENGINE_ID)
google_api_key = ""
google_engine_id = ""

# Results returned per query (1-10)
max_results = 5

# Per-request timeout and total retry window, in seconds
timeout_secs = 20
max_retry_secs = 30

[workforce]
name = "Hackathon Judges"

# Time budget for one subtask (research or a single judge), in seconds
subtask_timeout_secs = 300

# Judges evaluated concurrently
max_concurrent_judges = 4

# Tool-call rounds an agent may take before it must answer
max_tool_rounds = 6

[panel]
# Directory of persona TOML files; comment out to use the bundled panel
# persona_dir = "~/.judge-panel/personas"

[output]
# Directory receiving <project_id>.json
dir = "output"

# Create the directory when missing
create_dir = true

# Also write <project_id>.run.json with subtask states and worker failures
write_report = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.judge-panel/logs/judge-panel.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.model.backend, "openai");
        assert_eq!(config.model.model, "gpt-4o");
        assert_eq!(config.workforce.name, "Hackathon Judges");
        assert_eq!(config.output.dir, "output");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("JUDGE_PANEL_EXTRACTION_MODEL", "gpt-test-extract");
        env::set_var("JUDGE_PANEL_SEARCH_MAX_RESULTS", "3");

        let mut config = EvalConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.model.extraction_model, "gpt-test-extract");
        assert_eq!(config.search.max_results, 3);

        env::remove_var("JUDGE_PANEL_EXTRACTION_MODEL");
        env::remove_var("JUDGE_PANEL_SEARCH_MAX_RESULTS");
    }

    #[test]
    fn test_file_key_wins_over_openai_fallback() {
        let mut config = EvalConfig::default();
        config.model.api_key = "sk-from-file".to_string();
        config.apply_env_overrides();
        if env::var("JUDGE_PANEL_API_KEY").is_err() {
            assert_eq!(config.model.api_key, "sk-from-file");
        }
    }

    #[test]
    fn test_validation_unknown_backend() {
        let mut config = EvalConfig::default();
        config.model.backend = "llama".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut config = EvalConfig::default();
        config.model.base_url = "ftp://invalid".to_string();
        assert!(config.validate().is_err());

        // URL is irrelevant for the mock backend
        config.model.backend = "mock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_limits() {
        let mut config = EvalConfig::default();
        config.workforce.max_concurrent_judges = 0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.search.max_results = 50;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.model.temperature = Some(3.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = EvalConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = EvalConfig::default();
        config.output.dir = "~/judge-output".to_string();
        config.expand_paths();
        assert!(!config.output.dir.contains('~'));
    }

    #[test]
    fn test_default_config_template_parses() {
        let parsed: EvalConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.workforce.max_tool_rounds, 6);
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let path_str = path.to_str().unwrap();

        assert_eq!(init_config(Some(path_str), false).unwrap(), path);
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }

    #[test]
    fn test_explicit_missing_file() {
        let result = EvalConfig::load(Some("/nonexistent/judge-panel.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[model]
backend = "mock"
model = "test-model"

[workforce]
max_concurrent_judges = 2

[panel]
persona_dir = "/tmp/personas"

[output]
dir = "/tmp/out"
write_report = true
"#;

        let config: EvalConfig = toml::from_str(config_str).unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Mock);
        assert_eq!(config.model.model, "test-model");
        assert_eq!(config.workforce.max_concurrent_judges, 2);
        assert_eq!(config.persona_dir(), Some(PathBuf::from("/tmp/personas")));
        assert!(config.output.write_report);
        // Unspecified sections fall back to defaults
        assert_eq!(config.search.max_results, 5);
    }
}
