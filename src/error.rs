//! Error types for judge-panel
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes that identify the failing pipeline stage

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for judge-panel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Model backend errors (3xx)
    BackendUnavailable = 300,
    BackendResponse = 301,
    BackendUnsupported = 302,

    // Search and tool errors (4xx)
    SearchUnavailable = 400,
    SearchNotConfigured = 401,
    SearchParse = 402,
    ToolInvocation = 410,
    ToolNotFound = 411,

    // Orchestration errors (5xx)
    Decomposition = 500,
    Synthesis = 501,
    SubtaskTimeout = 502,
    ToolRoundsExceeded = 503,
    UnscoredVerdict = 504,

    // Extraction errors (6xx)
    SchemaExtraction = 600,
    ScoreOutOfRange = 601,

    // Persistence errors (7xx)
    Persistence = 700,
    InvalidProjectId = 701,

    // Persona errors (8xx)
    PersonaNotFound = 800,
    PersonaInvalid = 801,

    // Internal errors (9xx)
    InternalError = 900,
    Serialization = 902,
}

impl ErrorCode {
    /// Get the string code (e.g., "E300")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (one per hundred-block)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Model backend errors
            400..=499 => 40, // Search/tool errors
            500..=599 => 50, // Orchestration errors
            600..=699 => 60, // Extraction errors
            700..=799 => 70, // Persistence errors
            800..=899 => 80, // Persona errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }

    /// Pipeline stage this code belongs to, for user-facing reporting
    pub fn stage(&self) -> &'static str {
        match *self as u16 {
            100..=199 => "configuration",
            200..=299 => "io",
            300..=399 => "model backend",
            400..=499 => "research tools",
            500..=599 => "orchestration",
            600..=699 => "structured extraction",
            700..=799 => "persistence",
            800..=899 => "persona loading",
            _ => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidation { message: String, field: String },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Model Backend Errors
    // ─────────────────────────────────────────────────────────────

    /// Model call failed after the backend's own retry policy was exhausted
    #[error("Model backend '{backend}' unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    /// Backend answered, but with something unusable
    #[error("Model backend '{backend}' returned an invalid response: {message}")]
    BackendResponse { backend: String, message: String },

    /// Backend lacks a capability the request needs
    #[error("Model backend '{backend}' does not support {feature}")]
    BackendUnsupported { backend: String, feature: String },

    // ─────────────────────────────────────────────────────────────
    // Search & Tool Errors
    // ─────────────────────────────────────────────────────────────

    /// Search provider failed after retries
    #[error("Search provider '{provider}' unavailable: {message}")]
    SearchUnavailable { provider: String, message: String },

    /// Search provider is missing credentials or endpoints
    #[error("Search provider '{provider}' is not configured: missing {missing}")]
    SearchNotConfigured { provider: String, missing: String },

    /// Search provider response could not be parsed
    #[error("Search provider '{provider}' returned unparseable results: {message}")]
    SearchParse { provider: String, message: String },

    /// A tool was called with bad arguments or failed internally
    #[error("Tool '{tool}' failed: {message}")]
    ToolInvocation { tool: String, message: String },

    /// The model asked for a tool that is not bound to the agent
    #[error("Tool not found: {tool}")]
    ToolNotFound { tool: String },

    // ─────────────────────────────────────────────────────────────
    // Orchestration Errors
    // ─────────────────────────────────────────────────────────────

    /// Task could not be split into subtasks
    #[error("Task {task_id} could not be decomposed: {message}")]
    Decomposition { task_id: String, message: String },

    /// Worker results could not be merged into a narrative
    #[error("Task {task_id} could not be synthesized: {message}")]
    Synthesis { task_id: String, message: String },

    /// A subtask exceeded its time budget
    #[error("Subtask {subtask_id} timed out after {timeout_secs}s")]
    SubtaskTimeout { subtask_id: String, timeout_secs: u64 },

    /// An agent kept requesting tools without producing an answer
    #[error("Agent '{agent}' exceeded {rounds} tool rounds without answering")]
    ToolRoundsExceeded { agent: String, rounds: u32 },

    /// A judge answered without a parseable `x/4` score
    #[error("Verdict from '{worker}' has no parseable score")]
    UnscoredVerdict { worker: String },

    // ─────────────────────────────────────────────────────────────
    // Extraction Errors
    // ─────────────────────────────────────────────────────────────

    /// Extracted record does not conform to the Feedback schema
    #[error("Schema extraction failed: {message}")]
    SchemaExtraction { message: String },

    /// An opinion's score lies outside 1..=4
    #[error("Score {score} for judge '{judge}' is outside the 1-4 range")]
    ScoreOutOfRange { judge: String, score: i64 },

    // ─────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────

    /// Artifact could not be written or read back
    #[error("Failed to persist artifact {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    /// Project id is not usable as a file name
    #[error("Invalid project id '{id}': {reason}")]
    InvalidProjectId { id: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Persona Errors
    // ─────────────────────────────────────────────────────────────

    /// Persona not found
    #[error("Persona not found: {name}")]
    PersonaNotFound { name: String },

    /// Persona configuration failed validation
    #[error("Persona '{name}' is invalid: {reason}")]
    PersonaInvalid { name: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::Serialization,

            Error::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            Error::BackendResponse { .. } => ErrorCode::BackendResponse,
            Error::BackendUnsupported { .. } => ErrorCode::BackendUnsupported,

            Error::SearchUnavailable { .. } => ErrorCode::SearchUnavailable,
            Error::SearchNotConfigured { .. } => ErrorCode::SearchNotConfigured,
            Error::SearchParse { .. } => ErrorCode::SearchParse,
            Error::ToolInvocation { .. } => ErrorCode::ToolInvocation,
            Error::ToolNotFound { .. } => ErrorCode::ToolNotFound,

            Error::Decomposition { .. } => ErrorCode::Decomposition,
            Error::Synthesis { .. } => ErrorCode::Synthesis,
            Error::SubtaskTimeout { .. } => ErrorCode::SubtaskTimeout,
            Error::ToolRoundsExceeded { .. } => ErrorCode::ToolRoundsExceeded,
            Error::UnscoredVerdict { .. } => ErrorCode::UnscoredVerdict,

            Error::SchemaExtraction { .. } => ErrorCode::SchemaExtraction,
            Error::ScoreOutOfRange { .. } => ErrorCode::ScoreOutOfRange,

            Error::Persistence { .. } => ErrorCode::Persistence,
            Error::InvalidProjectId { .. } => ErrorCode::InvalidProjectId,

            Error::PersonaNotFound { .. } => ErrorCode::PersonaNotFound,
            Error::PersonaInvalid { .. } => ErrorCode::PersonaInvalid,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'judge-panel config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'judge-panel config validate' to see details.",
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values.",
            ),
            Error::BackendUnavailable { .. } => Some(
                "Check the model endpoint and API key ([model] base_url / OPENAI_API_KEY), then re-run the evaluation.",
            ),
            Error::BackendResponse { .. } => Some(
                "The model may not support the requested features. Try a model with tool calling and structured outputs.",
            ),
            Error::SearchNotConfigured { .. } => Some(
                "Set GOOGLE_API_KEY and SEARCH_ENGINE_ID, or rely on the DuckDuckGo provider.",
            ),
            Error::SchemaExtraction { .. } | Error::ScoreOutOfRange { .. } => Some(
                "The extractor output did not match the panel narrative. Re-running the whole evaluation usually resolves this.",
            ),
            Error::Persistence { .. } => Some(
                "Check that the output directory exists and is writable, or set [output] create_dir = true.",
            ),
            Error::InvalidProjectId { .. } => Some(
                "Project ids may only contain letters, digits, '-', '_' and '.'.",
            ),
            Error::PersonaNotFound { .. } => Some(
                "Run 'judge-panel persona list' to see the bundled personas.",
            ),
            Error::PersonaInvalid { .. } => Some(
                "Every persona needs a name, persona text, example feedback and a rubric declaring the 1-4 scale.",
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m ({} stage): {}\n",
            code.as_str(),
            code.stage(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: field.into(),
        }
    }

    pub fn backend_unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn backend_response(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendResponse {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn schema_extraction(message: impl Into<String>) -> Self {
        Error::SchemaExtraction {
            message: message.into(),
        }
    }

    pub fn persona_invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::PersonaInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::BackendUnavailable.as_str(), "E300");
        assert_eq!(ErrorCode::SchemaExtraction.as_str(), "E600");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_exit_codes_identify_stage() {
        assert_eq!(ErrorCode::ConfigNotFound.exit_code(), 10);
        assert_eq!(ErrorCode::BackendUnavailable.exit_code(), 30);
        assert_eq!(ErrorCode::Synthesis.exit_code(), 50);
        assert_eq!(ErrorCode::SchemaExtraction.exit_code(), 60);
        assert_eq!(ErrorCode::Persistence.exit_code(), 70);
        assert_eq!(ErrorCode::SchemaExtraction.stage(), "structured extraction");
        assert_eq!(ErrorCode::Persistence.stage(), "persistence");
    }

    #[test]
    fn test_error_codes() {
        let err = Error::backend_unavailable("openai", "429");
        assert_eq!(err.code(), ErrorCode::BackendUnavailable);

        let err = Error::schema_extraction("missing summary");
        assert_eq!(err.code(), ErrorCode::SchemaExtraction);

        let err = Error::ScoreOutOfRange {
            judge: "Critical John".into(),
            score: 5,
        };
        assert_eq!(err.code(), ErrorCode::ScoreOutOfRange);
        assert!(err.to_string().contains("Critical John"));
    }

    #[test]
    fn test_config_field_in_message() {
        let err = Error::config_field_invalid("workforce.max_concurrent_judges", "must be at least 1");
        assert_eq!(err.code(), ErrorCode::ConfigValidation);
        assert!(err.to_string().contains("workforce.max_concurrent_judges"));
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::ConfigNotFound {
            path: PathBuf::from("/test"),
        };
        assert!(err.suggestion().unwrap().contains("config init"));

        let err = Error::Persistence {
            path: PathBuf::from("output/x.json"),
            message: "No such file or directory".into(),
        };
        assert!(err.suggestion().unwrap().contains("create_dir"));
    }

    #[test]
    fn test_format_for_terminal() {
        let err = Error::schema_extraction("no opinions");
        let formatted = err.format_for_terminal();

        assert!(formatted.contains("E600"));
        assert!(formatted.contains("structured extraction stage"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
