//! Backend selection
//!
//! Maps the configured backend kind to a shared model backend instance.

use std::sync::Arc;

use crate::config::ModelSettings;
use crate::error::Result;

use super::{MockBackend, MockConfig, OpenAiBackend, OpenAiConfig, SharedBackend};

// ─────────────────────────────────────────────────────────────────
// Backend Kind
// ─────────────────────────────────────────────────────────────────

/// Supported backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// OpenAI-compatible chat completions endpoint
    OpenAi,
    /// Deterministic offline backend
    Mock,
}

impl BackendKind {
    /// Get the backend name
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Mock => "mock",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(BackendKind::OpenAi),
            "mock" => Some(BackendKind::Mock),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ─────────────────────────────────────────────────────────────────
// Backend Factory
// ─────────────────────────────────────────────────────────────────

/// Factory for creating backends
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend of `kind` serving `model`
    ///
    /// The extraction step asks for a different model than the agents, so the
    /// model identifier is passed separately from the rest of the settings.
    pub fn create(kind: BackendKind, settings: &ModelSettings, model: &str) -> Result<SharedBackend> {
        let backend: SharedBackend = match kind {
            BackendKind::OpenAi => Arc::new(OpenAiBackend::new(OpenAiConfig {
                base_url: settings.base_url.clone(),
                api_key: settings.api_key.clone(),
                model: model.to_string(),
                timeout_secs: settings.timeout_secs,
                max_retries: settings.max_retries,
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            })?),
            BackendKind::Mock => Arc::new(MockBackend::with_config(MockConfig {
                fail_agents: settings.mock.fail_agents.clone(),
                unscored_agents: settings.mock.unscored_agents.clone(),
                scores: settings.mock.scores.clone(),
                ..Default::default()
            })),
        };

        tracing::debug!(backend = %kind, model, "Backend created");
        Ok(backend)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
