//! Backend trait definitions
//!
//! Defines the core ModelBackend trait that every model endpoint must implement.
//! Agents and the extractor only ever talk to a model through this trait, so the
//! whole pipeline runs unchanged against the offline `MockBackend`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};

// ─────────────────────────────────────────────────────────────────
// Backend Capabilities
// ─────────────────────────────────────────────────────────────────

/// Capabilities of a backend
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// Name of the backend
    pub name: &'static str,

    /// Whether the backend can issue tool calls
    pub supports_tools: bool,

    /// Whether the backend honours a response schema
    pub supports_response_schema: bool,

    /// Maximum context length supported
    pub max_context_length: u32,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            name: "unknown",
            supports_tools: false,
            supports_response_schema: false,
            max_context_length: 4096,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// ModelBackend Trait
// ─────────────────────────────────────────────────────────────────

/// Core trait for model backends
///
/// A request carries system instructions, history, optional tool specs and an
/// optional response schema. The response is text, a tool-call request, or a
/// schema-conformant value. The trait is object-safe for dynamic dispatch.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Get the backend name (e.g., "openai", "mock")
    fn name(&self) -> &'static str;

    /// Get the backend capabilities
    fn capabilities(&self) -> BackendCapabilities;

    /// Run one completion
    ///
    /// Implementations apply their own retry policy; once it is exhausted the
    /// error is `BackendUnavailable`.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;
}

// ─────────────────────────────────────────────────────────────────
// Arc wrapper for trait objects
// ─────────────────────────────────────────────────────────────────

/// Type alias for a shared backend reference
pub type SharedBackend = Arc<dyn ModelBackend>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_capabilities_default() {
        let caps = BackendCapabilities::default();
        assert_eq!(caps.name, "unknown");
        assert!(!caps.supports_tools);
        assert!(!caps.supports_response_schema);
    }
}
