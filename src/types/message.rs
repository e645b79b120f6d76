//! Chat message types
//!
//! The request/response contract between evaluator agents and a model
//! backend: system instructions, conversation history, optional tool specs,
//! optional response schema in; text, tool calls or a structured value out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Backend-assigned call id, echoed back in the tool result message
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: Value,
}

/// One entry of an agent's conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    /// Tool calls issued by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// For `Role::Tool`, the call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn that only requests tools
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// Result of a tool call, fed back to the model
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────

/// Description of a callable tool, as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments
    pub parameters: Value,
}

/// JSON schema the model's answer must conform to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

/// Sampling parameters shared by every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum tokens to generate (None = backend default)
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (None = backend default)
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Random seed for reproducibility, where supported
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: Some(0.2),
            seed: None,
        }
    }
}

/// A single model invocation
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Label of the calling agent, used for logging and test doubles
    pub agent: String,
    /// System instructions
    pub system: Option<String>,
    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call
    pub tools: Vec<ToolSpec>,
    /// Schema constraint for structured output
    pub response_schema: Option<ResponseSchema>,
    pub params: GenerationParams,
}

impl ChatRequest {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            system: None,
            messages: Vec::new(),
            tools: Vec::new(),
            response_schema: None,
            params: GenerationParams::default(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Content of the most recent user message, if any
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// What the model produced
#[derive(Debug, Clone, PartialEq)]
pub enum ChatContent {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    Structured(Value),
}

/// Response to a [`ChatRequest`]
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: ChatContent,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: ChatContent::Text(text.into()),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: ChatContent::ToolCalls(calls),
            finish_reason: FinishReason::ToolCalls,
            usage: TokenUsage::default(),
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            content: ChatContent::Structured(value),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
    }

    #[test]
    fn test_tool_result_carries_call_id() {
        let msg = ChatMessage::tool_result("call_1", "[]");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_last_user_message() {
        let req = ChatRequest::new("judge").with_messages(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ]);
        assert_eq!(req.last_user_message(), Some("second"));
        assert_eq!(ChatRequest::new("empty").last_user_message(), None);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }
}
