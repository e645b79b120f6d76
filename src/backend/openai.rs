//! OpenAI-compatible API backend
//!
//! Implements ModelBackend by making HTTP calls to any OpenAI-compatible
//! `/chat/completions` endpoint (OpenAI, Azure proxies, Ollama, vLLM, etc.).
//! Tool calling and strict `json_schema` response formats are passed through.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{
    ChatContent, ChatMessage, ChatRequest, ChatResponse, FinishReason, Role, TokenUsage,
    ToolCall,
};

use super::{BackendCapabilities, ModelBackend};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for OpenAI-compatible API backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (e.g., "https://api.openai.com/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    /// Model to use (e.g., "gpt-4o", "gpt-4o-2024-08-06")
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient errors
    pub max_retries: u32,

    /// Overrides the per-request temperature when set
    pub temperature: Option<f32>,

    /// Overrides the per-request token cap when set
    pub max_tokens: Option<u32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            temperature: None,
            max_tokens: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// OpenAI API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ApiResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunctionSpec,
}

#[derive(Debug, Serialize)]
struct ApiFunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ApiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: ApiJsonSchema,
}

#[derive(Debug, Serialize)]
struct ApiJsonSchema {
    name: String,
    schema: Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn function_type() -> String {
    "function".to_string()
}

// ─────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────

/// OpenAI-compatible API backend
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
    total_requests: RwLock<u64>,
    total_tokens: RwLock<u64>,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend with the given configuration
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::backend_unavailable("openai", format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "OpenAI-compatible backend created"
        );

        Ok(Self {
            config,
            client,
            total_requests: RwLock::new(0),
            total_tokens: RwLock::new(0),
        })
    }

    /// Build the authorization header value (if API key is set)
    fn auth_header(&self) -> Option<String> {
        if self.config.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.config.api_key))
        }
    }

    /// Translate a request into the wire format
    fn build_request_body(&self, request: &ChatRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system {
            messages.push(ApiMessage {
                role: "system",
                content: Some(system.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }
        messages.extend(request.messages.iter().map(to_api_message));

        let tools = request
            .tools
            .iter()
            .map(|t| ApiTool {
                kind: "function",
                function: ApiFunctionSpec {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();

        let response_format = request.response_schema.as_ref().map(|s| ApiResponseFormat {
            kind: "json_schema",
            json_schema: ApiJsonSchema {
                name: s.name.clone(),
                schema: s.schema.clone(),
                strict: true,
            },
        });

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            tools,
            response_format,
            max_tokens: self.config.max_tokens.or(request.params.max_tokens),
            temperature: self.config.temperature.or(request.params.temperature),
            seed: request.params.seed,
        }
    }

    /// Make a chat completion request with retry logic
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let request_body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let expects_structured = request.response_schema.is_some();
        let mut last_error: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                debug!(agent = %request.agent, attempt, ?backoff, "Retrying after error");
                tokio::time::sleep(backoff).await;
            }

            let mut req = self.client.post(&url).json(&request_body);
            if let Some(ref auth) = self.auth_header() {
                req = req.header("Authorization", auth);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.json::<ChatCompletionResponse>().await {
                            Ok(parsed) => {
                                *self.total_requests.write() += 1;
                                if let Some(ref u) = parsed.usage {
                                    *self.total_tokens.write() += u.total_tokens as u64;
                                }
                                return parse_completion(parsed, expects_structured);
                            }
                            Err(e) => {
                                last_error =
                                    Some(format!("Failed to parse API response: {}", e));
                            }
                        }
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        // Retryable error
                        let body = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, "Retryable API error: {}", body);
                        last_error = Some(format!("API error {}: {}", status, body));
                    } else {
                        // Non-retryable error
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::backend_response(
                            "openai",
                            format!("API error {}: {}", status, body),
                        ));
                    }
                }
                Err(e) => {
                    if e.is_timeout() || e.is_connect() {
                        warn!(attempt, error = %e, "Retryable connection error");
                        last_error = Some(format!("Connection error: {}", e));
                    } else {
                        return Err(Error::backend_unavailable(
                            "openai",
                            format!("Request error: {}", e),
                        ));
                    }
                }
            }
        }

        Err(Error::backend_unavailable(
            "openai",
            format!(
                "{} attempt(s) exhausted: {}",
                self.config.max_retries + 1,
                last_error.unwrap_or_else(|| "unknown error".to_string())
            ),
        ))
    }
}

fn to_api_message(message: &ChatMessage) -> ApiMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let tool_calls: Vec<ApiToolCall> = message
        .tool_calls
        .iter()
        .map(|c| ApiToolCall {
            id: c.id.clone(),
            kind: function_type(),
            function: ApiFunctionCall {
                name: c.name.clone(),
                arguments: c.arguments.to_string(),
            },
        })
        .collect();

    // Assistant turns that only carry tool calls send a null content
    let content = if message.content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(message.content.clone())
    };

    ApiMessage {
        role,
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Convert the first choice into a `ChatResponse`
fn parse_completion(parsed: ChatCompletionResponse, expects_structured: bool) -> Result<ChatResponse> {
    let usage = parsed
        .usage
        .as_ref()
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::backend_response("openai", "No choices in API response"))?;

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    if let Some(refusal) = choice.message.refusal {
        return Err(Error::backend_response(
            "openai",
            format!("Model refused the request: {}", refusal),
        ));
    }

    let calls = choice.message.tool_calls.unwrap_or_default();
    let content = if !calls.is_empty() {
        ChatContent::ToolCalls(
            calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.function.name,
                    // Models occasionally emit invalid JSON; hand the raw text to the tool
                    arguments: serde_json::from_str(&c.function.arguments)
                        .unwrap_or(Value::String(c.function.arguments)),
                })
                .collect(),
        )
    } else {
        let text = choice.message.content.unwrap_or_default();
        if expects_structured {
            let value: Value = serde_json::from_str(&text).map_err(|e| {
                Error::backend_response(
                    "openai",
                    format!("Malformed schema response: {}", e),
                )
            })?;
            ChatContent::Structured(value)
        } else {
            ChatContent::Text(text)
        }
    };

    Ok(ChatResponse {
        content,
        finish_reason,
        usage,
    })
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "openai",
            supports_tools: true,
            supports_response_schema: true,
            max_context_length: 128_000,
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();
        let response = self.chat_completion(&request).await?;
        debug!(
            agent = %request.agent,
            model = %self.config.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            total_tokens = response.usage.total_tokens,
            session_requests = *self.total_requests.read(),
            session_tokens = *self.total_tokens.read(),
            "Completion received"
        );
        Ok(response)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseSchema, ToolSpec};
    use serde_json::json;

    fn backend(config: OpenAiConfig) -> OpenAiBackend {
        OpenAiBackend::new(config).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert!(config.api_key.is_empty());
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_capabilities() {
        let backend = backend(OpenAiConfig::default());
        let caps = backend.capabilities();
        assert_eq!(caps.name, "openai");
        assert!(caps.supports_tools);
        assert!(caps.supports_response_schema);
    }

    #[test]
    fn test_auth_header() {
        let config = OpenAiConfig {
            api_key: "sk-test-123".to_string(),
            ..Default::default()
        };
        assert_eq!(
            backend(config).auth_header(),
            Some("Bearer sk-test-123".to_string())
        );
        assert_eq!(backend(OpenAiConfig::default()).auth_header(), None);
    }

    #[test]
    fn test_request_body_with_tools_and_schema() {
        let backend = backend(OpenAiConfig::default());
        let request = ChatRequest::new("Researcher Rachel")
            .with_system("You are a researcher.")
            .with_messages(vec![
                ChatMessage::user("Find news"),
                ChatMessage::assistant_tool_calls(vec![ToolCall {
                    id: "call_1".into(),
                    name: "search_google".into(),
                    arguments: json!({"query": "WasteNot"}),
                }]),
                ChatMessage::tool_result("call_1", "[]"),
            ])
            .with_tools(vec![ToolSpec {
                name: "search_google".into(),
                description: "Search Google".into(),
                parameters: json!({"type": "object"}),
            }])
            .with_response_schema(ResponseSchema {
                name: "feedback".into(),
                schema: json!({"type": "object"}),
            });

        let body = serde_json::to_value(backend.build_request_body(&request)).unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["content"], Value::Null);
        assert_eq!(
            body["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"query\":\"WasteNot\"}"
        );
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_config_overrides_request_params() {
        let backend = backend(OpenAiConfig {
            temperature: Some(0.9),
            ..Default::default()
        });
        let body = backend.build_request_body(&ChatRequest::new("judge"));
        assert_eq!(body.temperature, Some(0.9));
        assert!(body.tools.is_empty());
    }

    #[test]
    fn test_parse_tool_calls() {
        let parsed: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "search_duckduckgo", "arguments": "{\"query\":\"food waste apps\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let response = parse_completion(parsed, false).unwrap();
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage.total_tokens, 15);
        match response.content {
            ChatContent::ToolCalls(calls) => {
                assert_eq!(calls[0].name, "search_duckduckgo");
                assert_eq!(calls[0].arguments["query"], "food waste apps");
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_structured_and_malformed() {
        let ok: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "{\"summary\":\"ok\"}"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        match parse_completion(ok, true).unwrap().content {
            ChatContent::Structured(v) => assert_eq!(v["summary"], "ok"),
            other => panic!("expected structured, got {:?}", other),
        }

        let bad: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "not json"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert!(matches!(
            parse_completion(bad, true),
            Err(Error::BackendResponse { .. })
        ));
    }

    #[test]
    fn test_parse_empty_choices() {
        let parsed = ChatCompletionResponse {
            choices: vec![],
            usage: None,
        };
        assert!(parse_completion(parsed, false).is_err());
    }
}
