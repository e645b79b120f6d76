//! Evaluator agent: a model endpoint behind a fixed system persona
//!
//! Each agent owns its conversation history exclusively. Tool-bound agents may
//! issue tool calls before answering; tool output is fed back as `tool`
//! messages until the model produces text or the round budget runs out.

use serde_json::json;
use tracing::{debug, warn};

use crate::backend::SharedBackend;
use crate::error::{Error, Result};
use crate::tools::SharedTool;
use crate::types::{ChatContent, ChatMessage, ChatRequest, ToolCall};

/// Tool rounds allowed when none is configured
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 6;

pub struct EvaluatorAgent {
    label: String,
    role: String,
    system_instructions: String,
    tools: Vec<SharedTool>,
    backend: SharedBackend,
    history: Vec<ChatMessage>,
    max_tool_rounds: u32,
}

impl std::fmt::Debug for EvaluatorAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorAgent")
            .field("label", &self.label)
            .field("role", &self.role)
            .field("backend", &self.backend.name())
            .field("tools", &self.tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>())
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl EvaluatorAgent {
    /// Create an agent with no tools
    pub fn new(
        label: impl Into<String>,
        role: impl Into<String>,
        system_instructions: impl Into<String>,
        backend: SharedBackend,
    ) -> Self {
        Self {
            label: label.into(),
            role: role.into(),
            system_instructions: system_instructions.into(),
            tools: Vec::new(),
            backend,
            history: Vec::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_tools(mut self, tools: Vec<SharedTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// Identity label (a judge's display name, "Researcher Rachel", ...)
    #[cfg(test)]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Role name shown to the model (e.g. "Hackathon Judge")
    #[cfg(test)]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[cfg(test)]
    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    #[cfg(test)]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    #[cfg(test)]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Answer `input` given the conversation so far
    ///
    /// Routes through [`respond_with_tools`](Self::respond_with_tools) when tools
    /// are bound.
    pub async fn respond(&mut self, input: &str) -> Result<String> {
        if self.has_tools() {
            return self.respond_with_tools(input).await;
        }

        self.history.push(ChatMessage::user(input));
        let content = self.complete(true).await?;
        match content {
            ChatContent::Text(text) => {
                self.history.push(ChatMessage::assistant(text.clone()));
                Ok(text)
            }
            ChatContent::ToolCalls(calls) => Err(Error::backend_response(
                self.backend.name(),
                format!(
                    "{} requested tool '{}' but has no tools bound",
                    self.label,
                    calls.first().map(|c| c.name.as_str()).unwrap_or("?")
                ),
            )),
            ChatContent::Structured(_) => Err(Error::backend_response(
                self.backend.name(),
                "structured output returned for a text request",
            )),
        }
    }

    /// Answer `input`, running any tool calls the model issues first
    pub async fn respond_with_tools(&mut self, input: &str) -> Result<String> {
        self.history.push(ChatMessage::user(input));

        for round in 0..=self.max_tool_rounds {
            // The last round withholds tools so the model has to answer
            let offer_tools = round < self.max_tool_rounds;
            match self.complete(offer_tools).await? {
                ChatContent::Text(text) => {
                    self.history.push(ChatMessage::assistant(text.clone()));
                    return Ok(text);
                }
                ChatContent::ToolCalls(calls) => {
                    if !offer_tools {
                        break;
                    }
                    debug!(agent = %self.label, round, calls = calls.len(), "Tool calls requested");
                    self.history.push(ChatMessage::assistant_tool_calls(calls.clone()));
                    for call in &calls {
                        let output = self.invoke_tool(call).await;
                        self.history.push(ChatMessage::tool_result(call.id.clone(), output));
                    }
                }
                ChatContent::Structured(_) => {
                    return Err(Error::backend_response(
                        self.backend.name(),
                        "structured output returned for a text request",
                    ));
                }
            }
        }

        Err(Error::ToolRoundsExceeded {
            agent: self.label.clone(),
            rounds: self.max_tool_rounds,
        })
    }

    async fn complete(&self, offer_tools: bool) -> Result<ChatContent> {
        let mut request = ChatRequest::new(self.label.clone())
            .with_system(self.system_instructions.clone())
            .with_messages(self.history.clone());
        if offer_tools && !self.tools.is_empty() {
            request = request.with_tools(self.tools.iter().map(|t| t.spec()).collect());
        }

        let response = self.backend.complete(request).await?;
        Ok(response.content)
    }

    /// Run one tool call; failures become an error payload for the model
    async fn invoke_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            warn!(agent = %self.label, tool = %call.name, "Model requested an unknown tool");
            return json!({ "error": Error::ToolNotFound { tool: call.name.clone() }.to_string() })
                .to_string();
        };

        match tool.execute(call.arguments.clone()).await {
            Ok(value) => value.to_string(),
            Err(e) => {
                warn!(agent = %self.label, tool = %call.name, error = %e, "Tool invocation failed");
                json!({ "error": e.to_string() }).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockConfig};
    use crate::search::testing::StaticSearch;
    use crate::search::SearchResult;
    use crate::tools::search_tools;
    use crate::types::{ChatResponse, Role};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_respond_appends_history() {
        let backend = Arc::new(MockBackend::new());
        let mut agent = EvaluatorAgent::new("Plain Paula", "Hackathon Judge", "You judge.", backend);

        let answer = agent.respond("Evaluate this").await.unwrap();
        assert!(!answer.is_empty());
        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.history()[0].role, Role::User);
        assert_eq!(agent.history()[1].role, Role::Assistant);

        agent.reset_history();
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces() {
        let backend = Arc::new(MockBackend::with_config(MockConfig {
            fail_agents: vec!["Plain Paula".to_string()],
            ..Default::default()
        }));
        let mut agent = EvaluatorAgent::new("Plain Paula", "Hackathon Judge", "You judge.", backend);
        let err = agent.respond("Evaluate").await.unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_tool_loop_feeds_results_back() {
        let provider = Arc::new(StaticSearch::with_results(
            "google",
            vec![SearchResult::new("AgentKit", "https://agentkit.example", "agents")],
        ));
        let backend = Arc::new(MockBackend::new());
        let mut agent = EvaluatorAgent::new("Researcher Rachel", "Researcher", "You research.", backend.clone())
            .with_tools(search_tools(&[provider.clone()], 5));

        let answer = agent.respond("WasteNot Market").await.unwrap();
        assert!(answer.contains("AgentKit"));
        assert_eq!(provider.queries().len(), 1);

        let roles: Vec<Role> = agent.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(backend.call_count("Researcher Rachel"), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let backend = Arc::new(MockBackend::new());
        backend.set_responder(|req| {
            if req.messages.iter().any(|m| m.role == Role::Tool) {
                let tool_output = &req.messages.last()?.content;
                return Some(Ok(ChatResponse::text(format!("saw: {}", tool_output))));
            }
            Some(Ok(ChatResponse::tool_calls(vec![ToolCall {
                id: "c1".into(),
                name: "search_bing".into(),
                arguments: json!({"query": "x"}),
            }])))
        });

        let provider = Arc::new(StaticSearch::empty("google"));
        let mut agent = EvaluatorAgent::new("R", "Researcher", "s", backend)
            .with_tools(search_tools(&[provider], 5));
        let answer = agent.respond("go").await.unwrap();
        assert!(answer.contains("not found"));
    }

    #[tokio::test]
    async fn test_tool_rounds_exhausted() {
        let backend = Arc::new(MockBackend::new());
        // Keeps calling tools even when none are offered
        backend.set_responder(|_| {
            Some(Ok(ChatResponse::tool_calls(vec![ToolCall {
                id: "c".into(),
                name: "search_google".into(),
                arguments: json!({"query": "again"}),
            }])))
        });

        let provider = Arc::new(StaticSearch::empty("google"));
        let mut agent = EvaluatorAgent::new("R", "Researcher", "s", backend)
            .with_tools(search_tools(&[provider.clone()], 5))
            .with_max_tool_rounds(2);

        let err = agent.respond("go").await.unwrap_err();
        assert!(matches!(err, Error::ToolRoundsExceeded { rounds: 2, .. }));
        assert_eq!(provider.queries().len(), 2);
    }
}
