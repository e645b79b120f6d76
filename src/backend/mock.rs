//! Mock backend for testing and offline runs
//!
//! Deterministic stand-in for a model endpoint. Requests are answered by
//! shape: schema-constrained requests are extracted from the narrative,
//! tool-bound requests search once and then summarise, judge requests return
//! an in-voice verdict with an `x/4` score, and anything else gets a summary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::agent::JUDGE_PREAMBLE;
use crate::error::{Error, Result};
use crate::types::{ChatRequest, ChatResponse, Role, ToolCall, MAX_SCORE};
use crate::workforce::narrative;

use super::{BackendCapabilities, ModelBackend};

// ─────────────────────────────────────────────────────────────────
// Mock Backend Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock backend behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Agent labels whose calls fail with `BackendUnavailable`
    pub fail_agents: Vec<String>,

    /// Agent labels that answer without a score token
    pub unscored_agents: Vec<String>,

    /// Fixed scores per agent label (otherwise derived from a hash)
    pub scores: HashMap<String, u8>,

    /// Simulated latency per agent label (ms)
    pub delays_ms: HashMap<String, u64>,
}

/// Scripted override: return `Some` to answer a request, `None` to fall through
pub type Responder = Arc<dyn Fn(&ChatRequest) -> Option<Result<ChatResponse>> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of ModelBackend
pub struct MockBackend {
    config: MockConfig,
    call_counts: RwLock<HashMap<String, u32>>,
    responder: RwLock<Option<Responder>>,
}

impl MockBackend {
    /// Create a new mock backend with default configuration
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a new mock backend with custom configuration
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            call_counts: RwLock::new(HashMap::new()),
            responder: RwLock::new(None),
        }
    }

    /// Install a scripted responder consulted before the built-in behavior
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&ChatRequest) -> Option<Result<ChatResponse>> + Send + Sync + 'static,
    {
        *self.responder.write() = Some(Arc::new(responder));
    }

    /// Get the number of calls made by an agent
    pub fn call_count(&self, agent: &str) -> u32 {
        self.call_counts.read().get(agent).copied().unwrap_or(0)
    }

    /// Total calls across all agents
    #[cfg(test)]
    pub fn total_calls(&self) -> u32 {
        self.call_counts.read().values().sum()
    }

    fn score_for(&self, agent: &str, prompt: &str) -> u8 {
        if let Some(&score) = self.config.scores.get(agent) {
            return score.clamp(1, MAX_SCORE);
        }
        let mut hasher = Sha256::new();
        hasher.update(agent.as_bytes());
        hasher.update(prompt.as_bytes());
        let hash = hasher.finalize();
        hash[0] % MAX_SCORE + 1
    }

    fn judge_verdict(&self, request: &ChatRequest) -> ChatResponse {
        let agent = request.agent.as_str();
        let prompt = request.last_user_message().unwrap_or_default();
        let score = self.score_for(agent, prompt);

        let tone = match score {
            4 => "this is exceptional work that stands out from the whole field",
            3 => "this is a strong entry with a few rough edges left to polish",
            2 => "the idea has merit, but the execution needs significant work",
            _ => "this does not yet meet the bar on the criteria I judge",
        };
        let grounding = if prompt.contains("No research findings") {
            "I judged it on the description alone."
        } else {
            "The research findings helped me place it among current work."
        };

        let text = if self.config.unscored_agents.iter().any(|a| a == agent) {
            format!("{} here. Having reviewed the project, {}. {}", agent, tone, grounding)
        } else {
            format!(
                "{} here. Having reviewed the project, {}. {}\nScore: {}/{}",
                agent, tone, grounding, score, MAX_SCORE
            )
        };
        ChatResponse::text(text)
    }

    fn research_step(&self, request: &ChatRequest) -> ChatResponse {
        let tool_outputs: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.as_str())
            .collect();

        if tool_outputs.is_empty() && !request.tools.is_empty() {
            let query: String = request
                .last_user_message()
                .unwrap_or_default()
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("hackathon project")
                .chars()
                .take(100)
                .collect();
            return ChatResponse::tool_calls(vec![ToolCall {
                id: "call_0".to_string(),
                name: request.tools[0].name.clone(),
                arguments: json!({ "query": query }),
            }]);
        }

        let mut lines = Vec::new();
        for output in tool_outputs {
            let Ok(value) = serde_json::from_str::<Value>(output) else {
                continue;
            };
            if let Some(error) = value.get("error").and_then(Value::as_str) {
                lines.push(format!("- search failed: {}", error));
            }
            for hit in value
                .get("results")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                lines.push(format!(
                    "- {} ({}): {}",
                    hit["title"].as_str().unwrap_or_default(),
                    hit["url"].as_str().unwrap_or_default(),
                    hit["snippet"].as_str().unwrap_or_default()
                ));
            }
        }

        if lines.is_empty() {
            ChatResponse::text("Research findings: no relevant results were found.")
        } else {
            ChatResponse::text(format!("Research findings:\n{}", lines.join("\n")))
        }
    }

    fn extraction(&self, request: &ChatRequest) -> ChatResponse {
        let system = request.system.as_deref().unwrap_or_default();
        let narrative_text = request.last_user_message().unwrap_or_default();
        let judges = narrative::parse_judges_line(system).unwrap_or_default();
        let names: Vec<&str> = judges.iter().map(String::as_str).collect();

        let opinions: Vec<Value> = narrative::segments(narrative_text, &names)
            .into_iter()
            .filter_map(|(name, segment)| {
                let segment = segment?;
                let score = narrative::segment_score(segment, &name)?;
                Some(json!({
                    "judge_name": name,
                    "score": score,
                    "comment": narrative::comment_of(segment, &name),
                }))
            })
            .collect();

        ChatResponse::structured(json!({
            "opinions": opinions,
            "summary": narrative::summary_of(narrative_text).unwrap_or_default(),
        }))
    }

    fn summary(&self, request: &ChatRequest) -> ChatResponse {
        let prompt = request.last_user_message().unwrap_or_default();
        // One score per judge section: the line right after its heading
        let lines: Vec<&str> = prompt.lines().collect();
        let scores: Vec<u8> = lines
            .windows(2)
            .filter(|pair| pair[0].starts_with("### "))
            .filter_map(|pair| narrative::find_score(pair[1]))
            .collect();

        if scores.is_empty() {
            return ChatResponse::text(format!(
                "Noted. {}",
                prompt.chars().take(120).collect::<String>()
            ));
        }

        let mean = scores.iter().map(|&s| s as f32).sum::<f32>() / scores.len() as f32;
        let verdict = if mean >= 3.0 {
            "The panel is broadly enthusiastic"
        } else if mean >= 2.0 {
            "The panel is divided"
        } else {
            "The panel has serious reservations"
        };
        let mut text = format!(
            "{} judges weighed in with an average of {:.1} out of {}. {}, with each judge \
             reading the project through their own criteria.",
            scores.len(),
            mean,
            MAX_SCORE,
            verdict
        );

        let missing = missing_workers(prompt);
        if !missing.is_empty() {
            text.push_str(&format!(
                " No verdict was recorded for {}, so this summary leaves out their view.",
                missing.join(", ")
            ));
        }
        ChatResponse::text(text)
    }
}

/// Worker names listed under the missing-verdicts heading of a prompt
fn missing_workers(prompt: &str) -> Vec<&str> {
    prompt
        .lines()
        .skip_while(|l| l.trim() != narrative::GAPS_HEADING)
        .skip(1)
        .map_while(|l| l.strip_prefix("- "))
        .filter_map(|l| l.split(" (subtask ").next())
        .collect()
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "mock",
            supports_tools: true,
            supports_response_schema: true,
            max_context_length: 128_000,
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        *self
            .call_counts
            .write()
            .entry(request.agent.clone())
            .or_insert(0) += 1;

        if let Some(&ms) = self.config.delays_ms.get(&request.agent) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let responder = self.responder.read().clone();
        if let Some(responder) = responder {
            if let Some(result) = responder(&request) {
                return result;
            }
        }

        if self.config.fail_agents.iter().any(|a| a == &request.agent) {
            return Err(Error::backend_unavailable(
                "mock",
                format!("injected failure for '{}'", request.agent),
            ));
        }

        let system = request.system.as_deref().unwrap_or_default();
        let has_tool_turns = request.messages.iter().any(|m| m.role == Role::Tool);

        let response = if request.response_schema.is_some() {
            self.extraction(&request)
        } else if !request.tools.is_empty() || has_tool_turns {
            self.research_step(&request)
        } else if system.contains(JUDGE_PREAMBLE) {
            self.judge_verdict(&request)
        } else {
            self.summary(&request)
        };

        Ok(response)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
