//! Callable tools bound to agents
//!
//! A tool advertises a name, a description and a JSON schema for its
//! arguments, and executes with the model's JSON arguments. Search providers
//! are exposed to the research agent through [`SearchTool`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::search::SharedSearchProvider;
use crate::types::ToolSpec;

/// A capability an agent may invoke between model turns
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value>;

    /// Specification advertised to the model
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

pub type SharedTool = Arc<dyn Tool>;

// ─────────────────────────────────────────────────────────────────
// Search Tool
// ─────────────────────────────────────────────────────────────────

/// Exposes a search provider as `search_<provider>`
pub struct SearchTool {
    name: String,
    description: String,
    provider: SharedSearchProvider,
    max_results: usize,
}

impl SearchTool {
    pub fn new(provider: SharedSearchProvider, max_results: usize) -> Self {
        let name = format!("search_{}", provider.name());
        let description = match provider.name() {
            "google" => "Use the Google search engine to search information for the given query.".to_string(),
            "duckduckgo" => "Use the DuckDuckGo search engine to search information for the given query.".to_string(),
            other => format!("Use the {} search engine to search information for the given query.", other),
        };
        Self {
            name,
            description,
            provider,
            max_results,
        }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The query to be searched"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return"
                }
            },
            "required": ["query"]
        })
    }

    /// Provider failures come back as an error payload so the model can
    /// carry on with the other provider or with what it already knows.
    async fn execute(&self, args: Value) -> Result<Value> {
        let args: SearchArgs = match args {
            Value::String(query) => SearchArgs {
                query,
                max_results: None,
            },
            other => serde_json::from_value(other).map_err(|e| Error::ToolInvocation {
                tool: self.name.clone(),
                message: format!("Invalid arguments: {}", e),
            })?,
        };

        let limit = args
            .max_results
            .unwrap_or(self.max_results)
            .clamp(1, self.max_results.max(1));

        info!(tool = %self.name, query = %args.query, "Search requested");

        match self.provider.search(&args.query, limit).await {
            Ok(results) => Ok(json!({
                "query": args.query,
                "results": results,
            })),
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Search provider failed");
                Ok(json!({
                    "query": args.query,
                    "error": e.to_string(),
                    "results": [],
                }))
            }
        }
    }
}

/// Wrap every provider as a tool, in provider order
pub fn search_tools(providers: &[SharedSearchProvider], max_results: usize) -> Vec<SharedTool> {
    providers
        .iter()
        .map(|p| Arc::new(SearchTool::new(p.clone(), max_results)) as SharedTool)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::testing::StaticSearch;
    use crate::search::SearchResult;

    fn hits() -> Vec<SearchResult> {
        (0..4)
            .map(|i| SearchResult::new(format!("t{}", i), format!("https://{}.example", i), "s"))
            .collect()
    }

    #[test]
    fn test_tool_names_follow_provider() {
        let tools = search_tools(
            &[
                Arc::new(StaticSearch::empty("google")),
                Arc::new(StaticSearch::empty("duckduckgo")),
            ],
            5,
        );
        let names: Vec<_> = tools.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["search_google", "search_duckduckgo"]);
        assert!(tools[0].description().contains("Google"));
        assert_eq!(tools[1].spec().parameters["required"][0], "query");
    }

    #[tokio::test]
    async fn test_execute_returns_results() {
        let tool = SearchTool::new(Arc::new(StaticSearch::with_results("google", hits())), 3);
        let out = tool.execute(json!({"query": "food waste apps"})).await.unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 3);
        assert_eq!(out["results"][0]["url"], "https://0.example");
    }

    #[tokio::test]
    async fn test_execute_accepts_bare_string() {
        let provider = Arc::new(StaticSearch::with_results("google", hits()));
        let tool = SearchTool::new(provider.clone(), 2);
        tool.execute(json!("food waste apps")).await.unwrap();
        assert_eq!(provider.queries(), vec!["food waste apps".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_payload() {
        let tool = SearchTool::new(Arc::new(StaticSearch::failing("duckduckgo", "blocked")), 5);
        let out = tool.execute(json!({"query": "x"})).await.unwrap();
        assert!(out["error"].as_str().unwrap().contains("blocked"));
        assert!(out["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected() {
        let tool = SearchTool::new(Arc::new(StaticSearch::empty("google")), 5);
        let err = tool.execute(json!({"q": 1})).await.unwrap_err();
        assert!(matches!(err, Error::ToolInvocation { .. }));
    }
}
