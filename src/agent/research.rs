//! Research agent: an evaluator bound to the search tools

use crate::backend::SharedBackend;
use crate::persona::ResearcherPersona;
use crate::search::SharedSearchProvider;
use crate::tools::search_tools;

use super::EvaluatorAgent;

pub const RESEARCHER_ROLE: &str = "Researcher";

/// Build the research agent with one search tool per provider
///
/// Providers are interchangeable; the agent may use either or both, and a
/// failing provider only costs it that provider's results.
pub fn build_researcher(
    persona: &ResearcherPersona,
    providers: &[SharedSearchProvider],
    max_results: usize,
    max_tool_rounds: u32,
    backend: SharedBackend,
) -> EvaluatorAgent {
    EvaluatorAgent::new(
        persona.name.clone(),
        RESEARCHER_ROLE,
        persona.instructions.clone(),
        backend,
    )
    .with_tools(search_tools(providers, max_results))
    .with_max_tool_rounds(max_tool_rounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::persona::bundled_researcher;
    use crate::search::testing::StaticSearch;
    use std::sync::Arc;

    #[test]
    fn test_researcher_binds_both_tools() {
        let persona = bundled_researcher().unwrap();
        let providers: Vec<SharedSearchProvider> = vec![
            Arc::new(StaticSearch::empty("google")),
            Arc::new(StaticSearch::empty("duckduckgo")),
        ];
        let agent = build_researcher(&persona, &providers, 5, 4, Arc::new(MockBackend::new()));

        assert_eq!(agent.label(), "Researcher Rachel");
        assert_eq!(agent.tool_names(), vec!["search_google", "search_duckduckgo"]);
        assert!(agent.system_instructions().contains("web search"));
    }

    #[tokio::test]
    async fn test_empty_results_still_answer() {
        let persona = bundled_researcher().unwrap();
        let providers: Vec<SharedSearchProvider> = vec![Arc::new(StaticSearch::empty("google"))];
        let mut agent = build_researcher(&persona, &providers, 5, 4, Arc::new(MockBackend::new()));

        let findings = agent.respond("WasteNot Market").await.unwrap();
        assert!(findings.contains("no relevant results"));
    }

    #[tokio::test]
    async fn test_both_providers_failing_still_answer() {
        let persona = bundled_researcher().unwrap();
        let providers: Vec<SharedSearchProvider> = vec![
            Arc::new(StaticSearch::failing("google", "quota exceeded")),
            Arc::new(StaticSearch::failing("duckduckgo", "blocked")),
        ];
        let mut agent = build_researcher(&persona, &providers, 5, 4, Arc::new(MockBackend::new()));

        let findings = agent.respond("WasteNot Market").await.unwrap();
        assert!(findings.contains("search failed"));
    }
}
