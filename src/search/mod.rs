//! Web search providers
//!
//! Two interchangeable providers of the same capability: a query goes in, a
//! ranked list of `{title, url, snippet}` comes out. An empty list is a valid
//! answer. Providers retry transient HTTP failures themselves and surface
//! `SearchUnavailable` once their retry window is spent.

mod duckduckgo;
mod google;

pub use duckduckgo::DuckDuckGoSearch;
pub use google::GoogleSearch;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SearchSettings;
use crate::error::{Error, Result};

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// A search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Run a query, returning at most `max_results` hits in rank order
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

pub type SharedSearchProvider = Arc<dyn SearchProvider>;

/// Build the providers enabled in configuration, in binding order
pub fn providers_from_settings(settings: &SearchSettings) -> Result<Vec<SharedSearchProvider>> {
    let mut providers: Vec<SharedSearchProvider> = Vec::new();
    let timeout = Duration::from_secs(settings.timeout_secs);
    let retry_window = Duration::from_secs(settings.max_retry_secs);

    if settings.enable_google {
        providers.push(Arc::new(GoogleSearch::new(
            &settings.google_endpoint,
            settings.google_api_key.clone(),
            settings.google_engine_id.clone(),
            timeout,
            retry_window,
        )?));
    }
    if settings.enable_duckduckgo {
        providers.push(Arc::new(DuckDuckGoSearch::new(
            &settings.duckduckgo_endpoint,
            timeout,
            retry_window,
        )?));
    }

    Ok(providers)
}

/// Shared HTTP client for providers
pub(crate) fn http_client(provider: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("judge-panel/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::SearchUnavailable {
            provider: provider.to_string(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Classify a failed HTTP exchange for `backoff`
pub(crate) fn classify_status(
    provider: &str,
    status: reqwest::StatusCode,
    body: String,
) -> backoff::Error<Error> {
    let err = Error::SearchUnavailable {
        provider: provider.to_string(),
        message: format!("HTTP {}: {}", status, truncate(&body, 200)),
    };
    if status.as_u16() == 429 || status.is_server_error() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

pub(crate) fn classify_request_error(provider: &str, e: reqwest::Error) -> backoff::Error<Error> {
    let retryable = e.is_timeout() || e.is_connect();
    let err = Error::SearchUnavailable {
        provider: provider.to_string(),
        message: format!("Request error: {}", e),
    };
    if retryable {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─────────────────────────────────────────────────────────────────
// Test providers
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use super::*;
    use parking_lot::RwLock;

    /// Provider with canned results or a canned failure
    pub struct StaticSearch {
        name: &'static str,
        results: Vec<SearchResult>,
        failure: Option<String>,
        queries: RwLock<Vec<String>>,
    }

    impl StaticSearch {
        pub fn with_results(name: &'static str, results: Vec<SearchResult>) -> Self {
            Self {
                name,
                results,
                failure: None,
                queries: RwLock::new(Vec::new()),
            }
        }

        pub fn empty(name: &'static str) -> Self {
            Self::with_results(name, Vec::new())
        }

        pub fn failing(name: &'static str, message: &str) -> Self {
            Self {
                name,
                results: Vec::new(),
                failure: Some(message.to_string()),
                queries: RwLock::new(Vec::new()),
            }
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.read().clone()
        }
    }

    #[async_trait]
    impl SearchProvider for StaticSearch {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
            self.queries.write().push(query.to_string());
            if let Some(ref message) = self.failure {
                return Err(Error::SearchUnavailable {
                    provider: self.name.to_string(),
                    message: message.clone(),
                });
            }
            Ok(self.results.iter().take(max_results).cloned().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_providers_from_settings_respects_toggles() {
        let mut settings = SearchSettings::default();
        let all = providers_from_settings(&settings).unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["google", "duckduckgo"]);

        settings.enable_google = false;
        settings.enable_duckduckgo = false;
        assert!(providers_from_settings(&settings).unwrap().is_empty());
    }

    #[test]
    fn test_classify_status() {
        let transient = classify_status("google", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow".into());
        assert!(matches!(transient, backoff::Error::Transient { .. }));

        let permanent = classify_status("google", reqwest::StatusCode::FORBIDDEN, "denied".into());
        assert!(matches!(permanent, backoff::Error::Permanent(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_static_search_limits_results() {
        let provider = testing::StaticSearch::with_results(
            "static",
            vec![
                SearchResult::new("a", "https://a.example", "first"),
                SearchResult::new("b", "https://b.example", "second"),
            ],
        );
        let hits = tokio_test::block_on(provider.search("anything", 1)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(provider.queries(), vec!["anything".to_string()]);

        let failing = testing::StaticSearch::failing("static", "offline");
        let err = tokio_test::block_on(failing.search("anything", 3)).unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable { .. }));
    }
}
