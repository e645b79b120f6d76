//! DuckDuckGo provider backed by the no-JavaScript HTML endpoint

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{classify_request_error, classify_status, http_client, SearchProvider, SearchResult};

const PROVIDER: &str = "duckduckgo";

/// DuckDuckGo HTML search provider
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: Url,
    retry_window: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: &str, timeout: Duration, retry_window: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            Error::config_field_invalid("search.duckduckgo_endpoint", format!("Invalid URL: {}", e))
        })?;

        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
            endpoint,
            retry_window,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_window),
            ..Default::default()
        };

        let html = backoff::future::retry(policy, || async {
            let response = self
                .client
                .post(self.endpoint.clone())
                .form(&[("q", query), ("kl", "wt-wt")])
                .send()
                .await
                .map_err(|e| classify_request_error(PROVIDER, e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(provider = PROVIDER, status = %status, "Search request failed");
                return Err(classify_status(PROVIDER, status, body));
            }

            response
                .text()
                .await
                .map_err(|e| classify_request_error(PROVIDER, e))
        })
        .await?;

        let results = parse_results(&html, max_results)?;
        debug!(provider = PROVIDER, query, hits = results.len(), "Search completed");
        Ok(results)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::SearchParse {
        provider: PROVIDER.to_string(),
        message: format!("invalid selector '{}': {}", css, e),
    })
}

/// Extract ranked hits from a results page
fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let title_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut results = Vec::new();
    for node in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }
        // Sponsored entries carry this class
        if node.value().classes().any(|c| c == "result--ad") {
            continue;
        }

        let Some(anchor) = node.select(&title_sel).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href) else {
            continue;
        };

        let title = collapse_whitespace(&anchor.text().collect::<String>());
        let snippet = node
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();

        results.push(SearchResult::new(title, url, snippet));
    }

    Ok(results)
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links
fn resolve_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    if parsed.path().starts_with("/l/") {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    Some(parsed.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
