//! Google Custom Search JSON API provider

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{classify_request_error, classify_status, http_client, SearchProvider, SearchResult};

const PROVIDER: &str = "google";

/// The API caps `num` at 10
const MAX_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google Programmable Search Engine provider
pub struct GoogleSearch {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    engine_id: String,
    retry_window: Duration,
}

impl GoogleSearch {
    pub fn new(
        endpoint: &str,
        api_key: String,
        engine_id: String,
        timeout: Duration,
        retry_window: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            Error::config_field_invalid("search.google_endpoint", format!("Invalid URL: {}", e))
        })?;

        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
            endpoint,
            api_key,
            engine_id,
            retry_window,
        })
    }

    fn is_configured(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("GOOGLE_API_KEY");
        }
        if self.engine_id.is_empty() {
            missing.push("SEARCH_ENGINE_ID");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SearchNotConfigured {
                provider: PROVIDER.to_string(),
                missing: missing.join(", "),
            })
        }
    }

    fn request_url(&self, query: &str, max_results: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("cx", &self.engine_id)
            .append_pair("q", query)
            .append_pair("num", &max_results.clamp(1, MAX_PAGE_SIZE).to_string());
        url
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.is_configured()?;

        let url = self.request_url(query, max_results);
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_window),
            ..Default::default()
        };

        let body = backoff::future::retry(policy, || async {
            let response = self
                .client
                .get(url.clone())
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
                .json::<CustomSearchResponse>()
                .await
                .map_err(|e| {
                    backoff::Error::permanent(Error::SearchParse {
                        provider: PROVIDER.to_string(),
                        message: e.to_string(),
                    })
                })
        })
        .await?;

        let results: Vec<SearchResult> = into_results(body, max_results);
        debug!(provider = PROVIDER, query, hits = results.len(), "Search completed");
        Ok(results)
    }
}

fn into_results(body: CustomSearchResponse, max_results: usize) -> Vec<SearchResult> {
    body.items
        .into_iter()
        .filter(|item| !item.link.is_empty())
        .take(max_results)
        .map(|item| SearchResult::new(item.title, item.link, item.snippet))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(key: &str, cx: &str) -> GoogleSearch {
        GoogleSearch::new(
            "https://www.googleapis.com/customsearch/v1",
            key.to_string(),
            cx.to_string(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_network() {
        let google = provider("", "");
        match google.search("camel ai", 3).await {
            Err(Error::SearchNotConfigured { missing, .. }) => {
                assert!(missing.contains("GOOGLE_API_KEY"));
                assert!(missing.contains("SEARCH_ENGINE_ID"));
            }
            other => panic!("expected SearchNotConfigured, got {:?}", other),
        }
    }

    #[test]
    fn test_request_url_encodes_query() {
        let google = provider("k", "cx1");
        let url = google.request_url("food waste & AI", 50);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".to_string(), "food waste & AI".to_string())));
        assert!(pairs.contains(&("num".to_string(), "10".to_string())));
        assert!(pairs.contains(&("cx".to_string(), "cx1".to_string())));
    }

    #[test]
    fn test_response_without_items_is_empty() {
        let body: CustomSearchResponse = serde_json::from_str("{\"kind\":\"customsearch#search\"}").unwrap();
        assert!(into_results(body, 5).is_empty());
    }

    #[test]
    fn test_response_items_mapped_in_rank_order() {
        let body: CustomSearchResponse = serde_json::from_str(
            r#"{"items":[
                {"title":"CAMEL-AI","link":"https://www.camel-ai.org","snippet":"Agents"},
                {"title":"No link"},
                {"title":"GitHub","link":"https://github.com/camel-ai/camel","snippet":"Repo"}
            ]}"#,
        )
        .unwrap();
        let results = into_results(body, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.camel-ai.org");
        assert_eq!(results[1].title, "GitHub");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = GoogleSearch::new(
            "not a url",
            String::new(),
            String::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }
}
