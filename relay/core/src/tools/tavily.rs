//! Tavily search backend
//!
//! `POST {base_url}` with the key in the body. The optional `answer` comes
//! back as a leading "AI summary" entry without a URL, so it feeds the prompt
//! but never shows up as a citation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{SearchBackend, SearchError};
use crate::config::SearchConfig;
use crate::messages::SearchResult;

const SUMMARY_TITLE: &str = "AI summary";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyItem>,
}

#[derive(Debug, Deserialize)]
struct TavilyItem {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    raw_content: Option<String>,
    score: Option<f64>,
}

/// Tavily web search
#[derive(Clone, Debug)]
pub struct TavilySearchBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: u32,
}

impl TavilySearchBackend {
    /// Create a backend for `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        max_results: u32,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            max_results,
        })
    }

    /// Create a backend from the search settings
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NotConfigured`] when no API key resolves.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = config.resolve_api_key().ok_or(SearchError::NotConfigured)?;
        Self::new(&config.base_url, api_key, config.max_results, config.timeout)
    }

    fn convert(response: TavilyResponse) -> Vec<SearchResult> {
        let summary = response
            .answer
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .map(|answer| SearchResult {
                title: SUMMARY_TITLE.to_string(),
                url: None,
                snippet: answer,
                content: None,
                score: None,
            });

        let items = response.results.into_iter().filter_map(|item| {
            let url = item.url.filter(|u| !u.trim().is_empty())?;
            Some(SearchResult {
                title: item
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| url.clone()),
                url: Some(url),
                snippet: item.content.unwrap_or_default(),
                content: item.raw_content,
                score: item.score,
            })
        });

        summary.into_iter().chain(items).collect()
    }
}

#[async_trait]
impl SearchBackend for TavilySearchBackend {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "search_depth": "basic",
                "include_answer": true,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        let parsed: TavilyResponse =
            serde_json::from_str(&body).map_err(|e| SearchError::Decode(e.to_string()))?;

        let results = Self::convert(parsed);
        tracing::debug!(backend = "tavily", total = results.len(), "Search response decoded");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> TavilySearchBackend {
        TavilySearchBackend::new(server.uri(), "tvly-test", 3, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_answer_becomes_leading_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "api_key": "tvly-test",
                "query": "rust async",
                "search_depth": "basic",
                "include_answer": true,
                "max_results": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Rust has async/await.",
                "results": [
                    {"title": "Async Book", "url": "https://rust-lang.github.io/async-book/", "content": "Intro", "score": 0.9},
                    {"title": "No link", "content": "dropped"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = backend(&server).search("rust async").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, SUMMARY_TITLE);
        assert_eq!(results[0].url, None);
        assert!(!results[0].is_citable());
        assert_eq!(results[1].title, "Async Book");
        assert_eq!(results[1].score, Some(0.9));
        assert!(results[1].is_citable());
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = backend(&server).search("q").await.unwrap_err();
        assert_eq!(
            err,
            SearchError::Status {
                status: 401,
                body: "bad key".into()
            }
        );
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = backend(&server).search("q").await.unwrap_err();
        assert!(matches!(err, SearchError::Decode(_)));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = SearchConfig {
            api_key: None,
            api_key_env: None,
            ..SearchConfig::default()
        };
        assert_eq!(
            TavilySearchBackend::from_config(&config).unwrap_err(),
            SearchError::NotConfigured
        );
    }
}
