use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SearchError;
use crate::{RawResult, SearchProvider};

/// Tavily web search API client.
#[derive(Clone)]
pub struct TavilyClient {
    base_url: String,
    api_key: String,
    max_results: usize,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_results: 15,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(api_key: String) -> Self {
        Self::new("https://api.tavily.com".to_string(), api_key)
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str) -> Result<RawResult, SearchError> {
        let url = format!("{}/search", self.base_url);

        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
            search_depth: "basic",
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Transient(format!("request to Tavily failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SearchError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(SearchError::Transient(format!("Tavily returned {}", status)));
        }
        if !status.is_success() {
            return Err(SearchError::Permanent(format!("Tavily returned {}", status)));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Permanent(format!("failed to parse Tavily response: {}", e)))?;

        Ok(RawResult::new(render_hits(&body.results)))
    }
}

fn render_hits(hits: &[TavilyHit]) -> String {
    let mut text = String::new();
    for hit in hits {
        if hit.content.trim().is_empty() && hit.title.trim().is_empty() {
            continue;
        }
        text.push_str(&format!(
            "Title: {}\nURL: {}\nContent: {}\n\n",
            hit.title.trim(),
            hit.url.trim(),
            hit.content.trim()
        ));
    }
    text
}
