//! # Search Tools
//!
//! Web search used by the Searcher worker once queries are approved.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Search backend seam
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// SearXNG-backed search (self-hosted or public instances)
pub struct SearxngSearch {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl SearxngSearch {
    /// Build the endpoint list:
    /// 1. Configured URL (config or `SEARXNG_URL`)
    /// 2. Public instances
    /// 3. Local fallback
    pub fn new(custom_url: Option<String>) -> anyhow::Result<Self> {
        let mut endpoints = Vec::new();

        if let Some(url) = custom_url.or_else(|| std::env::var("SEARXNG_URL").ok()) {
            endpoints.push(format!("{}/search", url.trim_end_matches('/')));
        }

        // Full list: https://searx.space/
        endpoints.extend([
            "https://searx.be/search".to_string(),
            "https://search.sapti.me/search".to_string(),
            "https://searx.tiekoetter.com/search".to_string(),
        ]);

        endpoints.push("http://localhost:8888/search".to_string());
        endpoints.push("http://127.0.0.1:8888/search".to_string());

        Self::with_endpoints(endpoints)
    }

    /// Use exactly these endpoints, in order
    pub fn with_endpoints(endpoints: Vec<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { endpoints, client })
    }
}

#[async_trait]
impl SearchProvider for SearxngSearch {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        for endpoint in &self.endpoints {
            let url = format!(
                "{}?q={}&format=json",
                endpoint,
                urlencoding::encode(query)
            );

            let response = match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    tracing::debug!(%endpoint, status = %response.status(), "SearXNG endpoint refused");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(%endpoint, "SearXNG endpoint unreachable: {}", e);
                    continue;
                }
            };

            if let Ok(json) = response.json::<serde_json::Value>().await {
                if let Some(hits) = parse_results(&json, max_results) {
                    return Ok(hits);
                }
            }
        }

        anyhow::bail!("No search backend available for query '{}'", query)
    }
}

/// Extract hits from a SearXNG JSON response
pub fn parse_results(json: &serde_json::Value, max_results: usize) -> Option<Vec<SearchHit>> {
    let results = json.get("results")?.as_array()?;
    let field = |r: &serde_json::Value, key: &str| {
        r.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    Some(
        results
            .iter()
            .map(|r| SearchHit {
                title: field(r, "title"),
                url: field(r, "url"),
                snippet: field(r, "content"),
            })
            .filter(|hit| !hit.url.is_empty())
            .take(max_results)
            .collect(),
    )
}
