//! # Content Fetcher
//!
//! Fetches a set of URLs concurrently and reduces each page to plain text.
//! Best effort: one attempt per URL, and a failing URL only affects its own
//! entry in the result.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::extract::html_to_text;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; IdeaForge/0.1; +https://github.com/ideaforge)";

/// Hard ceiling on concurrent fetches regardless of configuration
pub const MAX_PARALLEL_FETCHES: usize = 8;

/// Limits applied to one `fetch_all` call
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Characters kept per page after extraction
    pub max_chars: usize,
    /// Per-URL request timeout
    pub timeout: Duration,
    /// Requested parallelism (capped at [`MAX_PARALLEL_FETCHES`])
    pub max_parallel: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_chars: 5000,
            timeout: Duration::from_secs(10),
            max_parallel: MAX_PARALLEL_FETCHES,
        }
    }
}

/// Marker stored in place of page text when a URL fails
pub fn error_marker(url: &str, reason: &str) -> String {
    format!("ERROR READING {}: {}", url, reason)
}

/// Whether a fetch result is an error marker rather than page text
pub fn is_error_marker(text: &str) -> bool {
    text.starts_with("ERROR READING ")
}

/// Fetch every URL and map it to extracted text or an error marker
#[tracing::instrument(skip_all, fields(urls = urls.len()))]
pub async fn fetch_all(urls: &[String], options: &FetchOptions) -> BTreeMap<String, String> {
    let mut results = BTreeMap::new();
    for url in urls {
        results
            .entry(url.clone())
            .or_insert_with(|| error_marker(url, "fetch did not complete"));
    }
    if results.is_empty() {
        return results;
    }

    let client = match reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(options.timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            let reason = format!("failed to create HTTP client: {}", e);
            for (url, text) in results.iter_mut() {
                *text = error_marker(url, &reason);
            }
            return results;
        }
    };

    let parallelism = options
        .max_parallel
        .clamp(1, MAX_PARALLEL_FETCHES)
        .min(results.len());
    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut join_set = JoinSet::new();

    for url in results.keys().cloned() {
        let client = client.clone();
        let semaphore = semaphore.clone();
        let max_chars = options.max_chars;

        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let text = match fetch_one(&client, &url).await {
                Ok(html) => html_to_text(&html, max_chars),
                Err(reason) => {
                    tracing::warn!(%url, %reason, "Fetch failed");
                    error_marker(&url, &reason)
                }
            };
            (url, text)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((url, text)) => {
                results.insert(url, text);
            }
            Err(e) => tracing::warn!("Fetch task aborted: {}", e),
        }
    }

    results
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| e.to_string())?
        .error_for_status()
        .map_err(|e| e.to_string())?;

    response.text().await.map_err(|e| e.to_string())
}
