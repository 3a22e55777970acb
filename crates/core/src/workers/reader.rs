//! # Reader
//!
//! Pulls the URLs out of its task and fetches them.

use regex::Regex;
use std::sync::OnceLock;

use super::WorkerResult;
use crate::tools::fetch::{fetch_all, is_error_marker, FetchOptions};

static URL: OnceLock<Regex> = OnceLock::new();

fn url_pattern() -> &'static Regex {
    URL.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).expect("static pattern compiles")
    })
}

pub struct Reader {
    fetch: FetchOptions,
}

impl Reader {
    pub fn new(fetch: FetchOptions) -> Self {
        Self { fetch }
    }

    pub(crate) async fn produce_result(&mut self, task: &str) -> anyhow::Result<WorkerResult> {
        let urls = extract_urls(task);
        if urls.is_empty() {
            return Ok(WorkerResult::Completed {
                content: "No sources to read.".to_string(),
            });
        }

        let pages = fetch_all(&urls, &self.fetch).await;
        let failed = pages.values().filter(|text| is_error_marker(text)).count();
        tracing::info!(urls = urls.len(), failed, "Reader fetched sources");

        let content = urls
            .iter()
            .filter_map(|url| pages.get(url).map(|text| (url, text)))
            .map(|(url, text)| {
                if is_error_marker(text) {
                    format!("--- {} ---", text)
                } else {
                    format!("--- CONTENT FROM {} ---\n{}", url, text)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(WorkerResult::Completed { content })
    }
}

/// URLs in order of first appearance, without trailing punctuation
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in url_pattern().find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}
