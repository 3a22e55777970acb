//! # Searcher
//!
//! Proposes search queries and suspends until they are approved. On resume
//! it runs the approved queries and returns the collected result URLs.

use anyhow::Context;
use regex::Regex;
use std::sync::OnceLock;

use super::{Approvals, PendingInputField, WorkContext, WorkerDeps, WorkerResult};
use crate::llm::{prompts, ModelRequest};

static LIST_MARKER: OnceLock<Regex> = OnceLock::new();

fn list_marker() -> &'static Regex {
    LIST_MARKER.get_or_init(|| {
        Regex::new(r#"(?i)^\s*(?:[-*•]+|\d+[.)]|query\s*\d*\s*:)?\s*["']?(.*?)["']?\s*$"#)
            .expect("static pattern compiles")
    })
}

/// Field name for the nth proposed query (1-based)
pub fn field_name(n: usize) -> String {
    format!("query_{}", n)
}

pub struct Searcher {
    deps: WorkerDeps,
    task: String,
    pending: Vec<PendingInputField>,
    suspended: bool,
}

impl Searcher {
    pub fn new(deps: WorkerDeps) -> Self {
        Self {
            deps,
            task: String::new(),
            pending: Vec::new(),
            suspended: false,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn pending_fields(&self) -> &[PendingInputField] {
        &self.pending
    }

    pub(crate) async fn produce_result(
        &mut self,
        task: &str,
        cx: &WorkContext<'_>,
    ) -> anyhow::Result<WorkerResult> {
        self.task = task.to_string();

        let seeds = &cx.plan.research_queries;
        let mut prompt = format!("Product idea: {}\n", task);
        if !seeds.is_empty() {
            prompt.push_str("\nSeed queries:\n");
            for seed in seeds {
                prompt.push_str(&format!("{}\n", seed));
            }
        }

        let reply = self
            .deps
            .model
            .complete(ModelRequest::new("searcher", prompts::SEARCHER, prompt))
            .await
            .context("Searcher failed to propose queries")?;

        let candidates = seeds.iter().cloned().chain(parse_queries(&reply));
        let mut queries = propose(candidates, self.deps.max_proposed_queries);
        if queries.is_empty() {
            queries.push(task.trim().to_string());
        }

        self.pending = queries
            .into_iter()
            .enumerate()
            .map(|(i, query)| PendingInputField::new(field_name(i + 1), query))
            .collect();
        self.suspended = true;

        tracing::info!(queries = self.pending.len(), "Searcher waiting for query approval");
        Ok(WorkerResult::Suspended {
            pending_fields: self.pending.clone(),
        })
    }

    pub(crate) async fn resume(&mut self, approvals: &Approvals) -> anyhow::Result<WorkerResult> {
        // Unlisted fields are rejected, never defaulted to the proposal
        for field in &mut self.pending {
            field.approved_value = Some(
                approvals
                    .get(&field.field_name)
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default(),
            );
        }
        self.suspended = false;

        let queries: Vec<&str> = self
            .pending
            .iter()
            .filter_map(|f| f.approved_value.as_deref())
            .filter(|q| !q.is_empty())
            .collect();

        let mut urls: Vec<String> = Vec::new();
        for query in queries {
            match self
                .deps
                .search
                .search(query, self.deps.results_per_query)
                .await
            {
                Ok(hits) => {
                    for hit in hits.into_iter().take(self.deps.results_per_query) {
                        if !urls.contains(&hit.url) {
                            urls.push(hit.url);
                        }
                    }
                }
                Err(e) => tracing::warn!(%query, "Search failed: {:#}", e),
            }
        }

        tracing::info!(urls = urls.len(), "Searcher collected sources");
        let content = if urls.is_empty() {
            format!("No sources found for: {}", self.task.trim())
        } else {
            urls.join("\n")
        };
        Ok(WorkerResult::Completed { content })
    }
}

/// Clean one query per line from a model reply
pub fn parse_queries(reply: &str) -> Vec<String> {
    reply
        .lines()
        .filter_map(|line| {
            list_marker()
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|q| !q.is_empty())
        .collect()
}

fn propose(candidates: impl Iterator<Item = String>, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for candidate in candidates {
        if out.len() >= max {
            break;
        }
        let candidate = candidate.trim();
        if !candidate.is_empty() && !out.iter().any(|q| q == candidate) {
            out.push(candidate.to_string());
        }
    }
    out
}
