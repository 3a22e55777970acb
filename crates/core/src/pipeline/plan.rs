//! # Run Plan
//!
//! The planner's freeform reply reduced to a plan the workers can rely on.

use serde::{Deserialize, Serialize};

use super::validator::is_roadmap;
use crate::tools::fs_session::validate_filename;

/// Research queries kept from the planner
pub const MAX_RESEARCH_QUERIES: usize = 3;

/// Documents every run produces, in padding order
pub const DEFAULT_OUTPUT_FILES: [&str; 3] =
    ["business_proposal.md", "market_analysis.md", ROADMAP_FILE];

/// Roadmap written when the planner names none
pub const ROADMAP_FILE: &str = "roadmap.md";

/// Sanitized plan for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    pub research_queries: Vec<String>,
    pub analysis_focus: Vec<String>,
    pub output_files: Vec<String>,
}

impl Plan {
    /// Parse the first JSON object in a model reply; anything unusable yields
    /// the default documents and no queries
    pub fn from_model_output(text: &str) -> Self {
        let parsed = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<serde_json::Value>(&text[start..=end]).ok()
            }
            _ => None,
        };

        let Some(value) = parsed else {
            tracing::warn!("Planner reply had no JSON object, using defaults");
            return Self::default().sanitize();
        };

        Self {
            research_queries: string_list(&value, "research_queries"),
            analysis_focus: string_list(&value, "analysis_focus"),
            output_files: string_list(&value, "output_files"),
        }
        .sanitize()
    }

    /// Normalize queries, focus areas and filenames. Idempotent.
    pub fn sanitize(self) -> Self {
        let research_queries = dedup_trimmed(self.research_queries)
            .into_iter()
            .take(MAX_RESEARCH_QUERIES)
            .collect();

        let analysis_focus = dedup_trimmed(self.analysis_focus);

        let mut output_files: Vec<String> = dedup_trimmed(self.output_files)
            .into_iter()
            .filter(|name| validate_filename(name).is_ok())
            .take(DEFAULT_OUTPUT_FILES.len())
            .collect();
        for default in DEFAULT_OUTPUT_FILES {
            if output_files.len() == DEFAULT_OUTPUT_FILES.len() {
                break;
            }
            if !output_files.iter().any(|f| f == default) {
                output_files.push(default.to_string());
            }
        }
        // Every run ships a roadmap so it can be validated
        if !output_files.iter().any(|f| is_roadmap(f)) {
            if let Some(last) = output_files.last_mut() {
                *last = ROADMAP_FILE.to_string();
            }
        }

        Self {
            research_queries,
            analysis_focus,
            output_files,
        }
    }

    /// The output file subject to roadmap validation
    pub fn roadmap_file(&self) -> Option<&str> {
        self.output_files
            .iter()
            .map(String::as_str)
            .find(|f| is_roadmap(f))
    }
}

fn string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn dedup_trimmed(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}
