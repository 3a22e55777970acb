//! # Roadmap Validator
//!
//! Structural contract for the roadmap document: a markdown table with the
//! required headers, and no mention of how the document was produced.

use regex::Regex;
use std::sync::OnceLock;

/// Column headers the roadmap table must carry
pub const REQUIRED_HEADERS: [&str; 5] = [
    "Phase",
    "Timeline",
    "Goals",
    "Key Deliverables",
    "Success Metrics",
];

/// Internal vocabulary that must not leak into customer documents
pub const BANNED_TERMS: [&str; 8] = [
    "coordinator",
    "orchestrator",
    "searcher",
    "sub-agent",
    "subagent",
    "tool call",
    "delegation",
    "pipeline stage",
];

static SEPARATOR: OnceLock<Regex> = OnceLock::new();

fn separator() -> &'static Regex {
    SEPARATOR.get_or_init(|| {
        Regex::new(r"\|\s*:?-{3,}:?\s*\|").expect("static pattern compiles")
    })
}

/// What is wrong with a roadmap, if anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoadmapReport {
    pub has_table: bool,
    pub missing_headers: Vec<&'static str>,
    pub banned_terms: Vec<&'static str>,
}

impl RoadmapReport {
    pub fn is_valid(&self) -> bool {
        self.has_table && self.missing_headers.is_empty() && self.banned_terms.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut problems = Vec::new();
        if !self.has_table {
            problems.push("no markdown table".to_string());
        }
        if !self.missing_headers.is_empty() {
            problems.push(format!("missing headers: {}", self.missing_headers.join(", ")));
        }
        if !self.banned_terms.is_empty() {
            problems.push(format!("internal terms: {}", self.banned_terms.join(", ")));
        }
        problems.join("; ")
    }
}

pub fn inspect(text: &str) -> RoadmapReport {
    let lowered = text.to_lowercase();
    RoadmapReport {
        has_table: text.contains('|') && separator().is_match(text),
        missing_headers: REQUIRED_HEADERS
            .iter()
            .copied()
            .filter(|header| !text.contains(header))
            .collect(),
        banned_terms: BANNED_TERMS
            .iter()
            .copied()
            .filter(|term| lowered.contains(term))
            .collect(),
    }
}

pub fn validate(text: &str) -> bool {
    inspect(text).is_valid()
}

/// Whether a filename is subject to roadmap validation
pub fn is_roadmap(filename: &str) -> bool {
    filename.to_lowercase().contains("roadmap")
}

/// The single instruction sent to the writer when a roadmap fails validation
pub fn repair_instruction(filename: &str, report: &RoadmapReport) -> String {
    format!(
        "The document {filename} does not meet the required format ({problems}).\n\
         Rewrite it completely. It must contain a markdown table with a separator row \
         and exactly these column headers: | {headers} |.\n\
         It must not mention any of these words: {banned}.\n\
         Return only the corrected document.",
        filename = filename,
        problems = report.summary(),
        headers = REQUIRED_HEADERS.join(" | "),
        banned = BANNED_TERMS.join(", "),
    )
}
