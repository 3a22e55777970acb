//! Default prompt templates bundled at compile time.

/// Planner - turns the idea into research queries, focus areas and filenames
pub const PLANNER: &str = include_str!("defaults/planner.md");

/// Searcher - proposes search queries for human approval
pub const SEARCHER: &str = include_str!("defaults/searcher.md");

/// Analyst - market analysis over fetched sources
pub const ANALYST: &str = include_str!("defaults/analyst.md");

/// Writer - general product documents
pub const WRITER: &str = include_str!("defaults/writer.md");

/// Writer - roadmap document with the required table layout
pub const ROADMAP: &str = include_str!("defaults/roadmap.md");
