//! # IdeaForge Core
//!
//! The engine behind IdeaForge: turns a one-line product idea into a set of
//! investor-ready documents by running a fixed worker pipeline that can pause
//! for human approval and resume later.
//!
//! ## Architecture
//!
//! - `pipeline/` - Coordinator, run registry, stage tracking, roadmap validation
//! - `workers/` - Searcher, Reader, Analyst and Writer
//! - `tools/` - Search provider, content fetcher, filesystem sessions
//! - `llm/` - Language model seam and bundled prompts
//! - `models` - LLM provider configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ideaforge_core::pipeline::{PipelineService, RunOutcome};
//!
//! let service = PipelineService::new(config, model, search);
//! match service.start("dog walking app", None, None).await? {
//!     RunOutcome::Suspended { run_id, pending_fields, .. } => { /* ask the user */ }
//!     outcome => println!("{:?}", outcome),
//! }
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod tools;
pub mod workers;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
