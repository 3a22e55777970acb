//! # Workers
//!
//! The fixed lineup the coordinator delegates to:
//!
//! 1. **Searcher** - proposes search queries, waits for approval, collects URLs
//! 2. **Reader** - fetches the URLs and reduces them to text
//! 3. **Analyst** - market analysis over the fetched text
//! 4. **Writer** - writes the output documents
//!
//! Each worker reports its stage before it produces a result. Only the
//! Searcher can suspend.

pub mod analyst;
pub mod reader;
pub mod searcher;
pub mod writer;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::llm::LanguageModel;
use crate::pipeline::plan::Plan;
use crate::pipeline::stage::{Stage, StageTracker};
use crate::tools::{FetchOptions, FsSession, SearchProvider};

pub use analyst::Analyst;
pub use reader::Reader;
pub use searcher::Searcher;
pub use writer::Writer;

/// Worker identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Searcher,
    Reader,
    Analyst,
    Writer,
}

impl WorkerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerKind::Searcher => "searcher",
            WorkerKind::Reader => "reader",
            WorkerKind::Analyst => "analyst",
            WorkerKind::Writer => "writer",
        }
    }

    pub fn stage(self) -> Stage {
        match self {
            WorkerKind::Searcher | WorkerKind::Reader => Stage::Research,
            WorkerKind::Analyst => Stage::Analysis,
            WorkerKind::Writer => Stage::Writing,
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value the worker needs approved before it can continue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInputField {
    pub field_name: String,
    pub proposed_value: String,
    #[serde(default)]
    pub approved_value: Option<String>,
}

impl PendingInputField {
    pub fn new(field_name: impl Into<String>, proposed_value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            proposed_value: proposed_value.into(),
            approved_value: None,
        }
    }
}

/// Approved values by field name
pub type Approvals = HashMap<String, String>;

/// Outcome of asking a worker for its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerResult {
    Completed { content: String },
    Suspended { pending_fields: Vec<PendingInputField> },
}

/// Shared collaborators handed to every worker
#[derive(Clone)]
pub struct WorkerDeps {
    pub model: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchProvider>,
    pub fetch: FetchOptions,
    pub results_per_query: usize,
    pub max_proposed_queries: usize,
}

/// What a worker can see of the run while working
pub struct WorkContext<'a> {
    pub session: &'a FsSession,
    pub tracker: &'a StageTracker,
    pub plan: &'a Plan,
}

/// The closed set of workers
pub enum Worker {
    Searcher(Searcher),
    Reader(Reader),
    Analyst(Analyst),
    Writer(Writer),
}

impl Worker {
    /// Workers in delegation order
    pub fn lineup(deps: &WorkerDeps) -> Vec<Worker> {
        vec![
            Worker::Searcher(Searcher::new(deps.clone())),
            Worker::Reader(Reader::new(deps.fetch.clone())),
            Worker::Analyst(Analyst::new(deps.model.clone())),
            Worker::Writer(Writer::new(deps.model.clone())),
        ]
    }

    pub fn kind(&self) -> WorkerKind {
        match self {
            Worker::Searcher(_) => WorkerKind::Searcher,
            Worker::Reader(_) => WorkerKind::Reader,
            Worker::Analyst(_) => WorkerKind::Analyst,
            Worker::Writer(_) => WorkerKind::Writer,
        }
    }

    pub fn stage(&self) -> Stage {
        self.kind().stage()
    }

    pub fn is_suspended(&self) -> bool {
        match self {
            Worker::Searcher(searcher) => searcher.is_suspended(),
            _ => false,
        }
    }

    pub fn pending_fields(&self) -> Vec<PendingInputField> {
        match self {
            Worker::Searcher(searcher) => searcher.pending_fields().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Run the worker on a task
    pub async fn produce_result(
        &mut self,
        task: &str,
        cx: &WorkContext<'_>,
    ) -> anyhow::Result<WorkerResult> {
        cx.tracker.set_stage(self.stage(), None);
        tracing::info!(worker = %self.kind(), "Worker started");

        match self {
            Worker::Searcher(searcher) => searcher.produce_result(task, cx).await,
            Worker::Reader(reader) => reader.produce_result(task).await,
            Worker::Analyst(analyst) => analyst.produce_result(task, cx).await,
            Worker::Writer(writer) => writer.produce_result(task, cx).await,
        }
    }

    /// Continue a suspended worker with approved values
    pub async fn resume(&mut self, approvals: &Approvals) -> PipelineResult<WorkerResult> {
        if !self.is_suspended() {
            return Err(PipelineError::InvalidResumeState(format!(
                "{} is not waiting for input",
                self.kind()
            )));
        }
        // The run stays at AWAITING_CONFIRM until the next worker reports in
        tracing::info!(worker = %self.kind(), approvals = approvals.len(), "Worker resumed");

        match self {
            Worker::Searcher(searcher) => Ok(searcher.resume(approvals).await?),
            _ => Err(PipelineError::InvalidResumeState(format!(
                "{} cannot suspend",
                self.kind()
            ))),
        }
    }

    pub fn as_writer_mut(&mut self) -> Option<&mut Writer> {
        match self {
            Worker::Writer(writer) => Some(writer),
            _ => None,
        }
    }
}
