//! # Pipeline Errors
//!
//! Error taxonomy surfaced by the orchestration engine.

use thiserror::Error;

/// Errors produced while starting or resuming a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing input to start/resume. No state was touched.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Resume against a run that is missing, expired or already consumed
    #[error("unknown run id: {0}")]
    UnknownRunId(String),

    /// A worker was asked to resume while not waiting for input
    #[error("worker cannot resume: {0}")]
    InvalidResumeState(String),

    /// Coordinator bookkeeping does not match the suspended worker
    #[error("inconsistent run state: {0}")]
    InconsistentState(String),

    /// A tool (filesystem session, search backend) failed outright
    #[error("tool failure: {0}")]
    Tool(String),

    /// Anything else raised during delegation or resume
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Protocol errors escalate to the caller instead of becoming a failed run
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnknownRunId(_)
                | Self::InvalidResumeState(_)
                | Self::InconsistentState(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
