//! # Pipeline
//!
//! The orchestration engine: a coordinator that delegates to the worker
//! lineup, suspends when a worker needs approval, and resumes exactly that
//! worker later.
//!
//! ## Flow
//!
//! ```text
//! start ─▶ plan ─▶ Searcher ──suspend──▶ registry[run_id]
//!                                            │
//! resume(run_id, approvals) ◀────────────────┘
//!    └─▶ Searcher.resume ─▶ splice ─▶ Reader ─▶ Analyst ─▶ Writer ─▶ validate/repair ─▶ done
//! ```

pub mod coordinator;
pub mod events;
pub mod history;
pub mod plan;
pub mod registry;
pub mod service;
pub mod stage;
pub mod validator;

pub use coordinator::{Coordinator, Document, Step};
pub use events::{EventSink, PipelineEvent, PipelineEventKind};
pub use history::{History, HistoryEntry, PendingDelegation};
pub use plan::Plan;
pub use registry::{RunContext, RunRegistry};
pub use service::{spawn_sweeper, PipelineService, RunOutcome};
pub use stage::{Stage, StageBoard, StageStatus, StageTracker};
