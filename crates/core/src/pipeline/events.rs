//! # Pipeline Events
//!
//! Progress notifications broadcast to observers (SSE, CLI).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Run accepted and planning started
    PipelineStarted,
    /// Stage changed
    StageChanged,
    /// Worker received its task
    WorkerStarted,
    /// Worker produced its result
    WorkerCompleted,
    /// Worker is waiting for approval; run registered
    RunSuspended,
    /// Suspended run picked up again
    RunResumed,
    /// Roadmap failed validation and was rewritten
    ArtifactRepaired,
    /// Suspended run dropped by the expiry sweep
    RunEvicted,
    /// All documents written
    PipelineCompleted,
    /// Run ended in the error stage
    PipelineFailed,
}

/// An event in a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: PipelineEventKind,
    /// Agent that produced this event
    pub agent: String,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Related run ID if applicable
    #[serde(default)]
    pub run_id: Option<String>,
}

impl PipelineEvent {
    pub fn new(kind: PipelineEventKind, agent: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            data: None,
            run_id: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_run(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }
}

/// Optional broadcast sink; sending without subscribers is not an error
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<broadcast::Sender<PipelineEvent>>,
}

impl EventSink {
    pub fn new(tx: broadcast::Sender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
