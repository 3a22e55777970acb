//! # Pipeline Stages
//!
//! Stage state machine with a fixed progress value per stage. Each run owns a
//! [`StageTracker`]; the [`StageBoard`] publishes trackers by session id until
//! the run has been finished for a full TTL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::events::{EventSink, PipelineEvent, PipelineEventKind};

/// Stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Research,
    AwaitingConfirm,
    Analysis,
    Writing,
    Saving,
    Complete,
    Error,
}

impl Stage {
    /// Wire name, as serialized
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "INIT",
            Stage::Research => "RESEARCH",
            Stage::AwaitingConfirm => "AWAITING_CONFIRM",
            Stage::Analysis => "ANALYSIS",
            Stage::Writing => "WRITING",
            Stage::Saving => "SAVING",
            Stage::Complete => "COMPLETE",
            Stage::Error => "ERROR",
        }
    }

    pub fn progress(self) -> u8 {
        match self {
            Stage::Init => 0,
            Stage::Research => 15,
            Stage::AwaitingConfirm => 25,
            Stage::Analysis => 50,
            Stage::Writing => 75,
            Stage::Saving => 90,
            Stage::Complete => 100,
            Stage::Error => 0,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Stage::Init => "Preparing your request...",
            Stage::Research => "Researching the market...",
            Stage::AwaitingConfirm => "Waiting for search query approval",
            Stage::Analysis => "Analyzing sources...",
            Stage::Writing => "Writing documents...",
            Stage::Saving => "Saving documents...",
            Stage::Complete => "All documents are ready",
            Stage::Error => "Something went wrong",
        }
    }
}

/// Snapshot of a run's stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub progress: u8,
    pub message: String,
}

impl StageStatus {
    pub fn of(stage: Stage, message: Option<&str>) -> Self {
        Self {
            stage,
            progress: stage.progress(),
            message: message.unwrap_or(stage.default_message()).to_string(),
        }
    }
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::of(Stage::Init, None)
    }
}

#[derive(Debug)]
struct TrackerState {
    status: StageStatus,
    updated_at: DateTime<Utc>,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            status: StageStatus::default(),
            updated_at: Utc::now(),
        }
    }
}

/// Shared handle to one run's current stage
///
/// Progress only moves forward within a run; ERROR is the one stage allowed
/// to lower it.
#[derive(Debug, Clone, Default)]
pub struct StageTracker {
    inner: Arc<RwLock<TrackerState>>,
    events: EventSink,
    session_id: Option<String>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast every accepted stage change for `session_id`
    pub fn with_events(mut self, events: EventSink, session_id: &str) -> Self {
        self.events = events;
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Move to a stage; returns false when the change would lower progress
    pub fn set_stage(&self, stage: Stage, message: Option<&str>) -> bool {
        let status = StageStatus::of(stage, message);
        {
            let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
            if stage != Stage::Error && status.progress < guard.status.progress {
                tracing::debug!(
                    from = ?guard.status.stage,
                    to = ?stage,
                    "Ignoring stage change that lowers progress"
                );
                return false;
            }
            guard.status = status.clone();
            guard.updated_at = Utc::now();
        }

        tracing::debug!(stage = ?status.stage, progress = status.progress, "Stage changed");
        self.events.emit(
            PipelineEvent::new(PipelineEventKind::StageChanged, "coordinator").with_data(
                serde_json::json!({
                    "stage": status.stage,
                    "progress": status.progress,
                    "message": status.message,
                    "session_id": self.session_id,
                }),
            ),
        );
        true
    }

    pub fn get_stage(&self) -> StageStatus {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .status
            .clone()
    }

    /// When the stage last changed
    pub fn last_update(&self) -> DateTime<Utc> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).updated_at
    }

    fn is_finished(&self) -> bool {
        matches!(self.get_stage().stage, Stage::Complete | Stage::Error)
    }
}

/// Trackers published by session id
#[derive(Debug, Clone, Default)]
pub struct StageBoard {
    trackers: Arc<RwLock<HashMap<String, StageTracker>>>,
}

impl StageBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a tracker, replacing any previous one for the session
    pub fn register(&self, session_id: &str, tracker: StageTracker) {
        self.trackers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), tracker);
    }

    /// Latest status for a session, or INIT when unknown
    pub fn status(&self, session_id: &str) -> StageStatus {
        self.trackers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .map(StageTracker::get_stage)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.trackers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions that finished (COMPLETE or ERROR) at least `ttl` ago
    pub fn prune_finished(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut trackers = self.trackers.write().unwrap_or_else(|e| e.into_inner());
        let before = trackers.len();
        trackers.retain(|_, tracker| {
            let idle = now
                .signed_duration_since(tracker.last_update())
                .to_std()
                .unwrap_or_default();
            !(tracker.is_finished() && idle >= ttl)
        });
        before - trackers.len()
    }
}
