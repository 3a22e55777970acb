//! # Run Registry
//!
//! Suspended runs by run id. A run is registered when its worker suspends
//! and taken exactly once on resume; the take removes it under the lock, so
//! two resumes of the same id cannot both get it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::coordinator::Coordinator;
use super::events::{EventSink, PipelineEvent, PipelineEventKind};
use super::stage::Stage;
use crate::tools::FsSession;

/// Everything a suspended run needs to continue
pub struct RunContext {
    pub coordinator: Coordinator,
    pub session: FsSession,
    pub user_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(coordinator: Coordinator, session: FsSession) -> Self {
        Self {
            user_id: coordinator.user_id().to_string(),
            session_id: coordinator.session_id().to_string(),
            coordinator,
            session,
            created_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// In-memory table of suspended runs
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunContext>>,
    events: EventSink,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_channel(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Store a suspended run under a fresh, unguessable id
    pub fn register(&self, context: RunContext) -> String {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.lock().insert(run_id.clone(), context);
        tracing::info!(%run_id, "Run registered");
        run_id
    }

    /// Remove and return a run; `None` if missing, expired or already taken
    pub fn take(&self, run_id: &str) -> Option<RunContext> {
        self.lock().remove(run_id)
    }

    pub fn contains(&self, run_id: &str) -> bool {
        self.lock().contains_key(run_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove runs at least `ttl` old
    pub fn evict_expired(&self, ttl: Duration) -> Vec<(String, RunContext)> {
        let mut runs = self.lock();
        let expired: Vec<String> = runs
            .iter()
            .filter(|(_, context)| context.age() >= ttl)
            .map(|(run_id, _)| run_id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|run_id| runs.remove(&run_id).map(|context| (run_id, context)))
            .collect()
    }

    /// Evict expired runs, mark them failed and release their sessions.
    /// Returns the session ids of the evicted runs.
    pub fn sweep_expired(&self, ttl: Duration) -> Vec<String> {
        let evicted = self.evict_expired(ttl);
        let mut sessions = Vec::with_capacity(evicted.len());
        for (run_id, context) in evicted {
            context
                .coordinator
                .tracker()
                .set_stage(Stage::Error, Some("The approval window expired. Please start again."));
            self.events.emit(
                PipelineEvent::new(PipelineEventKind::RunEvicted, "registry")
                    .with_run(&run_id)
                    .with_data(serde_json::json!({ "session_id": context.session_id })),
            );
            tracing::info!(%run_id, user_id = %context.user_id, "Expired run evicted");
            context.session.close();
            sessions.push(context.session_id);
        }
        sessions
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RunContext>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
