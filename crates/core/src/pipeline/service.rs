//! # Pipeline Service
//!
//! Entry point for callers: start a run, resume a suspended one, observe
//! progress. Owns the run registry and turns coordinator results into
//! [`RunOutcome`]s.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::coordinator::{Coordinator, Document, Step};
use super::events::{EventSink, PipelineEvent, PipelineEventKind};
use super::registry::{RunContext, RunRegistry};
use super::stage::{Stage, StageBoard, StageStatus, StageTracker};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::LanguageModel;
use crate::tools::{FsSession, FsTool, SearchProvider};
use crate::workers::{Approvals, PendingInputField, WorkerDeps};

const DEFAULT_USER: &str = "anonymous";

/// How a start or resume ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        session_id: String,
        content: String,
        documents: Vec<Document>,
        status: StageStatus,
    },
    Suspended {
        session_id: String,
        run_id: String,
        pending_fields: Vec<PendingInputField>,
        status: StageStatus,
    },
    Failed {
        session_id: String,
        error: String,
        status: StageStatus,
    },
}

impl RunOutcome {
    pub fn status(&self) -> &StageStatus {
        match self {
            RunOutcome::Completed { status, .. }
            | RunOutcome::Suspended { status, .. }
            | RunOutcome::Failed { status, .. } => status,
        }
    }

    /// Session to poll for this run's stage
    pub fn session_id(&self) -> &str {
        match self {
            RunOutcome::Completed { session_id, .. }
            | RunOutcome::Suspended { session_id, .. }
            | RunOutcome::Failed { session_id, .. } => session_id,
        }
    }
}

pub struct PipelineService {
    deps: WorkerDeps,
    fs: FsTool,
    registry: Arc<RunRegistry>,
    board: StageBoard,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineService {
    pub fn new(
        config: &PipelineConfig,
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let deps = WorkerDeps {
            model,
            search,
            fetch: config.fetch_options(),
            results_per_query: config.results_per_query,
            max_proposed_queries: config.max_proposed_queries,
        };

        Self {
            deps,
            fs: FsTool::new(config.output_dir.clone(), config.fs_connect_timeout()),
            registry: Arc::new(
                RunRegistry::new().with_event_channel(EventSink::new(events.clone())),
            ),
            board: StageBoard::new(),
            events,
        }
    }

    pub fn registry(&self) -> Arc<RunRegistry> {
        self.registry.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Latest stage of a session (INIT when unknown)
    pub fn status(&self, session_id: &str) -> StageStatus {
        self.board.status(session_id)
    }

    /// Filesystem sessions currently held by runs
    pub fn active_sessions(&self) -> usize {
        self.fs.active_sessions()
    }

    /// Start a new run for a one-line idea
    #[tracing::instrument(skip(self), fields(task_preview = %task.chars().take(50).collect::<String>()))]
    pub async fn start(
        &self,
        task: &str,
        user_id: Option<String>,
        session_id: Option<String>,
    ) -> PipelineResult<RunOutcome> {
        if task.trim().is_empty() {
            return Err(PipelineError::Validation("message must not be empty".to_string()));
        }

        let user_id = user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER.to_string());
        let session_id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let tracker =
            StageTracker::new().with_events(EventSink::new(self.events.clone()), &session_id);
        self.board.register(&session_id, tracker.clone());
        tracker.set_stage(Stage::Init, None);

        let session = match self.fs.connect().await {
            Ok(session) => session,
            Err(e) => return self.fail(&tracker, &session_id, None, e),
        };

        let mut coordinator =
            Coordinator::new(task, &user_id, &session_id, self.deps.clone(), tracker)
                .with_event_channel(EventSink::new(self.events.clone()));
        let result = coordinator.start(&session).await;
        self.settle(coordinator, session, result)
    }

    /// Resume a suspended run with approved field values
    #[tracing::instrument(skip(self, approvals), fields(approvals = approvals.len()))]
    pub async fn resume(&self, run_id: &str, approvals: Approvals) -> PipelineResult<RunOutcome> {
        if run_id.trim().is_empty() {
            return Err(PipelineError::Validation("run_id is required".to_string()));
        }

        let RunContext {
            mut coordinator,
            session,
            ..
        } = self
            .registry
            .take(run_id)
            .ok_or_else(|| PipelineError::UnknownRunId(run_id.to_string()))?;

        self.emit(
            PipelineEvent::new(PipelineEventKind::RunResumed, "coordinator")
                .with_run(run_id)
                .with_data(serde_json::json!({ "session_id": coordinator.session_id() })),
        );
        tracing::info!(%run_id, "Resuming run");

        let result = coordinator.resume(&approvals, &session).await;
        self.settle(coordinator, session, result)
    }

    /// Evict suspended runs older than `ttl` and forget sessions that have
    /// been finished for as long
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let evicted = self.registry.sweep_expired(ttl);
        let pruned = self.board.prune_finished(ttl);
        if !evicted.is_empty() || pruned > 0 {
            tracing::info!(
                evicted = ?evicted,
                pruned,
                tracked = self.board.len(),
                "Sweep finished"
            );
        }
        evicted.len()
    }

    /// Sessions the status board still answers for
    pub fn tracked_sessions(&self) -> usize {
        self.board.len()
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }

    fn settle(
        &self,
        coordinator: Coordinator,
        session: FsSession,
        result: PipelineResult<Step>,
    ) -> PipelineResult<RunOutcome> {
        let tracker = coordinator.tracker().clone();
        let session_id = coordinator.session_id().to_string();

        match result {
            Ok(Step::Finished { content, documents }) => {
                session.close();
                Ok(RunOutcome::Completed {
                    session_id,
                    content,
                    documents,
                    status: tracker.get_stage(),
                })
            }
            Ok(Step::Suspended(pending_fields)) => {
                tracker.set_stage(Stage::AwaitingConfirm, None);
                let run_id = self.registry.register(RunContext::new(coordinator, session));
                self.emit(
                    PipelineEvent::new(PipelineEventKind::RunSuspended, "coordinator")
                        .with_run(&run_id)
                        .with_data(serde_json::json!({
                            "session_id": session_id,
                            "fields": pending_fields.len(),
                        })),
                );
                Ok(RunOutcome::Suspended {
                    session_id,
                    run_id,
                    pending_fields,
                    status: tracker.get_stage(),
                })
            }
            Err(e) => self.fail(&tracker, &session_id, Some(session), e),
        }
    }

    fn fail(
        &self,
        tracker: &StageTracker,
        session_id: &str,
        session: Option<FsSession>,
        error: PipelineError,
    ) -> PipelineResult<RunOutcome> {
        let message = describe(&error);
        tracker.set_stage(Stage::Error, Some(&message));
        if let Some(session) = session {
            session.close();
        }
        self.emit(
            PipelineEvent::new(PipelineEventKind::PipelineFailed, "coordinator")
                .with_data(serde_json::json!({ "session_id": session_id, "error": message })),
        );

        if error.is_protocol() {
            tracing::warn!(%session_id, "Run rejected: {}", message);
            return Err(error);
        }

        tracing::error!(%session_id, "Run failed: {}", message);
        Ok(RunOutcome::Failed {
            session_id: session_id.to_string(),
            error: message,
            status: tracker.get_stage(),
        })
    }
}

/// Full error chain for fatal errors, display text otherwise
fn describe(error: &PipelineError) -> String {
    match error {
        PipelineError::Fatal(inner) => format!("{:#}", inner),
        other => other.to_string(),
    }
}

/// Periodically run [`PipelineService::sweep_expired`]
pub fn spawn_sweeper(
    service: Arc<PipelineService>,
    ttl: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            service.sweep_expired(ttl);
        }
    })
}
