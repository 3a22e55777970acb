//! # Coordinator
//!
//! Plans a run, then delegates to the worker lineup one worker at a time.
//! Every delegation is recorded with a call id; the result for it is spliced
//! back under the same id, whether it arrives directly or after a resume.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::events::{EventSink, PipelineEvent, PipelineEventKind};
use super::history::{History, HistoryEntry, PendingDelegation};
use super::plan::Plan;
use super::stage::{Stage, StageTracker};
use super::validator;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{prompts, ModelRequest};
use crate::tools::FsSession;
use crate::workers::{
    Approvals, PendingInputField, WorkContext, Worker, WorkerDeps, WorkerKind, WorkerResult,
};

/// A generated document as returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub content: String,
}

/// Where the coordinator stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Every worker finished and the documents were read back
    Finished {
        content: String,
        documents: Vec<Document>,
    },
    /// A worker is waiting for approval
    Suspended(Vec<PendingInputField>),
}

/// Drives one run through the worker lineup
pub struct Coordinator {
    task: String,
    user_id: String,
    session_id: String,
    deps: WorkerDeps,
    workers: Vec<Worker>,
    plan: Plan,
    history: History,
    pending: Option<PendingDelegation>,
    /// Index of the next worker to delegate to
    cursor: usize,
    last_content: String,
    tracker: StageTracker,
    events: EventSink,
}

impl Coordinator {
    pub fn new(
        task: &str,
        user_id: &str,
        session_id: &str,
        deps: WorkerDeps,
        tracker: StageTracker,
    ) -> Self {
        Self {
            task: task.trim().to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            workers: Worker::lineup(&deps),
            deps,
            plan: Plan::default().sanitize(),
            history: History::default(),
            pending: None,
            cursor: 0,
            last_content: String::new(),
            tracker,
            events: EventSink::default(),
        }
    }

    /// Set event sink for streaming events
    pub fn with_event_channel(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn pending(&self) -> Option<&PendingDelegation> {
        self.pending.as_ref()
    }

    pub fn tracker(&self) -> &StageTracker {
        &self.tracker
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Fields of the suspended worker, if any
    pub fn pending_fields(&self) -> Vec<PendingInputField> {
        self.pending
            .as_ref()
            .and_then(|p| self.workers.get(p.index))
            .map(Worker::pending_fields)
            .unwrap_or_default()
    }

    fn emit(&self, kind: PipelineEventKind, agent: &str, mut data: serde_json::Value) {
        if let Some(map) = data.as_object_mut() {
            map.insert("session_id".into(), self.session_id.clone().into());
        }
        self.events.emit(PipelineEvent::new(kind, agent).with_data(data));
    }

    /// Plan the run and delegate until the lineup finishes or a worker suspends
    #[tracing::instrument(skip_all, fields(session_id = %self.session_id))]
    pub async fn start(&mut self, session: &FsSession) -> PipelineResult<Step> {
        self.tracker.set_stage(Stage::Init, None);
        self.history.push(HistoryEntry::Instruction {
            text: self.task.clone(),
        });
        self.emit(
            PipelineEventKind::PipelineStarted,
            "coordinator",
            serde_json::json!({ "task": self.task }),
        );

        let reply = self
            .deps
            .model
            .complete(ModelRequest::new(
                "planner",
                prompts::PLANNER,
                format!("Product idea: {}", self.task),
            ))
            .await
            .context("Planning failed")?;

        self.plan = Plan::from_model_output(&reply);
        tracing::info!(
            queries = self.plan.research_queries.len(),
            files = ?self.plan.output_files,
            "Plan ready"
        );
        self.history.push(HistoryEntry::Note {
            text: format!(
                "Plan: queries {:?}, focus {:?}, files {:?}",
                self.plan.research_queries, self.plan.analysis_focus, self.plan.output_files
            ),
        });

        self.advance(session).await
    }

    /// Delegate to the remaining workers in order
    pub async fn advance(&mut self, session: &FsSession) -> PipelineResult<Step> {
        if let Some(pending) = &self.pending {
            return Err(PipelineError::InconsistentState(format!(
                "delegation {} to {} is still pending",
                pending.call_id, pending.worker
            )));
        }

        while self.cursor < self.workers.len() {
            let index = self.cursor;
            let kind = self.workers[index].kind();
            let task = self.task_for(kind);
            let call_id = uuid::Uuid::new_v4().to_string();

            self.history.push(HistoryEntry::Delegation {
                call_id: call_id.clone(),
                worker: kind,
                task: task.clone(),
            });
            self.pending = Some(PendingDelegation {
                call_id: call_id.clone(),
                worker: kind,
                index,
            });
            self.emit(
                PipelineEventKind::WorkerStarted,
                kind.as_str(),
                serde_json::json!({ "call_id": call_id }),
            );

            let cx = WorkContext {
                session,
                tracker: &self.tracker,
                plan: &self.plan,
            };
            let result = self.workers[index]
                .produce_result(&task, &cx)
                .await
                .with_context(|| format!("{} failed", kind))?;

            match result {
                WorkerResult::Completed { content } => {
                    self.complete_delegation(&call_id, content)?;
                }
                WorkerResult::Suspended { pending_fields } => {
                    tracing::info!(worker = %kind, fields = pending_fields.len(), "Delegation suspended");
                    return Ok(Step::Suspended(pending_fields));
                }
            }
        }

        self.finish(session).await
    }

    /// Record the result of the pending delegation
    ///
    /// Appends exactly one history entry bound to `call_id`, with the content
    /// verbatim, and moves past the worker.
    pub fn complete_delegation(&mut self, call_id: &str, content: String) -> PipelineResult<()> {
        let pending = match self.pending.take() {
            Some(pending) if pending.call_id == call_id => pending,
            other => {
                let expected = other.as_ref().map(|p| p.call_id.clone());
                self.pending = other;
                return Err(PipelineError::InconsistentState(format!(
                    "no pending delegation {} (pending: {:?})",
                    call_id, expected
                )));
            }
        };

        self.emit(
            PipelineEventKind::WorkerCompleted,
            pending.worker.as_str(),
            serde_json::json!({ "call_id": call_id, "chars": content.chars().count() }),
        );
        self.history.push(HistoryEntry::DelegationResult {
            call_id: pending.call_id,
            worker: pending.worker,
            content: content.clone(),
        });
        self.last_content = content;
        self.cursor = pending.index + 1;
        Ok(())
    }

    /// Resume the worker named by the pending delegation, without splicing
    pub async fn resume_worker(&mut self, approvals: &Approvals) -> PipelineResult<WorkerResult> {
        let pending = self.pending.clone().ok_or_else(|| {
            PipelineError::InconsistentState("no delegation is pending".to_string())
        })?;

        let worker = self.workers.get_mut(pending.index).ok_or_else(|| {
            PipelineError::InconsistentState(format!("no worker at position {}", pending.index))
        })?;
        if worker.kind() != pending.worker || !worker.is_suspended() {
            return Err(PipelineError::InconsistentState(format!(
                "{} is not suspended on delegation {}",
                pending.worker, pending.call_id
            )));
        }

        worker.resume(approvals).await
    }

    /// Resume the suspended worker, splice its result and continue the lineup
    #[tracing::instrument(skip_all, fields(session_id = %self.session_id))]
    pub async fn resume(&mut self, approvals: &Approvals, session: &FsSession) -> PipelineResult<Step> {
        match self.resume_worker(approvals).await? {
            WorkerResult::Completed { content } => {
                let call_id = self
                    .pending
                    .as_ref()
                    .map(|p| p.call_id.clone())
                    .ok_or_else(|| {
                        PipelineError::InconsistentState("pending delegation vanished".to_string())
                    })?;
                self.complete_delegation(&call_id, content)?;
                self.advance(session).await
            }
            WorkerResult::Suspended { pending_fields } => Ok(Step::Suspended(pending_fields)),
        }
    }

    fn task_for(&self, kind: WorkerKind) -> String {
        match kind {
            WorkerKind::Searcher => self.task.clone(),
            WorkerKind::Reader => self.last_content.clone(),
            WorkerKind::Analyst => format!(
                "Product idea: {}\n\nSources:\n{}",
                self.task, self.last_content
            ),
            WorkerKind::Writer => format!(
                "Product idea: {}\n\nMarket analysis:\n{}",
                self.task, self.last_content
            ),
        }
    }

    /// Read back the documents, repair the roadmap once if needed, complete
    async fn finish(&mut self, session: &FsSession) -> PipelineResult<Step> {
        self.tracker.set_stage(Stage::Saving, None);

        let mut documents = Vec::with_capacity(self.plan.output_files.len());
        for filename in &self.plan.output_files {
            documents.push(Document {
                filename: filename.clone(),
                content: session.read_file(filename).await?,
            });
        }

        if let Some(roadmap) = self.plan.roadmap_file().map(str::to_string) {
            self.repair_roadmap(&roadmap, &mut documents, session).await?;
        }

        self.tracker.set_stage(Stage::Complete, None);
        self.emit(
            PipelineEventKind::PipelineCompleted,
            "coordinator",
            serde_json::json!({ "documents": documents.len() }),
        );
        tracing::info!(documents = documents.len(), "Run complete");

        Ok(Step::Finished {
            content: self.last_content.clone(),
            documents,
        })
    }

    async fn repair_roadmap(
        &mut self,
        filename: &str,
        documents: &mut [Document],
        session: &FsSession,
    ) -> PipelineResult<()> {
        let Some(doc) = documents.iter_mut().find(|d| d.filename == filename) else {
            return Ok(());
        };

        let report = validator::inspect(&doc.content);
        if report.is_valid() {
            return Ok(());
        }

        tracing::warn!(%filename, problems = %report.summary(), "Roadmap failed validation, requesting one rewrite");
        let instruction = validator::repair_instruction(filename, &report);
        self.history.push(HistoryEntry::Note {
            text: format!("Repair requested for {}: {}", filename, report.summary()),
        });

        let cx = WorkContext {
            session,
            tracker: &self.tracker,
            plan: &self.plan,
        };
        let writer = self
            .workers
            .iter_mut()
            .find_map(Worker::as_writer_mut)
            .ok_or_else(|| PipelineError::InconsistentState("no writer in lineup".to_string()))?;
        writer.rewrite(filename, &instruction, &cx).await?;

        doc.content = session.read_file(filename).await?;
        let after = validator::inspect(&doc.content);
        if !after.is_valid() {
            tracing::warn!(%filename, problems = %after.summary(), "Roadmap still invalid after rewrite, keeping it");
        }
        self.emit(
            PipelineEventKind::ArtifactRepaired,
            "writer",
            serde_json::json!({ "filename": filename, "valid": after.is_valid() }),
        );
        Ok(())
    }
}
