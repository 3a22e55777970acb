mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedModel, StaticSearch, IDEA};
use ideaforge_core::pipeline::validator;
use ideaforge_core::pipeline::{
    Coordinator, HistoryEntry, PipelineEventKind, PipelineService, RunOutcome, Stage,
    StageTracker, Step,
};
use ideaforge_core::tools::FsTool;
use ideaforge_core::workers::{Approvals, WorkerKind, WorkerResult};
use ideaforge_core::PipelineError;

struct Harness {
    _dir: tempfile::TempDir,
    _server: wiremock::MockServer,
    model: Arc<ScriptedModel>,
    search: Arc<StaticSearch>,
    service: PipelineService,
}

async fn harness(model: ScriptedModel) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let (server, urls) = common::source_server().await;
    let model = Arc::new(model);
    let search = Arc::new(StaticSearch::new(urls));
    let service = PipelineService::new(&common::config(dir.path()), model.clone(), search.clone());
    Harness {
        _dir: dir,
        _server: server,
        model,
        search,
        service,
    }
}

async fn suspend(h: &Harness) -> (String, Vec<ideaforge_core::workers::PendingInputField>) {
    match h
        .service
        .start(IDEA, Some("user-1".into()), Some("session-1".into()))
        .await
        .unwrap()
    {
        RunOutcome::Suspended {
            run_id,
            pending_fields,
            status,
            ..
        } => {
            assert_eq!(status.stage, Stage::AwaitingConfirm);
            assert_eq!(status.progress, 25);
            (run_id, pending_fields)
        }
        other => panic!("expected suspension, got {:?}", other),
    }
}

fn approve_all(fields: &[ideaforge_core::workers::PendingInputField]) -> Approvals {
    fields
        .iter()
        .map(|f| (f.field_name.clone(), f.proposed_value.clone()))
        .collect()
}

#[tokio::test]
async fn test_dog_walking_scenario() {
    let h = harness(ScriptedModel::default()).await;
    let (run_id, fields) = suspend(&h).await;

    let names: Vec<&str> = fields.iter().map(|f| f.field_name.as_str()).collect();
    assert_eq!(names, vec!["query_1", "query_2", "query_3", "query_4", "query_5"]);
    assert_eq!(fields[0].proposed_value, IDEA);
    assert_eq!(h.service.active_sessions(), 1);

    let approvals: Approvals = fields
        .iter()
        .map(|f| (f.field_name.clone(), format!("{} 2025", f.proposed_value)))
        .collect();

    let outcome = h.service.resume(&run_id, approvals).await.unwrap();
    let RunOutcome::Completed {
        session_id,
        content,
        documents,
        status,
    } = outcome
    else {
        panic!("expected completion, got {:?}", outcome);
    };

    assert_eq!(session_id, "session-1");
    assert_eq!(status.stage, Stage::Complete);
    assert_eq!(status.progress, 100);
    assert!(content.starts_with("Created 3 documents"));

    let filenames: Vec<&str> = documents.iter().map(|d| d.filename.as_str()).collect();
    assert_eq!(
        filenames,
        vec!["business_proposal.md", "market_analysis.md", "roadmap.md"]
    );
    let roadmap = documents.iter().find(|d| d.filename == "roadmap.md").unwrap();
    assert!(validator::validate(&roadmap.content));

    let queries = h.search.queries();
    assert_eq!(queries.len(), 5);
    assert!(queries.iter().all(|q| q.ends_with(" 2025")));

    assert_eq!(h.service.active_sessions(), 0);
    assert!(h.service.registry().is_empty());
    assert_eq!(h.service.status("session-1").stage, Stage::Complete);
}

#[tokio::test]
async fn test_reader_content_reaches_analyst() {
    let h = harness(ScriptedModel::default()).await;
    let (run_id, fields) = suspend(&h).await;
    h.service.resume(&run_id, approve_all(&fields)).await.unwrap();

    let requests = h.model.requests.lock().unwrap();
    let analyst = requests.iter().find(|r| r.agent == "analyst").unwrap();
    assert!(analyst.prompt.contains("--- CONTENT FROM "));
    assert!(analyst.prompt.contains("Wag has 400k walkers."));
    assert!(!analyst.prompt.contains("menu"));
    assert!(analyst.prompt.contains("Who are the competitors?"));
}

#[tokio::test]
async fn test_run_id_is_consumed_once() {
    let h = harness(ScriptedModel::default()).await;
    let (run_id, fields) = suspend(&h).await;
    assert!(h.service.registry().contains(&run_id));

    let first = h.service.resume(&run_id, approve_all(&fields)).await.unwrap();
    assert!(matches!(first, RunOutcome::Completed { .. }));
    assert!(!h.service.registry().contains(&run_id));

    let second = h.service.resume(&run_id, approve_all(&fields)).await;
    assert!(matches!(second, Err(PipelineError::UnknownRunId(_))));
}

#[tokio::test]
async fn test_concurrent_resume_has_one_winner() {
    let h = harness(ScriptedModel::default()).await;
    let (run_id, fields) = suspend(&h).await;

    let (a, b) = tokio::join!(
        h.service.resume(&run_id, approve_all(&fields)),
        h.service.resume(&run_id, approve_all(&fields)),
    );

    let outcomes = [a, b];
    let completed = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(RunOutcome::Completed { .. })))
        .count();
    let unknown = outcomes
        .iter()
        .filter(|r| matches!(r, Err(PipelineError::UnknownRunId(_))))
        .count();
    assert_eq!((completed, unknown), (1, 1));
    assert_eq!(h.model.roadmap_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unapproved_fields_are_skipped() {
    let h = harness(ScriptedModel::default()).await;
    let (run_id, fields) = suspend(&h).await;

    let mut approvals = HashMap::new();
    approvals.insert("query_2".to_string(), fields[1].proposed_value.clone());
    approvals.insert("query_4".to_string(), "  ".to_string());

    let outcome = h.service.resume(&run_id, approvals).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(h.search.queries(), vec![fields[1].proposed_value.clone()]);
}

#[tokio::test]
async fn test_roadmap_is_repaired_once() {
    let h = harness(ScriptedModel::with_invalid_roadmaps(1)).await;
    let (run_id, fields) = suspend(&h).await;

    let RunOutcome::Completed { documents, .. } =
        h.service.resume(&run_id, approve_all(&fields)).await.unwrap()
    else {
        panic!("expected completion");
    };

    assert_eq!(h.model.roadmap_calls.load(Ordering::SeqCst), 2);
    let roadmap = documents.iter().find(|d| d.filename == "roadmap.md").unwrap();
    assert_eq!(roadmap.content, common::VALID_ROADMAP);

    let requests = h.model.requests.lock().unwrap();
    let repair = requests
        .iter()
        .filter(|r| r.agent == "writer")
        .last()
        .unwrap();
    assert!(repair.prompt.contains("Roadmap draft 1"));
    assert!(repair.prompt.contains("Success Metrics"));
}

#[tokio::test]
async fn test_roadmap_repair_is_not_retried() {
    let h = harness(ScriptedModel::with_invalid_roadmaps(usize::MAX)).await;
    let (run_id, fields) = suspend(&h).await;

    let RunOutcome::Completed { documents, .. } =
        h.service.resume(&run_id, approve_all(&fields)).await.unwrap()
    else {
        panic!("expected completion");
    };

    assert_eq!(h.model.roadmap_calls.load(Ordering::SeqCst), 2);
    let roadmap = documents.iter().find(|d| d.filename == "roadmap.md").unwrap();
    assert_eq!(roadmap.content, "Roadmap draft 2 written by the coordinator.");
    assert!(!validator::validate(&roadmap.content));
}

#[tokio::test]
async fn test_worker_failure_becomes_failed_outcome() {
    let h = harness(ScriptedModel::failing("analyst")).await;
    let (run_id, fields) = suspend(&h).await;

    let outcome = h.service.resume(&run_id, approve_all(&fields)).await.unwrap();
    let RunOutcome::Failed { error, status, .. } = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };

    assert!(error.contains("analyst model unavailable"));
    assert_eq!(status.stage, Stage::Error);
    assert_eq!(status.progress, 0);
    assert_eq!(h.service.status("session-1").message, error);
    assert_eq!(h.service.active_sessions(), 0);
    assert!(h.service.registry().is_empty());
}

#[tokio::test]
async fn test_planning_failure_on_start() {
    let h = harness(ScriptedModel::failing("planner")).await;
    let outcome = h.service.start(IDEA, None, Some("s".into())).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert_eq!(outcome.status().stage, Stage::Error);
    assert_eq!(h.service.active_sessions(), 0);
}

#[tokio::test]
async fn test_empty_inputs_are_rejected() {
    let h = harness(ScriptedModel::default()).await;

    let start = h.service.start("   ", None, None).await;
    assert!(matches!(start, Err(PipelineError::Validation(_))));

    let resume = h.service.resume("", Approvals::new()).await;
    assert!(matches!(resume, Err(PipelineError::Validation(_))));

    let unknown = h.service.resume("no-such-run", Approvals::new()).await;
    assert!(matches!(unknown, Err(PipelineError::UnknownRunId(_))));
    assert!(h.model.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_runs_are_swept() {
    let h = harness(ScriptedModel::default()).await;
    let (run_id, fields) = suspend(&h).await;
    assert_eq!(h.service.active_sessions(), 1);

    assert_eq!(h.service.sweep_expired(Duration::from_secs(3600)), 0);
    assert_eq!(h.service.status("session-1").stage, Stage::AwaitingConfirm);

    let evicted = h.service.registry().sweep_expired(Duration::from_secs(60));
    assert!(evicted.is_empty());
    assert_eq!(h.service.sweep_expired(Duration::ZERO), 1);

    assert_eq!(h.service.active_sessions(), 0);
    assert_eq!(h.service.tracked_sessions(), 0);
    assert_eq!(h.service.status("session-1").stage, Stage::Init);
    let resume = h.service.resume(&run_id, approve_all(&fields)).await;
    assert!(matches!(resume, Err(PipelineError::UnknownRunId(_))));
}

#[tokio::test]
async fn test_events_follow_the_run() {
    let h = harness(ScriptedModel::default()).await;
    let mut rx = h.service.subscribe();
    let (run_id, fields) = suspend(&h).await;
    h.service.resume(&run_id, approve_all(&fields)).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.kind == PipelineEventKind::RunSuspended {
            assert_eq!(event.run_id.as_deref(), Some(run_id.as_str()));
        }
        kinds.push(event.kind);
    }

    assert!(kinds.contains(&PipelineEventKind::PipelineStarted));
    assert!(kinds.contains(&PipelineEventKind::RunResumed));
    assert_eq!(kinds.last(), Some(&PipelineEventKind::PipelineCompleted));
    assert!(kinds.contains(&PipelineEventKind::StageChanged));
}

#[tokio::test]
async fn test_progress_only_moves_forward() {
    let h = harness(ScriptedModel::default()).await;
    let mut rx = h.service.subscribe();
    let (run_id, fields) = suspend(&h).await;
    h.service.resume(&run_id, approve_all(&fields)).await.unwrap();

    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.kind == PipelineEventKind::StageChanged {
            let data = event.data.unwrap();
            assert_eq!(data["session_id"], "session-1");
            stages.push((
                data["stage"].as_str().unwrap().to_string(),
                data["progress"].as_u64().unwrap(),
            ));
        }
    }

    let progress: Vec<u64> = stages.iter().map(|(_, p)| *p).collect();
    assert!(
        progress.windows(2).all(|pair| pair[0] <= pair[1]),
        "progress went backwards: {:?}",
        stages
    );

    let paused_at = stages
        .iter()
        .position(|(stage, _)| stage == "AWAITING_CONFIRM")
        .unwrap();
    assert_eq!(stages[paused_at + 1].0, "ANALYSIS");
    assert_eq!(stages.last().unwrap(), &("COMPLETE".to_string(), 100));
}

#[tokio::test]
async fn test_finished_sessions_leave_the_status_board() {
    let h = harness(ScriptedModel::default()).await;
    let (run_id, fields) = suspend(&h).await;
    h.service.resume(&run_id, approve_all(&fields)).await.unwrap();
    h.service
        .start(IDEA, None, Some("session-2".into()))
        .await
        .unwrap();
    assert_eq!(h.service.tracked_sessions(), 2);

    assert_eq!(h.service.sweep_expired(Duration::from_secs(3600)), 0);
    assert_eq!(h.service.status("session-1").stage, Stage::Complete);

    h.service.sweep_expired(Duration::ZERO);
    assert_eq!(h.service.tracked_sessions(), 0);
    assert_eq!(h.service.status("session-1").stage, Stage::Init);
    assert!(h.service.registry().is_empty());
}

#[tokio::test]
async fn test_resume_splices_one_entry_under_original_call_id() {
    let dir = tempfile::tempdir().unwrap();
    let (_server, urls) = common::source_server().await;
    let deps = common::deps(
        Arc::new(ScriptedModel::default()),
        Arc::new(StaticSearch::new(urls.clone())),
    );
    let session = FsTool::new(dir.path(), Duration::from_secs(5))
        .connect()
        .await
        .unwrap();

    let mut coordinator = Coordinator::new(IDEA, "user", "session", deps, StageTracker::new());
    let Step::Suspended(fields) = coordinator.start(&session).await.unwrap() else {
        panic!("expected suspension");
    };

    let pending = coordinator.pending().cloned().unwrap();
    assert_eq!(pending.worker, WorkerKind::Searcher);
    let before = coordinator.history().len();

    let WorkerResult::Completed { content } = coordinator
        .resume_worker(&approve_all(&fields))
        .await
        .unwrap()
    else {
        panic!("searcher completes on resume");
    };
    assert_eq!(content, urls.join("\n"));
    assert_eq!(coordinator.history().len(), before);

    coordinator
        .complete_delegation(&pending.call_id, content.clone())
        .unwrap();

    assert_eq!(coordinator.history().len(), before + 1);
    assert_eq!(
        coordinator.history().last(),
        Some(&HistoryEntry::DelegationResult {
            call_id: pending.call_id.clone(),
            worker: WorkerKind::Searcher,
            content,
        })
    );
    assert!(coordinator.pending().is_none());

    let step = coordinator.advance(&session).await.unwrap();
    assert!(matches!(step, Step::Finished { .. }));
}

#[tokio::test]
async fn test_resuming_a_worker_that_is_not_suspended() {
    let dir = tempfile::tempdir().unwrap();
    let (_server, urls) = common::source_server().await;
    let deps = common::deps(
        Arc::new(ScriptedModel::default()),
        Arc::new(StaticSearch::new(urls)),
    );
    let session = FsTool::new(dir.path(), Duration::from_secs(5))
        .connect()
        .await
        .unwrap();

    let mut coordinator = Coordinator::new(IDEA, "user", "session", deps, StageTracker::new());
    let Step::Suspended(fields) = coordinator.start(&session).await.unwrap() else {
        panic!("expected suspension");
    };

    coordinator
        .resume_worker(&approve_all(&fields))
        .await
        .unwrap();
    let again = coordinator.resume_worker(&approve_all(&fields)).await;
    assert!(matches!(again, Err(PipelineError::InconsistentState(_))));
}

#[tokio::test]
async fn test_worker_resume_requires_suspension() {
    use ideaforge_core::workers::Worker;

    let deps = common::deps(
        Arc::new(ScriptedModel::default()),
        Arc::new(StaticSearch::default()),
    );

    let mut lineup = Worker::lineup(&deps);
    for worker in lineup.iter_mut() {
        let err = worker.resume(&Approvals::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidResumeState(_)));
    }
}
