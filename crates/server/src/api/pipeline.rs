//! # Pipeline API
//!
//! Start a run, resume a paused one, poll its stage, stream its events.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use ideaforge_core::pipeline::{RunOutcome, StageStatus};
use ideaforge_core::workers::Approvals;
use ideaforge_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use utoipa::ToSchema;

use super::SharedState;

// === API Types ===

#[derive(Deserialize, ToSchema)]
pub struct StartRequest {
    /// One-line product idea
    #[serde(default)]
    pub message: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ApprovedQuery {
    pub field_name: String,
    pub query: String,
    /// Unapproved queries are dropped (default: true)
    #[serde(default = "approved_by_default")]
    pub approved: bool,
}

fn approved_by_default() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
pub struct ResumeRequest {
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub approved_queries: Vec<ApprovedQuery>,
}

#[derive(Serialize, ToSchema)]
pub struct ProposedQuery {
    pub query: String,
    pub field_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub filename: String,
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct CompletedResponse {
    /// Session to poll on `/status`
    pub session_id: String,
    pub response: String,
    pub documents: Vec<DocumentResponse>,
    pub stage: String,
    pub progress: u8,
    pub message: String,
    pub is_paused: bool,
}

#[derive(Serialize, ToSchema)]
pub struct PausedResponse {
    pub is_paused: bool,
    /// Session to poll on `/status`
    pub session_id: String,
    pub run_id: String,
    pub queries: Vec<ProposedQuery>,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
#[serde(untagged)]
pub enum PipelineResponse {
    Completed(CompletedResponse),
    Paused(PausedResponse),
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub stage: String,
    pub progress: u8,
    pub message: String,
}

impl From<StageStatus> for StatusResponse {
    fn from(status: StageStatus) -> Self {
        Self {
            stage: status.stage.as_str().to_string(),
            progress: status.progress,
            message: status.message,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    session_id: Option<String>,
}

/// Error response with its HTTP status
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                session_id: None,
                stage: None,
                progress: None,
                message: None,
            },
        }
    }

    fn failed(error: String, session_id: String, status: StageStatus) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error,
                session_id: Some(session_id),
                stage: Some(status.stage.as_str().to_string()),
                progress: Some(status.progress),
                message: Some(status.message),
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        let status = match &error {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::UnknownRunId(_) => StatusCode::NOT_FOUND,
            PipelineError::InvalidResumeState(_) | PipelineError::InconsistentState(_) => {
                StatusCode::CONFLICT
            }
            PipelineError::Tool(_) | PipelineError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn respond(outcome: RunOutcome) -> Result<Json<PipelineResponse>, ApiError> {
    match outcome {
        RunOutcome::Completed {
            session_id,
            content,
            documents,
            status,
        } => Ok(Json(PipelineResponse::Completed(CompletedResponse {
            session_id,
            response: content,
            documents: documents
                .into_iter()
                .map(|d| DocumentResponse {
                    filename: d.filename,
                    content: d.content,
                })
                .collect(),
            stage: status.stage.as_str().to_string(),
            progress: status.progress,
            message: status.message,
            is_paused: false,
        }))),
        RunOutcome::Suspended {
            session_id,
            run_id,
            pending_fields,
            status,
        } => Ok(Json(PipelineResponse::Paused(PausedResponse {
            is_paused: true,
            session_id,
            run_id,
            queries: pending_fields
                .into_iter()
                .map(|f| ProposedQuery {
                    query: f.proposed_value,
                    field_name: f.field_name,
                })
                .collect(),
            message: status.message,
        }))),
        RunOutcome::Failed {
            session_id,
            error,
            status,
        } => Err(ApiError::failed(error, session_id, status)),
    }
}

pub fn pipeline_routes() -> Router<SharedState> {
    Router::new()
        .route("/start", post(start_pipeline))
        .route("/resume", post(resume_pipeline))
        .route("/status", get(get_status))
        .route("/events", get(events))
        .route("/openapi.json", get(super::serve_openapi))
}

// === API Handlers ===

/// Start a run for a product idea
#[utoipa::path(
    post,
    path = "/api/v1/pipeline/start",
    tag = "pipeline",
    request_body = StartRequest,
    responses(
        (status = 200, description = "Run completed or paused for approval", body = PipelineResponse),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 500, description = "Run failed", body = ErrorResponse)
    )
)]
pub async fn start_pipeline(
    State(state): State<SharedState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let outcome = state
        .service
        .start(&req.message, req.user_id, req.session_id)
        .await?;
    respond(outcome)
}

/// Resume a paused run with the approved queries
#[utoipa::path(
    post,
    path = "/api/v1/pipeline/resume",
    tag = "pipeline",
    request_body = ResumeRequest,
    responses(
        (status = 200, description = "Run completed or paused again", body = PipelineResponse),
        (status = 404, description = "Missing or unknown run id", body = ErrorResponse),
        (status = 409, description = "Run is not waiting for approval", body = ErrorResponse),
        (status = 500, description = "Run failed", body = ErrorResponse)
    )
)]
pub async fn resume_pipeline(
    State(state): State<SharedState>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<PipelineResponse>, ApiError> {
    if req.run_id.trim().is_empty() {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "run_id is required"));
    }

    let approvals: Approvals = req
        .approved_queries
        .into_iter()
        .filter(|q| q.approved)
        .map(|q| (q.field_name, q.query))
        .collect();

    let outcome = state.service.resume(&req.run_id, approvals).await?;
    respond(outcome)
}

/// Current stage of a session
#[utoipa::path(
    get,
    path = "/api/v1/pipeline/status",
    tag = "pipeline",
    params(("session_id" = Option<String>, Query, description = "Session to inspect")),
    responses(
        (status = 200, description = "Stage, progress and message", body = StatusResponse)
    )
)]
pub async fn get_status(
    State(state): State<SharedState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let session_id = query.session_id.unwrap_or_default();
    Json(state.service.status(&session_id).into())
}

/// SSE endpoint for pipeline events with heartbeat
#[utoipa::path(
    get,
    path = "/api/v1/pipeline/events",
    tag = "pipeline",
    responses(
        (status = 200, description = "Server-sent pipeline events")
    )
)]
pub async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.service.subscribe();

    // Heartbeat every 15 seconds while idle
    let stream = stream::unfold(rx, |mut rx| async move {
        let next = tokio::time::timeout(std::time::Duration::from_secs(15), rx.recv()).await;

        match next {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().data(json)), rx))
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "SSE subscriber lagged");
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Ok(Err(_)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
