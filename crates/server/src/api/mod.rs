//! # HTTP API
//!
//! Routes under `/api/v1/pipeline` plus the OpenAPI document.

pub mod pipeline;

use axum::{Json, Router};
use ideaforge_core::pipeline::PipelineService;
use std::sync::Arc;
use utoipa::OpenApi;

/// Application state
pub struct AppState {
    pub service: Arc<PipelineService>,
}

pub type SharedState = Arc<AppState>;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "IdeaForge API",
        version = "1.0.0",
        description = "Turns a product idea into investor-ready documents, pausing for search query approval"
    ),
    paths(
        pipeline::start_pipeline,
        pipeline::resume_pipeline,
        pipeline::get_status,
        pipeline::events
    ),
    components(
        schemas(
            pipeline::StartRequest,
            pipeline::ResumeRequest,
            pipeline::ApprovedQuery,
            pipeline::ProposedQuery,
            pipeline::DocumentResponse,
            pipeline::CompletedResponse,
            pipeline::PausedResponse,
            pipeline::PipelineResponse,
            pipeline::StatusResponse,
            pipeline::ErrorResponse
        )
    ),
    tags(
        (name = "pipeline", description = "Document generation runs")
    )
)]
pub struct ApiDoc;

pub(crate) async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Full application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1/pipeline", pipeline::pipeline_routes())
        .with_state(state)
}
