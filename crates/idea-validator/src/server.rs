/// HTTP surface for submitting, listing, fetching and deleting ideas.
///
/// Routes:
/// - `GET /` — liveness banner
/// - `GET /ideas?q=` — summaries, newest first, optional prompt filter
/// - `POST /idea` — evaluate and store a new idea
/// - `GET /idea/{id}` — one full record
/// - `DELETE /idea/{id}` — remove a record
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppError;
use crate::model::{IdeaEvaluation, IdeaRecord, IdeaSummary};
use crate::pipeline::EvaluationPipeline;
use crate::store::IdeaStore;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EvaluationPipeline>,
    pub store: Arc<dyn IdeaStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/ideas", get(list_ideas))
        .route("/idea", post(create_idea))
        .route("/idea/{id}", get(get_idea).delete(delete_idea))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn banner() -> &'static str {
    "Idea validator backend is running"
}

#[derive(Debug, Deserialize)]
struct ListParams {
    q: Option<String>,
}

async fn list_ideas(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<IdeaSummary>>, AppError> {
    let ideas = state.store.list(params.q.as_deref()).await?;
    Ok(Json(ideas))
}

#[derive(Debug, Deserialize)]
struct CreateIdeaRequest {
    idea: String,
}

#[derive(Debug, Serialize)]
struct CreateIdeaResponse {
    message: &'static str,
    id: String,
    evaluation: IdeaEvaluation,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn create_idea(
    State(state): State<AppState>,
    payload: Result<Json<CreateIdeaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateIdeaResponse>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    if request.idea.trim().is_empty() {
        return Err(AppError::InvalidRequest("idea must not be empty".to_string()));
    }

    // Nothing is written unless the evaluation validated.
    let evaluation = state.pipeline.evaluate(&request.idea).await?;
    let record = state.store.create(&request.idea, &evaluation).await?;
    info!(id = %record.id, "idea added");

    Ok((
        StatusCode::CREATED,
        Json(CreateIdeaResponse {
            message: "Idea added successfully",
            id: record.id,
            evaluation,
        }),
    ))
}

async fn get_idea(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IdeaRecord>, AppError> {
    let record = state.store.get(&id).await?;
    Ok(Json(record))
}

async fn delete_idea(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.store.delete(&id).await?;
    Ok(Json(MessageResponse {
        message: "Idea deleted successfully",
    }))
}
