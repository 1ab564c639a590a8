//! On-demand sync runs and preview.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use scimsync_engine::{SyncKind, SyncPreview};

use crate::error::ApiResult;
use crate::runner::{run_sync, CompletedRun};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/manual", post(manual))
        .route("/sync/users", post(users))
        .route("/sync/groups", post(groups))
        .route("/sync/preview", get(preview))
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub run: CompletedRun,
}

async fn trigger(state: &AppState, kind: SyncKind) -> Json<RunResponse> {
    let run = run_sync(&state.engine, &state.status, kind).await;
    Json(RunResponse {
        status: "success",
        run,
    })
}

async fn manual(State(state): State<AppState>) -> Json<RunResponse> {
    trigger(&state, SyncKind::Manual).await
}

async fn users(State(state): State<AppState>) -> Json<RunResponse> {
    trigger(&state, SyncKind::Users).await
}

async fn groups(State(state): State<AppState>) -> Json<RunResponse> {
    trigger(&state, SyncKind::Groups).await
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub status: &'static str,
    pub preview: SyncPreview,
}

async fn preview(State(state): State<AppState>) -> ApiResult<Json<PreviewResponse>> {
    state.require_development("Sync preview")?;
    let preview = state.engine.preview_sync().await?;
    Ok(Json(PreviewResponse {
        status: "success",
        preview,
    }))
}
