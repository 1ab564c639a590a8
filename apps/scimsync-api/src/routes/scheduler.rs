//! Scheduler control.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::scheduler::SchedulerStatus;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scheduler/status", get(status))
        .route("/scheduler/start", post(start))
        .route("/scheduler/stop", post(stop))
}

async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

async fn start(State(state): State<AppState>) -> Json<Value> {
    let message = if state.scheduler.start().await {
        "Scheduler started"
    } else {
        "Scheduler already running"
    };
    Json(json!({ "status": message }))
}

async fn stop(State(state): State<AppState>) -> Json<Value> {
    let message = if state.scheduler.stop().await {
        "Scheduler stopped"
    } else {
        "Scheduler not running"
    };
    Json(json!({ "status": message }))
}
