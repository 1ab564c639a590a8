//! Service identity and health.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use scimsync_engine::{SyncKind, SyncOutcome};

use crate::state::AppState;

pub const SERVICE_NAME: &str = "scimsync";

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub status: &'static str,
}

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.to_string(),
        status: "running",
    })
}

#[derive(Debug, Serialize)]
pub struct SyncInfo {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_type: Option<SyncKind>,
    pub last_sync_result: Option<SyncOutcome>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sync: SyncInfo,
}

/// `degraded` when the last run carried errors or failed outright.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let last = state.status.last().await;
    let degraded = last.as_ref().is_some_and(|l| l.outcome.is_degraded());

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" },
        sync: SyncInfo {
            last_sync_time: last.as_ref().map(|l| l.at),
            last_sync_type: last.as_ref().map(|l| l.kind),
            last_sync_result: last.map(|l| l.outcome),
        },
    })
}
