//! Introspection routes, mounted in development only.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::RedactedConfig;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/source/users", get(source_users))
        .route("/source/users/:id/groups", get(source_user_groups))
        .route("/keycloak/groups", get(source_groups))
        .route("/keycloak/groups/filtered", get(filtered_groups))
        .route("/scim/users", get(destination_users))
        .route("/scim/groups", get(destination_groups))
        .route("/sync/groups-detail", get(groups_detail))
        .route("/sync/users-detail", get(users_detail))
        .route("/destination/test-connection", get(test_connection))
        .route("/config", get(config))
}

async fn source_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users = state.engine.source().list_all_users().await?;
    Ok(Json(json!({ "count": users.len(), "users": users })))
}

async fn source_user_groups(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let groups = state.engine.source().list_user_groups(&id).await?;
    Ok(Json(json!({ "user_id": id, "count": groups.len(), "groups": groups })))
}

async fn source_groups(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let groups = state.engine.source().list_all_groups().await?;
    Ok(Json(json!({ "total": groups.len(), "groups": groups })))
}

/// Every source group next to the ones the filter selects, for checking
/// the filter attribute against what the realm actually carries.
async fn filtered_groups(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let attribute = state.engine.config().filter_attribute.as_str();
    let all = state.engine.source().list_all_groups().await?;
    let scope = state.engine.sync_scope().await?;

    let all_groups: Vec<Value> = all
        .iter()
        .map(|g| {
            json!({
                "id": g.id,
                "name": g.name,
                "path": g.path,
                "attributes": g.attributes,
                "has_filter_attribute": g.attributes.contains_key(attribute),
            })
        })
        .collect();
    let filtered_groups: Vec<Value> = scope
        .top_level
        .iter()
        .map(|top| {
            let subgroups: Vec<&str> = scope
                .subgroups
                .iter()
                .filter(|s| scope.parent_of(&s.id).is_some_and(|p| p.id == top.id))
                .map(|s| s.name.as_str())
                .collect();
            json!({
                "id": top.id,
                "name": top.name,
                "path": top.path,
                "attributes": top.attributes,
                "subgroups": subgroups,
            })
        })
        .collect();

    Ok(Json(json!({
        "filter_attribute": attribute,
        "filter_value": scope.filter_value,
        "all_groups_count": all_groups.len(),
        "filtered_groups_count": filtered_groups.len(),
        "all_groups": all_groups,
        "filtered_groups": filtered_groups,
    })))
}

async fn destination_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users = state.engine.destination().list_all_users().await?;
    Ok(Json(json!({ "total": users.len(), "users": users })))
}

async fn destination_groups(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let groups = state.engine.destination().list_all_groups().await?;
    Ok(Json(json!({ "total": groups.len(), "groups": groups })))
}

async fn groups_detail(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let groups = state.engine.group_details().await?;
    Ok(Json(json!({
        "filter_value": state.engine.config().effective_filter_value(),
        "count": groups.len(),
        "groups": groups,
    })))
}

async fn users_detail(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users = state.engine.user_details().await?;
    Ok(Json(json!({
        "filter_value": state.engine.config().effective_filter_value(),
        "count": users.len(),
        "users": users,
    })))
}

/// Always answers 200; the body says whether the destination responded.
async fn test_connection(State(state): State<AppState>) -> Json<Value> {
    match state.engine.destination().test_connection().await {
        Ok(info) => Json(json!({
            "status": "connected",
            "endpoint": info.endpoint,
            "total_users": info.total_users,
        })),
        Err(e) => Json(json!({ "status": "failed", "error": e.to_string() })),
    }
}

async fn config(State(state): State<AppState>) -> Json<RedactedConfig> {
    Json(state.config.redacted())
}
