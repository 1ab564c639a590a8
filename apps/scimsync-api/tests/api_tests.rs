//! Router tests against in-memory directories.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use scimsync_api::{build_router, AppState, Config};
use scimsync_engine::memory::{InMemoryDestination, InMemorySource};
use scimsync_engine::{
    DestinationGroup, DestinationUser, DirectoryError, ReconciliationEngine, SourceGroup,
    SourceUser,
};

// =============================================================================
// Fixtures
// =============================================================================

fn vars(env: &str) -> HashMap<String, String> {
    [
        ("APP_ENV", env),
        ("KEYCLOAK_URL", "https://sso.example.com"),
        ("KEYCLOAK_REALM", "corp"),
        ("KEYCLOAK_CLIENT_ID", "scimsync"),
        ("KEYCLOAK_CLIENT_SECRET", "kc-secret"),
        ("SCIM_ENDPOINT_URL", "https://vc01.example.com/scim/v2"),
        ("SCIM_BEARER_TOKEN", "scim-token"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// `eng` (vcenter_name = vc01.example.com) with subgroup `admins` holding bob.
fn source() -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    source.add_group(SourceGroup {
        id: "g-eng".into(),
        name: "eng".into(),
        path: "/eng".into(),
        attributes: HashMap::from([(
            "vcenter_name".to_string(),
            vec!["vc01.example.com".to_string()],
        )]),
        sub_group_count: 0,
    });
    source.add_subgroup(
        "g-eng",
        SourceGroup {
            id: "g-admins".into(),
            name: "admins".into(),
            path: "/eng/admins".into(),
            ..Default::default()
        },
    );
    source.add_user(SourceUser {
        id: "u1".into(),
        username: "bob".into(),
        email: Some("bob@example.com".into()),
        first_name: Some("Bob".into()),
        last_name: Some("Builder".into()),
        enabled: true,
    });
    source.add_member("g-admins", "u1");
    Arc::new(source)
}

struct TestApp {
    router: Router,
    destination: Arc<InMemoryDestination>,
}

fn app(env: &str) -> TestApp {
    app_with(env, source(), Arc::new(InMemoryDestination::new()))
}

fn app_with(
    env: &str,
    source: Arc<InMemorySource>,
    destination: Arc<InMemoryDestination>,
) -> TestApp {
    let config = Config::from_map(&vars(env)).unwrap();
    let engine =
        ReconciliationEngine::new(source, destination.clone(), config.engine_config()).unwrap();
    TestApp {
        router: build_router(AppState::with_engine(config, engine)),
        destination,
    }
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// =============================================================================
// Root & health
// =============================================================================

#[tokio::test]
async fn test_root_reports_environment() {
    let app = app("production");
    let (status, body) = send(&app.router, "GET", "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "scimsync");
    assert_eq!(body["environment"], "production");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_health_before_any_sync() {
    let app = app("production");
    let (status, body) = send(&app.router, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["sync"]["last_sync_time"].is_null());
}

#[tokio::test]
async fn test_health_degraded_after_failed_run() {
    let destination = Arc::new(InMemoryDestination::new());
    destination.set_listing_failure(Some(DirectoryError::Transport("refused".into())));
    let app = app_with("production", source(), destination);

    let (status, body) = send(&app.router, "POST", "/api/sync/manual").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["result"]["errors"].as_array().unwrap().is_empty());

    let (_, health) = send(&app.router, "GET", "/health").await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["sync"]["last_sync_type"], "manual");
    assert_eq!(health["sync"]["last_sync_result"]["status"], "completed");
}

// =============================================================================
// Sync routes
// =============================================================================

#[tokio::test]
async fn test_manual_sync_provisions_and_records() {
    let app = app("production");
    let (status, body) = send(&app.router, "POST", "/api/sync/manual").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["kind"], "manual");
    assert!(body["run_id"].is_string());
    assert_eq!(body["result"]["users_created"], 1);
    assert_eq!(body["result"]["groups_created"], 1);

    assert!(app.destination.user_by_username("bob").is_some());
    let group = app.destination.group_by_name("corp-eng-admins").unwrap();
    assert_eq!(group.members.len(), 1);

    let (_, health) = send(&app.router, "GET", "/health").await;
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_user_sync_leaves_groups_alone() {
    let app = app("production");
    let (_, body) = send(&app.router, "POST", "/api/sync/users").await;

    assert_eq!(body["kind"], "users");
    assert_eq!(body["result"]["users_created"], 1);
    assert!(app.destination.groups().is_empty());
}

#[tokio::test]
async fn test_group_sync_kind_is_recorded() {
    let app = app("production");
    send(&app.router, "POST", "/api/sync/users").await;
    let (_, body) = send(&app.router, "POST", "/api/sync/groups").await;

    assert_eq!(body["result"]["groups_created"], 1);
    let (_, health) = send(&app.router, "GET", "/health").await;
    assert_eq!(health["sync"]["last_sync_type"], "groups");
}

#[tokio::test]
async fn test_preview_forbidden_in_production() {
    let app = app("production");
    let (status, body) = send(&app.router, "GET", "/api/sync/preview").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_preview_in_development_makes_no_writes() {
    let app = app("development");
    let (status, body) = send(&app.router, "GET", "/api/sync/preview").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preview"]["users_to_create"][0]["username"], "bob");
    assert_eq!(body["preview"]["summary"]["filter_value"], "vc01.example.com");
    assert_eq!(app.destination.calls().mutations(), 0);
}

// =============================================================================
// Scheduler routes
// =============================================================================

#[tokio::test]
async fn test_scheduler_start_and_stop() {
    let app = app("production");

    let (_, status) = send(&app.router, "GET", "/api/scheduler/status").await;
    assert_eq!(status["running"], false);
    assert_eq!(status["interval_seconds"], 3600);

    let (_, started) = send(&app.router, "POST", "/api/scheduler/start").await;
    assert_eq!(started["status"], "Scheduler started");
    let (_, again) = send(&app.router, "POST", "/api/scheduler/start").await;
    assert_eq!(again["status"], "Scheduler already running");

    let (_, status) = send(&app.router, "GET", "/api/scheduler/status").await;
    assert_eq!(status["running"], true);
    assert!(status["next_run"].is_string());

    let (_, stopped) = send(&app.router, "POST", "/api/scheduler/stop").await;
    assert_eq!(stopped["status"], "Scheduler stopped");
}

// =============================================================================
// Debug routes
// =============================================================================

#[tokio::test]
async fn test_debug_routes_absent_in_production() {
    let app = app("production");
    let (status, _) = send(&app.router, "GET", "/api/debug/config").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_debug_config_is_redacted() {
    let app = app("development");
    let (status, body) = send(&app.router, "GET", "/api/debug/config").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keycloak_client_secret"], "[REDACTED]");
    assert!(!body.to_string().contains("scim-token"));
}

#[tokio::test]
async fn test_debug_source_views() {
    let app = app("development");

    let (_, users) = send(&app.router, "GET", "/api/debug/source/users").await;
    assert_eq!(users["count"], 1);

    let (_, groups) = send(&app.router, "GET", "/api/debug/sync/groups-detail").await;
    assert_eq!(groups["groups"][0]["destination_name"], "corp-eng-admins");
    assert_eq!(groups["groups"][0]["members"][0]["username"], "bob");

    let (_, details) = send(&app.router, "GET", "/api/debug/sync/users-detail").await;
    assert_eq!(details["users"][0]["username"], "bob");
    assert_eq!(details["users"][0]["action"], "create");
}

#[tokio::test]
async fn test_debug_source_groups() {
    let source = source();
    source.add_group(SourceGroup {
        id: "g-ops".into(),
        name: "ops".into(),
        path: "/ops".into(),
        attributes: HashMap::from([(
            "vcenter_name".to_string(),
            vec!["vc02.example.com".to_string()],
        )]),
        sub_group_count: 0,
    });
    source.add_group(SourceGroup {
        id: "g-misc".into(),
        name: "misc".into(),
        path: "/misc".into(),
        ..Default::default()
    });
    let app = app_with("development", source, Arc::new(InMemoryDestination::new()));

    let (status, all) = send(&app.router, "GET", "/api/debug/keycloak/groups").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total"], 4);

    let (status, body) = send(&app.router, "GET", "/api/debug/keycloak/groups/filtered").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filter_attribute"], "vcenter_name");
    assert_eq!(body["filter_value"], "vc01.example.com");
    assert_eq!(body["all_groups_count"], 4);
    assert_eq!(body["filtered_groups_count"], 1);
    assert_eq!(body["filtered_groups"][0]["name"], "eng");
    assert_eq!(body["filtered_groups"][0]["subgroups"][0], "admins");

    let flagged: Vec<&str> = body["all_groups"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|g| g["has_filter_attribute"] == true)
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(flagged, vec!["eng", "ops"]);
}

#[tokio::test]
async fn test_debug_destination_listings() {
    let destination = Arc::new(InMemoryDestination::new());
    let bob = destination.seed_user(DestinationUser {
        id: None,
        external_id: Some("u1".into()),
        username: "bob".into(),
        display_name: "Bob Builder".into(),
        given_name: Some("Bob".into()),
        family_name: Some("Builder".into()),
        active: true,
        emails: vec!["bob@example.com".into()],
    });
    destination.seed_group(DestinationGroup {
        id: None,
        display_name: "corp-eng-admins".into(),
        members: vec![bob.clone()],
    });
    let app = app_with("development", source(), destination);

    let (status, users) = send(&app.router, "GET", "/api/debug/scim/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["total"], 1);
    assert_eq!(users["users"][0]["username"], "bob");

    let (status, groups) = send(&app.router, "GET", "/api/debug/scim/groups").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(groups["total"], 1);
    assert_eq!(groups["groups"][0]["display_name"], "corp-eng-admins");
    assert_eq!(groups["groups"][0]["members"][0], bob.as_str());
}

#[tokio::test]
async fn test_debug_test_connection() {
    let app = app("development");
    let (status, body) =
        send(&app.router, "GET", "/api/debug/destination/test-connection").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "connected");
    assert_eq!(body["total_users"], 0);
}

#[tokio::test]
async fn test_debug_source_failure_is_bad_gateway() {
    let source = source();
    source.set_failure(Some(DirectoryError::Auth("token expired".into())));
    let app = app_with("development", source, Arc::new(InMemoryDestination::new()));

    let (status, body) = send(&app.router, "GET", "/api/debug/source/users").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "directory_error");
}
