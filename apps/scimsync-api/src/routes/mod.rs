//! HTTP routes.

pub mod debug;
pub mod health;
pub mod scheduler;
pub mod sync;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router. Sync and scheduler routes live under the
/// configured prefix; debug routes are only mounted in development.
pub fn build_router(state: AppState) -> Router {
    let mut api = Router::new()
        .merge(sync::router())
        .merge(scheduler::router());
    if state.config.environment.is_development() {
        api = api.nest("/debug", debug::router());
    }

    let prefix = state.config.api.prefix.clone();
    let root = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health));
    let app = if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(&prefix, api)
    };

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
