//! scimsync service: configuration, scheduler and HTTP API around the
//! reconciliation engine.

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use config::{AppEnvironment, Config, ConfigError};
pub use routes::build_router;
pub use scheduler::SyncScheduler;
pub use state::AppState;
