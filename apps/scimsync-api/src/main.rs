//! scimsync service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use scimsync_api::logging::init_logging;
use scimsync_api::{build_router, AppState, Config};
use scimsync_engine::ReconciliationEngine;
use scimsync_keycloak::KeycloakClient;
use scimsync_scim::ScimClient;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.rust_log);

    if let Err(e) = run(config).await {
        error!(error = ?e, "scimsync terminated");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        environment = %config.environment,
        realm = %config.keycloak.realm,
        destination = %config.scim.endpoint_url,
        filter_attribute = %config.sync.filter_attribute,
        filter_value = %config.sync.filter_value,
        "Starting scimsync"
    );

    let source = KeycloakClient::new(config.keycloak_config())
        .context("Failed to create Keycloak client")?;
    let destination =
        ScimClient::new(config.scim_config()).context("Failed to create SCIM client")?;
    let engine = ReconciliationEngine::new(
        Arc::new(source),
        Arc::new(destination),
        config.engine_config(),
    )
    .context("Invalid sync configuration")?;

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .context("Invalid API_HOST/API_PORT")?;
    let scheduler_enabled = config.sync.enabled;

    let state = AppState::with_engine(config, engine);
    let scheduler = state.scheduler.clone();
    if scheduler_enabled {
        scheduler.start().await;
    } else {
        info!("Sync scheduler disabled");
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
