//! Runs a reconciliation and records its outcome.

use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use scimsync_engine::{ReconciliationEngine, SyncKind, SyncResult, SyncStatusStore};

/// A finished run as reported to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRun {
    pub run_id: Uuid,
    pub kind: SyncKind,
    pub result: SyncResult,
}

/// Run the phase(s) selected by `kind` and store the result as the last sync.
pub async fn run_sync(
    engine: &ReconciliationEngine,
    status: &SyncStatusStore,
    kind: SyncKind,
) -> CompletedRun {
    let run_id = Uuid::new_v4();
    let span = info_span!("sync_run", %run_id, %kind);

    async move {
        info!("Sync started");
        let result = match kind {
            SyncKind::Users => engine.run_user_sync().await,
            SyncKind::Groups => engine.run_group_sync().await,
            SyncKind::Manual | SyncKind::Scheduled => engine.run_full_sync().await,
        };
        info!(
            changes = result.change_count(),
            errors = result.errors.len(),
            "Sync finished"
        );
        status.record_result(kind, result.clone()).await;
        CompletedRun {
            run_id,
            kind,
            result,
        }
    }
    .instrument(span)
    .await
}
