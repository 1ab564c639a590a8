//! Last-run status shared between the scheduler and the HTTP layer.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::result::SyncResult;

/// What triggered a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Manual,
    Scheduled,
    Users,
    Groups,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Users => "users",
            Self::Groups => "groups",
        };
        f.write_str(s)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncOutcome {
    /// The run produced a result, possibly carrying per-entity errors.
    Completed { result: SyncResult },
    /// The run could not be carried out at all.
    Failed { error: String },
}

impl SyncOutcome {
    /// Whether the outcome should mark the service as degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        match self {
            Self::Completed { result } => result.has_errors(),
            Self::Failed { .. } => true,
        }
    }
}

/// Summary of the most recent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastSync {
    pub at: DateTime<Utc>,
    pub kind: SyncKind,
    pub outcome: SyncOutcome,
}

/// In-memory holder of the last run. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct SyncStatusStore {
    inner: Arc<RwLock<Option<LastSync>>>,
}

impl SyncStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, kind: SyncKind, outcome: SyncOutcome) {
        let entry = LastSync {
            at: Utc::now(),
            kind,
            outcome,
        };
        *self.inner.write().await = Some(entry);
    }

    pub async fn record_result(&self, kind: SyncKind, result: SyncResult) {
        self.record(kind, SyncOutcome::Completed { result }).await;
    }

    pub async fn record_failure(&self, kind: SyncKind, error: impl Into<String>) {
        self.record(
            kind,
            SyncOutcome::Failed {
                error: error.into(),
            },
        )
        .await;
    }

    pub async fn last(&self) -> Option<LastSync> {
        self.inner.read().await.clone()
    }
}
