//! # scimsync-engine
//!
//! Reconciles a SCIM 2.0 destination against an identity-provider source.
//!
//! A run selects the source groups carrying a configured attribute value,
//! syncs their direct subgroups as destination groups named
//! `{realm}-{parent}-{subgroup}`, provisions every member of those groups as a
//! destination user correlated by external id, and replaces each synced
//! group's membership. Stale users and owned groups can optionally be deleted.
//!
//! The engine talks to both sides through the [`SourceDirectory`] and
//! [`DestinationDirectory`] traits; adapter crates implement them for
//! concrete systems.

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod model;
pub mod plan;
pub mod result;
pub mod status;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use config::EngineConfig;
pub use directory::{DestinationDirectory, SourceDirectory};
pub use engine::ReconciliationEngine;
pub use error::{DirectoryError, DirectoryResult, EngineResult, SyncError};
pub use filter::SyncScope;
pub use model::{ConnectionInfo, DestinationGroup, DestinationUser, SourceGroup, SourceUser};
pub use result::{GroupDetail, SyncPreview, SyncResult, UserDetail};
pub use status::{LastSync, SyncKind, SyncOutcome, SyncStatusStore};
