//! SCIM 2.0 destination directory for scimsync.
//!
//! Users and groups are written with the core SCIM schemas plus the vCenter
//! `ws1b` user extension. Every call is retried with exponential backoff on
//! transient failures, and list endpoints are paged transparently.
//!
//! ```no_run
//! use std::time::Duration;
//! use scimsync_scim::{RetryPolicy, ScimClient, ScimConfig, ScimCredentials};
//!
//! # fn example() -> Result<(), scimsync_scim::ScimClientError> {
//! let client = ScimClient::new(ScimConfig {
//!     base_url: "https://vc.example.com/scim/v2".into(),
//!     credentials: ScimCredentials::Bearer {
//!         token: "token".to_string().into(),
//!     },
//!     timeout: Duration::from_secs(30),
//!     tls_verify: true,
//!     retry: RetryPolicy::default(),
//! })?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod destination;
mod error;
mod models;
mod retry;

pub use auth::{ScimAuth, ScimCredentials};
pub use client::{ScimClient, ScimConfig, MAX_RESOURCES, PAGE_SIZE};
pub use error::{ScimClientError, ScimClientResult};
pub use models::{
    ScimEmail, ScimGroup, ScimListResponse, ScimMember, ScimName, ScimPatchOp, ScimPatchRequest,
    ScimUser, Ws1bUserExtension, GROUP_SCHEMA, PATCH_OP_SCHEMA, USER_SCHEMA, WS1B_USER_SCHEMA,
};
pub use retry::RetryPolicy;
