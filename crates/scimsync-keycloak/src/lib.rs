//! Keycloak source directory for scimsync.
//!
//! Reads groups, group members and users of one realm through the admin REST
//! API, authenticating as a service account with the OAuth2 client
//! credentials grant.
//!
//! ```no_run
//! use std::time::Duration;
//! use scimsync_keycloak::{KeycloakClient, KeycloakConfig, KeycloakCredentials};
//!
//! # fn example() -> Result<(), scimsync_keycloak::KeycloakError> {
//! let client = KeycloakClient::new(KeycloakConfig {
//!     base_url: "https://sso.example.com".into(),
//!     realm: "corp".into(),
//!     credentials: KeycloakCredentials {
//!         client_id: "scimsync".into(),
//!         client_secret: "secret".to_string().into(),
//!     },
//!     timeout: Duration::from_secs(30),
//!     tls_verify: true,
//! })?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod error;
mod models;
mod source;

pub use auth::{KeycloakCredentials, TokenCache};
pub use client::{KeycloakClient, KeycloakConfig};
pub use error::{KeycloakError, KeycloakResult};
pub use models::{KeycloakGroup, KeycloakUser};
