//! Application configuration loaded from environment variables.
//!
//! Loading is fail-fast: a missing or malformed variable aborts startup with
//! a message naming it.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use scimsync_engine::config::DEFAULT_FILTER_ATTRIBUTE;
use scimsync_engine::EngineConfig;
use scimsync_keycloak::{KeycloakConfig, KeycloakCredentials};
use scimsync_scim::{RetryPolicy, ScimConfig, ScimCredentials};

use crate::logging::DEFAULT_FILTER;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

impl ConfigError {
    fn invalid(var: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            var: var.to_string(),
            message: message.into(),
        }
    }
}

/// Deployment mode. Development enables preview and debug routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::invalid(
                "APP_ENV",
                format!("expected development or production, got {other:?}"),
            )),
        }
    }

    #[must_use]
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeycloakSettings {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Destination authentication mode.
#[derive(Debug, Clone)]
pub enum ScimAuthSettings {
    Bearer(SecretString),
    OAuth2 {
        token_url: String,
        client_id: String,
        client_secret: SecretString,
    },
}

#[derive(Debug, Clone)]
pub struct ScimSettings {
    pub endpoint_url: String,
    pub auth: ScimAuthSettings,
    pub verify_ssl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub filter_attribute: String,
    /// Empty means nothing is synced.
    pub filter_value: String,
    pub interval_minutes: u64,
    pub enabled: bool,
    pub delete_users: bool,
    pub delete_groups: bool,
}

impl SyncSettings {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
    /// Route prefix without trailing slash; empty mounts at the root.
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: AppEnvironment,
    pub keycloak: KeycloakSettings,
    pub scim: ScimSettings,
    pub sync: SyncSettings,
    pub http_timeout: Duration,
    pub api: ApiSettings,
    pub rust_log: String,
}

impl Config {
    /// Load from the process environment, after a `.env` file in the working
    /// directory when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_file(Path::new(".env"))
    }

    /// Load from the process environment layered over the file at `path`.
    /// Variables already set take precedence; a missing file is ignored.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let _ = dotenvy::from_path(path);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key/value source.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);

        let environment = match vars
            .optional("APP_ENV")
            .or_else(|| vars.optional("ENVIRONMENT"))
        {
            Some(value) => AppEnvironment::parse(&value)?,
            None => AppEnvironment::Production,
        };

        let keycloak = KeycloakSettings {
            url: vars.url("KEYCLOAK_URL")?.to_string(),
            realm: vars.required("KEYCLOAK_REALM")?,
            client_id: vars.required("KEYCLOAK_CLIENT_ID")?,
            client_secret: vars.required("KEYCLOAK_CLIENT_SECRET")?.into(),
        };

        let endpoint = vars.url("SCIM_ENDPOINT_URL")?;
        let scim = ScimSettings {
            endpoint_url: endpoint.to_string(),
            auth: scim_auth(&vars)?,
            verify_ssl: vars.flag("SCIM_VERIFY_SSL", true)?,
        };

        // Present but empty is honoured: it disables syncing.
        let filter_value = vars
            .raw("SYNC_FILTER_VALUE")
            .or_else(|| vars.raw("VCENTER_NAME"))
            .unwrap_or_else(|| endpoint.host_str().unwrap_or_default().to_string());
        let interval_minutes = vars.number("SYNC_INTERVAL_MINUTES", 60)?;
        if interval_minutes == 0 {
            return Err(ConfigError::invalid(
                "SYNC_INTERVAL_MINUTES",
                "must be greater than zero",
            ));
        }
        let sync = SyncSettings {
            filter_attribute: vars
                .optional("SYNC_FILTER_ATTRIBUTE")
                .or_else(|| vars.optional("VCENTER_NAME_ATTRIBUTE"))
                .unwrap_or_else(|| DEFAULT_FILTER_ATTRIBUTE.to_string()),
            filter_value: filter_value.trim().to_string(),
            interval_minutes,
            enabled: vars.flag("SYNC_ENABLED", true)?,
            delete_users: vars.flag("SYNC_DELETE_USERS", false)?,
            delete_groups: vars.flag("SYNC_DELETE_GROUPS", false)?,
        };

        let http_timeout = Duration::from_secs(vars.number("HTTP_TIMEOUT_SECS", 30)?);

        let port = vars.number("API_PORT", 8000)?;
        let api = ApiSettings {
            host: vars
                .optional("API_HOST")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: u16::try_from(port)
                .map_err(|_| ConfigError::invalid("API_PORT", format!("{port} is out of range")))?,
            prefix: normalize_prefix(&vars.raw("API_PREFIX").unwrap_or_else(|| "/api".into())),
        };

        Ok(Self {
            environment,
            keycloak,
            scim,
            sync,
            http_timeout,
            api,
            rust_log: vars
                .optional("RUST_LOG")
                .or_else(|| vars.optional("LOG_LEVEL").map(|level| level.to_lowercase()))
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
        })
    }

    #[must_use]
    pub fn keycloak_config(&self) -> KeycloakConfig {
        KeycloakConfig {
            base_url: self.keycloak.url.clone(),
            realm: self.keycloak.realm.clone(),
            credentials: KeycloakCredentials {
                client_id: self.keycloak.client_id.clone(),
                client_secret: self.keycloak.client_secret.clone(),
            },
            timeout: self.http_timeout,
            tls_verify: true,
        }
    }

    #[must_use]
    pub fn scim_config(&self) -> ScimConfig {
        let credentials = match &self.scim.auth {
            ScimAuthSettings::Bearer(token) => ScimCredentials::Bearer {
                token: token.clone(),
            },
            ScimAuthSettings::OAuth2 {
                token_url,
                client_id,
                client_secret,
            } => ScimCredentials::OAuth2 {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                token_endpoint: token_url.clone(),
                scopes: Vec::new(),
            },
        };
        ScimConfig {
            base_url: self.scim.endpoint_url.clone(),
            credentials,
            timeout: self.http_timeout,
            tls_verify: self.scim.verify_ssl,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(&self.keycloak.realm)
            .with_filter(&self.sync.filter_attribute, &self.sync.filter_value)
            .with_deletes(self.sync.delete_users, self.sync.delete_groups)
    }

    /// Settings safe to expose: secrets are replaced by a marker.
    #[must_use]
    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            environment: self.environment,
            keycloak_url: self.keycloak.url.clone(),
            keycloak_realm: self.keycloak.realm.clone(),
            keycloak_client_id: self.keycloak.client_id.clone(),
            keycloak_client_secret: REDACTED,
            scim_endpoint_url: self.scim.endpoint_url.clone(),
            scim_auth: match self.scim.auth {
                ScimAuthSettings::Bearer(_) => "bearer",
                ScimAuthSettings::OAuth2 { .. } => "oauth2",
            },
            scim_verify_ssl: self.scim.verify_ssl,
            sync_filter_attribute: self.sync.filter_attribute.clone(),
            sync_filter_value: self.sync.filter_value.clone(),
            sync_interval_minutes: self.sync.interval_minutes,
            sync_enabled: self.sync.enabled,
            sync_delete_users: self.sync.delete_users,
            sync_delete_groups: self.sync.delete_groups,
            http_timeout_secs: self.http_timeout.as_secs(),
            api_host: self.api.host.clone(),
            api_port: self.api.port,
            api_prefix: self.api.prefix.clone(),
        }
    }
}

const REDACTED: &str = "[REDACTED]";

/// Serializable view returned by the debug config route.
#[derive(Debug, Clone, Serialize)]
pub struct RedactedConfig {
    pub environment: AppEnvironment,
    pub keycloak_url: String,
    pub keycloak_realm: String,
    pub keycloak_client_id: String,
    pub keycloak_client_secret: &'static str,
    pub scim_endpoint_url: String,
    pub scim_auth: &'static str,
    pub scim_verify_ssl: bool,
    pub sync_filter_attribute: String,
    pub sync_filter_value: String,
    pub sync_interval_minutes: u64,
    pub sync_enabled: bool,
    pub sync_delete_users: bool,
    pub sync_delete_groups: bool,
    pub http_timeout_secs: u64,
    pub api_host: String,
    pub api_port: u16,
    pub api_prefix: String,
}

fn scim_auth<F: Fn(&str) -> Option<String>>(
    vars: &Vars<F>,
) -> Result<ScimAuthSettings, ConfigError> {
    let bearer = vars.optional("SCIM_BEARER_TOKEN");
    let token_url = vars.optional("SCIM_OAUTH_TOKEN_URL");

    match (bearer, token_url) {
        (Some(_), Some(_)) => Err(ConfigError::invalid(
            "SCIM_BEARER_TOKEN",
            "set either a bearer token or SCIM_OAUTH_* variables, not both",
        )),
        (Some(token), None) => Ok(ScimAuthSettings::Bearer(token.into())),
        (None, Some(_)) => Ok(ScimAuthSettings::OAuth2 {
            token_url: vars.url("SCIM_OAUTH_TOKEN_URL")?.to_string(),
            client_id: vars.required("SCIM_OAUTH_CLIENT_ID")?,
            client_secret: vars.required("SCIM_OAUTH_CLIENT_SECRET")?.into(),
        }),
        (None, None) => Err(ConfigError::MissingVar(
            "SCIM_BEARER_TOKEN (or SCIM_OAUTH_TOKEN_URL)".into(),
        )),
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// Set and not blank.
    fn optional(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
    }

    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let value = self.required(key)?;
        Url::parse(&value).map_err(|e| ConfigError::invalid(key, format!("{value:?}: {e}")))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(key, format!("{value:?} is not a boolean"))),
            },
        }
    }

    fn number(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::invalid(key, format!("{value:?}: {e}"))),
        }
    }
}
