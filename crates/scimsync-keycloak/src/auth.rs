//! OAuth2 client credentials against the realm token endpoint.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{KeycloakError, KeycloakResult};

/// Service-account credentials of the Keycloak client.
#[derive(Debug, Clone)]
pub struct KeycloakCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Caches the service-account access token until shortly before expiry.
#[derive(Debug)]
pub struct TokenCache {
    credentials: KeycloakCredentials,
    token_url: String,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    grace_period: Duration,
}

impl TokenCache {
    pub fn new(
        credentials: KeycloakCredentials,
        token_url: String,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            credentials,
            token_url,
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::seconds(30),
        }
    }

    /// A valid access token, requesting a new one when needed.
    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    pub async fn get_token(&self) -> KeycloakResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Requesting Keycloak access token");
        let token = self.acquire_token().await?;
        *self.cached_token.write().await = Some(token.clone());
        Ok(token.access_token)
    }

    async fn acquire_token(&self) -> KeycloakResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret(),
            ),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| KeycloakError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KeycloakError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| KeycloakError::Auth(format!("Failed to parse token response: {e}")))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    /// Drop the cached token so the next call requests a fresh one.
    pub async fn invalidate(&self) {
        *self.cached_token.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expires_within_grace_period() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + Duration::seconds(20),
        };
        assert!(token.is_expired(Duration::seconds(30)));
        assert!(!token.is_expired(Duration::seconds(5)));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = KeycloakCredentials {
            client_id: "scimsync".into(),
            client_secret: SecretString::from("hunter2".to_string()),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("scimsync"));
        assert!(!debug.contains("hunter2"));
    }
}
