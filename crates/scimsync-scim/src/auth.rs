//! Destination authentication: static bearer token or OAuth2 client
//! credentials.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{ScimClientError, ScimClientResult};

/// Tokens are dropped this long before the provider says they expire.
const EARLY_EXPIRY: Duration = Duration::from_secs(30);

/// How the client authenticates against the service provider.
#[derive(Debug, Clone)]
pub enum ScimCredentials {
    Bearer { token: SecretString },

    OAuth2 {
        client_id: String,
        client_secret: SecretString,
        token_endpoint: String,
        scopes: Vec<String>,
    },
}

impl ScimCredentials {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bearer { .. } => "bearer",
            Self::OAuth2 { .. } => "oauth2",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Attaches credentials to outgoing requests, caching OAuth2 tokens.
#[derive(Debug, Clone)]
pub struct ScimAuth {
    credentials: ScimCredentials,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    http_client: reqwest::Client,
}

impl ScimAuth {
    #[must_use]
    pub fn new(credentials: ScimCredentials, http_client: reqwest::Client) -> Self {
        Self {
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &ScimCredentials {
        &self.credentials
    }

    /// The bearer token for the next request, fetching a new OAuth2 token
    /// when the cached one is missing or stale.
    #[instrument(skip(self), fields(kind = self.credentials.kind()))]
    pub async fn bearer_token(&self) -> ScimClientResult<String> {
        let (client_id, client_secret, token_endpoint, scopes) = match &self.credentials {
            ScimCredentials::Bearer { token } => return Ok(token.expose_secret().to_string()),
            ScimCredentials::OAuth2 {
                client_id,
                client_secret,
                token_endpoint,
                scopes,
            } => (client_id, client_secret, token_endpoint, scopes),
        };

        if let Some(cached) = self.cached_token.read().await.as_ref() {
            if !cached.is_expired() {
                return Ok(cached.access_token.clone());
            }
        }

        debug!(token_endpoint = %token_endpoint, "Fetching SCIM access token");
        let scope = scopes.join(" ");
        let mut form = vec![("grant_type", "client_credentials")];
        if !scopes.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        let response = self
            .http_client
            .post(token_endpoint)
            .basic_auth(client_id, Some(client_secret.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| ScimClientError::AuthError(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScimClientError::AuthError(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ScimClientError::AuthError(format!("Failed to parse token response: {e}"))
        })?;

        let expires_at = token
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(EARLY_EXPIRY));

        *self.cached_token.write().await = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    pub async fn apply(&self, builder: RequestBuilder) -> ScimClientResult<RequestBuilder> {
        Ok(builder.bearer_auth(self.bearer_token().await?))
    }

    /// Forget the cached OAuth2 token after the provider rejected it.
    pub async fn invalidate_cache(&self) {
        *self.cached_token.write().await = None;
    }
}
