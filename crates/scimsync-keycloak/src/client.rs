//! Keycloak admin REST client.

use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{KeycloakCredentials, TokenCache};
use crate::error::{KeycloakError, KeycloakResult};
use crate::models::{KeycloakGroup, KeycloakUser};

/// Page size requested from list endpoints.
const LIST_MAX: &str = "10000";

/// Connection settings for one realm.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Server root, e.g. `https://sso.example.com`.
    pub base_url: String,
    pub realm: String,
    pub credentials: KeycloakCredentials,
    pub timeout: Duration,
    pub tls_verify: bool,
}

/// Client for the admin API of one realm.
#[derive(Debug)]
pub struct KeycloakClient {
    http_client: reqwest::Client,
    admin_url: String,
    tokens: TokenCache,
}

impl KeycloakClient {
    /// Build a client from `config`.
    pub fn new(config: KeycloakConfig) -> KeycloakResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| KeycloakError::Config(format!("Failed to create HTTP client: {e}")))?;
        Self::with_http_client(config, http_client)
    }

    /// Build a client reusing an existing `reqwest::Client`.
    pub fn with_http_client(
        config: KeycloakConfig,
        http_client: reqwest::Client,
    ) -> KeycloakResult<Self> {
        let base = Url::parse(&config.base_url)?;
        if config.realm.trim().is_empty() {
            return Err(KeycloakError::Config("realm must not be empty".into()));
        }
        let root = base.as_str().trim_end_matches('/');
        let token_url = format!("{root}/realms/{}/protocol/openid-connect/token", config.realm);
        let admin_url = format!("{root}/admin/realms/{}", config.realm);

        Ok(Self {
            tokens: TokenCache::new(config.credentials, token_url, http_client.clone()),
            http_client,
            admin_url,
        })
    }

    #[must_use]
    pub fn admin_url(&self) -> &str {
        &self.admin_url
    }

    /// Every group of the realm, nested groups flattened.
    #[instrument(skip(self))]
    pub async fn list_groups(&self) -> KeycloakResult<Vec<KeycloakGroup>> {
        let groups: Vec<KeycloakGroup> = self
            .get_json(
                "/groups",
                &[("max", LIST_MAX), ("briefRepresentation", "false")],
            )
            .await?;
        Ok(groups.into_iter().flat_map(KeycloakGroup::flatten).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_group(&self, group_id: &str) -> KeycloakResult<KeycloakGroup> {
        self.get_json(&format!("/groups/{group_id}"), &[]).await
    }

    /// Direct children of a group.
    ///
    /// Servers without the `children` endpoint embed them in the group itself.
    #[instrument(skip(self))]
    pub async fn list_children(&self, group_id: &str) -> KeycloakResult<Vec<KeycloakGroup>> {
        match self
            .get_json(
                &format!("/groups/{group_id}/children"),
                &[("max", LIST_MAX), ("briefRepresentation", "false")],
            )
            .await
        {
            Err(KeycloakError::NotFound(_)) => {
                debug!(group_id, "No children endpoint, reading embedded subgroups");
                Ok(self.get_group(group_id).await?.sub_groups)
            }
            other => other,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, group_id: &str) -> KeycloakResult<Vec<KeycloakUser>> {
        self.get_json(&format!("/groups/{group_id}/members"), &[("max", LIST_MAX)])
            .await
    }

    #[instrument(skip(self))]
    pub async fn user_groups(&self, user_id: &str) -> KeycloakResult<Vec<KeycloakGroup>> {
        self.get_json(&format!("/users/{user_id}/groups"), &[]).await
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> KeycloakResult<Vec<KeycloakUser>> {
        self.get_json("/users", &[("max", LIST_MAX)]).await
    }

    /// GET an admin resource. A 401 drops the cached token and the request
    /// is retried once with a fresh one.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> KeycloakResult<T> {
        let url = format!("{}{path}", self.admin_url);
        let mut retried = false;
        loop {
            let token = self.tokens.get_token().await?;
            debug!(url = %url, "Keycloak GET");
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED && !retried {
                warn!(url = %url, "Keycloak rejected token, refreshing");
                self.tokens.invalidate().await;
                retried = true;
                continue;
            }
            if status.is_success() {
                return Ok(response.json().await?);
            }

            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => KeycloakError::Auth(format!("{status} for {path}: {body}")),
                404 => KeycloakError::NotFound(path.to_string()),
                code => KeycloakError::Api {
                    status: code,
                    message: body,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(base_url: &str, realm: &str) -> KeycloakConfig {
        KeycloakConfig {
            base_url: base_url.into(),
            realm: realm.into(),
            credentials: KeycloakCredentials {
                client_id: "scimsync".into(),
                client_secret: SecretString::from("secret".to_string()),
            },
            timeout: Duration::from_secs(5),
            tls_verify: true,
        }
    }

    #[test]
    fn test_admin_url_strips_trailing_slash() {
        let client = KeycloakClient::new(config("https://sso.example.com/", "corp")).unwrap();
        assert_eq!(client.admin_url(), "https://sso.example.com/admin/realms/corp");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = KeycloakClient::new(config("not a url", "corp")).unwrap_err();
        assert!(matches!(err, KeycloakError::Url(_)));
    }

    #[test]
    fn test_rejects_empty_realm() {
        let err = KeycloakClient::new(config("https://sso.example.com", "")).unwrap_err();
        assert!(matches!(err, KeycloakError::Config(_)));
    }
}
