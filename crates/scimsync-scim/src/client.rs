//! SCIM 2.0 HTTP client.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{ScimAuth, ScimCredentials};
use crate::error::{ScimClientError, ScimClientResult};
use crate::models::{ScimGroup, ScimListResponse, ScimPatchRequest, ScimUser};
use crate::retry::RetryPolicy;

const SCIM_CONTENT_TYPE: &str = "application/scim+json";

/// Resources requested per list page.
pub const PAGE_SIZE: u64 = 100;

/// Listing stops once this many resources have been collected.
pub const MAX_RESOURCES: usize = 50_000;

/// Connection settings for a SCIM service provider.
#[derive(Debug, Clone)]
pub struct ScimConfig {
    /// Base URL including the SCIM root, e.g. `https://vc.example.com/scim/v2`.
    pub base_url: String,
    pub credentials: ScimCredentials,
    pub timeout: Duration,
    pub tls_verify: bool,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct ScimClient {
    base_url: String,
    auth: ScimAuth,
    http_client: Client,
    retry: RetryPolicy,
}

impl ScimClient {
    pub fn new(config: ScimConfig) -> ScimClientResult<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            ScimClientError::InvalidConfig(format!("Invalid SCIM URL {}: {e}", config.base_url))
        })?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .user_agent(concat!("scimsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ScimClientError::InvalidConfig(format!("Failed to build HTTP client: {e}"))
            })?;

        let auth = ScimAuth::new(config.credentials, http_client.clone());
        Ok(Self::with_http_client(config.base_url, auth, http_client).with_retry_policy(config.retry))
    }

    /// Build a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(base_url: String, auth: ScimAuth, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            http_client,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Users ─────────────────────────────────────────────────────────

    #[instrument(skip(self, user), fields(user_name = %user.user_name))]
    pub async fn create_user(&self, user: &ScimUser) -> ScimClientResult<ScimUser> {
        let url = format!("{}/Users", self.base_url);
        self.call("create user", Method::POST, &url, &[], Some(user))
            .await
    }

    #[instrument(skip(self, user), fields(user_name = %user.user_name))]
    pub async fn replace_user(&self, id: &str, user: &ScimUser) -> ScimClientResult<ScimUser> {
        let url = format!("{}/Users/{id}", self.base_url);
        self.call("replace user", Method::PUT, &url, &[], Some(user))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> ScimClientResult<()> {
        let url = format!("{}/Users/{id}", self.base_url);
        self.call_no_content("delete user", Method::DELETE, &url, None::<&()>)
            .await
    }

    /// One page of users; `start_index` is 1-based.
    pub async fn list_users_page(
        &self,
        start_index: u64,
        count: u64,
    ) -> ScimClientResult<ScimListResponse<ScimUser>> {
        self.list_page("Users", start_index, count).await
    }

    #[instrument(skip(self))]
    pub async fn list_all_users(&self) -> ScimClientResult<Vec<ScimUser>> {
        self.list_all("Users").await
    }

    // ── Groups ────────────────────────────────────────────────────────

    #[instrument(skip(self, group), fields(display_name = %group.display_name))]
    pub async fn create_group(&self, group: &ScimGroup) -> ScimClientResult<ScimGroup> {
        let url = format!("{}/Groups", self.base_url);
        self.call("create group", Method::POST, &url, &[], Some(group))
            .await
    }

    /// Set the exact member list of a group with a single `replace` PATCH.
    #[instrument(skip(self, member_ids), fields(members = member_ids.len()))]
    pub async fn replace_group_members(
        &self,
        group_id: &str,
        member_ids: &[String],
    ) -> ScimClientResult<()> {
        let url = format!("{}/Groups/{group_id}", self.base_url);
        let patch = ScimPatchRequest::replace_members(member_ids);
        self.call_no_content("replace group members", Method::PATCH, &url, Some(&patch))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_group(&self, id: &str) -> ScimClientResult<()> {
        let url = format!("{}/Groups/{id}", self.base_url);
        self.call_no_content("delete group", Method::DELETE, &url, None::<&()>)
            .await
    }

    pub async fn list_groups_page(
        &self,
        start_index: u64,
        count: u64,
    ) -> ScimClientResult<ScimListResponse<ScimGroup>> {
        self.list_page("Groups", start_index, count).await
    }

    #[instrument(skip(self))]
    pub async fn list_all_groups(&self) -> ScimClientResult<Vec<ScimGroup>> {
        self.list_all("Groups").await
    }

    // ── Paging ────────────────────────────────────────────────────────

    async fn list_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        start_index: u64,
        count: u64,
    ) -> ScimClientResult<ScimListResponse<T>> {
        let url = format!("{}/{resource}", self.base_url);
        let query = [
            ("startIndex", start_index.to_string()),
            ("count", count.to_string()),
        ];
        self.call("list", Method::GET, &url, &query, None::<&()>)
            .await
    }

    /// Walk every page of `resource`.
    async fn list_all<T: DeserializeOwned>(&self, resource: &str) -> ScimClientResult<Vec<T>> {
        let mut resources = Vec::new();
        let mut start_index = 1;

        loop {
            let page: ScimListResponse<T> =
                self.list_page(resource, start_index, PAGE_SIZE).await?;
            let received = u64::try_from(page.resources.len()).unwrap_or(u64::MAX);
            resources.extend(page.resources);

            if resources.len() >= MAX_RESOURCES {
                warn!(resource, limit = MAX_RESOURCES, "SCIM listing truncated");
                resources.truncate(MAX_RESOURCES);
                break;
            }
            if received < PAGE_SIZE || start_index + received > page.total_results {
                break;
            }
            start_index += received;
        }

        debug!(resource, count = resources.len(), "Listed SCIM resources");
        Ok(resources)
    }

    // ── Transport ─────────────────────────────────────────────────────

    async fn call<T, B>(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> ScimClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let response = self
            .retry
            .execute(operation, || self.send(method.clone(), url, query, body))
            .await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ScimClientError::ParseError(format!("{operation}: {e}")))
    }

    async fn call_no_content<B>(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> ScimClientResult<()>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.retry
            .execute(operation, || self.send(method.clone(), url, &[], body))
            .await
            .map(drop)
    }

    /// Send one request. When the provider rejects an OAuth2 token, the
    /// cached token is dropped and the request is repeated once.
    async fn send<B>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> ScimClientResult<Response>
    where
        B: Serialize + Sync + ?Sized,
    {
        let refreshable = matches!(self.auth.credentials(), ScimCredentials::OAuth2 { .. });
        let mut refreshed = false;

        loop {
            let mut builder = self.http_client.request(method.clone(), url).query(query);
            if let Some(body) = body {
                builder = builder.header(CONTENT_TYPE, SCIM_CONTENT_TYPE).json(body);
            }
            let builder = self.auth.apply(builder).await?;

            debug!(method = %method, url, "SCIM request");
            let response = builder.send().await.map_err(|e| {
                if e.is_connect() {
                    ScimClientError::Unreachable(format!("{url}: {e}"))
                } else {
                    ScimClientError::Http(e)
                }
            })?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                self.auth.invalidate_cache().await;
                if refreshable && !refreshed {
                    warn!(url, "SCIM provider rejected token, refreshing");
                    refreshed = true;
                    continue;
                }
            }
            if status.is_success() {
                return Ok(response);
            }
            return Err(Self::error_from(response).await);
        }
    }

    async fn error_from(response: Response) -> ScimClientError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => ScimClientError::NotFound(body),
            StatusCode::CONFLICT => ScimClientError::Conflict(body),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(retry_after_secs = ?retry_after, "SCIM provider rate limited");
                ScimClientError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ScimClientError::AuthError(format!("{status}: {body}"))
            }
            _ => ScimClientError::ScimError {
                status: status.as_u16(),
                detail: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(base_url: &str) -> ScimConfig {
        ScimConfig {
            base_url: base_url.into(),
            credentials: ScimCredentials::Bearer {
                token: SecretString::from("t".to_string()),
            },
            timeout: Duration::from_secs(5),
            tls_verify: true,
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = ScimClient::new(config("https://vc.example.com/scim/v2/")).unwrap();
        assert_eq!(client.base_url(), "https://vc.example.com/scim/v2");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = ScimClient::new(config("vc.example.com")).unwrap_err();
        assert!(matches!(err, ScimClientError::InvalidConfig(_)));
    }
}
