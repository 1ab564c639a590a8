//! Mock SCIM service provider fixtures.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::MockServer;

use scimsync_engine::DestinationUser;
use scimsync_scim::{RetryPolicy, ScimAuth, ScimClient, ScimCredentials};

pub const TOKEN: &str = "test-token-123";

pub fn bearer_client(server: &MockServer) -> ScimClient {
    let auth = ScimAuth::new(
        ScimCredentials::Bearer {
            token: TOKEN.to_string().into(),
        },
        reqwest::Client::new(),
    );
    ScimClient::with_http_client(server.uri(), auth, reqwest::Client::new())
        .with_retry_policy(RetryPolicy::none())
}

/// OAuth2 client whose token endpoint lives on the same mock server.
pub fn oauth_client(server: &MockServer) -> ScimClient {
    let auth = ScimAuth::new(
        ScimCredentials::OAuth2 {
            client_id: "scimsync".into(),
            client_secret: "secret".to_string().into(),
            token_endpoint: format!("{}/oauth/token", server.uri()),
            scopes: Vec::new(),
        },
        reqwest::Client::new(),
    );
    ScimClient::with_http_client(server.uri(), auth, reqwest::Client::new())
        .with_retry_policy(RetryPolicy::none())
}

/// Retries immediately, for exercising the backoff path without sleeping.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

pub fn scim_user(id: &str, user_name: &str, external_id: &str) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "id": id,
        "externalId": external_id,
        "userName": user_name,
        "name": {"givenName": "Test", "familyName": "User"},
        "displayName": "Test User",
        "active": true,
        "emails": [{"value": format!("{user_name}@corp.example.com"), "type": "work", "primary": true}]
    })
}

pub fn scim_group(id: &str, display_name: &str, members: &[&str]) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
        "id": id,
        "displayName": display_name,
        "members": members.iter().map(|m| json!({"value": m, "type": "User"})).collect::<Vec<_>>()
    })
}

pub fn list_response(total: u64, start_index: u64, resources: Vec<Value>) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
        "totalResults": total,
        "startIndex": start_index,
        "itemsPerPage": resources.len(),
        "Resources": resources
    })
}

pub fn bob() -> DestinationUser {
    DestinationUser {
        id: None,
        external_id: Some("kc-bob".into()),
        username: "bob".into(),
        display_name: "Bob Builder".into(),
        given_name: Some("Bob".into()),
        family_name: Some("Builder".into()),
        active: true,
        emails: vec!["bob@corp.example.com".into()],
    }
}
