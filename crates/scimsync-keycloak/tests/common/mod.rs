//! Shared fixtures for the Keycloak wiremock tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scimsync_keycloak::{KeycloakClient, KeycloakConfig, KeycloakCredentials};

pub const REALM: &str = "corp";
pub const TOKEN_PATH: &str = "/realms/corp/protocol/openid-connect/token";
pub const ADMIN: &str = "/admin/realms/corp";

pub fn client(server: &MockServer) -> KeycloakClient {
    KeycloakClient::new(KeycloakConfig {
        base_url: server.uri(),
        realm: REALM.into(),
        credentials: KeycloakCredentials {
            client_id: "scimsync".into(),
            client_secret: "secret".to_string().into(),
        },
        timeout: Duration::from_secs(5),
        tls_verify: true,
    })
    .unwrap()
}

/// Token endpoint handing out `token`, expected to be hit `times` times.
pub async fn mock_token(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": 300,
            "token_type": "Bearer"
        })))
        .expect(times)
        .mount(server)
        .await;
}

pub fn user(id: &str, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "firstName": "Test",
        "lastName": "User",
        "enabled": true
    })
}

pub fn group(id: &str, name: &str, attributes: Value, sub_group_count: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "path": format!("/{name}"),
        "attributes": attributes,
        "subGroupCount": sub_group_count
    })
}
