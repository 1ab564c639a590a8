//! SCIM 2.0 wire resources and their mapping to engine records.

use serde::{Deserialize, Serialize};

use scimsync_engine::{DestinationGroup, DestinationUser};

pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";
/// vCenter user extension carrying the login domain.
pub const WS1B_USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:extension:ws1b:2.0:User";

fn default_true() -> bool {
    true
}

/// SCIM User resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    #[serde(
        rename = "urn:ietf:params:scim:schemas:extension:ws1b:2.0:User",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ws1b: Option<Ws1bUserExtension>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimEmail {
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ws1bUserExtension {
    #[serde(default)]
    pub domain: String,
}

/// SCIM Group resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub members: Vec<ScimMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimMember {
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ScimMember {
    #[must_use]
    pub fn user(id: &str) -> Self {
        Self {
            value: id.to_string(),
            kind: Some("User".into()),
            display: None,
        }
    }
}

/// Paged list envelope (RFC 7644 §3.4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub start_index: Option<u64>,
    #[serde(default)]
    pub items_per_page: Option<u64>,
    #[serde(rename = "Resources", default = "Vec::new")]
    pub resources: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimPatchOp {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimPatchRequest {
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOp>,
}

impl ScimPatchRequest {
    /// Replace the whole member list of a group.
    #[must_use]
    pub fn replace_members(member_ids: &[String]) -> Self {
        let members = member_ids
            .iter()
            .map(|id| serde_json::json!({"value": id, "type": "User"}))
            .collect();
        Self {
            schemas: vec![PATCH_OP_SCHEMA.to_string()],
            operations: vec![ScimPatchOp {
                op: "replace".into(),
                path: Some("members".into()),
                value: Some(serde_json::Value::Array(members)),
            }],
        }
    }
}

impl ScimUser {
    /// Payload for `POST /Users`.
    #[must_use]
    pub fn for_create(user: &DestinationUser) -> Self {
        Self {
            external_id: user.external_id.clone(),
            ..Self::from_record(user)
        }
    }

    /// Payload for `PUT /Users/{id}`. The external id is immutable once set
    /// and is left out.
    #[must_use]
    pub fn for_replace(id: &str, user: &DestinationUser) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::from_record(user)
        }
    }

    fn from_record(user: &DestinationUser) -> Self {
        let domain = user
            .emails
            .first()
            .and_then(|email| email.split_once('@'))
            .map(|(_, domain)| domain.to_string())
            .unwrap_or_default();

        Self {
            schemas: vec![USER_SCHEMA.to_string(), WS1B_USER_SCHEMA.to_string()],
            id: None,
            external_id: None,
            user_name: user.username.clone(),
            name: Some(ScimName {
                given_name: user.given_name.clone(),
                family_name: user.family_name.clone(),
            }),
            display_name: Some(user.display_name.clone()),
            active: user.active,
            emails: user
                .emails
                .iter()
                .enumerate()
                .map(|(i, value)| ScimEmail {
                    value: value.clone(),
                    kind: Some("work".into()),
                    primary: i == 0,
                })
                .collect(),
            ws1b: Some(Ws1bUserExtension { domain }),
        }
    }

    /// Engine view of a listed user. The primary address comes first.
    #[must_use]
    pub fn into_record(self) -> DestinationUser {
        let (given_name, family_name) = match self.name {
            Some(name) => (name.given_name, name.family_name),
            None => (None, None),
        };
        let mut emails = self.emails;
        emails.sort_by_key(|email| !email.primary);

        DestinationUser {
            id: self.id,
            external_id: self.external_id,
            username: self.user_name,
            display_name: self.display_name.unwrap_or_default(),
            given_name,
            family_name,
            active: self.active,
            emails: emails.into_iter().map(|email| email.value).collect(),
        }
    }
}

impl ScimGroup {
    /// Payload for `POST /Groups`.
    #[must_use]
    pub fn for_create(group: &DestinationGroup) -> Self {
        Self {
            schemas: vec![GROUP_SCHEMA.to_string()],
            id: None,
            display_name: group.display_name.clone(),
            members: group.members.iter().map(|id| ScimMember::user(id)).collect(),
        }
    }

    #[must_use]
    pub fn into_record(self) -> DestinationGroup {
        DestinationGroup {
            id: self.id,
            display_name: self.display_name,
            members: self.members.into_iter().map(|m| m.value).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bob() -> DestinationUser {
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

    #[test]
    fn test_create_payload_shape() {
        let value = serde_json::to_value(ScimUser::for_create(&bob())).unwrap();

        assert_eq!(
            value,
            json!({
                "schemas": [USER_SCHEMA, WS1B_USER_SCHEMA],
                "externalId": "kc-bob",
                "userName": "bob",
                "name": {"givenName": "Bob", "familyName": "Builder"},
                "displayName": "Bob Builder",
                "active": true,
                "emails": [{"value": "bob@corp.example.com", "type": "work", "primary": true}],
                "urn:ietf:params:scim:schemas:extension:ws1b:2.0:User": {"domain": "corp.example.com"}
            })
        );
    }

    #[test]
    fn test_replace_payload_omits_external_id() {
        let value = serde_json::to_value(ScimUser::for_replace("d-7", &bob())).unwrap();

        assert_eq!(value["id"], "d-7");
        assert!(value.get("externalId").is_none());
    }

    #[test]
    fn test_domain_is_empty_without_email() {
        let mut user = bob();
        user.emails.clear();
        let scim = ScimUser::for_create(&user);

        assert_eq!(scim.ws1b, Some(Ws1bUserExtension::default()));
        assert!(scim.emails.is_empty());
    }

    #[test]
    fn test_listed_user_maps_to_record() {
        let scim: ScimUser = serde_json::from_value(json!({
            "id": "d-1",
            "externalId": "kc-bob",
            "userName": "bob",
            "name": {"givenName": "Bob"},
            "emails": [
                {"value": "b@home.example", "primary": false},
                {"value": "bob@corp.example.com", "primary": true}
            ],
            "meta": {"resourceType": "User"}
        }))
        .unwrap();
        let record = scim.into_record();

        assert_eq!(record.id.as_deref(), Some("d-1"));
        assert_eq!(record.display_name, "");
        assert_eq!(record.family_name, None);
        assert!(record.active);
        assert_eq!(record.emails, vec!["bob@corp.example.com", "b@home.example"]);
    }

    #[test]
    fn test_replace_members_patch() {
        let patch = ScimPatchRequest::replace_members(&["d-1".into(), "d-2".into()]);

        assert_eq!(
            serde_json::to_value(patch).unwrap(),
            json!({
                "schemas": [PATCH_OP_SCHEMA],
                "Operations": [{
                    "op": "replace",
                    "path": "members",
                    "value": [
                        {"value": "d-1", "type": "User"},
                        {"value": "d-2", "type": "User"}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_list_response_tolerates_missing_resources() {
        let list: ScimListResponse<ScimGroup> =
            serde_json::from_value(json!({"totalResults": 0})).unwrap();
        assert!(list.resources.is_empty());
    }
}
