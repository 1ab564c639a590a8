//! Keycloak admin API representations.

use serde::Deserialize;
use std::collections::HashMap;

use scimsync_engine::{SourceGroup, SourceUser};

/// `UserRepresentation` subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// `GroupRepresentation` subset. `sub_groups` is only populated by some
/// Keycloak versions and list modes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub attributes: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub sub_group_count: Option<u32>,
    #[serde(default)]
    pub sub_groups: Vec<KeycloakGroup>,
}

impl KeycloakGroup {
    /// This group followed by every nested group, depth first.
    #[must_use]
    pub fn flatten(self) -> Vec<KeycloakGroup> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(mut group) = stack.pop() {
            let children = std::mem::take(&mut group.sub_groups);
            if group.sub_group_count.is_none() {
                group.sub_group_count = u32::try_from(children.len()).ok();
            }
            out.push(group);
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

impl From<KeycloakUser> for SourceUser {
    fn from(user: KeycloakUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            enabled: user.enabled,
        }
    }
}

impl From<KeycloakGroup> for SourceGroup {
    fn from(group: KeycloakGroup) -> Self {
        let sub_group_count = group.sub_group_count.unwrap_or_else(|| {
            u32::try_from(group.sub_groups.len()).unwrap_or(u32::MAX)
        });
        Self {
            id: group.id,
            name: group.name,
            path: group.path,
            attributes: group.attributes.unwrap_or_default(),
            sub_group_count,
        }
    }
}
