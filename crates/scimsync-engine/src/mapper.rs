//! Identity mapping between the source and destination directories.
//!
//! Group correlation is by canonical display name; user correlation is by
//! the external id pinned at creation time.

use std::collections::HashMap;

use crate::model::{DestinationUser, SourceGroup, SourceUser};

/// Parent name used when a subgroup has no recorded top-level group.
pub const UNKNOWN_PARENT: &str = "unknown";

/// Build the destination display name for a synced subgroup.
#[must_use]
pub fn canonical_group_name(realm: &str, parent: Option<&str>, sub: &str) -> String {
    format!("{realm}-{}-{sub}", parent.unwrap_or(UNKNOWN_PARENT))
}

/// Display name of `subgroup` given the subgroup → top-level map.
#[must_use]
pub fn group_name_for(
    realm: &str,
    subgroup: &SourceGroup,
    parents: &HashMap<String, SourceGroup>,
) -> String {
    let parent = parents.get(&subgroup.id).map(|p| p.name.as_str());
    canonical_group_name(realm, parent, &subgroup.name)
}

/// Prefix shared by every group this realm owns on the destination.
#[must_use]
pub fn owned_group_prefix(realm: &str) -> String {
    format!("{realm}-")
}

/// Whether a destination group name belongs to `realm`.
#[must_use]
pub fn is_owned_group(realm: &str, display_name: &str) -> bool {
    display_name.starts_with(&owned_group_prefix(realm))
}

/// Map a source user onto the destination representation.
///
/// The returned record carries no destination id.
#[must_use]
pub fn to_destination_user(user: &SourceUser) -> DestinationUser {
    let given = user.first_name.clone().unwrap_or_default();
    let family = user.last_name.clone().unwrap_or_default();
    let full_name = format!("{given} {family}");
    let display_name = match full_name.trim() {
        "" => user.username.clone(),
        name => name.to_string(),
    };

    DestinationUser {
        id: None,
        external_id: Some(user.id.clone()),
        username: user.username.clone(),
        display_name,
        given_name: Some(given),
        family_name: Some(family),
        active: user.enabled,
        emails: user
            .email
            .iter()
            .filter(|e| !e.is_empty())
            .cloned()
            .collect(),
    }
}

/// Destination users keyed by external id.
///
/// Users without an external id or without a destination id are left out:
/// they cannot be a membership target.
#[derive(Debug, Default, Clone)]
pub struct ExternalIdIndex {
    by_external_id: HashMap<String, String>,
}

impl ExternalIdIndex {
    #[must_use]
    pub fn build(users: &[DestinationUser]) -> Self {
        let by_external_id = users
            .iter()
            .filter_map(|u| Some((u.external_id.clone()?, u.id.clone()?)))
            .collect();
        Self { by_external_id }
    }

    /// Destination id of the user created for `source_id`.
    #[must_use]
    pub fn destination_id(&self, source_id: &str) -> Option<&str> {
        self.by_external_id.get(source_id).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_external_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_external_id.is_empty()
    }
}
