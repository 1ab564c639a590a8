//! Directory records exchanged between the adapters and the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Group as read from the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    /// Source-assigned identifier.
    pub id: String,
    /// Short group name.
    pub name: String,
    /// Hierarchical path (e.g. `/eng/admins`).
    pub path: String,
    /// Multi-valued attributes.
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
    /// Number of direct children reported by the source.
    #[serde(default)]
    pub sub_group_count: u32,
}

impl SourceGroup {
    /// Whether `attribute` carries `value` among its values.
    #[must_use]
    pub fn has_attribute_value(&self, attribute: &str, value: &str) -> bool {
        self.attributes
            .get(attribute)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }
}

/// User as read from the source directory. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUser {
    /// Source-assigned identifier; becomes the destination external id.
    pub id: String,
    /// Username, unique within the source.
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub enabled: bool,
}

/// User resource on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationUser {
    /// Destination-assigned identifier, `None` before creation.
    pub id: Option<String>,
    /// Source user id pinned at creation.
    pub external_id: Option<String>,
    pub username: String,
    pub display_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl DestinationUser {
    /// Whether the attributes the engine manages differ from `other`.
    ///
    /// Identifiers are not compared: `id` is destination-owned and
    /// `external_id` is immutable after creation.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.username != other.username
            || self.display_name != other.display_name
            || self.given_name.as_deref().unwrap_or_default()
                != other.given_name.as_deref().unwrap_or_default()
            || self.family_name.as_deref().unwrap_or_default()
                != other.family_name.as_deref().unwrap_or_default()
            || self.active != other.active
            || self.emails != other.emails
    }
}

/// Group resource on the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationGroup {
    /// Destination-assigned identifier, `None` before creation.
    pub id: Option<String>,
    /// Canonical display name; the only group correlation key.
    pub display_name: String,
    /// Destination user ids.
    #[serde(default)]
    pub members: Vec<String>,
}

/// Result of a destination connection check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Endpoint that was contacted.
    pub endpoint: String,
    /// Total users reported by the destination, when it says.
    pub total_users: Option<u64>,
}
