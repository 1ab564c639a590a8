//! Outcome of reconciliation runs and previews.

use serde::{Deserialize, Serialize};

use crate::model::SourceUser;

/// Counters and errors of one reconciliation phase or run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub users_created: u32,
    pub users_updated: u32,
    pub users_deleted: u32,
    /// Users skipped because their username is held by another identity.
    pub users_skipped: u32,
    pub groups_created: u32,
    pub groups_deleted: u32,
    /// Successful membership replacements. Not counted as changes.
    pub memberships_replaced: u32,
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Fold another phase's outcome into this one.
    pub fn merge(&mut self, other: SyncResult) {
        self.users_created += other.users_created;
        self.users_updated += other.users_updated;
        self.users_deleted += other.users_deleted;
        self.users_skipped += other.users_skipped;
        self.groups_created += other.groups_created;
        self.groups_deleted += other.groups_deleted;
        self.memberships_replaced += other.memberships_replaced;
        self.errors.extend(other.errors);
    }

    /// Number of creates, updates and deletes.
    #[must_use]
    pub fn change_count(&self) -> u32 {
        self.users_created
            + self.users_updated
            + self.users_deleted
            + self.groups_created
            + self.groups_deleted
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// User entry of a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewUser {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub enabled: bool,
}

/// Destination record a run would delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewDeletion {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Synced group entry of a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewGroup {
    pub name: String,
    pub path: String,
    pub destination_name: String,
    /// Whether the destination group does not exist yet.
    pub create: bool,
}

/// Counts attached to a preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewSummary {
    pub filter_value: Option<String>,
    pub filtered_users: usize,
    pub destination_users: usize,
    pub filtered_groups: usize,
    pub destination_groups: usize,
    pub delete_users_enabled: bool,
    pub delete_groups_enabled: bool,
}

/// What the next full run would do. Built without any write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPreview {
    pub users_to_create: Vec<PreviewUser>,
    pub users_to_update: Vec<PreviewUser>,
    /// Users skipped as identity conflicts.
    pub users_conflicting: Vec<PreviewUser>,
    /// Empty when user deletion is disabled.
    pub users_to_delete: Vec<PreviewDeletion>,
    pub groups_to_sync: Vec<PreviewGroup>,
    /// Empty when group deletion is disabled.
    pub groups_to_delete: Vec<PreviewDeletion>,
    pub summary: PreviewSummary,
}

/// A synced subgroup with its source members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDetail {
    pub source_id: String,
    pub source_name: String,
    pub source_path: String,
    pub parent: Option<String>,
    pub destination_name: String,
    pub members: Vec<PreviewUser>,
}

/// An eligible user with the synced groups it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: PreviewUser,
    /// Planned action: `create`, `update`, `unchanged` or `conflict`.
    pub action: String,
    /// Destination names of the synced groups listing this user.
    pub groups: Vec<String>,
}

impl From<&SourceUser> for PreviewUser {
    fn from(user: &SourceUser) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            enabled: user.enabled,
        }
    }
}
