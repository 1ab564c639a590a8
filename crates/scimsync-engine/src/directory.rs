//! Adapter traits for the two directories the engine reconciles.
//!
//! The source is read-only; the destination accepts the writes needed to
//! converge it towards the source.

use async_trait::async_trait;

use crate::error::DirectoryResult;
use crate::model::{ConnectionInfo, DestinationGroup, DestinationUser, SourceGroup, SourceUser};

/// Read access to the authoritative identity provider.
#[async_trait]
pub trait SourceDirectory: Send + Sync {
    /// List every group carrying `attribute` with `value`.
    ///
    /// Nested groups returned by the remote system are flattened, so the
    /// result may contain groups from any level. The engine re-checks the
    /// attribute match on whatever is returned.
    async fn list_top_level_groups_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<Vec<SourceGroup>>;

    /// List the direct children of a group.
    async fn list_subgroups(&self, group_id: &str) -> DirectoryResult<Vec<SourceGroup>>;

    /// List the direct members of a group.
    async fn list_group_members(&self, group_id: &str) -> DirectoryResult<Vec<SourceUser>>;

    /// List the groups a user belongs to.
    async fn list_user_groups(&self, user_id: &str) -> DirectoryResult<Vec<SourceGroup>>;

    /// List every group of the realm regardless of attributes, flattened.
    async fn list_all_groups(&self) -> DirectoryResult<Vec<SourceGroup>>;

    /// List every user of the realm.
    async fn list_all_users(&self) -> DirectoryResult<Vec<SourceUser>>;
}

/// Read/write access to the provisioning target.
#[async_trait]
pub trait DestinationDirectory: Send + Sync {
    /// List every user, paging transparently.
    async fn list_all_users(&self) -> DirectoryResult<Vec<DestinationUser>>;

    /// Create a user and return it with its destination id populated.
    async fn create_user(&self, user: &DestinationUser) -> DirectoryResult<DestinationUser>;

    /// Replace a user's mutable attributes. The external id is never sent.
    async fn update_user(
        &self,
        id: &str,
        user: &DestinationUser,
    ) -> DirectoryResult<DestinationUser>;

    async fn delete_user(&self, id: &str) -> DirectoryResult<()>;

    /// List every group, paging transparently.
    async fn list_all_groups(&self) -> DirectoryResult<Vec<DestinationGroup>>;

    /// Create a group and return it with its destination id populated.
    async fn create_group(&self, group: &DestinationGroup) -> DirectoryResult<DestinationGroup>;

    /// Replace the full member list of a group with `member_ids`.
    async fn replace_group_members(
        &self,
        group_id: &str,
        member_ids: &[String],
    ) -> DirectoryResult<()>;

    async fn delete_group(&self, id: &str) -> DirectoryResult<()>;

    /// Check that the destination answers.
    async fn test_connection(&self) -> DirectoryResult<ConnectionInfo>;
}
