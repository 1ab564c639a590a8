//! `DestinationDirectory` backed by a SCIM 2.0 service provider.

use async_trait::async_trait;
use tracing::info;

use scimsync_engine::{
    ConnectionInfo, DestinationDirectory, DestinationGroup, DestinationUser, DirectoryResult,
};

use crate::client::ScimClient;
use crate::models::{ScimGroup, ScimUser};

#[async_trait]
impl DestinationDirectory for ScimClient {
    async fn list_all_users(&self) -> DirectoryResult<Vec<DestinationUser>> {
        let users = ScimClient::list_all_users(self).await?;
        Ok(users.into_iter().map(ScimUser::into_record).collect())
    }

    async fn create_user(&self, user: &DestinationUser) -> DirectoryResult<DestinationUser> {
        let created = ScimClient::create_user(self, &ScimUser::for_create(user)).await?;
        info!(user_name = %created.user_name, id = ?created.id, "Created SCIM user");
        Ok(created.into_record())
    }

    async fn update_user(
        &self,
        id: &str,
        user: &DestinationUser,
    ) -> DirectoryResult<DestinationUser> {
        let updated = self
            .replace_user(id, &ScimUser::for_replace(id, user))
            .await?;
        info!(user_name = %updated.user_name, id, "Updated SCIM user");
        Ok(updated.into_record())
    }

    async fn delete_user(&self, id: &str) -> DirectoryResult<()> {
        ScimClient::delete_user(self, id).await?;
        info!(id, "Deleted SCIM user");
        Ok(())
    }

    async fn list_all_groups(&self) -> DirectoryResult<Vec<DestinationGroup>> {
        let groups = ScimClient::list_all_groups(self).await?;
        Ok(groups.into_iter().map(ScimGroup::into_record).collect())
    }

    async fn create_group(&self, group: &DestinationGroup) -> DirectoryResult<DestinationGroup> {
        let created = ScimClient::create_group(self, &ScimGroup::for_create(group)).await?;
        info!(display_name = %created.display_name, id = ?created.id, "Created SCIM group");
        Ok(created.into_record())
    }

    async fn replace_group_members(
        &self,
        group_id: &str,
        member_ids: &[String],
    ) -> DirectoryResult<()> {
        ScimClient::replace_group_members(self, group_id, member_ids).await?;
        info!(group_id, members = member_ids.len(), "Replaced SCIM group members");
        Ok(())
    }

    async fn delete_group(&self, id: &str) -> DirectoryResult<()> {
        ScimClient::delete_group(self, id).await?;
        info!(id, "Deleted SCIM group");
        Ok(())
    }

    async fn test_connection(&self) -> DirectoryResult<ConnectionInfo> {
        let page = self.list_users_page(1, 1).await?;
        Ok(ConnectionInfo {
            endpoint: self.base_url().to_string(),
            total_users: Some(page.total_results),
        })
    }
}
