//! `SourceDirectory` backed by the Keycloak admin API.

use async_trait::async_trait;
use tracing::{debug, info};

use scimsync_engine::{DirectoryResult, SourceDirectory, SourceGroup, SourceUser};

use crate::client::KeycloakClient;
use crate::error::KeycloakResult;
use crate::models::KeycloakGroup;

#[async_trait]
impl SourceDirectory for KeycloakClient {
    async fn list_top_level_groups_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<Vec<SourceGroup>> {
        let groups = self.list_groups().await?;
        let total = groups.len();

        let mut matched = Vec::new();
        for group in groups {
            let group = if group.attributes.is_some() {
                group
            } else {
                self.with_details(group).await?
            };
            let group = SourceGroup::from(group);
            if group.has_attribute_value(attribute, value) {
                debug!(group = %group.name, "Group matches filter");
                matched.push(group);
            }
        }

        info!(
            attribute,
            value,
            matched = matched.len(),
            total,
            "Filtered Keycloak groups"
        );
        Ok(matched)
    }

    async fn list_subgroups(&self, group_id: &str) -> DirectoryResult<Vec<SourceGroup>> {
        Ok(self
            .list_children(group_id)
            .await?
            .into_iter()
            .map(SourceGroup::from)
            .collect())
    }

    async fn list_group_members(&self, group_id: &str) -> DirectoryResult<Vec<SourceUser>> {
        Ok(self
            .list_members(group_id)
            .await?
            .into_iter()
            .map(SourceUser::from)
            .collect())
    }

    async fn list_user_groups(&self, user_id: &str) -> DirectoryResult<Vec<SourceGroup>> {
        Ok(self
            .user_groups(user_id)
            .await?
            .into_iter()
            .map(SourceGroup::from)
            .collect())
    }

    async fn list_all_groups(&self) -> DirectoryResult<Vec<SourceGroup>> {
        Ok(self
            .list_groups()
            .await?
            .into_iter()
            .map(SourceGroup::from)
            .collect())
    }

    async fn list_all_users(&self) -> DirectoryResult<Vec<SourceUser>> {
        Ok(self
            .list_users()
            .await?
            .into_iter()
            .map(SourceUser::from)
            .collect())
    }
}

impl KeycloakClient {
    /// Fill in attributes from the group's own resource, keeping the
    /// listing's subgroup count when the detail omits it.
    async fn with_details(&self, group: KeycloakGroup) -> KeycloakResult<KeycloakGroup> {
        let mut detailed = self.get_group(&group.id).await?;
        if detailed.sub_group_count.is_none() {
            detailed.sub_group_count = group.sub_group_count;
        }
        detailed.sub_groups.clear();
        Ok(detailed)
    }
}
