//! In-memory directories for tests.
//!
//! `InMemorySource` models a source that flattens nested groups when
//! searching by attribute. `InMemoryDestination` models a destination that
//! assigns ids, rejects duplicate usernames and counts every write.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::directory::{DestinationDirectory, SourceDirectory};
use crate::error::{DirectoryError, DirectoryResult};
use crate::model::{ConnectionInfo, DestinationGroup, DestinationUser, SourceGroup, SourceUser};

#[derive(Debug, Default)]
struct SourceState {
    groups: Vec<SourceGroup>,
    children: HashMap<String, Vec<String>>,
    users: Vec<SourceUser>,
    members: HashMap<String, Vec<String>>,
    failure: Option<DirectoryError>,
}

/// In-memory implementation of `SourceDirectory`.
#[derive(Debug, Default)]
pub struct InMemorySource {
    state: RwLock<SourceState>,
}

impl InMemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level group.
    pub fn add_group(&self, group: SourceGroup) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .groups
            .push(group);
    }

    /// Add `group` as a direct child of `parent_id`.
    pub fn add_subgroup(&self, parent_id: &str, group: SourceGroup) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = state.groups.iter_mut().find(|g| g.id == parent_id) {
            parent.sub_group_count += 1;
        }
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(group.id.clone());
        state.groups.push(group);
    }

    pub fn add_user(&self, user: SourceUser) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .users
            .push(user);
    }

    pub fn add_member(&self, group_id: &str, user_id: &str) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .members
            .entry(group_id.to_string())
            .or_default()
            .push(user_id.to_string());
    }

    pub fn remove_member(&self, group_id: &str, user_id: &str) {
        if let Some(members) = self
            .state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .members
            .get_mut(group_id)
        {
            members.retain(|m| m != user_id);
        }
    }

    /// Replace a stored user, keyed by id.
    pub fn update_user(&self, user: SourceUser) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = state.users.iter_mut().find(|u| u.id == user.id) {
            *existing = user;
        }
    }

    /// Make every subsequent call fail with `error`, or succeed again on `None`.
    pub fn set_failure(&self, error: Option<DirectoryError>) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).failure = error;
    }

    fn check(&self) -> DirectoryResult<()> {
        match &self.state.read().unwrap_or_else(|e| e.into_inner()).failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceDirectory for InMemorySource {
    async fn list_top_level_groups_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<Vec<SourceGroup>> {
        self.check()?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .groups
            .iter()
            .filter(|g| g.has_attribute_value(attribute, value))
            .cloned()
            .collect())
    }

    async fn list_subgroups(&self, group_id: &str) -> DirectoryResult<Vec<SourceGroup>> {
        self.check()?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let ids = state.children.get(group_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| state.groups.iter().find(|g| &g.id == id))
            .cloned()
            .collect())
    }

    async fn list_group_members(&self, group_id: &str) -> DirectoryResult<Vec<SourceUser>> {
        self.check()?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let ids = state.members.get(group_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.iter().find(|u| &u.id == id))
            .cloned()
            .collect())
    }

    async fn list_user_groups(&self, user_id: &str) -> DirectoryResult<Vec<SourceGroup>> {
        self.check()?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .groups
            .iter()
            .filter(|g| {
                state
                    .members
                    .get(&g.id)
                    .is_some_and(|m| m.iter().any(|id| id == user_id))
            })
            .cloned()
            .collect())
    }

    async fn list_all_groups(&self) -> DirectoryResult<Vec<SourceGroup>> {
        self.check()?;
        Ok(self
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .groups
            .clone())
    }

    async fn list_all_users(&self) -> DirectoryResult<Vec<SourceUser>> {
        self.check()?;
        Ok(self
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .users
            .clone())
    }
}

/// Write counters of an `InMemoryDestination`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DestinationCalls {
    pub create_user: usize,
    pub update_user: usize,
    pub delete_user: usize,
    pub create_group: usize,
    pub replace_members: usize,
    pub delete_group: usize,
}

impl DestinationCalls {
    /// Writes other than membership replacement.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.create_user
            + self.update_user
            + self.delete_user
            + self.create_group
            + self.delete_group
    }
}

#[derive(Debug, Default)]
struct DestinationState {
    users: Vec<DestinationUser>,
    groups: Vec<DestinationGroup>,
    next_id: u64,
    listing_failure: Option<DirectoryError>,
    /// Failures keyed by username or group display name.
    entity_failures: HashMap<String, DirectoryError>,
}

impl DestinationState {
    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn entity_failure(&self, name: &str) -> DirectoryResult<()> {
        match self.entity_failures.get(name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// In-memory implementation of `DestinationDirectory`.
#[derive(Debug, Default)]
pub struct InMemoryDestination {
    state: RwLock<DestinationState>,
    create_user_calls: AtomicUsize,
    update_user_calls: AtomicUsize,
    delete_user_calls: AtomicUsize,
    create_group_calls: AtomicUsize,
    replace_members_calls: AtomicUsize,
    delete_group_calls: AtomicUsize,
}

impl InMemoryDestination {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user; an id is assigned when missing. Returns the stored id.
    pub fn seed_user(&self, mut user: DestinationUser) -> String {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let id = match user.id.clone() {
            Some(id) => id,
            None => state.assign_id("user"),
        };
        user.id = Some(id.clone());
        state.users.push(user);
        id
    }

    /// Seed a group; an id is assigned when missing. Returns the stored id.
    pub fn seed_group(&self, mut group: DestinationGroup) -> String {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let id = match group.id.clone() {
            Some(id) => id,
            None => state.assign_id("group"),
        };
        group.id = Some(id.clone());
        state.groups.push(group);
        id
    }

    #[must_use]
    pub fn users(&self) -> Vec<DestinationUser> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .users
            .clone()
    }

    #[must_use]
    pub fn groups(&self) -> Vec<DestinationGroup> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .groups
            .clone()
    }

    #[must_use]
    pub fn user_by_username(&self, username: &str) -> Option<DestinationUser> {
        self.users().into_iter().find(|u| u.username == username)
    }

    #[must_use]
    pub fn group_by_name(&self, display_name: &str) -> Option<DestinationGroup> {
        self.groups()
            .into_iter()
            .find(|g| g.display_name == display_name)
    }

    /// Fail both listings with `error`, or succeed again on `None`.
    pub fn set_listing_failure(&self, error: Option<DirectoryError>) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .listing_failure = error;
    }

    /// Fail every write touching the user or group called `name`.
    pub fn fail_writes_for(&self, name: &str, error: DirectoryError) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entity_failures
            .insert(name.to_string(), error);
    }

    #[must_use]
    pub fn calls(&self) -> DestinationCalls {
        DestinationCalls {
            create_user: self.create_user_calls.load(Ordering::SeqCst),
            update_user: self.update_user_calls.load(Ordering::SeqCst),
            delete_user: self.delete_user_calls.load(Ordering::SeqCst),
            create_group: self.create_group_calls.load(Ordering::SeqCst),
            replace_members: self.replace_members_calls.load(Ordering::SeqCst),
            delete_group: self.delete_group_calls.load(Ordering::SeqCst),
        }
    }

    pub fn reset_calls(&self) {
        for counter in [
            &self.create_user_calls,
            &self.update_user_calls,
            &self.delete_user_calls,
            &self.create_group_calls,
            &self.replace_members_calls,
            &self.delete_group_calls,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn check_listing(&self) -> DirectoryResult<()> {
        match &self
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .listing_failure
        {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DestinationDirectory for InMemoryDestination {
    async fn list_all_users(&self) -> DirectoryResult<Vec<DestinationUser>> {
        self.check_listing()?;
        Ok(self.users())
    }

    async fn create_user(&self, user: &DestinationUser) -> DirectoryResult<DestinationUser> {
        self.create_user_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.entity_failure(&user.username)?;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(DirectoryError::Conflict(format!(
                "userName {} already exists",
                user.username
            )));
        }
        let mut created = user.clone();
        created.id = Some(state.assign_id("user"));
        state.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(
        &self,
        id: &str,
        user: &DestinationUser,
    ) -> DirectoryResult<DestinationUser> {
        self.update_user_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.entity_failure(&user.username)?;
        let existing = state
            .users
            .iter_mut()
            .find(|u| u.id.as_deref() == Some(id))
            .ok_or_else(|| DirectoryError::NotFound(format!("user {id}")))?;
        let external_id = existing.external_id.clone();
        *existing = user.clone();
        existing.id = Some(id.to_string());
        existing.external_id = external_id;
        Ok(existing.clone())
    }

    async fn delete_user(&self, id: &str) -> DirectoryResult<()> {
        self.delete_user_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let position = state
            .users
            .iter()
            .position(|u| u.id.as_deref() == Some(id))
            .ok_or_else(|| DirectoryError::NotFound(format!("user {id}")))?;
        state.entity_failure(&state.users[position].username)?;
        state.users.remove(position);
        for group in &mut state.groups {
            group.members.retain(|m| m != id);
        }
        Ok(())
    }

    async fn list_all_groups(&self) -> DirectoryResult<Vec<DestinationGroup>> {
        self.check_listing()?;
        Ok(self.groups())
    }

    async fn create_group(&self, group: &DestinationGroup) -> DirectoryResult<DestinationGroup> {
        self.create_group_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.entity_failure(&group.display_name)?;
        let mut created = group.clone();
        created.id = Some(state.assign_id("group"));
        state.groups.push(created.clone());
        Ok(created)
    }

    async fn replace_group_members(
        &self,
        group_id: &str,
        member_ids: &[String],
    ) -> DirectoryResult<()> {
        self.replace_members_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let position = state
            .groups
            .iter()
            .position(|g| g.id.as_deref() == Some(group_id))
            .ok_or_else(|| DirectoryError::NotFound(format!("group {group_id}")))?;
        state.entity_failure(&state.groups[position].display_name)?;
        state.groups[position].members = member_ids.to_vec();
        Ok(())
    }

    async fn delete_group(&self, id: &str) -> DirectoryResult<()> {
        self.delete_group_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let position = state
            .groups
            .iter()
            .position(|g| g.id.as_deref() == Some(id))
            .ok_or_else(|| DirectoryError::NotFound(format!("group {id}")))?;
        state.entity_failure(&state.groups[position].display_name)?;
        state.groups.remove(position);
        Ok(())
    }

    async fn test_connection(&self) -> DirectoryResult<ConnectionInfo> {
        self.check_listing()?;
        Ok(ConnectionInfo {
            endpoint: "memory://destination".to_string(),
            total_users: Some(self.users().len() as u64),
        })
    }
}
