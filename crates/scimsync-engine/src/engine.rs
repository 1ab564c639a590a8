//! Reconciliation engine.
//!
//! Each phase reads its snapshots first, plans every write, then applies the
//! plan in order: creates and updates, membership, and finally deletes.
//! Nothing is read back from the destination while a plan is being applied.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::directory::{DestinationDirectory, SourceDirectory};
use crate::error::{DirectoryError, DirectoryResult, EngineResult};
use crate::filter::{eligible_users, resolve_scope, SyncScope};
use crate::mapper::{group_name_for, ExternalIdIndex};
use crate::model::{DestinationGroup, SourceUser};
use crate::plan::{plan_groups, plan_users, GroupPlan, UserAction, UserPlan};
use crate::result::{
    GroupDetail, PreviewDeletion, PreviewGroup, PreviewSummary, PreviewUser, SyncPreview,
    SyncResult, UserDetail,
};

/// Snapshots read at the start of a group phase.
struct GroupSnapshot {
    plan: GroupPlan,
    members: HashMap<String, Vec<SourceUser>>,
    index: ExternalIdIndex,
}

/// Converges one destination onto the filtered part of one source.
pub struct ReconciliationEngine {
    source: Arc<dyn SourceDirectory>,
    destination: Arc<dyn DestinationDirectory>,
    config: EngineConfig,
    run_guard: Mutex<()>,
}

impl ReconciliationEngine {
    pub fn new(
        source: Arc<dyn SourceDirectory>,
        destination: Arc<dyn DestinationDirectory>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            destination,
            config,
            run_guard: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn SourceDirectory> {
        &self.source
    }

    #[must_use]
    pub fn destination(&self) -> &Arc<dyn DestinationDirectory> {
        &self.destination
    }

    /// Whether a run currently holds the run guard.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    /// User phase followed by group phase. Counters and errors of both
    /// phases are merged into the returned result.
    pub async fn run_full_sync(&self) -> SyncResult {
        let _guard = self.run_guard.lock().await;
        info!(realm = %self.config.realm, "Starting full sync");

        let mut result = self.user_phase().await;
        result.merge(self.group_phase().await);

        info!(
            changes = result.change_count(),
            errors = result.errors.len(),
            "Full sync finished"
        );
        result
    }

    pub async fn run_user_sync(&self) -> SyncResult {
        let _guard = self.run_guard.lock().await;
        self.user_phase().await
    }

    pub async fn run_group_sync(&self) -> SyncResult {
        let _guard = self.run_guard.lock().await;
        self.group_phase().await
    }

    /// Compute what a full run would do without writing anything.
    pub async fn preview_sync(&self) -> EngineResult<SyncPreview> {
        let scope = self.sync_scope().await?;
        let eligible = eligible_users(self.source.as_ref(), &scope).await?;
        let destination_users = self.destination.list_all_users().await?;
        let destination_groups = self.destination.list_all_groups().await?;

        let user_plan = plan_users(&eligible, &destination_users);
        let group_plan = plan_groups(&self.config.realm, &scope, &destination_groups);

        let users_for = |label: &str| -> Vec<PreviewUser> {
            user_plan
                .with_action(label)
                .map(|e| PreviewUser::from(&e.source))
                .collect()
        };

        // Runs skip both phases without a filter value, so nothing is deleted.
        let in_scope = scope.filter_value.is_some();
        let users_to_delete = if self.config.delete_users && in_scope {
            user_plan
                .deletions
                .iter()
                .map(|u| PreviewDeletion {
                    name: u.username.clone(),
                    id: u.id.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        let groups_to_delete = if self.config.delete_groups && in_scope {
            group_plan
                .deletions
                .iter()
                .map(|g| PreviewDeletion {
                    name: g.display_name.clone(),
                    id: g.id.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(SyncPreview {
            users_to_create: users_for("create"),
            users_to_update: users_for("update"),
            users_conflicting: users_for("conflict"),
            users_to_delete,
            groups_to_sync: group_plan
                .entries
                .iter()
                .map(|e| PreviewGroup {
                    name: e.source.name.clone(),
                    path: e.source.path.clone(),
                    destination_name: e.display_name.clone(),
                    create: e.existing_id.is_none(),
                })
                .collect(),
            groups_to_delete,
            summary: PreviewSummary {
                filter_value: scope.filter_value.clone(),
                filtered_users: eligible.len(),
                destination_users: destination_users.len(),
                filtered_groups: scope.subgroups.len(),
                destination_groups: destination_groups.len(),
                delete_users_enabled: self.config.delete_users,
                delete_groups_enabled: self.config.delete_groups,
            },
        })
    }

    /// Resolve the groups currently in scope.
    pub async fn sync_scope(&self) -> EngineResult<SyncScope> {
        Ok(resolve_scope(self.source.as_ref(), &self.config).await?)
    }

    /// Every synced subgroup with its destination name and source members.
    pub async fn group_details(&self) -> EngineResult<Vec<GroupDetail>> {
        let scope = self.sync_scope().await?;
        let mut details = Vec::with_capacity(scope.subgroups.len());
        for sub in &scope.subgroups {
            let members = self.source.list_group_members(&sub.id).await?;
            details.push(GroupDetail {
                source_id: sub.id.clone(),
                source_name: sub.name.clone(),
                source_path: sub.path.clone(),
                parent: scope.parent_of(&sub.id).map(|p| p.name.clone()),
                destination_name: group_name_for(&self.config.realm, sub, &scope.parents),
                members: members.iter().map(PreviewUser::from).collect(),
            });
        }
        Ok(details)
    }

    /// Every eligible user with its planned action and synced groups.
    pub async fn user_details(&self) -> EngineResult<Vec<UserDetail>> {
        let scope = self.sync_scope().await?;
        let eligible = eligible_users(self.source.as_ref(), &scope).await?;
        let destination_users = self.destination.list_all_users().await?;
        let plan = plan_users(&eligible, &destination_users);

        let mut groups_by_user: HashMap<String, Vec<String>> = HashMap::new();
        for sub in &scope.subgroups {
            let name = group_name_for(&self.config.realm, sub, &scope.parents);
            for member in self.source.list_group_members(&sub.id).await? {
                groups_by_user.entry(member.id).or_default().push(name.clone());
            }
        }

        Ok(plan
            .entries
            .iter()
            .map(|entry| UserDetail {
                user: PreviewUser::from(&entry.source),
                action: entry.action.label().to_string(),
                groups: groups_by_user
                    .get(&entry.source.id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self), fields(realm = %self.config.realm))]
    async fn user_phase(&self) -> SyncResult {
        info!("Starting user sync");
        let mut result = SyncResult::default();
        if self.config.effective_filter_value().is_none() {
            warn!("No filter value configured, skipping user sync");
            return result;
        }

        let plan = match self.snapshot_users().await {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "User sync failed");
                result.errors.push(format!("User sync failed: {e}"));
                return result;
            }
        };

        self.apply_user_plan(&plan, &mut result).await;
        self.apply_user_deletions(&plan, &mut result).await;

        info!(
            created = result.users_created,
            updated = result.users_updated,
            deleted = result.users_deleted,
            skipped = result.users_skipped,
            errors = result.errors.len(),
            "User sync finished"
        );
        result
    }

    async fn snapshot_users(&self) -> DirectoryResult<UserPlan> {
        let scope = resolve_scope(self.source.as_ref(), &self.config).await?;
        let eligible = eligible_users(self.source.as_ref(), &scope).await?;
        let destination = self.destination.list_all_users().await?;
        debug!(
            eligible = eligible.len(),
            destination = destination.len(),
            "User snapshots loaded"
        );
        Ok(plan_users(&eligible, &destination))
    }

    async fn apply_user_plan(&self, plan: &UserPlan, result: &mut SyncResult) {
        for entry in &plan.entries {
            let username = entry.source.username.as_str();
            match &entry.action {
                UserAction::Create(user) => match self.destination.create_user(user).await {
                    Ok(created) => {
                        debug!(username, id = ?created.id, "Created user");
                        result.users_created += 1;
                    }
                    Err(e) => record_failure(result, "create user", username, &e),
                },
                UserAction::Update { id, user } => {
                    match self.destination.update_user(id, user).await {
                        Ok(_) => {
                            debug!(username, id = %id, "Updated user");
                            result.users_updated += 1;
                        }
                        Err(e) => record_failure(result, "update user", username, &e),
                    }
                }
                UserAction::Unchanged => {}
                UserAction::Conflict { reason } => {
                    warn!(
                        username,
                        source_id = %entry.source.id,
                        reason = %reason,
                        "Skipping user with conflicting identity"
                    );
                    result.users_skipped += 1;
                }
            }
        }
    }

    async fn apply_user_deletions(&self, plan: &UserPlan, result: &mut SyncResult) {
        for user in &plan.deletions {
            let Some(id) = user.id.as_deref() else {
                continue;
            };
            if !self.config.delete_users {
                warn!(username = %user.username, id, "Would delete user (deletion disabled)");
                continue;
            }
            match self.destination.delete_user(id).await {
                Ok(()) => {
                    info!(username = %user.username, id, "Deleted user");
                    result.users_deleted += 1;
                }
                Err(e) => record_failure(result, "delete user", &user.username, &e),
            }
        }
    }

    #[instrument(skip(self), fields(realm = %self.config.realm))]
    async fn group_phase(&self) -> SyncResult {
        info!("Starting group sync");
        let mut result = SyncResult::default();
        if self.config.effective_filter_value().is_none() {
            warn!("No filter value configured, skipping group sync");
            return result;
        }

        let snapshot = match self.snapshot_groups().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Group sync failed");
                result.errors.push(format!("Group sync failed: {e}"));
                return result;
            }
        };

        for name in snapshot.plan.collisions() {
            warn!(
                display_name = name,
                "Several subgroups share a destination name; the last one processed sets membership"
            );
        }

        self.apply_group_plan(&snapshot, &mut result).await;
        self.apply_group_deletions(&snapshot.plan, &mut result).await;

        info!(
            created = result.groups_created,
            memberships = result.memberships_replaced,
            deleted = result.groups_deleted,
            errors = result.errors.len(),
            "Group sync finished"
        );
        result
    }

    async fn snapshot_groups(&self) -> DirectoryResult<GroupSnapshot> {
        let scope = resolve_scope(self.source.as_ref(), &self.config).await?;
        let mut members = HashMap::with_capacity(scope.subgroups.len());
        for sub in &scope.subgroups {
            let users = self.source.list_group_members(&sub.id).await?;
            members.insert(sub.id.clone(), users);
        }
        let destination_users = self.destination.list_all_users().await?;
        let destination_groups = self.destination.list_all_groups().await?;
        let index = ExternalIdIndex::build(&destination_users);
        debug!(
            subgroups = scope.subgroups.len(),
            destination_groups = destination_groups.len(),
            correlated_users = index.len(),
            "Group snapshots loaded"
        );

        Ok(GroupSnapshot {
            plan: plan_groups(&self.config.realm, &scope, &destination_groups),
            members,
            index,
        })
    }

    async fn apply_group_plan(&self, snapshot: &GroupSnapshot, result: &mut SyncResult) {
        let mut resolved: HashMap<&str, String> = HashMap::new();

        for entry in &snapshot.plan.entries {
            let name = entry.display_name.as_str();

            let group_id = if let Some(id) = resolved.get(name) {
                id.clone()
            } else if let Some(id) = &entry.existing_id {
                id.clone()
            } else {
                match self.create_group(name).await {
                    Ok(id) => {
                        info!(display_name = name, id = %id, "Created group");
                        result.groups_created += 1;
                        id
                    }
                    Err(e) => {
                        record_failure(result, "create group", name, &e);
                        continue;
                    }
                }
            };
            resolved.insert(name, group_id.clone());

            let source_members = snapshot
                .members
                .get(&entry.source.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let member_ids = map_members(name, source_members, &snapshot.index);

            match self
                .destination
                .replace_group_members(&group_id, &member_ids)
                .await
            {
                Ok(()) => {
                    debug!(display_name = name, members = member_ids.len(), "Replaced membership");
                    result.memberships_replaced += 1;
                }
                Err(e) => record_failure(result, "update members of group", name, &e),
            }
        }
    }

    async fn create_group(&self, display_name: &str) -> DirectoryResult<String> {
        let group = DestinationGroup {
            id: None,
            display_name: display_name.to_string(),
            members: Vec::new(),
        };
        self.destination
            .create_group(&group)
            .await?
            .id
            .ok_or_else(|| DirectoryError::InvalidResponse("created group has no id".into()))
    }

    async fn apply_group_deletions(&self, plan: &GroupPlan, result: &mut SyncResult) {
        for group in &plan.deletions {
            let Some(id) = group.id.as_deref() else {
                continue;
            };
            if !self.config.delete_groups {
                warn!(display_name = %group.display_name, id, "Would delete group (deletion disabled)");
                continue;
            }
            match self.destination.delete_group(id).await {
                Ok(()) => {
                    info!(display_name = %group.display_name, id, "Deleted group");
                    result.groups_deleted += 1;
                }
                Err(e) => record_failure(result, "delete group", &group.display_name, &e),
            }
        }
    }
}

/// Destination ids of `members`, dropping those never provisioned.
fn map_members(group: &str, members: &[SourceUser], index: &ExternalIdIndex) -> Vec<String> {
    let mut ids = Vec::with_capacity(members.len());
    for member in members {
        match index.destination_id(&member.id) {
            Some(id) if !ids.iter().any(|existing| existing == id) => ids.push(id.to_string()),
            Some(_) => {}
            None => warn!(
                group,
                username = %member.username,
                "Member has no destination counterpart, dropping"
            ),
        }
    }
    ids
}

/// Record a per-entity failure. The phase always moves on to the next entity.
fn record_failure(result: &mut SyncResult, op: &str, name: &str, err: &DirectoryError) {
    error!(op, name, error = %err, "Destination write failed");
    result.errors.push(format!("Failed to {op} {name}: {err}"));
    if err.is_fatal() {
        warn!(op, name, "Destination looks unavailable, continuing with the next entity");
    }
}
