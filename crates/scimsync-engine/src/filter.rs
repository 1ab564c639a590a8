//! Selection of the source groups and users that are in sync scope.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::directory::SourceDirectory;
use crate::error::DirectoryResult;
use crate::model::{SourceGroup, SourceUser};

/// Source groups selected for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncScope {
    /// Filter value the scope was resolved with, `None` when unset.
    pub filter_value: Option<String>,
    /// Groups carrying the filter attribute. Used for naming and user
    /// aggregation, never synced themselves.
    pub top_level: Vec<SourceGroup>,
    /// Direct children of `top_level`; the synced group set.
    pub subgroups: Vec<SourceGroup>,
    /// Subgroup id → top-level group.
    pub parents: HashMap<String, SourceGroup>,
}

impl SyncScope {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top_level.is_empty()
    }

    /// Top-level group a subgroup was reached through.
    #[must_use]
    pub fn parent_of(&self, subgroup_id: &str) -> Option<&SourceGroup> {
        self.parents.get(subgroup_id)
    }

    /// Groups whose members are eligible users: every subgroup followed by
    /// every top-level group.
    pub fn member_groups(&self) -> impl Iterator<Item = &SourceGroup> {
        self.subgroups.iter().chain(self.top_level.iter())
    }
}

/// Keep only groups that carry `attribute` with `value`, dropping repeats.
#[must_use]
pub fn matching_groups(groups: Vec<SourceGroup>, attribute: &str, value: &str) -> Vec<SourceGroup> {
    let mut seen = HashSet::new();
    groups
        .into_iter()
        .filter(|g| g.has_attribute_value(attribute, value))
        .filter(|g| seen.insert(g.id.clone()))
        .collect()
}

/// Deduplicate users by source id, keeping the first occurrence.
#[must_use]
pub fn unique_users(users: impl IntoIterator<Item = SourceUser>) -> Vec<SourceUser> {
    let mut seen = HashSet::new();
    users
        .into_iter()
        .filter(|u| seen.insert(u.id.clone()))
        .collect()
}

/// Resolve the top-level groups and their subgroups for `config`.
///
/// An unset or blank filter value selects nothing.
pub async fn resolve_scope(
    source: &dyn SourceDirectory,
    config: &EngineConfig,
) -> DirectoryResult<SyncScope> {
    let Some(value) = config.effective_filter_value() else {
        warn!(
            attribute = %config.filter_attribute,
            "No filter value configured, no groups will be synced"
        );
        return Ok(SyncScope::default());
    };

    let candidates = source
        .list_top_level_groups_by_attribute(&config.filter_attribute, value)
        .await?;
    let returned = candidates.len();
    let top_level = matching_groups(candidates, &config.filter_attribute, value);
    if top_level.len() < returned {
        debug!(
            returned,
            matched = top_level.len(),
            "Dropped source groups not matching the filter"
        );
    }

    // A filtered group nested under another filtered group stays top-level.
    let top_level_ids: HashSet<String> = top_level.iter().map(|g| g.id.clone()).collect();
    let mut subgroups = Vec::new();
    let mut parents = HashMap::new();
    for parent in &top_level {
        if parent.sub_group_count == 0 {
            continue;
        }
        for child in source.list_subgroups(&parent.id).await? {
            if top_level_ids.contains(&child.id) || parents.contains_key(&child.id) {
                continue;
            }
            parents.insert(child.id.clone(), parent.clone());
            subgroups.push(child);
        }
    }

    debug!(
        filter_value = value,
        top_level = top_level.len(),
        subgroups = subgroups.len(),
        "Resolved sync scope"
    );

    Ok(SyncScope {
        filter_value: Some(value.to_string()),
        top_level,
        subgroups,
        parents,
    })
}

/// Collect the eligible user set: members of every synced subgroup and every
/// top-level group, unique by source id.
pub async fn eligible_users(
    source: &dyn SourceDirectory,
    scope: &SyncScope,
) -> DirectoryResult<Vec<SourceUser>> {
    let mut users = Vec::new();
    for group in scope.member_groups() {
        users.extend(source.list_group_members(&group.id).await?);
    }
    Ok(unique_users(users))
}
