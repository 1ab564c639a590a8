//! Diff planning between source snapshots and destination snapshots.
//!
//! Planning is pure: it takes the snapshots read at the start of a phase and
//! decides every write up front. Nothing here talks to a directory.

use std::collections::{HashMap, HashSet};

use crate::filter::SyncScope;
use crate::mapper::{group_name_for, is_owned_group, to_destination_user};
use crate::model::{DestinationGroup, DestinationUser, SourceGroup, SourceUser};

/// Decision for one eligible source user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// No destination user carries this identity yet.
    Create(DestinationUser),
    /// The correlated destination user drifted.
    Update { id: String, user: DestinationUser },
    /// The correlated destination user already matches.
    Unchanged,
    /// Another destination identity holds the username; never overwritten.
    Conflict { reason: String },
}

impl UserAction {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Unchanged => "unchanged",
            Self::Conflict { .. } => "conflict",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserPlanEntry {
    pub source: SourceUser,
    pub action: UserAction,
}

/// Planned user writes for one phase.
#[derive(Debug, Clone, Default)]
pub struct UserPlan {
    pub entries: Vec<UserPlanEntry>,
    /// Destination users no longer eligible. Applied only when deletes are on.
    pub deletions: Vec<DestinationUser>,
}

impl UserPlan {
    pub fn with_action<'a>(
        &'a self,
        label: &'a str,
    ) -> impl Iterator<Item = &'a UserPlanEntry> + 'a {
        self.entries.iter().filter(move |e| e.action.label() == label)
    }
}

/// Decide what to do with every eligible source user.
#[must_use]
pub fn plan_users(eligible: &[SourceUser], destination: &[DestinationUser]) -> UserPlan {
    let mut by_external_id: HashMap<&str, &DestinationUser> = HashMap::new();
    let mut by_username: HashMap<&str, &DestinationUser> = HashMap::new();
    for user in destination {
        if let Some(external_id) = user.external_id.as_deref() {
            by_external_id.entry(external_id).or_insert(user);
        }
        by_username.entry(user.username.as_str()).or_insert(user);
    }

    let entries = eligible
        .iter()
        .map(|source| UserPlanEntry {
            source: source.clone(),
            action: user_action(source, &by_external_id, &by_username),
        })
        .collect();

    let eligible_ids: HashSet<&str> = eligible.iter().map(|u| u.id.as_str()).collect();
    let eligible_usernames: HashSet<&str> = eligible.iter().map(|u| u.username.as_str()).collect();
    let deletions = destination
        .iter()
        .filter(|u| u.id.is_some())
        .filter(|u| !eligible_usernames.contains(u.username.as_str()))
        .filter(|u| {
            u.external_id
                .as_deref()
                .map_or(true, |ext| !eligible_ids.contains(ext))
        })
        .cloned()
        .collect();

    UserPlan { entries, deletions }
}

fn user_action(
    source: &SourceUser,
    by_external_id: &HashMap<&str, &DestinationUser>,
    by_username: &HashMap<&str, &DestinationUser>,
) -> UserAction {
    let desired = to_destination_user(source);

    if let Some(existing) = by_external_id.get(source.id.as_str()) {
        if let Some(holder) = by_username.get(desired.username.as_str()) {
            if holder.id != existing.id {
                return UserAction::Conflict {
                    reason: format!(
                        "username {} is held by destination user {}",
                        desired.username,
                        holder.id.as_deref().unwrap_or("<unknown>")
                    ),
                };
            }
        }
        let Some(id) = existing.id.clone() else {
            return UserAction::Conflict {
                reason: "correlated destination user has no id".to_string(),
            };
        };
        if existing.differs_from(&desired) {
            return UserAction::Update { id, user: desired };
        }
        return UserAction::Unchanged;
    }

    if let Some(holder) = by_username.get(source.username.as_str()) {
        return UserAction::Conflict {
            reason: format!(
                "username is held by external id {}",
                holder.external_id.as_deref().unwrap_or("<none>")
            ),
        };
    }

    UserAction::Create(desired)
}

#[derive(Debug, Clone)]
pub struct GroupPlanEntry {
    pub source: SourceGroup,
    pub display_name: String,
    /// Id of the destination group already carrying `display_name`.
    pub existing_id: Option<String>,
}

/// Planned group writes for one phase.
#[derive(Debug, Clone, Default)]
pub struct GroupPlan {
    pub entries: Vec<GroupPlanEntry>,
    /// Owned destination groups no longer synced.
    pub deletions: Vec<DestinationGroup>,
}

impl GroupPlan {
    /// Display names produced by more than one subgroup.
    #[must_use]
    pub fn collisions(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut collisions = Vec::new();
        for entry in &self.entries {
            let name = entry.display_name.as_str();
            if !seen.insert(name) && !collisions.contains(&name) {
                collisions.push(name);
            }
        }
        collisions
    }

    #[must_use]
    pub fn synced_names(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.display_name.as_str()).collect()
    }
}

/// Map every synced subgroup to its destination group.
#[must_use]
pub fn plan_groups(realm: &str, scope: &SyncScope, destination: &[DestinationGroup]) -> GroupPlan {
    let mut existing: HashMap<&str, &DestinationGroup> = HashMap::new();
    for group in destination {
        existing.entry(group.display_name.as_str()).or_insert(group);
    }

    let entries: Vec<GroupPlanEntry> = scope
        .subgroups
        .iter()
        .map(|sub| {
            let display_name = group_name_for(realm, sub, &scope.parents);
            let existing_id = existing
                .get(display_name.as_str())
                .and_then(|g| g.id.clone());
            GroupPlanEntry {
                source: sub.clone(),
                display_name,
                existing_id,
            }
        })
        .collect();

    let synced: HashSet<&str> = entries.iter().map(|e| e.display_name.as_str()).collect();
    let deletions = destination
        .iter()
        .filter(|g| g.id.is_some())
        .filter(|g| is_owned_group(realm, &g.display_name))
        .filter(|g| !synced.contains(g.display_name.as_str()))
        .cloned()
        .collect();

    GroupPlan { entries, deletions }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, username: &str) -> SourceUser {
        SourceUser {
            id: id.into(),
            username: username.into(),
            email: Some(format!("{username}@example.com")),
            first_name: Some("First".into()),
            last_name: Some("Last".into()),
            enabled: true,
        }
    }

    fn provisioned(id: &str, source_user: &SourceUser) -> DestinationUser {
        let mut user = to_destination_user(source_user);
        user.id = Some(id.into());
        user
    }

    fn subgroup(id: &str, name: &str) -> SourceGroup {
        SourceGroup {
            id: id.into(),
            name: name.into(),
            path: format!("/eng/{name}"),
            ..Default::default()
        }
    }

    fn destination_group(id: &str, name: &str) -> DestinationGroup {
        DestinationGroup {
            id: Some(id.into()),
            display_name: name.into(),
            members: vec![],
        }
    }

    #[test]
    fn test_new_user_is_created() {
        let plan = plan_users(&[source("kc-1", "bob")], &[]);
        assert!(matches!(plan.entries[0].action, UserAction::Create(_)));
        assert!(plan.deletions.is_empty());
    }

    #[test]
    fn test_matching_user_is_unchanged() {
        let bob = source("kc-1", "bob");
        let plan = plan_users(&[bob.clone()], &[provisioned("d1", &bob)]);
        assert_eq!(plan.entries[0].action, UserAction::Unchanged);
    }

    #[test]
    fn test_drifted_user_is_updated() {
        let bob = source("kc-1", "bob");
        let mut existing = provisioned("d1", &bob);
        existing.display_name = "Old Name".into();

        let plan = plan_users(&[bob], &[existing]);
        match &plan.entries[0].action {
            UserAction::Update { id, user } => {
                assert_eq!(id, "d1");
                assert_eq!(user.display_name, "First Last");
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_username_held_by_other_identity_conflicts() {
        let alice = source("kc-123", "alice");
        let mut squatter = provisioned("d9", &source("other-id", "alice"));
        squatter.display_name = "Someone Else".into();

        let plan = plan_users(&[alice], &[squatter]);
        assert!(matches!(plan.entries[0].action, UserAction::Conflict { .. }));
        // Still referenced by an eligible username, so never a delete candidate.
        assert!(plan.deletions.is_empty());
    }

    #[test]
    fn test_username_without_external_id_conflicts() {
        let alice = source("kc-1", "alice");
        let mut manual = provisioned("d2", &alice);
        manual.external_id = None;

        let plan = plan_users(&[alice], &[manual]);
        assert!(matches!(plan.entries[0].action, UserAction::Conflict { .. }));
    }

    #[test]
    fn test_rename_onto_taken_username_conflicts() {
        let renamed = source("kc-1", "robert");
        let existing = provisioned("d1", &source("kc-1", "bob"));
        let holder = provisioned("d2", &source("kc-2", "robert"));

        let plan = plan_users(&[renamed], &[existing, holder]);
        assert!(matches!(plan.entries[0].action, UserAction::Conflict { .. }));
    }

    #[test]
    fn test_rename_is_an_update() {
        let renamed = source("kc-1", "robert");
        let existing = provisioned("d1", &source("kc-1", "bob"));

        let plan = plan_users(&[renamed], &[existing]);
        assert!(matches!(plan.entries[0].action, UserAction::Update { .. }));
        assert!(plan.deletions.is_empty());
    }

    #[test]
    fn test_ineligible_users_are_delete_candidates() {
        let bob = source("kc-1", "bob");
        let carol = provisioned("d3", &source("kc-3", "carol"));

        let plan = plan_users(&[bob.clone()], &[provisioned("d1", &bob), carol]);
        assert_eq!(plan.deletions.len(), 1);
        assert_eq!(plan.deletions[0].username, "carol");
    }

    #[test]
    fn test_group_plan_reuses_existing_and_finds_deletions() {
        let parent = SourceGroup {
            id: "p1".into(),
            name: "eng".into(),
            path: "/eng".into(),
            ..Default::default()
        };
        let scope = SyncScope {
            filter_value: Some("vc01".into()),
            top_level: vec![parent.clone()],
            subgroups: vec![subgroup("s1", "admins"), subgroup("s2", "devs")],
            parents: HashMap::from([
                ("s1".to_string(), parent.clone()),
                ("s2".to_string(), parent),
            ]),
        };
        let destination = vec![
            destination_group("g1", "corp-eng-admins"),
            destination_group("g2", "corp-eng-old"),
            destination_group("g3", "vcenter-admins"),
        ];

        let plan = plan_groups("corp", &scope, &destination);

        assert_eq!(plan.entries[0].display_name, "corp-eng-admins");
        assert_eq!(plan.entries[0].existing_id.as_deref(), Some("g1"));
        assert_eq!(plan.entries[1].display_name, "corp-eng-devs");
        assert_eq!(plan.entries[1].existing_id, None);
        assert_eq!(plan.deletions.len(), 1);
        assert_eq!(plan.deletions[0].display_name, "corp-eng-old");
        assert!(plan.collisions().is_empty());
    }

    #[test]
    fn test_group_plan_reports_collisions() {
        let scope = SyncScope {
            filter_value: Some("vc01".into()),
            top_level: vec![],
            subgroups: vec![subgroup("s1", "admins"), subgroup("s2", "admins")],
            parents: HashMap::new(),
        };

        let plan = plan_groups("corp", &scope, &[]);
        assert_eq!(plan.collisions(), vec!["corp-unknown-admins"]);
    }
}
