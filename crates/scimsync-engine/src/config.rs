//! Engine settings.

use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, SyncError};

/// Group attribute used to select top-level groups when none is configured.
pub const DEFAULT_FILTER_ATTRIBUTE: &str = "vcenter_name";

/// Settings that drive a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Source realm; prefixes every owned destination group name.
    pub realm: String,
    /// Group attribute compared against `filter_value`.
    #[serde(default = "default_filter_attribute")]
    pub filter_attribute: String,
    /// Value a top-level group must carry. Unset or blank selects nothing.
    #[serde(default)]
    pub filter_value: Option<String>,
    /// Delete destination users no longer eligible.
    #[serde(default)]
    pub delete_users: bool,
    /// Delete owned destination groups no longer synced.
    #[serde(default)]
    pub delete_groups: bool,
}

fn default_filter_attribute() -> String {
    DEFAULT_FILTER_ATTRIBUTE.to_string()
}

impl EngineConfig {
    /// Config for `realm` with the default attribute, no filter value and
    /// deletes disabled.
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            filter_attribute: default_filter_attribute(),
            filter_value: None,
            delete_users: false,
            delete_groups: false,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter_attribute = attribute.into();
        self.filter_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_deletes(mut self, users: bool, groups: bool) -> Self {
        self.delete_users = users;
        self.delete_groups = groups;
        self
    }

    /// The filter value, or `None` when unset or blank.
    #[must_use]
    pub fn effective_filter_value(&self) -> Option<&str> {
        self.filter_value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.realm.trim().is_empty() {
            return Err(SyncError::Config("realm must not be empty".into()));
        }
        if self.filter_attribute.trim().is_empty() {
            return Err(SyncError::Config(
                "filter attribute must not be empty".into(),
            ));
        }
        Ok(())
    }
}
