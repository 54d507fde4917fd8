// Membership module.
// The static cluster definition and the live view reported by the
// group-communication layer, plus the coherence checks between the two.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type MemberName = String;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no database members are configured")]
    NoDbMembers,

    #[error("local member {0} does not appear in the potential quorum member set")]
    LocalNotConfigured(MemberName),

    #[error("the view contains no database members")]
    EmptyView,

    #[error("local member {0} does not appear in the view")]
    LocalNotInView(MemberName),
}

/// Decides which names may carry a validation fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Configured members plus anything visible in the view.
    #[default]
    ConfiguredOrView,
    /// Configured members only.
    ConfiguredOnly,
}

// Read only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipConfiguration {
    pub local_name: MemberName,
    pub db_members: BTreeSet<MemberName>,
    pub active_witnesses: BTreeSet<MemberName>,
    pub passive_witnesses: BTreeSet<MemberName>,
}

impl MembershipConfiguration {
    pub fn new<I, S>(local_name: &str, db_members: I, active_witnesses: I, passive_witnesses: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<MemberName>
    {
        Self {
            local_name: local_name.to_string(),
            db_members: db_members.into_iter().map(Into::into).collect(),
            active_witnesses: active_witnesses.into_iter().map(Into::into).collect(),
            passive_witnesses: passive_witnesses.into_iter().map(Into::into).collect(),
        }
    }

    /// Every configured name: db members and both kinds of witness.
    pub fn potential_quorum_set(&self) -> BTreeSet<MemberName> {
        self.db_members
            .iter()
            .chain(self.active_witnesses.iter())
            .chain(self.passive_witnesses.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipView {
    pub db_members: BTreeSet<MemberName>,
    pub active_witnesses: BTreeSet<MemberName>,
}

impl MembershipView {
    pub fn new<I, S>(db_members: I, active_witnesses: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<MemberName>
    {
        Self {
            db_members: db_members.into_iter().map(Into::into).collect(),
            active_witnesses: active_witnesses.into_iter().map(Into::into).collect(),
        }
    }

    // Members whose validation the consistency check requires.
    pub fn members(&self) -> BTreeSet<MemberName> {
        self.db_members.union(&self.active_witnesses).cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.db_members.contains(name) || self.active_witnesses.contains(name)
    }
}

pub fn known_members(
    config: &MembershipConfiguration,
    view: &MembershipView,
    policy: AdmissionPolicy
) -> BTreeSet<MemberName> {
    let mut known = config.potential_quorum_set();
    if policy == AdmissionPolicy::ConfiguredOrView {
        known.extend(view.members());
    }
    known
}

/// Checks that a configuration and view are coherent, reporting the first
/// check that fails.
pub fn validate(config: &MembershipConfiguration, view: &MembershipView) -> Result<(), ConfigurationError> {
    if config.db_members.is_empty() {
        return Err(ConfigurationError::NoDbMembers);
    }
    if !config.potential_quorum_set().contains(&config.local_name) {
        return Err(ConfigurationError::LocalNotConfigured(config.local_name.clone()));
    }
    if view.db_members.is_empty() {
        return Err(ConfigurationError::EmptyView);
    }
    if !view.db_members.contains(&config.local_name) {
        return Err(ConfigurationError::LocalNotInView(config.local_name.clone()));
    }
    Ok(())
}
