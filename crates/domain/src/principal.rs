use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Principal sets bound to one rule item or role document.
///
/// All three collections have set semantics; ordering is deterministic so
/// identical logical state always serializes identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSet {
    /// Directory user names.
    pub users: BTreeSet<String>,
    /// Directory group names.
    pub groups: BTreeSet<String>,
    /// Authority role names.
    pub roles: BTreeSet<String>,
}

impl PrincipalSet {
    /// Creates an empty principal set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set containing exactly one user.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.users.insert(name.into());
        set
    }

    /// Returns whether no principal of any kind is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty() && self.roles.is_empty()
    }

    /// Returns whether every principal in `other` is already present here.
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other.users.is_subset(&self.users)
            && other.groups.is_subset(&self.groups)
            && other.roles.is_subset(&self.roles)
    }

    /// Inserts every principal from `other`.
    pub fn extend(&mut self, other: &Self) {
        self.users.extend(other.users.iter().cloned());
        self.groups.extend(other.groups.iter().cloned());
        self.roles.extend(other.roles.iter().cloned());
    }

    /// Removes the intersection with `other`, returning whether anything
    /// was actually removed.
    pub fn remove_all(&mut self, other: &Self) -> bool {
        let mut removed = false;
        for user in &other.users {
            removed |= self.users.remove(user);
        }
        for group in &other.groups {
            removed |= self.groups.remove(group);
        }
        for role in &other.roles {
            removed |= self.roles.remove(role);
        }
        removed
    }
}
