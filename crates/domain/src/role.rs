use lakewarden_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::principal::PrincipalSet;

/// One named role owned by the external policy authority.
///
/// Membership is a set: adding a present principal is a no-op. Role
/// documents are only ever mutated, never deleted automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDocument {
    /// Identifier assigned by the authority; absent before creation.
    pub id: Option<i64>,
    /// Unique role name within a service.
    pub name: String,
    /// Member users, groups, and nested roles.
    pub members: PrincipalSet,
}

impl RoleDocument {
    /// Creates an unsaved role document with the given members.
    pub fn new(name: impl Into<String>, members: PrincipalSet) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "role name must not be empty".to_owned(),
            ));
        }
        Ok(Self {
            id: None,
            name,
            members,
        })
    }
}

/// Computes the role state after adding `add` to its membership.
///
/// Returns `None` when every requested principal is already a member, in
/// which case no remote update must be issued.
#[must_use]
pub fn merge_members(document: &RoleDocument, add: &PrincipalSet) -> Option<RoleDocument> {
    if document.members.contains_all(add) {
        return None;
    }
    let mut updated = document.clone();
    updated.members.extend(add);
    Some(updated)
}

/// Computes the role state after removing `remove` from its membership.
///
/// Returns `None` when none of the requested principals were members.
#[must_use]
pub fn subtract_members(document: &RoleDocument, remove: &PrincipalSet) -> Option<RoleDocument> {
    let mut updated = document.clone();
    if !updated.members.remove_all(remove) {
        return None;
    }
    Some(updated)
}

#[cfg(test)]
mod tests {
    use crate::principal::PrincipalSet;

    use super::{RoleDocument, merge_members, subtract_members};

    fn role_with(users: &[&str]) -> RoleDocument {
        RoleDocument {
            id: Some(7),
            name: "analysts".to_owned(),
            members: PrincipalSet {
                users: users.iter().map(ToString::to_string).collect(),
                groups: Default::default(),
                roles: Default::default(),
            },
        }
    }

    #[test]
    fn merging_present_members_is_a_no_op() {
        let role = role_with(&["alice", "bob"]);
        assert!(merge_members(&role, &PrincipalSet::user("alice")).is_none());
    }

    #[test]
    fn merging_unions_the_membership() {
        let role = role_with(&["alice"]);
        let mut add = PrincipalSet::user("alice");
        add.users.insert("bob".to_owned());

        let updated = match merge_members(&role, &add) {
            Some(updated) => updated,
            None => panic!("expected a membership change"),
        };
        let expected: Vec<&str> = vec!["alice", "bob"];
        let held: Vec<&str> = updated.members.users.iter().map(String::as_str).collect();
        assert_eq!(held, expected);
    }

    #[test]
    fn subtracting_absent_members_is_a_no_op() {
        let role = role_with(&["alice"]);
        assert!(subtract_members(&role, &PrincipalSet::user("carol")).is_none());
    }

    #[test]
    fn subtracting_removes_only_requested_members() {
        let role = role_with(&["alice", "bob"]);
        let updated = match subtract_members(&role, &PrincipalSet::user("alice")) {
            Some(updated) => updated,
            None => panic!("expected a membership change"),
        };
        assert!(!updated.members.users.contains("alice"));
        assert!(updated.members.users.contains("bob"));
    }

    #[test]
    fn empty_role_name_is_rejected() {
        assert!(RoleDocument::new("  ", PrincipalSet::new()).is_err());
    }
}
