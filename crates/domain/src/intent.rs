use std::collections::BTreeSet;

use lakewarden_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::access::AccessKind;
use crate::policy::{MaskKind, WILDCARD};
use crate::principal::PrincipalSet;
use crate::reconcile::PolicyChange;

/// Direction of one synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Converge remote state towards holding the intent.
    Grant,
    /// Converge remote state towards dropping the intent.
    Revoke,
}

impl SyncOperation {
    /// Returns a stable log token for this operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }
}

/// Intent families stored in separate relational tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Whole-table access grants.
    Table,
    /// Column mask grants.
    Column,
    /// Row filter grants.
    Row,
    /// Storage quota assignments.
    Quota,
}

/// Principal an intent grants to: a directory user, an authority role, or
/// both. At least one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grantee {
    /// Directory user name.
    pub user: Option<String>,
    /// Authority role name.
    pub role: Option<String>,
}

impl Grantee {
    /// Creates a user-only grantee.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user: Some(name.into()),
            role: None,
        }
    }

    /// Creates a role-only grantee.
    #[must_use]
    pub fn role(name: impl Into<String>) -> Self {
        Self {
            user: None,
            role: Some(name.into()),
        }
    }

    /// Validates the at-least-one-principal invariant.
    pub fn validate(&self) -> AppResult<()> {
        let user_set = self.user.as_deref().is_some_and(|name| !name.trim().is_empty());
        let role_set = self.role.as_deref().is_some_and(|name| !name.trim().is_empty());
        if user_set || role_set {
            Ok(())
        } else {
            Err(AppError::Validation(
                "a permission intent requires a user or a role principal".to_owned(),
            ))
        }
    }

    /// Expands the grantee into principal sets.
    #[must_use]
    pub fn principals(&self) -> PrincipalSet {
        let mut members = PrincipalSet::new();
        if let Some(user) = self.user.as_deref().filter(|name| !name.trim().is_empty()) {
            members.users.insert(user.to_owned());
        }
        if let Some(role) = self.role.as_deref().filter(|name| !name.trim().is_empty()) {
            members.roles.insert(role.to_owned());
        }
        members
    }
}

/// Administrator-declared desired state, one variant per intent family.
///
/// Each variant carries exactly the fields its reconciliation path needs;
/// dispatch over intents is always an exhaustive match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionIntent {
    /// Grant plain access to a table (or all tables of a database).
    Table {
        /// Database name; wildcard not allowed.
        database: String,
        /// Table name; wildcard allowed.
        table: String,
        /// Receiving principal.
        grantee: Grantee,
    },
    /// Mask one column for the given principal.
    Column {
        /// Database name.
        database: String,
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Masking behavior.
        mask: MaskKind,
        /// Receiving principal.
        grantee: Grantee,
    },
    /// Restrict the rows the principal may read.
    Row {
        /// Database name.
        database: String,
        /// Table name.
        table: String,
        /// Row filter expression.
        filter: String,
        /// Receiving principal.
        grantee: Grantee,
    },
    /// Assign a storage quota to a database's warehouse directory.
    Quota {
        /// Database name.
        database: String,
        /// Quota in gigabytes.
        gigabytes: f64,
    },
}

impl PermissionIntent {
    /// Returns the intent family.
    #[must_use]
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Table { .. } => IntentKind::Table,
            Self::Column { .. } => IntentKind::Column,
            Self::Row { .. } => IntentKind::Row,
            Self::Quota { .. } => IntentKind::Quota,
        }
    }

    /// Returns the database the intent applies to.
    #[must_use]
    pub fn database(&self) -> &str {
        match self {
            Self::Table { database, .. }
            | Self::Column { database, .. }
            | Self::Row { database, .. }
            | Self::Quota { database, .. } => database.as_str(),
        }
    }

    /// Validates the intent before any persistence or remote call.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::Table {
                database,
                table,
                grantee,
            } => {
                require_named(database, "database")?;
                require_named(table, "table")?;
                if database == WILDCARD {
                    return Err(AppError::Validation(
                        "access intents must name a database, not the wildcard".to_owned(),
                    ));
                }
                grantee.validate()
            }
            Self::Column {
                database,
                table,
                column,
                grantee,
                ..
            } => {
                require_named(database, "database")?;
                require_named(table, "table")?;
                require_named(column, "column")?;
                reject_wildcard(database, table, "mask")?;
                if column == WILDCARD {
                    return Err(AppError::Validation(
                        "mask intents must name a column, not the wildcard".to_owned(),
                    ));
                }
                grantee.validate()
            }
            Self::Row {
                database,
                table,
                filter,
                grantee,
            } => {
                require_named(database, "database")?;
                require_named(table, "table")?;
                reject_wildcard(database, table, "row filter")?;
                if filter.trim().is_empty() {
                    return Err(AppError::Validation(
                        "row filter intents require a non-empty filter expression".to_owned(),
                    ));
                }
                grantee.validate()
            }
            Self::Quota {
                database,
                gigabytes,
            } => {
                require_named(database, "database")?;
                if database == WILDCARD {
                    return Err(AppError::Validation(
                        "quota intents must name a database, not the wildcard".to_owned(),
                    ));
                }
                if !gigabytes.is_finite() || *gigabytes <= 0.0 {
                    return Err(AppError::Validation(
                        "quota gigabytes must be a positive finite number".to_owned(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Returns whether two intents collide under their family's uniqueness
    /// tuple: (database, table, column, user, role) for columns,
    /// (database, table, user, role) for tables and row filters, and the
    /// database alone for quotas. Mask kinds and filter expressions are
    /// deliberately outside the tuple so one principal cannot hold two
    /// conflicting rules for the same selector.
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Table {
                    database,
                    table,
                    grantee,
                },
                Self::Table {
                    database: other_database,
                    table: other_table,
                    grantee: other_grantee,
                },
            ) => database == other_database && table == other_table && grantee == other_grantee,
            (
                Self::Column {
                    database,
                    table,
                    column,
                    grantee,
                    ..
                },
                Self::Column {
                    database: other_database,
                    table: other_table,
                    column: other_column,
                    grantee: other_grantee,
                    ..
                },
            ) => {
                database == other_database
                    && table == other_table
                    && column == other_column
                    && grantee == other_grantee
            }
            (
                Self::Row {
                    database,
                    table,
                    grantee,
                    ..
                },
                Self::Row {
                    database: other_database,
                    table: other_table,
                    grantee: other_grantee,
                    ..
                },
            ) => database == other_database && table == other_table && grantee == other_grantee,
            (
                Self::Quota { database, .. },
                Self::Quota {
                    database: other_database,
                    ..
                },
            ) => database == other_database,
            _ => false,
        }
    }

    /// Converts the intent into the reconciler's request, or `None` for
    /// quota intents, which bypass the policy store entirely.
    #[must_use]
    pub fn to_policy_change(&self) -> Option<PolicyChange> {
        match self {
            Self::Table {
                database,
                table,
                grantee,
            } => Some(PolicyChange::Access {
                database: database.clone(),
                table: table.clone(),
                column: WILDCARD.to_owned(),
                accesses: BTreeSet::from([AccessKind::Select]),
                members: grantee.principals(),
            }),
            Self::Column {
                database,
                table,
                column,
                mask,
                grantee,
            } => Some(PolicyChange::Mask {
                database: database.clone(),
                table: table.clone(),
                column: column.clone(),
                mask: *mask,
                members: grantee.principals(),
            }),
            Self::Row {
                database,
                table,
                filter,
                grantee,
            } => Some(PolicyChange::RowFilter {
                database: database.clone(),
                table: table.clone(),
                filter: filter.trim().to_owned(),
                accesses: BTreeSet::from([AccessKind::Select]),
                members: grantee.principals(),
            }),
            Self::Quota { .. } => None,
        }
    }
}

fn require_named(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn reject_wildcard(database: &str, table: &str, kind: &str) -> AppResult<()> {
    if database == WILDCARD || table == WILDCARD {
        return Err(AppError::Validation(format!(
            "{kind} intents do not allow a wildcard database or table"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Grantee, MaskKind, PermissionIntent};

    #[test]
    fn grantee_requires_at_least_one_principal() {
        assert!(Grantee::default().validate().is_err());
        assert!(Grantee::user("alice").validate().is_ok());
        assert!(Grantee::role("analysts").validate().is_ok());
    }

    #[test]
    fn column_intent_rejects_wildcard_table() {
        let intent = PermissionIntent::Column {
            database: "sales".to_owned(),
            table: "*".to_owned(),
            column: "phone".to_owned(),
            mask: MaskKind::Hash,
            grantee: Grantee::user("alice"),
        };
        assert!(intent.validate().is_err());
    }

    #[test]
    fn row_intent_rejects_blank_filter() {
        let intent = PermissionIntent::Row {
            database: "sales".to_owned(),
            table: "orders".to_owned(),
            filter: "   ".to_owned(),
            grantee: Grantee::user("alice"),
        };
        assert!(intent.validate().is_err());
    }

    #[test]
    fn table_intent_allows_wildcard_table_but_not_database() {
        let allowed = PermissionIntent::Table {
            database: "sales".to_owned(),
            table: "*".to_owned(),
            grantee: Grantee::user("alice"),
        };
        assert!(allowed.validate().is_ok());

        let rejected = PermissionIntent::Table {
            database: "*".to_owned(),
            table: "orders".to_owned(),
            grantee: Grantee::user("alice"),
        };
        assert!(rejected.validate().is_err());
    }

    #[test]
    fn row_intents_conflict_regardless_of_filter_expression() {
        let first = PermissionIntent::Row {
            database: "sales".to_owned(),
            table: "orders".to_owned(),
            filter: "region = 'emea'".to_owned(),
            grantee: Grantee::user("alice"),
        };
        let second = PermissionIntent::Row {
            database: "sales".to_owned(),
            table: "orders".to_owned(),
            filter: "region = 'apac'".to_owned(),
            grantee: Grantee::user("alice"),
        };
        assert!(first.conflicts_with(&second));

        let other_grantee = PermissionIntent::Row {
            database: "sales".to_owned(),
            table: "orders".to_owned(),
            filter: "region = 'emea'".to_owned(),
            grantee: Grantee::user("bob"),
        };
        assert!(!first.conflicts_with(&other_grantee));
    }

    #[test]
    fn quota_intent_rejects_non_positive_sizes() {
        let intent = PermissionIntent::Quota {
            database: "sales".to_owned(),
            gigabytes: 0.0,
        };
        assert!(intent.validate().is_err());
    }
}
