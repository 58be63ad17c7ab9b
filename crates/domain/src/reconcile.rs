//! Pure reconciliation of desired policy changes against remote documents.
//!
//! Given a change and the current remote document (or its absence), the
//! functions here compute the new document state without performing any I/O.
//! Callers apply the returned outcome through the policy authority port.

use std::collections::BTreeSet;

use lakewarden_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::access::AccessKind;
use crate::fanout::SyncTarget;
use crate::intent::reject_wildcard;
use crate::policy::{
    MaskKind, PolicyDocument, PolicyKind, ResourceSelector, RuleItem, RulePayload, WILDCARD,
    name_segment,
};
use crate::principal::PrincipalSet;

/// Desired policy mutation consumed by the reconciler, one variant per
/// policy kind carrying exactly the fields that kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyChange {
    /// Plain access to a database/table/column selector.
    Access {
        /// Database name; wildcard not allowed.
        database: String,
        /// Table name; wildcard allowed.
        table: String,
        /// Column name; wildcard allowed.
        column: String,
        /// Requested access tokens.
        accesses: BTreeSet<AccessKind>,
        /// Requested principals.
        members: PrincipalSet,
    },
    /// Column masking.
    Mask {
        /// Database name; wildcard not allowed.
        database: String,
        /// Table name; wildcard not allowed.
        table: String,
        /// Column name.
        column: String,
        /// Masking behavior.
        mask: MaskKind,
        /// Requested principals.
        members: PrincipalSet,
    },
    /// Row filtering.
    RowFilter {
        /// Database name; wildcard not allowed.
        database: String,
        /// Table name; wildcard not allowed.
        table: String,
        /// Filter expression.
        filter: String,
        /// Access tokens the filter item carries.
        accesses: BTreeSet<AccessKind>,
        /// Requested principals.
        members: PrincipalSet,
    },
}

impl PolicyChange {
    /// Returns the policy kind this change targets.
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Access { .. } => PolicyKind::Access,
            Self::Mask { .. } => PolicyKind::Mask,
            Self::RowFilter { .. } => PolicyKind::RowFilter,
        }
    }

    /// Returns the requested principals.
    #[must_use]
    pub fn members(&self) -> &PrincipalSet {
        match self {
            Self::Access { members, .. }
            | Self::Mask { members, .. }
            | Self::RowFilter { members, .. } => members,
        }
    }

    /// Returns the requested access tokens before engine expansion. Mask
    /// items always carry `select` alone.
    #[must_use]
    pub fn accesses(&self) -> BTreeSet<AccessKind> {
        match self {
            Self::Access { accesses, .. } | Self::RowFilter { accesses, .. } => accesses.clone(),
            Self::Mask { .. } => BTreeSet::from([AccessKind::Select]),
        }
    }

    /// Derives the catalog-independent part of the policy document name.
    #[must_use]
    pub fn base_name(&self) -> String {
        match self {
            Self::Access {
                database,
                table,
                column,
                ..
            } => format!(
                "{database}.{}.{}.{}",
                name_segment(table),
                name_segment(column),
                PolicyKind::Access.name_suffix()
            ),
            Self::Mask {
                database,
                table,
                column,
                ..
            } => format!(
                "{database}.{table}.{column}.{}",
                PolicyKind::Mask.name_suffix()
            ),
            Self::RowFilter {
                database, table, ..
            } => format!(
                "{database}.{table}.{}",
                PolicyKind::RowFilter.name_suffix()
            ),
        }
    }

    /// Validates the change before any remote call.
    pub fn validate(&self) -> AppResult<()> {
        if self.members().is_empty() {
            return Err(AppError::Validation(
                "a policy change requires at least one user, group, or role".to_owned(),
            ));
        }

        match self {
            Self::Access {
                database, accesses, ..
            } => {
                if database == WILDCARD {
                    return Err(AppError::Validation(
                        "access policies must name a database, not the wildcard".to_owned(),
                    ));
                }
                if accesses.is_empty() {
                    return Err(AppError::Validation(
                        "an access policy change requires at least one access token".to_owned(),
                    ));
                }
                if let Some(access) = accesses.iter().find(|access| !access.grantable()) {
                    return Err(AppError::Validation(format!(
                        "access token '{}' cannot be requested directly",
                        access.as_str()
                    )));
                }
                Ok(())
            }
            Self::Mask {
                database, table, ..
            } => reject_wildcard(database, table, "mask"),
            Self::RowFilter {
                database,
                table,
                filter,
                ..
            } => {
                reject_wildcard(database, table, "row filter")?;
                if filter.trim().is_empty() {
                    return Err(AppError::Validation(
                        "a row filter expression must not be empty".to_owned(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Builds the resource selector for one fan-out target.
    #[must_use]
    pub fn resource(&self, catalog: Option<&str>) -> ResourceSelector {
        let (database, table, column) = match self {
            Self::Access {
                database,
                table,
                column,
                ..
            } => (database, table, Some(column.clone())),
            Self::Mask {
                database,
                table,
                column,
                ..
            } => (database, table, Some(column.clone())),
            Self::RowFilter {
                database, table, ..
            } => (database, table, None),
        };

        ResourceSelector {
            database: database.clone(),
            table: table.clone(),
            column,
            catalog: catalog.map(ToOwned::to_owned),
        }
    }
}

/// Result of reconciling a grant against the current remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Remote state already holds the grant; no write needed.
    Unchanged,
    /// No document exists; create this one.
    Create(PolicyDocument),
    /// Replace the remote document with this state.
    Update(PolicyDocument),
}

/// Result of reconciling a revoke against the current remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// None of the document's items held the requested principals.
    NothingToRevoke,
    /// Replace the remote document with this state.
    Update(PolicyDocument),
    /// Every item ran empty; delete the document instead of updating it.
    Delete,
}

/// Computes the new document state for a grant.
///
/// A rule item whose payload and access set match the change and which
/// already contains every requested principal makes the grant a no-op.
/// When a matching item exists but lacks principals, a fresh item carrying
/// the full requested sets is inserted at the front; existing items are
/// never widened in place, so grants keep the shape they had when written.
/// Without any payload match the new item is appended.
pub fn grant(
    change: &PolicyChange,
    target: &SyncTarget,
    existing: Option<PolicyDocument>,
) -> AppResult<GrantOutcome> {
    change.validate()?;
    let desired = build_rule_item(change, target);

    let Some(mut document) = existing else {
        if let PolicyChange::Mask {
            mask: MaskKind::Unmasked,
            ..
        } = change
        {
            return Err(AppError::Validation(
                "an unmask exemption requires an existing mask policy".to_owned(),
            ));
        }
        return Ok(GrantOutcome::Create(new_document(change, target, desired)));
    };

    let mut payload_matched = false;
    for item in &document.items {
        if !payload_matches(item, &desired, change) {
            continue;
        }
        payload_matched = true;
        if item.members.contains_all(&desired.members) {
            return Ok(GrantOutcome::Unchanged);
        }
    }

    if payload_matched {
        document.items.insert(0, desired);
    } else {
        document.items.push(desired);
    }
    Ok(GrantOutcome::Update(document))
}

/// Computes the new document state for a revoke.
///
/// Principals are removed from every item whose payload matches the change;
/// items left without principals are pruned, and a document left without
/// items must be deleted remotely. Removing principals that were never
/// present is reported as [`RevokeOutcome::NothingToRevoke`].
pub fn revoke(
    change: &PolicyChange,
    target: &SyncTarget,
    mut document: PolicyDocument,
) -> AppResult<RevokeOutcome> {
    change.validate()?;
    let desired = build_rule_item(change, target);

    let mut removed_any = false;
    for item in &mut document.items {
        if !payload_matches(item, &desired, change) {
            continue;
        }
        removed_any |= item.members.remove_all(&desired.members);
    }

    if !removed_any {
        return Ok(RevokeOutcome::NothingToRevoke);
    }

    document.items.retain(|item| !item.members.is_empty());
    if document.items.is_empty() {
        Ok(RevokeOutcome::Delete)
    } else {
        Ok(RevokeOutcome::Update(document))
    }
}

/// Builds the rule item one change implies for one target.
#[must_use]
pub fn build_rule_item(change: &PolicyChange, target: &SyncTarget) -> RuleItem {
    let payload = match change {
        PolicyChange::Access { .. } => RulePayload::Access,
        PolicyChange::Mask { mask, column, .. } => RulePayload::Mask {
            mask: *mask,
            value_expr: mask_value_expr(*mask, column, target.catalog_aware()),
        },
        PolicyChange::RowFilter { filter, .. } => RulePayload::RowFilter {
            expr: filter.trim().to_owned(),
        },
    };

    RuleItem {
        accesses: target.accesses.clone(),
        members: change.members().clone(),
        payload,
    }
}

/// Masking expression applied by the backend for one column.
///
/// Catalog-aware engines hash inline; other engines delegate custom masks
/// to the platform UDF and let the authority's builtin handle hashing.
fn mask_value_expr(mask: MaskKind, column: &str, catalog_aware: bool) -> Option<String> {
    match (catalog_aware, mask) {
        (true, MaskKind::Hash | MaskKind::Custom) => Some(format!("upper(md5(`{column}`))")),
        (false, MaskKind::Custom) => Some(format!("default.uppermd5(`{column}`)")),
        _ => None,
    }
}

fn new_document(change: &PolicyChange, target: &SyncTarget, item: RuleItem) -> PolicyDocument {
    PolicyDocument {
        id: None,
        service: target.service.clone(),
        name: target.policy_name.clone(),
        kind: change.kind(),
        resource: change.resource(target.catalog.as_deref()),
        items: vec![item],
        description: Some(format!("managed policy {}", target.policy_name)),
    }
}

/// One matching rule for grants and revokes: exact access-set equality for
/// plain access items, payload equality for mask and row filter items.
fn payload_matches(item: &RuleItem, desired: &RuleItem, change: &PolicyChange) -> bool {
    match change {
        PolicyChange::Access { .. } => {
            matches!(item.payload, RulePayload::Access) && item.accesses == desired.accesses
        }
        PolicyChange::Mask { mask, .. } => {
            matches!(&item.payload, RulePayload::Mask { mask: held, .. } if held == mask)
        }
        PolicyChange::RowFilter { filter, .. } => {
            matches!(&item.payload, RulePayload::RowFilter { expr } if expr == filter.trim())
        }
    }
}
