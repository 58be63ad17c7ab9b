use std::collections::BTreeSet;
use std::str::FromStr;

use lakewarden_core::AppError;
use serde::{Deserialize, Serialize};

use crate::access::AccessKind;
use crate::principal::PrincipalSet;

/// Wildcard token accepted in resource selectors.
pub const WILDCARD: &str = "*";

/// Column masking behavior attached to a mask rule item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    /// Replace values with the authority's builtin hash.
    Hash,
    /// Exempt the principals from masking.
    Unmasked,
    /// Apply the platform's custom masking expression.
    Custom,
}

impl MaskKind {
    /// Returns the authority's wire token for this mask.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "MASK_HASH",
            Self::Unmasked => "MASK_NONE",
            Self::Custom => "CUSTOM",
        }
    }
}

impl FromStr for MaskKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "MASK_HASH" => Ok(Self::Hash),
            "MASK_NONE" => Ok(Self::Unmasked),
            "CUSTOM" => Ok(Self::Custom),
            _ => Err(AppError::Validation(format!(
                "mask kind must be MASK_HASH, MASK_NONE, or CUSTOM, got '{value}'"
            ))),
        }
    }
}

/// Policy document categories known to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Plain table/column access.
    Access,
    /// Column masking.
    Mask,
    /// Row filtering.
    RowFilter,
}

impl PolicyKind {
    /// Returns the numeric `policyType` the authority stores.
    #[must_use]
    pub fn wire_type(&self) -> i32 {
        match self {
            Self::Access => 0,
            Self::Mask => 1,
            Self::RowFilter => 2,
        }
    }

    /// Returns the suffix token used in derived policy names.
    #[must_use]
    pub fn name_suffix(&self) -> &'static str {
        match self {
            Self::Access => "normal",
            Self::Mask => "mask",
            Self::RowFilter => "row_filter",
        }
    }

    /// Parses the numeric `policyType` stored by the authority.
    pub fn from_wire_type(value: i32) -> Result<Self, AppError> {
        match value {
            0 => Ok(Self::Access),
            1 => Ok(Self::Mask),
            2 => Ok(Self::RowFilter),
            _ => Err(AppError::Internal(format!(
                "authority returned unknown policy type {value}"
            ))),
        }
    }
}

/// Kind-specific payload carried by one rule item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RulePayload {
    /// Plain access; no extra payload.
    Access,
    /// Column mask payload.
    Mask {
        /// Masking behavior.
        mask: MaskKind,
        /// Optional masking expression for custom masks.
        value_expr: Option<String>,
    },
    /// Row filter payload.
    RowFilter {
        /// Filter expression applied to every matching query.
        expr: String,
    },
}

/// One entry in a policy document binding principals and accesses together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleItem {
    /// Granted access tokens.
    pub accesses: BTreeSet<AccessKind>,
    /// Principals the item applies to. An item with no principals is
    /// semantically dead and must be pruned.
    pub members: PrincipalSet,
    /// Kind-specific payload.
    pub payload: RulePayload,
}

/// Resource selector a policy document is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSelector {
    /// Database name; wildcard only valid for plain access policies.
    pub database: String,
    /// Table name.
    pub table: String,
    /// Column name; absent for row filter policies.
    pub column: Option<String>,
    /// Catalog name on catalog-aware services.
    pub catalog: Option<String>,
}

/// One named rule set owned by the external policy authority.
///
/// The name derives deterministically from (service, catalog, database,
/// table, column-or-`all`, kind) so the same logical target always maps to
/// the same document. A document whose items run empty must be deleted
/// remotely rather than updated into an empty shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Identifier assigned by the authority; absent before creation.
    pub id: Option<i64>,
    /// Owning service.
    pub service: String,
    /// Derived document name.
    pub name: String,
    /// Policy category.
    pub kind: PolicyKind,
    /// Resource the document applies to.
    pub resource: ResourceSelector,
    /// Ordered rule items.
    pub items: Vec<RuleItem>,
    /// Free-form description shown in the authority's UI.
    pub description: Option<String>,
}

/// Replaces the wildcard token with the `all` naming segment.
#[must_use]
pub fn name_segment(value: &str) -> &str {
    if value == WILDCARD { "all" } else { value }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{MaskKind, PolicyKind, name_segment};

    #[test]
    fn mask_kind_roundtrips_wire_token() {
        for kind in [MaskKind::Hash, MaskKind::Unmasked, MaskKind::Custom] {
            assert_eq!(MaskKind::from_str(kind.as_str()).ok(), Some(kind));
        }
    }

    #[test]
    fn policy_kind_wire_types_are_stable() {
        assert_eq!(PolicyKind::Access.wire_type(), 0);
        assert_eq!(PolicyKind::Mask.wire_type(), 1);
        assert_eq!(PolicyKind::RowFilter.wire_type(), 2);
        assert!(PolicyKind::from_wire_type(3).is_err());
    }

    #[test]
    fn wildcard_maps_to_all_segment() {
        assert_eq!(name_segment("*"), "all");
        assert_eq!(name_segment("events"), "events");
    }
}
