//! Domain model and pure reconciliation logic.

#![forbid(unsafe_code)]

mod access;
mod fanout;
mod intent;
mod policy;
mod principal;
mod reconcile;
mod role;

pub use access::AccessKind;
pub use fanout::{ServiceRoute, ServiceTopology, SyncTarget, expand_targets};
pub use intent::{Grantee, IntentKind, PermissionIntent, SyncOperation};
pub use policy::{
    MaskKind, PolicyDocument, PolicyKind, ResourceSelector, RuleItem, RulePayload, WILDCARD,
    name_segment,
};
pub use principal::PrincipalSet;
pub use reconcile::{GrantOutcome, PolicyChange, RevokeOutcome, build_rule_item, grant, revoke};
pub use role::{RoleDocument, merge_members, subtract_members};
