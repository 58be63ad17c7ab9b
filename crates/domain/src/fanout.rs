use std::collections::BTreeSet;

use lakewarden_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::access::AccessKind;
use crate::reconcile::PolicyChange;

/// One configured backend service the same logical rule must reach.
///
/// A route with `catalogs: Some(..)` is catalog-aware: every catalog gets an
/// independent policy document whose name carries a `service.catalog.`
/// prefix. `Some(vec![])` is a configuration error surfaced at expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRoute {
    /// Service name registered in the authority.
    pub name: String,
    /// Catalogs to duplicate policies under, when the engine is
    /// catalog-aware.
    pub catalogs: Option<Vec<String>>,
}

impl ServiceRoute {
    /// Creates a route for a plain (catalog-unaware) service.
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            catalogs: None,
        }
    }

    /// Creates a route for a catalog-aware service.
    #[must_use]
    pub fn catalog_aware(name: impl Into<String>, catalogs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            catalogs: Some(catalogs),
        }
    }
}

/// The set of backend services every intent fans out across.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTopology {
    /// Configured routes, in fan-out order.
    pub routes: Vec<ServiceRoute>,
}

impl ServiceTopology {
    /// Creates a topology from the given routes.
    #[must_use]
    pub fn new(routes: Vec<ServiceRoute>) -> Self {
        Self { routes }
    }
}

/// One reconciliation target produced by fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    /// Service receiving the document.
    pub service: String,
    /// Catalog on catalog-aware services.
    pub catalog: Option<String>,
    /// Deterministic policy document name.
    pub policy_name: String,
    /// Access tokens after engine alias expansion.
    pub accesses: BTreeSet<AccessKind>,
}

impl SyncTarget {
    /// Returns whether the target belongs to a catalog-aware engine.
    #[must_use]
    pub fn catalog_aware(&self) -> bool {
        self.catalog.is_some()
    }
}

/// Expands one policy change into its independent reconciliation targets.
///
/// Targets are ordered by route then catalog configuration order; all are
/// reconciled independently and a partial failure is reported per-target.
/// There is no cross-target atomicity.
pub fn expand_targets(
    change: &PolicyChange,
    topology: &ServiceTopology,
) -> AppResult<Vec<SyncTarget>> {
    if topology.routes.is_empty() {
        return Err(AppError::Validation(
            "no backend services are configured for fan-out".to_owned(),
        ));
    }

    let base_name = change.base_name();
    let mut targets = Vec::new();

    for route in &topology.routes {
        match &route.catalogs {
            None => targets.push(SyncTarget {
                service: route.name.clone(),
                catalog: None,
                policy_name: base_name.clone(),
                accesses: change.accesses(),
            }),
            Some(catalogs) => {
                if catalogs.is_empty() {
                    return Err(AppError::Validation(format!(
                        "catalog-aware service '{}' has no catalogs configured",
                        route.name
                    )));
                }
                for catalog in catalogs {
                    targets.push(SyncTarget {
                        service: route.name.clone(),
                        catalog: Some(catalog.clone()),
                        policy_name: format!("{}.{}.{}", route.name, catalog, base_name),
                        accesses: expand_engine_accesses(change),
                    });
                }
            }
        }
    }

    Ok(targets)
}

/// Applies the catalog-aware engine's access aliases: a bare `all` becomes
/// the engine's full privilege list and a bare `select` implies `show`.
/// Only plain access changes carry expandable aliases.
fn expand_engine_accesses(change: &PolicyChange) -> BTreeSet<AccessKind> {
    let accesses = change.accesses();
    if !matches!(change, PolicyChange::Access { .. }) {
        return accesses;
    }

    if accesses == BTreeSet::from([AccessKind::All]) {
        return AccessKind::engine_full_privileges();
    }
    if accesses == BTreeSet::from([AccessKind::Select]) {
        return BTreeSet::from([AccessKind::Select, AccessKind::Show]);
    }
    accesses
}
