//! Idempotent role-membership reconciliation against the authority.

use std::sync::Arc;

use lakewarden_core::{AppError, AppResult};
use lakewarden_domain::{PrincipalSet, RoleDocument, merge_members, subtract_members};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::policy_ports::PolicyAuthority;
use crate::sync::{RetryPolicy, with_retry};

/// Remote effect of one membership reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOutcome {
    /// The role did not exist and was created with the requested members.
    Created,
    /// The role existed and its membership changed.
    Updated,
    /// Remote membership already matched; nothing written.
    Unchanged,
}

/// Reconciles role membership as an idempotent set union/difference.
pub struct RoleSyncService {
    authority: Arc<dyn PolicyAuthority>,
    retry: RetryPolicy,
}

impl RoleSyncService {
    /// Creates the service over the policy authority port.
    #[must_use]
    pub fn new(authority: Arc<dyn PolicyAuthority>, retry: RetryPolicy) -> Self {
        Self { authority, retry }
    }

    /// Ensures every requested principal is a member of the role, creating
    /// the role when absent. Issues at most one remote write.
    pub async fn ensure_membership(
        &self,
        service: &str,
        role_name: &str,
        add: &PrincipalSet,
    ) -> AppResult<MembershipOutcome> {
        validate_request(role_name, add)?;
        with_retry(self.retry, "ensure_role_membership", || {
            self.ensure_once(service, role_name, add)
        })
        .await
    }

    /// Removes the requested principals from the role's membership. A
    /// missing role is a no-op, not an error.
    pub async fn remove_membership(
        &self,
        service: &str,
        role_name: &str,
        remove: &PrincipalSet,
    ) -> AppResult<MembershipOutcome> {
        validate_request(role_name, remove)?;
        with_retry(self.retry, "remove_role_membership", || {
            self.remove_once(service, role_name, remove)
        })
        .await
    }

    /// Removes a user from every role whose membership contains it and
    /// returns the number of roles touched. Each role update is an
    /// independent remote call.
    pub async fn remove_principal_from_all_roles(&self, user: &str) -> AppResult<u32> {
        if user.trim().is_empty() {
            return Err(AppError::Validation(
                "user name must not be empty".to_owned(),
            ));
        }

        let roles = with_retry(self.retry, "search_roles_for_principal", || {
            self.authority.roles_containing_user(user)
        })
        .await?;

        let remove = PrincipalSet::user(user);
        let mut touched = 0_u32;
        for role in roles {
            let Some(updated) = subtract_members(&role, &remove) else {
                continue;
            };
            let role_id = require_role_id(&role)?;
            with_retry(self.retry, "remove_principal_from_role", || {
                self.authority.update_role(role_id, &updated)
            })
            .await?;
            info!(user, role = %role.name, "removed principal from role");
            touched += 1;
        }

        Ok(touched)
    }

    async fn ensure_once(
        &self,
        service: &str,
        role_name: &str,
        add: &PrincipalSet,
    ) -> AppResult<MembershipOutcome> {
        match self.authority.find_role(service, role_name).await? {
            None => {
                let document = RoleDocument::new(role_name, add.clone())?;
                self.authority.create_role(service, &document).await?;
                info!(service, role = role_name, "created role");
                Ok(MembershipOutcome::Created)
            }
            Some(existing) => match merge_members(&existing, add) {
                None => Ok(MembershipOutcome::Unchanged),
                Some(updated) => {
                    let role_id = require_role_id(&existing)?;
                    self.authority.update_role(role_id, &updated).await?;
                    info!(service, role = role_name, "extended role membership");
                    Ok(MembershipOutcome::Updated)
                }
            },
        }
    }

    async fn remove_once(
        &self,
        service: &str,
        role_name: &str,
        remove: &PrincipalSet,
    ) -> AppResult<MembershipOutcome> {
        match self.authority.find_role(service, role_name).await? {
            None => Ok(MembershipOutcome::Unchanged),
            Some(existing) => match subtract_members(&existing, remove) {
                None => Ok(MembershipOutcome::Unchanged),
                Some(updated) => {
                    let role_id = require_role_id(&existing)?;
                    self.authority.update_role(role_id, &updated).await?;
                    info!(service, role = role_name, "reduced role membership");
                    Ok(MembershipOutcome::Updated)
                }
            },
        }
    }
}

fn validate_request(role_name: &str, members: &PrincipalSet) -> AppResult<()> {
    if role_name.trim().is_empty() {
        return Err(AppError::Validation(
            "role name must not be empty".to_owned(),
        ));
    }
    if members.is_empty() {
        return Err(AppError::Validation(
            "a membership change requires at least one principal".to_owned(),
        ));
    }
    Ok(())
}

fn require_role_id(document: &RoleDocument) -> AppResult<i64> {
    document.id.ok_or_else(|| {
        AppError::Internal(format!(
            "authority returned role '{}' without an id",
            document.name
        ))
    })
}
