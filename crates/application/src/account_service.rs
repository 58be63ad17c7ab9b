//! Directory-service account administration.

use std::sync::Arc;

use lakewarden_core::{AppError, AppResult};
use lakewarden_domain::PrincipalSet;
use tracing::info;

use crate::command_ports::{DirectoryAccountSpec, DirectoryPort};
use crate::role_sync_service::RoleSyncService;

/// Provisions directory accounts and keeps their role-based access in step.
pub struct AccountService {
    directory: Arc<dyn DirectoryPort>,
    roles: Arc<RoleSyncService>,
    role_service: String,
}

impl AccountService {
    /// Creates the service. `role_service` names the authority service that
    /// hosts role documents.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryPort>,
        roles: Arc<RoleSyncService>,
        role_service: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            roles,
            role_service: role_service.into(),
        }
    }

    /// Provisions a directory account and enrolls it in its role.
    pub async fn create_account(&self, spec: DirectoryAccountSpec) -> AppResult<()> {
        if spec.username.trim().is_empty() {
            return Err(AppError::Validation(
                "account username must not be empty".to_owned(),
            ));
        }
        if spec.role_name.trim().is_empty() {
            return Err(AppError::Validation(
                "account role name must not be empty".to_owned(),
            ));
        }

        self.directory.create_account(&spec).await?;
        self.roles
            .ensure_membership(
                &self.role_service,
                &spec.role_name,
                &PrincipalSet::user(&spec.username),
            )
            .await?;
        info!(username = %spec.username, role = %spec.role_name, "account provisioned");
        Ok(())
    }

    /// Removes a directory account and strips it from every role, so no
    /// role-based access survives the deletion. Returns the number of roles
    /// the account was removed from.
    pub async fn delete_account(&self, username: &str) -> AppResult<u32> {
        if username.trim().is_empty() {
            return Err(AppError::Validation(
                "account username must not be empty".to_owned(),
            ));
        }

        self.directory.delete_account(username).await?;
        let touched = self.roles.remove_principal_from_all_roles(username).await?;
        info!(username, roles_touched = touched, "account removed");
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use lakewarden_domain::PrincipalSet;

    use crate::command_ports::DirectoryAccountSpec;
    use crate::role_sync_service::RoleSyncService;
    use crate::sync::RetryPolicy;
    use crate::test_support::{FakeDirectoryPort, FakePolicyAuthority};

    use super::AccountService;

    fn harness() -> (Arc<FakeDirectoryPort>, Arc<FakePolicyAuthority>, AccountService) {
        let directory = Arc::new(FakeDirectoryPort::default());
        let authority = Arc::new(FakePolicyAuthority::default());
        let roles = Arc::new(RoleSyncService::new(
            authority.clone(),
            RetryPolicy {
                attempts: 3,
                delay: Duration::ZERO,
            },
        ));
        let service = AccountService::new(directory.clone(), roles, "warehouse_sql");
        (directory, authority, service)
    }

    fn spec(username: &str) -> DirectoryAccountSpec {
        DirectoryAccountSpec {
            username: username.to_owned(),
            department: "analytics".to_owned(),
            role_name: "analysts".to_owned(),
        }
    }

    #[tokio::test]
    async fn creating_an_account_provisions_and_enrolls_it() {
        let (directory, authority, service) = harness();

        assert!(service.create_account(spec("alice")).await.is_ok());

        assert_eq!(directory.created.lock().await.len(), 1);
        let roles = authority.roles.lock().await;
        let role = roles
            .get(&("warehouse_sql".to_owned(), "analysts".to_owned()))
            .cloned();
        assert!(role.is_some_and(|role| role.members.users.contains("alice")));
    }

    #[tokio::test]
    async fn deleting_an_account_strips_all_role_access() {
        let (directory, authority, service) = harness();

        assert!(service.create_account(spec("alice")).await.is_ok());
        // A second membership outside the account's own role.
        {
            let roles = Arc::new(RoleSyncService::new(
                authority.clone(),
                RetryPolicy {
                    attempts: 1,
                    delay: Duration::ZERO,
                },
            ));
            assert!(
                roles
                    .ensure_membership("warehouse_sql", "etl", &PrincipalSet::user("alice"))
                    .await
                    .is_ok()
            );
        }

        let touched = service.delete_account("alice").await;
        assert_eq!(touched.ok(), Some(2));
        assert_eq!(directory.deleted.lock().await.len(), 1);
        assert!(
            authority
                .roles
                .lock()
                .await
                .values()
                .all(|role| !role.members.users.contains("alice"))
        );
    }
}
