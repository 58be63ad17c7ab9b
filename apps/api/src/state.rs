use std::sync::Arc;
use std::time::Duration;

use lakewarden_application::{
    AccountService, DirectoryPort, IntentRepository, PermissionService, PolicyAuthority,
    RoleSyncService, StorageQuotaPort, SyncOrchestrator,
};
use lakewarden_core::AppError;
use lakewarden_infrastructure::{
    PostgresIntentRepository, ProcessDirectoryPort, ProcessQuotaPort, RestPolicyAuthority,
};
use sqlx::PgPool;

use crate::api_config::ApiConfig;

/// Shared service handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub permissions: Arc<PermissionService>,
    pub roles: Arc<RoleSyncService>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    /// Wires adapters and services from the loaded configuration.
    pub fn build(config: &ApiConfig, pool: PgPool) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

        let authority: Arc<dyn PolicyAuthority> = Arc::new(RestPolicyAuthority::new(
            http_client,
            config.authority.clone(),
        ));
        let quota: Arc<dyn StorageQuotaPort> =
            Arc::new(ProcessQuotaPort::new(config.quota_tool.clone()));
        let directory: Arc<dyn DirectoryPort> =
            Arc::new(ProcessDirectoryPort::new(config.directory_tool.clone()));
        let repository: Arc<dyn IntentRepository> =
            Arc::new(PostgresIntentRepository::new(pool));

        let orchestrator = Arc::new(SyncOrchestrator::new(
            authority.clone(),
            quota,
            config.topology.clone(),
            config.retry,
        ));
        let permissions = Arc::new(PermissionService::new(repository, orchestrator));
        let roles = Arc::new(RoleSyncService::new(authority, config.retry));
        let accounts = Arc::new(AccountService::new(
            directory,
            roles.clone(),
            config.role_service.clone(),
        ));

        Ok(Self {
            permissions,
            roles,
            accounts,
        })
    }
}
