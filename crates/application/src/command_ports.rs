use async_trait::async_trait;
use lakewarden_core::AppResult;
use serde::{Deserialize, Serialize};

/// One storage quota assignment for a database's warehouse directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaChange {
    /// Database whose warehouse directory receives the quota.
    pub database: String,
    /// Quota in gigabytes.
    pub gigabytes: f64,
}

/// Port for the filesystem quota side channel.
///
/// Applying the same quota twice is a no-op at the filesystem level, so
/// implementations are free to be retried.
#[async_trait]
pub trait StorageQuotaPort: Send + Sync {
    /// Applies the quota change.
    async fn apply(&self, change: &QuotaChange) -> AppResult<()>;
}

/// Input for provisioning one directory-service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAccountSpec {
    /// Account user name.
    pub username: String,
    /// Owning department.
    pub department: String,
    /// Authority role the account belongs to.
    pub role_name: String,
}

/// Port for the directory-service provisioning side channel.
#[async_trait]
pub trait DirectoryPort: Send + Sync {
    /// Provisions a directory account.
    async fn create_account(&self, spec: &DirectoryAccountSpec) -> AppResult<()>;

    /// Removes a directory account.
    async fn delete_account(&self, username: &str) -> AppResult<()>;
}
