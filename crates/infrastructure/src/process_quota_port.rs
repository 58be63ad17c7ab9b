use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use lakewarden_application::{QuotaChange, StorageQuotaPort};
use lakewarden_core::{AppError, AppResult};

/// Settings for the filesystem quota tool invocation.
#[derive(Debug, Clone)]
pub struct QuotaToolConfig {
    /// Filesystem admin binary.
    pub command: String,
    /// Warehouse root the per-database directories live under.
    pub warehouse_root: String,
    /// Filesystem superuser the tool runs as.
    pub superuser: String,
}

impl Default for QuotaToolConfig {
    fn default() -> Self {
        Self {
            command: "hdfs".to_owned(),
            warehouse_root: "/user/hive/warehouse".to_owned(),
            superuser: "hdfs".to_owned(),
        }
    }
}

/// Applies storage quotas by shelling out to the filesystem admin tool.
///
/// Setting the same quota twice is a no-op at the filesystem level, so
/// failures are reported as transient and safe to retry.
pub struct ProcessQuotaPort {
    config: QuotaToolConfig,
}

impl ProcessQuotaPort {
    /// Creates the port with the given tool settings.
    #[must_use]
    pub fn new(config: QuotaToolConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StorageQuotaPort for ProcessQuotaPort {
    async fn apply(&self, change: &QuotaChange) -> AppResult<()> {
        let directory = format!(
            "{}/{}.db",
            self.config.warehouse_root.trim_end_matches('/'),
            change.database
        );
        let size = format!("{}G", change.gigabytes.round() as i64);

        let output = Command::new(&self.config.command)
            .args(["dfsadmin", "-setSpaceQuota", size.as_str(), directory.as_str()])
            .env("HADOOP_USER_NAME", &self.config.superuser)
            .output()
            .await
            .map_err(|error| {
                AppError::Transient(format!("failed to run quota tool: {error}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Transient(format!(
                "quota tool exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        info!(database = %change.database, quota = %size, "storage quota applied");
        Ok(())
    }
}
