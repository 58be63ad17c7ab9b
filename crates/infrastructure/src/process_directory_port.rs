use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use lakewarden_application::{DirectoryAccountSpec, DirectoryPort};
use lakewarden_core::{AppError, AppResult};

/// Settings for the directory provisioning tool invocation.
#[derive(Debug, Clone)]
pub struct DirectoryToolConfig {
    /// Provisioning binary or script.
    pub command: String,
}

/// Provisions directory accounts by shelling out to the platform tool.
pub struct ProcessDirectoryPort {
    config: DirectoryToolConfig,
}

impl ProcessDirectoryPort {
    /// Creates the port with the given tool settings.
    #[must_use]
    pub fn new(config: DirectoryToolConfig) -> Self {
        Self { config }
    }

    async fn run(&self, args: &[&str]) -> AppResult<()> {
        let output = Command::new(&self.config.command)
            .args(args)
            .output()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to run directory tool: {error}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Internal(format!(
                "directory tool exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryPort for ProcessDirectoryPort {
    async fn create_account(&self, spec: &DirectoryAccountSpec) -> AppResult<()> {
        self.run(&[
            "create-user",
            "--username",
            spec.username.as_str(),
            "--department",
            spec.department.as_str(),
            "--role",
            spec.role_name.as_str(),
        ])
        .await?;
        info!(username = %spec.username, "directory account created");
        Ok(())
    }

    async fn delete_account(&self, username: &str) -> AppResult<()> {
        self.run(&["delete-user", "--username", username]).await?;
        info!(username, "directory account deleted");
        Ok(())
    }
}
