use lakewarden_core::{AppError, AppResult, BatchItemError};
use lakewarden_domain::{PermissionIntent, SyncOperation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::intent_ports::StoredIntent;

use super::PermissionService;

/// Consistency mode for bulk intent creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Every item is created and synchronized independently; failures do
    /// not block the remaining items.
    PerRecord,
    /// All items are created locally first and synchronized as one group;
    /// any failure rolls back every record of the batch.
    AllOrNothing,
}

/// Result of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Records persisted and synchronized.
    pub created: Vec<StoredIntent>,
    /// Per-item failures, by submitted position.
    pub failed: Vec<BatchItemError>,
}

impl PermissionService {
    /// Creates many intents in one of the two consistency modes.
    pub async fn import_batch(
        &self,
        mode: ImportMode,
        intents: Vec<PermissionIntent>,
    ) -> AppResult<ImportReport> {
        if intents.is_empty() {
            return Err(AppError::Validation(
                "an import batch must contain at least one intent".to_owned(),
            ));
        }

        match mode {
            ImportMode::PerRecord => self.import_per_record(intents).await,
            ImportMode::AllOrNothing => self.import_all_or_nothing(intents).await,
        }
    }

    async fn import_per_record(
        &self,
        intents: Vec<PermissionIntent>,
    ) -> AppResult<ImportReport> {
        let mut report = ImportReport::default();

        for (index, intent) in intents.into_iter().enumerate() {
            match self.create(intent).await {
                Ok(stored) => report.created.push(stored),
                Err(error) => report.failed.push(BatchItemError {
                    index,
                    message: error.to_string(),
                }),
            }
        }

        Ok(report)
    }

    async fn import_all_or_nothing(
        &self,
        intents: Vec<PermissionIntent>,
    ) -> AppResult<ImportReport> {
        let mut created = Vec::with_capacity(intents.len());
        let mut failures = Vec::new();

        for (index, intent) in intents.iter().enumerate() {
            let stored = async {
                intent.validate()?;
                if let Some(existing) = self.repository.find_duplicate(intent, None).await? {
                    return Err(AppError::Conflict(format!(
                        "an identical intent already exists ({existing})"
                    )));
                }
                self.repository.insert(intent).await
            }
            .await;

            match stored {
                Ok(stored) => created.push((index, stored)),
                Err(error) => failures.push(BatchItemError {
                    index,
                    message: error.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            for (index, stored) in &created {
                if let Err(error) = self
                    .orchestrator
                    .sync(stored.id, &stored.intent, SyncOperation::Grant)
                    .await
                {
                    failures.push(BatchItemError {
                        index: *index,
                        message: error.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            return Ok(ImportReport {
                created: created.into_iter().map(|(_, stored)| stored).collect(),
                failed: Vec::new(),
            });
        }

        // Full rollback: the batch is all-or-nothing, so every record
        // created in this pass is removed again.
        for (_, stored) in &created {
            if let Err(cleanup_error) = self.repository.delete(stored.id).await {
                warn!(
                    intent_id = %stored.id,
                    error = %cleanup_error,
                    "failed to roll back batch intent"
                );
            }
        }

        Err(AppError::PartialBatch(failures))
    }
}
