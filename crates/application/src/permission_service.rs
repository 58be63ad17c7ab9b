//! CRUD-plus-synchronization surface for permission intents.

use std::sync::Arc;

use lakewarden_core::{AppError, AppResult, IntentId};
use lakewarden_domain::{IntentKind, PermissionIntent, SyncOperation};
use tracing::warn;

use crate::intent_ports::{IntentFilter, IntentRepository, Page, PageRequest, StoredIntent};
use crate::sync::SyncOrchestrator;

mod imports;
#[cfg(test)]
mod tests;

pub use imports::{ImportMode, ImportReport};

/// Administers permission intents and keeps the authority in step.
///
/// Every intent transition triggers a synchronization pass before the call
/// is considered complete; an interactive transition that cannot be
/// synchronized never leaves a phantom local record behind.
pub struct PermissionService {
    repository: Arc<dyn IntentRepository>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl PermissionService {
    /// Creates the service over the intent store and sync orchestrator.
    #[must_use]
    pub fn new(repository: Arc<dyn IntentRepository>, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            repository,
            orchestrator,
        }
    }

    /// Creates one intent and synchronizes it immediately.
    pub async fn create(&self, intent: PermissionIntent) -> AppResult<StoredIntent> {
        intent.validate()?;
        if let Some(existing) = self.repository.find_duplicate(&intent, None).await? {
            return Err(AppError::Conflict(format!(
                "an identical intent already exists ({existing})"
            )));
        }

        let stored = self.repository.insert(&intent).await?;
        self.grant_or_compensate(stored).await
    }

    /// Returns one stored intent.
    pub async fn get(&self, id: IntentId) -> AppResult<StoredIntent> {
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("intent {id}")))
    }

    /// Lists stored intents of one family, filtered and paginated.
    pub async fn list(
        &self,
        kind: IntentKind,
        filter: &IntentFilter,
        page: &PageRequest,
    ) -> AppResult<Page<StoredIntent>> {
        page.validate()?;
        self.repository.list(kind, filter, page).await
    }

    /// Replaces one intent: the old grant is revoked remotely, then the new
    /// state is persisted and granted.
    ///
    /// A failed revoke leaves the record untouched (local still matches
    /// remote). A failed grant of the new state removes the record, same as
    /// a failed create, so the store never holds an unsynchronized intent.
    pub async fn update(&self, id: IntentId, intent: PermissionIntent) -> AppResult<StoredIntent> {
        intent.validate()?;
        let current = self.get(id).await?;
        if current.intent.kind() != intent.kind() {
            return Err(AppError::Validation(
                "an intent cannot change kind on update".to_owned(),
            ));
        }
        if let Some(existing) = self.repository.find_duplicate(&intent, Some(id)).await? {
            return Err(AppError::Conflict(format!(
                "the updated intent collides with an existing one ({existing})"
            )));
        }

        self.orchestrator
            .sync(id, &current.intent, SyncOperation::Revoke)
            .await?;
        let stored = self.repository.update(id, &intent).await?;
        self.grant_or_compensate(stored).await
    }

    /// Deletes one intent after revoking its remote effect.
    pub async fn remove(&self, id: IntentId) -> AppResult<()> {
        let current = self.get(id).await?;
        self.orchestrator
            .sync(id, &current.intent, SyncOperation::Revoke)
            .await?;
        self.repository.delete(id).await?;
        Ok(())
    }

    /// Synchronizes a freshly written record, deleting it again when the
    /// grant ultimately fails.
    async fn grant_or_compensate(&self, stored: StoredIntent) -> AppResult<StoredIntent> {
        match self
            .orchestrator
            .sync(stored.id, &stored.intent, SyncOperation::Grant)
            .await
        {
            Ok(_) => Ok(stored),
            Err(error) => {
                warn!(
                    intent_id = %stored.id,
                    error = %error,
                    "synchronization failed, removing local intent"
                );
                if let Err(cleanup_error) = self.repository.delete(stored.id).await {
                    return Err(AppError::Internal(format!(
                        "synchronization failed for intent '{}': {error}; additionally failed \
                         to remove the local record: {cleanup_error}",
                        stored.id
                    )));
                }
                Err(error)
            }
        }
    }
}
