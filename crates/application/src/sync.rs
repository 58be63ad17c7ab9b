//! At-least-once synchronization between local intents and the authority.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lakewarden_core::{AppError, AppResult, IntentId};
use lakewarden_domain::{
    GrantOutcome, PermissionIntent, PolicyChange, RevokeOutcome, ServiceTopology, SyncOperation,
    SyncTarget, expand_targets, grant, revoke,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command_ports::{QuotaChange, StorageQuotaPort};
use crate::policy_ports::PolicyAuthority;

#[cfg(test)]
mod tests;

/// Fixed-interval retry budget for synchronization calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Runs an operation under the retry policy.
///
/// Only [`AppError::Transient`] failures are retried; anything else is
/// returned immediately. Exhausting the budget escalates the last transient
/// failure to [`AppError::SyncFailed`] with the consumed attempt count.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, operation: &str, mut run: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0_u32;

    loop {
        attempt += 1;
        match run().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < attempts => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    error = %error,
                    "retrying after transient failure"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(error) if error.is_transient() => {
                return Err(AppError::SyncFailed {
                    attempts: attempt,
                    message: error.to_string(),
                });
            }
            Err(error) => return Err(error),
        }
    }
}

/// Lifecycle of one synchronization job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobState {
    /// Created, not yet attempted.
    Pending,
    /// One reconciliation attempt is running.
    InFlight,
    /// Waiting out the fixed delay after a transient failure.
    Retrying,
    /// Remote state converged.
    Succeeded,
    /// Retry budget exhausted or a terminal error occurred.
    Failed,
}

/// Transient unit of synchronization work for one intent transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    /// Intent the job converges.
    pub intent_id: IntentId,
    /// Direction of the pass.
    pub operation: SyncOperation,
    /// Current lifecycle state.
    pub state: SyncJobState,
    /// Attempts consumed so far.
    pub attempt_count: u32,
    /// Last observed failure, if any.
    pub last_error: Option<String>,
}

impl SyncJob {
    /// Creates a pending job for one intent transition.
    #[must_use]
    pub fn new(intent_id: IntentId, operation: SyncOperation) -> Self {
        Self {
            intent_id,
            operation,
            state: SyncJobState::Pending,
            attempt_count: 0,
            last_error: None,
        }
    }
}

/// Remote effect applied to one fan-out target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAction {
    /// A new policy document was created.
    Created,
    /// The existing document was replaced.
    Updated,
    /// The document ran empty and was deleted.
    Deleted,
    /// Remote state already matched; nothing written.
    Unchanged,
    /// No rule item held the revoked principals; nothing written.
    NothingToRevoke,
}

/// Result of reconciling one fan-out target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOutcome {
    /// Service that received the pass.
    pub service: String,
    /// Catalog on catalog-aware services.
    pub catalog: Option<String>,
    /// Policy document name.
    pub policy_name: String,
    /// Effect applied.
    pub action: TargetAction,
}

/// Per-target outcomes of one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Outcomes in fan-out order.
    pub outcomes: Vec<TargetOutcome>,
}

/// Supervises intent synchronization with at-least-once semantics.
///
/// One job runs one reconciliation attempt at a time; concurrent jobs for
/// different intents are independent and unordered. There is no
/// optimistic-concurrency guard on remote documents: concurrent passes over
/// the same (service, policy-name) race on read-modify-write, so callers
/// needing that guarantee must serialize per document.
pub struct SyncOrchestrator {
    authority: Arc<dyn PolicyAuthority>,
    quota: Arc<dyn StorageQuotaPort>,
    topology: ServiceTopology,
    retry: RetryPolicy,
}

impl SyncOrchestrator {
    /// Creates an orchestrator over the given ports and fan-out topology.
    #[must_use]
    pub fn new(
        authority: Arc<dyn PolicyAuthority>,
        quota: Arc<dyn StorageQuotaPort>,
        topology: ServiceTopology,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            authority,
            quota,
            topology,
            retry,
        }
    }

    /// Synchronizes one intent transition, creating and driving a job.
    pub async fn sync(
        &self,
        intent_id: IntentId,
        intent: &PermissionIntent,
        operation: SyncOperation,
    ) -> AppResult<SyncReport> {
        let mut job = SyncJob::new(intent_id, operation);
        self.run(&mut job, intent).await
    }

    /// Drives one job to a terminal state.
    ///
    /// Transient failures move the job to `Retrying` and re-enter
    /// `InFlight` after the fixed delay; an exhausted budget or a terminal
    /// error moves it to `Failed` and the error is always surfaced.
    pub async fn run(
        &self,
        job: &mut SyncJob,
        intent: &PermissionIntent,
    ) -> AppResult<SyncReport> {
        let attempts = self.retry.attempts.max(1);

        loop {
            job.attempt_count += 1;
            job.state = SyncJobState::InFlight;

            match self.reconcile_once(intent, job.operation).await {
                Ok(report) => {
                    job.state = SyncJobState::Succeeded;
                    info!(
                        intent_id = %job.intent_id,
                        operation = job.operation.as_str(),
                        attempts = job.attempt_count,
                        targets = report.outcomes.len(),
                        "intent synchronized"
                    );
                    return Ok(report);
                }
                Err(error) if error.is_transient() && job.attempt_count < attempts => {
                    job.last_error = Some(error.to_string());
                    job.state = SyncJobState::Retrying;
                    warn!(
                        intent_id = %job.intent_id,
                        operation = job.operation.as_str(),
                        attempt = job.attempt_count,
                        max_attempts = attempts,
                        error = %error,
                        "synchronization attempt failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(error) => {
                    let failure = if error.is_transient() {
                        AppError::SyncFailed {
                            attempts: job.attempt_count,
                            message: error.to_string(),
                        }
                    } else {
                        error
                    };
                    job.last_error = Some(failure.to_string());
                    job.state = SyncJobState::Failed;
                    warn!(
                        intent_id = %job.intent_id,
                        operation = job.operation.as_str(),
                        attempts = job.attempt_count,
                        error = %failure,
                        "synchronization failed"
                    );
                    return Err(failure);
                }
            }
        }
    }

    async fn reconcile_once(
        &self,
        intent: &PermissionIntent,
        operation: SyncOperation,
    ) -> AppResult<SyncReport> {
        intent.validate()?;

        match (intent, intent.to_policy_change()) {
            (
                PermissionIntent::Quota {
                    database,
                    gigabytes,
                },
                _,
            ) => self.apply_quota(database, *gigabytes, operation).await,
            (_, Some(change)) => self.reconcile_policy(&change, operation).await,
            (_, None) => Err(AppError::Internal(
                "non-quota intent produced no policy change".to_owned(),
            )),
        }
    }

    /// Quota intents bypass the policy store. Dropping a quota record does
    /// not reset the filesystem quota, so revoke passes write nothing.
    async fn apply_quota(
        &self,
        database: &str,
        gigabytes: f64,
        operation: SyncOperation,
    ) -> AppResult<SyncReport> {
        let action = match operation {
            SyncOperation::Grant => {
                self.quota
                    .apply(&QuotaChange {
                        database: database.to_owned(),
                        gigabytes,
                    })
                    .await?;
                TargetAction::Updated
            }
            SyncOperation::Revoke => TargetAction::NothingToRevoke,
        };

        Ok(SyncReport {
            outcomes: vec![TargetOutcome {
                service: "storage".to_owned(),
                catalog: None,
                policy_name: format!("quota.{database}"),
                action,
            }],
        })
    }

    /// Reconciles every fan-out target of one change, sequentially.
    ///
    /// Targets are independent: the first failing target aborts the pass
    /// with an error naming it, earlier targets keep their applied state,
    /// and a retried pass re-reconciles them idempotently.
    async fn reconcile_policy(
        &self,
        change: &PolicyChange,
        operation: SyncOperation,
    ) -> AppResult<SyncReport> {
        change.validate()?;
        let targets = expand_targets(change, &self.topology)?;
        let mut outcomes = Vec::with_capacity(targets.len());

        for target in targets {
            let action = self
                .reconcile_target(change, &target, operation)
                .await
                .map_err(|error| annotate_target(error, &target))?;
            info!(
                service = %target.service,
                policy = %target.policy_name,
                operation = operation.as_str(),
                action = ?action,
                "target reconciled"
            );
            outcomes.push(TargetOutcome {
                service: target.service,
                catalog: target.catalog,
                policy_name: target.policy_name,
                action,
            });
        }

        Ok(SyncReport { outcomes })
    }

    async fn reconcile_target(
        &self,
        change: &PolicyChange,
        target: &SyncTarget,
        operation: SyncOperation,
    ) -> AppResult<TargetAction> {
        let existing = self
            .authority
            .find_policy(&target.service, &target.policy_name)
            .await?;

        match operation {
            SyncOperation::Grant => match grant(change, target, existing)? {
                GrantOutcome::Unchanged => Ok(TargetAction::Unchanged),
                GrantOutcome::Create(document) => {
                    self.authority.create_policy(&document).await?;
                    Ok(TargetAction::Created)
                }
                GrantOutcome::Update(document) => {
                    let policy_id = require_id(&document)?;
                    self.authority.update_policy(policy_id, &document).await?;
                    Ok(TargetAction::Updated)
                }
            },
            SyncOperation::Revoke => {
                let Some(document) = existing else {
                    return Ok(TargetAction::NothingToRevoke);
                };
                let policy_id = require_id(&document)?;
                match revoke(change, target, document)? {
                    RevokeOutcome::NothingToRevoke => Ok(TargetAction::NothingToRevoke),
                    RevokeOutcome::Update(document) => {
                        self.authority.update_policy(policy_id, &document).await?;
                        Ok(TargetAction::Updated)
                    }
                    RevokeOutcome::Delete => {
                        self.authority.delete_policy(policy_id).await?;
                        Ok(TargetAction::Deleted)
                    }
                }
            }
        }
    }
}

fn require_id(document: &lakewarden_domain::PolicyDocument) -> AppResult<i64> {
    document.id.ok_or_else(|| {
        AppError::Internal(format!(
            "authority returned policy '{}' without an id",
            document.name
        ))
    })
}

fn annotate_target(error: AppError, target: &SyncTarget) -> AppError {
    let context = format!("target {}/{}", target.service, target.policy_name);
    match error {
        AppError::Transient(message) => AppError::Transient(format!("{context}: {message}")),
        AppError::Internal(message) => AppError::Internal(format!("{context}: {message}")),
        AppError::Validation(message) => AppError::Validation(format!("{context}: {message}")),
        other => other,
    }
}
