use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lakewarden_core::{AppError, IntentId};
use lakewarden_domain::{
    Grantee, MaskKind, PermissionIntent, ServiceRoute, ServiceTopology, SyncOperation,
};

use crate::test_support::{FakePolicyAuthority, FakeQuotaPort};

use super::{RetryPolicy, SyncOrchestrator, TargetAction, with_retry};

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        delay: Duration::ZERO,
    }
}

fn orchestrator(
    authority: Arc<FakePolicyAuthority>,
    quota: Arc<FakeQuotaPort>,
    topology: ServiceTopology,
    attempts: u32,
) -> SyncOrchestrator {
    SyncOrchestrator::new(authority, quota, topology, fast_retry(attempts))
}

fn single_service() -> ServiceTopology {
    ServiceTopology::new(vec![ServiceRoute::plain("warehouse_sql")])
}

fn table_intent(user: &str) -> PermissionIntent {
    PermissionIntent::Table {
        database: "sales".to_owned(),
        table: "orders".to_owned(),
        grantee: Grantee::user(user),
    }
}

#[tokio::test]
async fn granting_twice_writes_exactly_once() {
    let authority = Arc::new(FakePolicyAuthority::default());
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority.clone(), quota, single_service(), 3);
    let intent = table_intent("alice");

    let first = orchestrator
        .sync(IntentId::new(), &intent, SyncOperation::Grant)
        .await;
    assert!(first.is_ok());

    let second = orchestrator
        .sync(IntentId::new(), &intent, SyncOperation::Grant)
        .await;
    let report = match second {
        Ok(report) => report,
        Err(error) => panic!("second grant failed: {error}"),
    };

    assert_eq!(report.outcomes[0].action, TargetAction::Unchanged);
    assert_eq!(authority.create_policy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(authority.update_policy_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn revoking_sole_principal_deletes_instead_of_updating() {
    let authority = Arc::new(FakePolicyAuthority::default());
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority.clone(), quota, single_service(), 3);
    let intent = table_intent("alice");

    assert!(
        orchestrator
            .sync(IntentId::new(), &intent, SyncOperation::Grant)
            .await
            .is_ok()
    );
    let report = match orchestrator
        .sync(IntentId::new(), &intent, SyncOperation::Revoke)
        .await
    {
        Ok(report) => report,
        Err(error) => panic!("revoke failed: {error}"),
    };

    assert_eq!(report.outcomes[0].action, TargetAction::Deleted);
    assert_eq!(authority.delete_policy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(authority.update_policy_calls.load(Ordering::SeqCst), 0);
    assert!(authority.policies.lock().await.is_empty());
}

#[tokio::test]
async fn revoking_absent_principal_writes_nothing() {
    let authority = Arc::new(FakePolicyAuthority::default());
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority.clone(), quota, single_service(), 3);

    assert!(
        orchestrator
            .sync(IntentId::new(), &table_intent("alice"), SyncOperation::Grant)
            .await
            .is_ok()
    );
    let mutations_after_grant = authority.mutation_calls();

    let report = match orchestrator
        .sync(IntentId::new(), &table_intent("carol"), SyncOperation::Revoke)
        .await
    {
        Ok(report) => report,
        Err(error) => panic!("revoke failed: {error}"),
    };

    assert_eq!(report.outcomes[0].action, TargetAction::NothingToRevoke);
    assert_eq!(authority.mutation_calls(), mutations_after_grant);
}

#[tokio::test]
async fn wildcard_mask_intent_is_rejected_before_any_remote_call() {
    let authority = Arc::new(FakePolicyAuthority::default());
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority.clone(), quota, single_service(), 3);

    let intent = PermissionIntent::Column {
        database: "sales".to_owned(),
        table: "*".to_owned(),
        column: "phone".to_owned(),
        mask: MaskKind::Hash,
        grantee: Grantee::user("alice"),
    };
    let result = orchestrator
        .sync(IntentId::new(), &intent, SyncOperation::Grant)
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(authority.find_policy_calls.load(Ordering::SeqCst), 0);
    assert_eq!(authority.mutation_calls(), 0);
}

#[tokio::test]
async fn fan_out_reconciles_every_service_and_catalog_independently() {
    let authority = Arc::new(FakePolicyAuthority::default());
    let quota = Arc::new(FakeQuotaPort::default());
    let topology = ServiceTopology::new(vec![
        ServiceRoute::catalog_aware("lake_sql", vec!["internal".to_owned(), "hive".to_owned()]),
        ServiceRoute::catalog_aware("lake_olap", vec!["internal".to_owned(), "hive".to_owned()]),
    ]);
    let orchestrator = orchestrator(authority.clone(), quota, topology, 3);

    let intent = PermissionIntent::Row {
        database: "sales".to_owned(),
        table: "orders".to_owned(),
        filter: "region = 'emea'".to_owned(),
        grantee: Grantee::user("alice"),
    };
    let report = match orchestrator
        .sync(IntentId::new(), &intent, SyncOperation::Grant)
        .await
    {
        Ok(report) => report,
        Err(error) => panic!("grant failed: {error}"),
    };

    assert_eq!(report.outcomes.len(), 4);
    let policies = authority.policies.lock().await;
    assert_eq!(policies.len(), 4);
    assert!(
        policies.contains_key(&(
            "lake_sql".to_owned(),
            "lake_sql.internal.sales.orders.row_filter".to_owned()
        ))
    );
    assert!(
        policies.contains_key(&(
            "lake_olap".to_owned(),
            "lake_olap.hive.sales.orders.row_filter".to_owned()
        ))
    );
}

#[tokio::test]
async fn transient_failures_are_retried_within_budget() {
    let authority = Arc::new(FakePolicyAuthority::default());
    authority.transient_failures.store(2, Ordering::SeqCst);
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority.clone(), quota, single_service(), 3);

    let result = orchestrator
        .sync(IntentId::new(), &table_intent("alice"), SyncOperation::Grant)
        .await;

    assert!(result.is_ok());
    assert_eq!(authority.policies.lock().await.len(), 1);
}

#[tokio::test]
async fn exhausted_retries_escalate_to_sync_failed() {
    let authority = Arc::new(FakePolicyAuthority::default());
    authority.transient_failures.store(10, Ordering::SeqCst);
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority.clone(), quota, single_service(), 3);

    let result = orchestrator
        .sync(IntentId::new(), &table_intent("alice"), SyncOperation::Grant)
        .await;

    match result {
        Err(AppError::SyncFailed { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected SyncFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn quota_grants_route_to_the_storage_port() {
    let authority = Arc::new(FakePolicyAuthority::default());
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority.clone(), quota.clone(), single_service(), 3);

    let intent = PermissionIntent::Quota {
        database: "sales".to_owned(),
        gigabytes: 250.0,
    };
    let result = orchestrator
        .sync(IntentId::new(), &intent, SyncOperation::Grant)
        .await;

    assert!(result.is_ok());
    let applied = quota.applied.lock().await;
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].database, "sales");
    assert_eq!(authority.mutation_calls(), 0);
}

#[tokio::test]
async fn quota_revokes_do_not_touch_the_filesystem() {
    let authority = Arc::new(FakePolicyAuthority::default());
    let quota = Arc::new(FakeQuotaPort::default());
    let orchestrator = orchestrator(authority, quota.clone(), single_service(), 3);

    let intent = PermissionIntent::Quota {
        database: "sales".to_owned(),
        gigabytes: 250.0,
    };
    let report = match orchestrator
        .sync(IntentId::new(), &intent, SyncOperation::Revoke)
        .await
    {
        Ok(report) => report,
        Err(error) => panic!("revoke failed: {error}"),
    };

    assert_eq!(report.outcomes[0].action, TargetAction::NothingToRevoke);
    assert!(quota.applied.lock().await.is_empty());
}

#[tokio::test]
async fn with_retry_does_not_retry_validation_errors() {
    let mut calls = 0_u32;
    let result: Result<(), AppError> = with_retry(fast_retry(5), "validate", || {
        calls += 1;
        async { Err(AppError::Validation("bad input".to_owned())) }
    })
    .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn with_retry_recovers_after_transient_failures() {
    let mut calls = 0_u32;
    let result = with_retry(fast_retry(3), "flaky", || {
        calls += 1;
        let failing = calls < 3;
        async move {
            if failing {
                Err(AppError::Transient("unavailable".to_owned()))
            } else {
                Ok(calls)
            }
        }
    })
    .await;

    assert_eq!(result.ok(), Some(3));
}
