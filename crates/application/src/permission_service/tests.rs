use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lakewarden_core::AppError;
use lakewarden_domain::{
    Grantee, IntentKind, PermissionIntent, ServiceRoute, ServiceTopology,
};

use crate::intent_ports::{IntentFilter, IntentRepository, PageRequest};
use crate::sync::{RetryPolicy, SyncOrchestrator};
use crate::test_support::{FakeIntentRepository, FakePolicyAuthority, FakeQuotaPort};

use super::{ImportMode, PermissionService};

struct Harness {
    authority: Arc<FakePolicyAuthority>,
    repository: Arc<FakeIntentRepository>,
    service: PermissionService,
}

fn harness(attempts: u32) -> Harness {
    let authority = Arc::new(FakePolicyAuthority::default());
    let repository = Arc::new(FakeIntentRepository::default());
    let orchestrator = Arc::new(SyncOrchestrator::new(
        authority.clone(),
        Arc::new(FakeQuotaPort::default()),
        ServiceTopology::new(vec![ServiceRoute::plain("warehouse_sql")]),
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
        },
    ));
    let service = PermissionService::new(repository.clone(), orchestrator);
    Harness {
        authority,
        repository,
        service,
    }
}

fn table_intent(table: &str, user: &str) -> PermissionIntent {
    PermissionIntent::Table {
        database: "sales".to_owned(),
        table: table.to_owned(),
        grantee: Grantee::user(user),
    }
}

#[tokio::test]
async fn create_persists_and_synchronizes() {
    let harness = harness(3);

    let stored = match harness.service.create(table_intent("orders", "alice")).await {
        Ok(stored) => stored,
        Err(error) => panic!("create failed: {error}"),
    };

    assert_eq!(harness.repository.records.lock().await.len(), 1);
    assert_eq!(harness.authority.policies.lock().await.len(), 1);
    assert_eq!(stored.intent.kind(), IntentKind::Table);
}

#[tokio::test]
async fn duplicate_create_is_rejected_without_persisting() {
    let harness = harness(3);

    assert!(
        harness
            .service
            .create(table_intent("orders", "alice"))
            .await
            .is_ok()
    );
    let result = harness.service.create(table_intent("orders", "alice")).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(harness.repository.records.lock().await.len(), 1);
}

#[tokio::test]
async fn failed_synchronization_removes_the_local_record() {
    let harness = harness(2);
    harness.authority.transient_failures.store(10, Ordering::SeqCst);

    let result = harness.service.create(table_intent("orders", "alice")).await;

    match result {
        Err(AppError::SyncFailed { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected SyncFailed, got {other:?}"),
    }
    assert!(harness.repository.records.lock().await.is_empty());
}

#[tokio::test]
async fn update_replaces_the_remote_grant() {
    let harness = harness(3);

    let stored = match harness.service.create(table_intent("orders", "alice")).await {
        Ok(stored) => stored,
        Err(error) => panic!("create failed: {error}"),
    };
    let updated = harness
        .service
        .update(stored.id, table_intent("orders", "bob"))
        .await;
    assert!(updated.is_ok());

    let policies = harness.authority.policies.lock().await;
    let document = policies
        .get(&("warehouse_sql".to_owned(), "sales.orders.all.normal".to_owned()))
        .cloned();
    let document = match document {
        Some(document) => document,
        None => panic!("expected the policy to exist"),
    };
    assert_eq!(document.items.len(), 1);
    assert!(document.items[0].members.users.contains("bob"));
    assert!(!document.items[0].members.users.contains("alice"));
}

#[tokio::test]
async fn update_cannot_change_intent_kind() {
    let harness = harness(3);

    let stored = match harness.service.create(table_intent("orders", "alice")).await {
        Ok(stored) => stored,
        Err(error) => panic!("create failed: {error}"),
    };
    let result = harness
        .service
        .update(
            stored.id,
            PermissionIntent::Quota {
                database: "sales".to_owned(),
                gigabytes: 100.0,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn remove_revokes_remotely_then_deletes_locally() {
    let harness = harness(3);

    let stored = match harness.service.create(table_intent("orders", "alice")).await {
        Ok(stored) => stored,
        Err(error) => panic!("create failed: {error}"),
    };
    assert!(harness.service.remove(stored.id).await.is_ok());

    assert!(harness.repository.records.lock().await.is_empty());
    assert!(harness.authority.policies.lock().await.is_empty());
}

#[tokio::test]
async fn list_pages_newest_first_records_of_one_family() {
    let harness = harness(3);

    for table in ["t1", "t2", "t3"] {
        assert!(harness.service.create(table_intent(table, "alice")).await.is_ok());
    }

    let page = match harness
        .service
        .list(
            IntentKind::Table,
            &IntentFilter::default(),
            &PageRequest {
                page: 1,
                page_size: 2,
            },
        )
        .await
    {
        Ok(page) => page,
        Err(error) => panic!("list failed: {error}"),
    };

    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn all_or_nothing_batch_rolls_back_every_record_on_one_failure() {
    let harness = harness(1);
    *harness.authority.fail_creates_containing.lock().await = Some("t3".to_owned());

    let intents = (1..=5)
        .map(|index| table_intent(&format!("t{index}"), "alice"))
        .collect();
    let result = harness
        .service
        .import_batch(ImportMode::AllOrNothing, intents)
        .await;

    match result {
        Err(AppError::PartialBatch(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 2);
        }
        other => panic!("expected PartialBatch, got {other:?}"),
    }
    assert!(harness.repository.records.lock().await.is_empty());
}

#[tokio::test]
async fn per_record_batch_keeps_the_records_that_synchronized() {
    let harness = harness(1);
    *harness.authority.fail_creates_containing.lock().await = Some("t3".to_owned());

    let intents = (1..=5)
        .map(|index| table_intent(&format!("t{index}"), "alice"))
        .collect();
    let report = match harness
        .service
        .import_batch(ImportMode::PerRecord, intents)
        .await
    {
        Ok(report) => report,
        Err(error) => panic!("per-record import failed: {error}"),
    };

    assert_eq!(report.created.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].index, 2);

    let records = harness.repository.records.lock().await;
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|record| {
        !matches!(&record.intent, PermissionIntent::Table { table, .. } if table == "t3")
    }));
}

#[tokio::test]
async fn find_duplicate_respects_the_exclusion_id() {
    let repository = FakeIntentRepository::default();
    let stored = match repository.insert(&table_intent("orders", "alice")).await {
        Ok(stored) => stored,
        Err(error) => panic!("insert failed: {error}"),
    };

    let duplicate = repository
        .find_duplicate(&table_intent("orders", "alice"), Some(stored.id))
        .await;
    assert_eq!(duplicate.ok(), Some(None));
}
