//! In-memory fakes for the application ports, shared by service tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use lakewarden_core::{AppError, AppResult, IntentId};
use lakewarden_domain::{IntentKind, PermissionIntent, PolicyDocument, RoleDocument};
use tokio::sync::Mutex;

use crate::command_ports::{DirectoryAccountSpec, DirectoryPort, QuotaChange, StorageQuotaPort};
use crate::intent_ports::{IntentFilter, IntentRepository, Page, PageRequest, StoredIntent};
use crate::policy_ports::PolicyAuthority;

/// In-memory policy authority with call counters and failure injection.
#[derive(Default)]
pub struct FakePolicyAuthority {
    /// Policies keyed by (service, name).
    pub policies: Mutex<HashMap<(String, String), PolicyDocument>>,
    /// Roles keyed by (service, name).
    pub roles: Mutex<HashMap<(String, String), RoleDocument>>,
    next_id: AtomicI64,
    /// Remaining calls that fail with a transient error before recovering.
    pub transient_failures: AtomicU32,
    /// Policy creations fail transiently when the name contains this.
    pub fail_creates_containing: Mutex<Option<String>>,
    /// Count of `find_policy` calls.
    pub find_policy_calls: AtomicU32,
    /// Count of `create_policy` calls.
    pub create_policy_calls: AtomicU32,
    /// Count of `update_policy` calls.
    pub update_policy_calls: AtomicU32,
    /// Count of `delete_policy` calls.
    pub delete_policy_calls: AtomicU32,
    /// Count of `create_role` calls.
    pub create_role_calls: AtomicU32,
    /// Count of `update_role` calls.
    pub update_role_calls: AtomicU32,
}

impl FakePolicyAuthority {
    fn maybe_fail(&self) -> AppResult<()> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Transient("authority unavailable".to_owned()));
        }
        Ok(())
    }

    fn assign_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of policy mutation calls (create + update + delete).
    pub fn mutation_calls(&self) -> u32 {
        self.create_policy_calls.load(Ordering::SeqCst)
            + self.update_policy_calls.load(Ordering::SeqCst)
            + self.delete_policy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyAuthority for FakePolicyAuthority {
    async fn find_policy(&self, service: &str, name: &str) -> AppResult<Option<PolicyDocument>> {
        self.find_policy_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self
            .policies
            .lock()
            .await
            .get(&(service.to_owned(), name.to_owned()))
            .cloned())
    }

    async fn create_policy(&self, document: &PolicyDocument) -> AppResult<i64> {
        self.create_policy_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        if let Some(fragment) = self.fail_creates_containing.lock().await.as_deref()
            && document.name.contains(fragment)
        {
            return Err(AppError::Transient(format!(
                "authority rejected policy '{}'",
                document.name
            )));
        }

        let policy_id = self.assign_id();
        let mut stored = document.clone();
        stored.id = Some(policy_id);
        self.policies
            .lock()
            .await
            .insert((stored.service.clone(), stored.name.clone()), stored);
        Ok(policy_id)
    }

    async fn update_policy(&self, policy_id: i64, document: &PolicyDocument) -> AppResult<()> {
        self.update_policy_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        let mut policies = self.policies.lock().await;
        let key = policies
            .iter()
            .find(|(_, stored)| stored.id == Some(policy_id))
            .map(|(key, _)| key.clone())
            .ok_or_else(|| AppError::NotFound(format!("policy id {policy_id}")))?;
        let mut updated = document.clone();
        updated.id = Some(policy_id);
        policies.insert(key, updated);
        Ok(())
    }

    async fn delete_policy(&self, policy_id: i64) -> AppResult<()> {
        self.delete_policy_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        let mut policies = self.policies.lock().await;
        let key = policies
            .iter()
            .find(|(_, stored)| stored.id == Some(policy_id))
            .map(|(key, _)| key.clone())
            .ok_or_else(|| AppError::NotFound(format!("policy id {policy_id}")))?;
        policies.remove(&key);
        Ok(())
    }

    async fn find_role(&self, service: &str, name: &str) -> AppResult<Option<RoleDocument>> {
        self.maybe_fail()?;
        Ok(self
            .roles
            .lock()
            .await
            .get(&(service.to_owned(), name.to_owned()))
            .cloned())
    }

    async fn create_role(&self, service: &str, document: &RoleDocument) -> AppResult<i64> {
        self.create_role_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        let role_id = self.assign_id();
        let mut stored = document.clone();
        stored.id = Some(role_id);
        self.roles
            .lock()
            .await
            .insert((service.to_owned(), stored.name.clone()), stored);
        Ok(role_id)
    }

    async fn update_role(&self, role_id: i64, document: &RoleDocument) -> AppResult<()> {
        self.update_role_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        let mut roles = self.roles.lock().await;
        let key = roles
            .iter()
            .find(|(_, stored)| stored.id == Some(role_id))
            .map(|(key, _)| key.clone())
            .ok_or_else(|| AppError::NotFound(format!("role id {role_id}")))?;
        let mut updated = document.clone();
        updated.id = Some(role_id);
        roles.insert(key, updated);
        Ok(())
    }

    async fn roles_containing_user(&self, user: &str) -> AppResult<Vec<RoleDocument>> {
        self.maybe_fail()?;
        Ok(self
            .roles
            .lock()
            .await
            .values()
            .filter(|role| role.members.users.contains(user))
            .cloned()
            .collect())
    }
}

/// In-memory storage quota port.
#[derive(Default)]
pub struct FakeQuotaPort {
    /// Applied quota changes in call order.
    pub applied: Mutex<Vec<QuotaChange>>,
    /// Remaining calls that fail with a transient error.
    pub transient_failures: AtomicU32,
}

#[async_trait]
impl StorageQuotaPort for FakeQuotaPort {
    async fn apply(&self, change: &QuotaChange) -> AppResult<()> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Transient("quota tool unavailable".to_owned()));
        }
        self.applied.lock().await.push(change.clone());
        Ok(())
    }
}

/// In-memory directory provisioning port.
#[derive(Default)]
pub struct FakeDirectoryPort {
    /// Provisioned accounts.
    pub created: Mutex<Vec<DirectoryAccountSpec>>,
    /// Deprovisioned user names.
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl DirectoryPort for FakeDirectoryPort {
    async fn create_account(&self, spec: &DirectoryAccountSpec) -> AppResult<()> {
        self.created.lock().await.push(spec.clone());
        Ok(())
    }

    async fn delete_account(&self, username: &str) -> AppResult<()> {
        self.deleted.lock().await.push(username.to_owned());
        Ok(())
    }
}

/// In-memory intent repository.
#[derive(Default)]
pub struct FakeIntentRepository {
    /// Stored records in insertion order.
    pub records: Mutex<Vec<StoredIntent>>,
}

#[async_trait]
impl IntentRepository for FakeIntentRepository {
    async fn insert(&self, intent: &PermissionIntent) -> AppResult<StoredIntent> {
        let now = Utc::now();
        let stored = StoredIntent {
            id: IntentId::new(),
            intent: intent.clone(),
            created_at: now,
            updated_at: now,
        };
        self.records.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn find(&self, id: IntentId) -> AppResult<Option<StoredIntent>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn update(&self, id: IntentId, intent: &PermissionIntent) -> AppResult<StoredIntent> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| AppError::NotFound(format!("intent {id}")))?;
        record.intent = intent.clone();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, id: IntentId) -> AppResult<bool> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() < before)
    }

    async fn list(
        &self,
        kind: IntentKind,
        _filter: &IntentFilter,
        page: &PageRequest,
    ) -> AppResult<Page<StoredIntent>> {
        let records = self.records.lock().await;
        let matching: Vec<StoredIntent> = records
            .iter()
            .filter(|record| record.intent.kind() == kind)
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.page_size as usize)
            .collect();
        Ok(Page {
            total,
            page: page.page,
            page_size: page.page_size,
            items,
        })
    }

    async fn find_duplicate(
        &self,
        intent: &PermissionIntent,
        exclude: Option<IntentId>,
    ) -> AppResult<Option<IntentId>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|record| {
                Some(record.id) != exclude && record.intent.conflicts_with(intent)
            })
            .map(|record| record.id))
    }
}
