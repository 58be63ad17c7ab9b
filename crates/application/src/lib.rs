//! Application services and ports.

#![forbid(unsafe_code)]

mod account_service;
mod command_ports;
mod intent_ports;
mod permission_service;
mod policy_ports;
mod role_sync_service;
mod sync;
#[cfg(test)]
mod test_support;

pub use account_service::AccountService;
pub use command_ports::{DirectoryAccountSpec, DirectoryPort, QuotaChange, StorageQuotaPort};
pub use intent_ports::{
    IntentFilter, IntentRepository, Page, PageRequest, StoredIntent,
};
pub use permission_service::{ImportMode, ImportReport, PermissionService};
pub use policy_ports::PolicyAuthority;
pub use role_sync_service::{MembershipOutcome, RoleSyncService};
pub use sync::{
    RetryPolicy, SyncJob, SyncJobState, SyncOrchestrator, SyncReport, TargetAction, TargetOutcome,
    with_retry,
};
