//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod postgres_intent_repository;
mod process_directory_port;
mod process_quota_port;
mod rest_policy_authority;

pub use postgres_intent_repository::PostgresIntentRepository;
pub use process_directory_port::{DirectoryToolConfig, ProcessDirectoryPort};
pub use process_quota_port::{ProcessQuotaPort, QuotaToolConfig};
pub use rest_policy_authority::{PolicyAuthorityConfig, RestPolicyAuthority};
