use async_trait::async_trait;
use lakewarden_core::AppResult;
use lakewarden_domain::{PolicyDocument, RoleDocument};

/// Port for the external policy authority's document store.
///
/// Implementations must not cache documents beyond a single call; the
/// authority owns them and concurrent administrators may edit them at any
/// time. Lookup misses are `Ok(None)`, never errors.
#[async_trait]
pub trait PolicyAuthority: Send + Sync {
    /// Looks up a policy document by service and derived name.
    async fn find_policy(&self, service: &str, name: &str) -> AppResult<Option<PolicyDocument>>;

    /// Creates a policy document and returns the authority-assigned id.
    async fn create_policy(&self, document: &PolicyDocument) -> AppResult<i64>;

    /// Replaces the policy document stored under the given id.
    async fn update_policy(&self, policy_id: i64, document: &PolicyDocument) -> AppResult<()>;

    /// Deletes the policy document stored under the given id.
    async fn delete_policy(&self, policy_id: i64) -> AppResult<()>;

    /// Looks up a role document by service and name.
    async fn find_role(&self, service: &str, name: &str) -> AppResult<Option<RoleDocument>>;

    /// Creates a role document and returns the authority-assigned id.
    async fn create_role(&self, service: &str, document: &RoleDocument) -> AppResult<i64>;

    /// Replaces the role document stored under the given id.
    async fn update_role(&self, role_id: i64, document: &RoleDocument) -> AppResult<()>;

    /// Returns every role whose membership contains the given user.
    async fn roles_containing_user(&self, user: &str) -> AppResult<Vec<RoleDocument>>;
}
