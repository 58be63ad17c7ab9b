use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lakewarden_core::{AppError, AppResult, IntentId};
use lakewarden_domain::{IntentKind, PermissionIntent};
use serde::{Deserialize, Serialize};

/// A permission intent persisted by the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredIntent {
    /// Stable record identifier.
    pub id: IntentId,
    /// The administrator-declared desired state.
    pub intent: PermissionIntent,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last record mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Substring filters applied to intent listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFilter {
    /// Database name fragment.
    pub database: Option<String>,
    /// Table name fragment.
    pub table: Option<String>,
    /// User name fragment.
    pub user: Option<String>,
    /// Role name fragment.
    pub role: Option<String>,
}

/// Offset pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// One-based page number.
    pub page: u32,
    /// Rows per page, between 1 and 100.
    pub page_size: u32,
}

impl PageRequest {
    /// Validates the pagination bounds.
    pub fn validate(&self) -> AppResult<()> {
        if self.page == 0 {
            return Err(AppError::Validation("page must be at least 1".to_owned()));
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err(AppError::Validation(
                "page_size must be between 1 and 100".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns the number of rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

/// One page of listed records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total records matching the filter.
    pub total: u64,
    /// One-based page number served.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Records of this page, newest first.
    pub items: Vec<T>,
}

/// Port for the relational store that owns permission intents.
#[async_trait]
pub trait IntentRepository: Send + Sync {
    /// Persists a new intent and returns the stored record.
    async fn insert(&self, intent: &PermissionIntent) -> AppResult<StoredIntent>;

    /// Returns the stored intent with the given id, if any.
    async fn find(&self, id: IntentId) -> AppResult<Option<StoredIntent>>;

    /// Replaces the stored intent under the given id.
    async fn update(&self, id: IntentId, intent: &PermissionIntent) -> AppResult<StoredIntent>;

    /// Deletes the stored intent; returns whether a record existed.
    async fn delete(&self, id: IntentId) -> AppResult<bool>;

    /// Lists stored intents of one family, filtered and paginated.
    async fn list(
        &self,
        kind: IntentKind,
        filter: &IntentFilter,
        page: &PageRequest,
    ) -> AppResult<Page<StoredIntent>>;

    /// Returns the id of a record equal to `intent` under the family's
    /// uniqueness tuple, ignoring `exclude` (used by updates).
    async fn find_duplicate(
        &self,
        intent: &PermissionIntent,
        exclude: Option<IntentId>,
    ) -> AppResult<Option<IntentId>>;
}
