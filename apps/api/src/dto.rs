use std::str::FromStr;

use chrono::{DateTime, Utc};
use lakewarden_application::{
    ImportMode, ImportReport, IntentFilter, Page, PageRequest, StoredIntent,
};
use lakewarden_core::{AppError, AppResult, BatchItemError};
use lakewarden_domain::{Grantee, MaskKind, PermissionIntent, PrincipalSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create/update payload for table permissions.
#[derive(Debug, Deserialize)]
pub struct TablePermissionRequest {
    pub db_name: String,
    pub table_name: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
}

impl TablePermissionRequest {
    pub fn into_intent(self) -> PermissionIntent {
        PermissionIntent::Table {
            database: self.db_name,
            table: self.table_name,
            grantee: Grantee {
                user: self.user_name,
                role: self.role_name,
            },
        }
    }
}

/// Create/update payload for column mask permissions.
#[derive(Debug, Deserialize)]
pub struct ColumnPermissionRequest {
    pub db_name: String,
    pub table_name: String,
    pub col_name: String,
    pub mask_kind: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
}

impl ColumnPermissionRequest {
    pub fn into_intent(self) -> AppResult<PermissionIntent> {
        let mask = MaskKind::from_str(self.mask_kind.as_str())?;
        Ok(PermissionIntent::Column {
            database: self.db_name,
            table: self.table_name,
            column: self.col_name,
            mask,
            grantee: Grantee {
                user: self.user_name,
                role: self.role_name,
            },
        })
    }
}

/// Create/update payload for row filter permissions.
#[derive(Debug, Deserialize)]
pub struct RowPermissionRequest {
    pub db_name: String,
    pub table_name: String,
    pub row_filter: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
}

impl RowPermissionRequest {
    pub fn into_intent(self) -> PermissionIntent {
        PermissionIntent::Row {
            database: self.db_name,
            table: self.table_name,
            filter: self.row_filter,
            grantee: Grantee {
                user: self.user_name,
                role: self.role_name,
            },
        }
    }
}

/// Create/update payload for storage quotas.
#[derive(Debug, Deserialize)]
pub struct StorageQuotaRequest {
    pub db_name: String,
    pub quota_gb: f64,
}

impl StorageQuotaRequest {
    pub fn into_intent(self) -> PermissionIntent {
        PermissionIntent::Quota {
            database: self.db_name,
            gigabytes: self.quota_gb,
        }
    }
}

/// Table permission record returned to callers.
#[derive(Debug, Serialize)]
pub struct TablePermissionResponse {
    pub id: Uuid,
    pub db_name: String,
    pub table_name: String,
    pub user_name: Option<String>,
    pub role_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TablePermissionResponse {
    pub fn from_stored(stored: StoredIntent) -> AppResult<Self> {
        let PermissionIntent::Table {
            database,
            table,
            grantee,
        } = stored.intent
        else {
            return Err(AppError::Internal(
                "stored intent is not a table permission".to_owned(),
            ));
        };
        Ok(Self {
            id: stored.id.as_uuid(),
            db_name: database,
            table_name: table,
            user_name: grantee.user,
            role_name: grantee.role,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

/// Column permission record returned to callers.
#[derive(Debug, Serialize)]
pub struct ColumnPermissionResponse {
    pub id: Uuid,
    pub db_name: String,
    pub table_name: String,
    pub col_name: String,
    pub mask_kind: String,
    pub user_name: Option<String>,
    pub role_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ColumnPermissionResponse {
    pub fn from_stored(stored: StoredIntent) -> AppResult<Self> {
        let PermissionIntent::Column {
            database,
            table,
            column,
            mask,
            grantee,
        } = stored.intent
        else {
            return Err(AppError::Internal(
                "stored intent is not a column permission".to_owned(),
            ));
        };
        Ok(Self {
            id: stored.id.as_uuid(),
            db_name: database,
            table_name: table,
            col_name: column,
            mask_kind: mask.as_str().to_owned(),
            user_name: grantee.user,
            role_name: grantee.role,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

/// Row permission record returned to callers.
#[derive(Debug, Serialize)]
pub struct RowPermissionResponse {
    pub id: Uuid,
    pub db_name: String,
    pub table_name: String,
    pub row_filter: String,
    pub user_name: Option<String>,
    pub role_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RowPermissionResponse {
    pub fn from_stored(stored: StoredIntent) -> AppResult<Self> {
        let PermissionIntent::Row {
            database,
            table,
            filter,
            grantee,
        } = stored.intent
        else {
            return Err(AppError::Internal(
                "stored intent is not a row permission".to_owned(),
            ));
        };
        Ok(Self {
            id: stored.id.as_uuid(),
            db_name: database,
            table_name: table,
            row_filter: filter,
            user_name: grantee.user,
            role_name: grantee.role,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

/// Storage quota record returned to callers.
#[derive(Debug, Serialize)]
pub struct StorageQuotaResponse {
    pub id: Uuid,
    pub db_name: String,
    pub quota_gb: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StorageQuotaResponse {
    pub fn from_stored(stored: StoredIntent) -> AppResult<Self> {
        let PermissionIntent::Quota {
            database,
            gigabytes,
        } = stored.intent
        else {
            return Err(AppError::Internal(
                "stored intent is not a storage quota".to_owned(),
            ));
        };
        Ok(Self {
            id: stored.id.as_uuid(),
            db_name: database,
            quota_gb: gigabytes,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

/// Listing query parameters shared by the permission resources.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

impl ListQuery {
    pub fn filter(&self) -> IntentFilter {
        IntentFilter {
            database: self.db_name.clone(),
            table: self.table_name.clone(),
            user: self.user_name.clone(),
            role: self.role_name.clone(),
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// One page of records returned to callers.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<T>,
}

impl<T> PageResponse<T> {
    pub fn from_page(
        page: Page<StoredIntent>,
        convert: impl Fn(StoredIntent) -> AppResult<T>,
    ) -> AppResult<Self> {
        let mut items = Vec::with_capacity(page.items.len());
        for stored in page.items {
            items.push(convert(stored)?);
        }
        Ok(Self {
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            items,
        })
    }
}

/// Import mode query parameter.
#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    #[serde(default = "default_import_mode")]
    pub mode: ImportMode,
}

fn default_import_mode() -> ImportMode {
    ImportMode::PerRecord
}

/// Import outcome returned to callers.
#[derive(Debug, Serialize)]
pub struct ImportReportResponse<T> {
    pub created: Vec<T>,
    pub failed: Vec<BatchItemError>,
}

impl<T> ImportReportResponse<T> {
    pub fn from_report(
        report: ImportReport,
        convert: impl Fn(StoredIntent) -> AppResult<T>,
    ) -> AppResult<Self> {
        let mut created = Vec::with_capacity(report.created.len());
        for stored in report.created {
            created.push(convert(stored)?);
        }
        Ok(Self {
            created,
            failed: report.failed,
        })
    }
}

/// Membership change payload for role administration.
#[derive(Debug, Deserialize)]
pub struct RoleMembershipRequest {
    pub service: String,
    pub role_name: String,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl RoleMembershipRequest {
    pub fn principals(&self) -> PrincipalSet {
        PrincipalSet {
            users: self.users.iter().cloned().collect(),
            groups: self.groups.iter().cloned().collect(),
            roles: self.roles.iter().cloned().collect(),
        }
    }
}

/// Membership change outcome returned to callers.
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub outcome: lakewarden_application::MembershipOutcome,
}

/// Account provisioning payload.
#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub username: String,
    pub department: String,
    pub role_name: String,
}

/// Role cleanup summary returned by principal-wide removals.
#[derive(Debug, Serialize)]
pub struct RolesTouchedResponse {
    pub roles_touched: u32,
}
