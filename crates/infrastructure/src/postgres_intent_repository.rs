use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use lakewarden_application::{IntentFilter, IntentRepository, Page, PageRequest, StoredIntent};
use lakewarden_core::{AppError, AppResult, IntentId};
use lakewarden_domain::{Grantee, IntentKind, MaskKind, PermissionIntent};

/// PostgreSQL-backed store for permission intents.
///
/// One table per intent family, each carrying the family's uniqueness
/// constraint so duplicate intents are rejected at the database too.
#[derive(Clone)]
pub struct PostgresIntentRepository {
    pool: PgPool,
}

impl PostgresIntentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TablePermissionRow {
    id: Uuid,
    db_name: String,
    table_name: String,
    user_name: Option<String>,
    role_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ColumnPermissionRow {
    id: Uuid,
    db_name: String,
    table_name: String,
    col_name: String,
    mask_kind: String,
    user_name: Option<String>,
    role_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RowPermissionRow {
    id: Uuid,
    db_name: String,
    table_name: String,
    row_filter: String,
    user_name: Option<String>,
    role_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct StorageQuotaRow {
    id: Uuid,
    db_name: String,
    quota_gb: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn grantee(user_name: Option<String>, role_name: Option<String>) -> Grantee {
    Grantee {
        user: user_name,
        role: role_name,
    }
}

impl TablePermissionRow {
    fn into_stored(self) -> StoredIntent {
        StoredIntent {
            id: IntentId::from_uuid(self.id),
            intent: PermissionIntent::Table {
                database: self.db_name,
                table: self.table_name,
                grantee: grantee(self.user_name, self.role_name),
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ColumnPermissionRow {
    fn into_stored(self) -> AppResult<StoredIntent> {
        let mask = MaskKind::from_str(&self.mask_kind).map_err(|_| {
            AppError::Internal(format!(
                "column permission {} holds unknown mask kind '{}'",
                self.id, self.mask_kind
            ))
        })?;
        Ok(StoredIntent {
            id: IntentId::from_uuid(self.id),
            intent: PermissionIntent::Column {
                database: self.db_name,
                table: self.table_name,
                column: self.col_name,
                mask,
                grantee: grantee(self.user_name, self.role_name),
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RowPermissionRow {
    fn into_stored(self) -> StoredIntent {
        StoredIntent {
            id: IntentId::from_uuid(self.id),
            intent: PermissionIntent::Row {
                database: self.db_name,
                table: self.table_name,
                filter: self.row_filter,
                grantee: grantee(self.user_name, self.role_name),
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl StorageQuotaRow {
    fn into_stored(self) -> StoredIntent {
        StoredIntent {
            id: IntentId::from_uuid(self.id),
            intent: PermissionIntent::Quota {
                database: self.db_name,
                gigabytes: self.quota_gb,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn map_query_error(error: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("an identical {context} record already exists"));
    }
    AppError::Internal(format!("failed to {context}: {error}"))
}

#[async_trait]
impl IntentRepository for PostgresIntentRepository {
    async fn insert(&self, intent: &PermissionIntent) -> AppResult<StoredIntent> {
        match intent {
            PermissionIntent::Table {
                database,
                table,
                grantee,
            } => {
                let row = sqlx::query_as::<_, TablePermissionRow>(
                    r#"
                    INSERT INTO table_permissions (db_name, table_name, user_name, role_name)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, db_name, table_name, user_name, role_name, created_at, updated_at
                    "#,
                )
                .bind(database)
                .bind(table)
                .bind(&grantee.user)
                .bind(&grantee.role)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "insert table permission"))?;
                Ok(row.into_stored())
            }
            PermissionIntent::Column {
                database,
                table,
                column,
                mask,
                grantee,
            } => {
                let row = sqlx::query_as::<_, ColumnPermissionRow>(
                    r#"
                    INSERT INTO column_permissions (db_name, table_name, col_name, mask_kind, user_name, role_name)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING id, db_name, table_name, col_name, mask_kind, user_name, role_name, created_at, updated_at
                    "#,
                )
                .bind(database)
                .bind(table)
                .bind(column)
                .bind(mask.as_str())
                .bind(&grantee.user)
                .bind(&grantee.role)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "insert column permission"))?;
                row.into_stored()
            }
            PermissionIntent::Row {
                database,
                table,
                filter,
                grantee,
            } => {
                let row = sqlx::query_as::<_, RowPermissionRow>(
                    r#"
                    INSERT INTO row_permissions (db_name, table_name, row_filter, user_name, role_name)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, db_name, table_name, row_filter, user_name, role_name, created_at, updated_at
                    "#,
                )
                .bind(database)
                .bind(table)
                .bind(filter)
                .bind(&grantee.user)
                .bind(&grantee.role)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "insert row permission"))?;
                Ok(row.into_stored())
            }
            PermissionIntent::Quota {
                database,
                gigabytes,
            } => {
                let row = sqlx::query_as::<_, StorageQuotaRow>(
                    r#"
                    INSERT INTO storage_quotas (db_name, quota_gb)
                    VALUES ($1, $2)
                    RETURNING id, db_name, quota_gb, created_at, updated_at
                    "#,
                )
                .bind(database)
                .bind(gigabytes)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "insert storage quota"))?;
                Ok(row.into_stored())
            }
        }
    }

    async fn find(&self, id: IntentId) -> AppResult<Option<StoredIntent>> {
        let record_id = id.as_uuid();

        let table_row = sqlx::query_as::<_, TablePermissionRow>(
            "SELECT id, db_name, table_name, user_name, role_name, created_at, updated_at \
             FROM table_permissions WHERE id = $1",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_query_error(error, "read table permission"))?;
        if let Some(row) = table_row {
            return Ok(Some(row.into_stored()));
        }

        let column_row = sqlx::query_as::<_, ColumnPermissionRow>(
            "SELECT id, db_name, table_name, col_name, mask_kind, user_name, role_name, \
             created_at, updated_at FROM column_permissions WHERE id = $1",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_query_error(error, "read column permission"))?;
        if let Some(row) = column_row {
            return row.into_stored().map(Some);
        }

        let row_row = sqlx::query_as::<_, RowPermissionRow>(
            "SELECT id, db_name, table_name, row_filter, user_name, role_name, created_at, \
             updated_at FROM row_permissions WHERE id = $1",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_query_error(error, "read row permission"))?;
        if let Some(row) = row_row {
            return Ok(Some(row.into_stored()));
        }

        let quota_row = sqlx::query_as::<_, StorageQuotaRow>(
            "SELECT id, db_name, quota_gb, created_at, updated_at \
             FROM storage_quotas WHERE id = $1",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_query_error(error, "read storage quota"))?;
        Ok(quota_row.map(StorageQuotaRow::into_stored))
    }

    async fn update(&self, id: IntentId, intent: &PermissionIntent) -> AppResult<StoredIntent> {
        let record_id = id.as_uuid();

        match intent {
            PermissionIntent::Table {
                database,
                table,
                grantee,
            } => {
                let row = sqlx::query_as::<_, TablePermissionRow>(
                    r#"
                    UPDATE table_permissions
                    SET db_name = $2, table_name = $3, user_name = $4, role_name = $5,
                        updated_at = now()
                    WHERE id = $1
                    RETURNING id, db_name, table_name, user_name, role_name, created_at, updated_at
                    "#,
                )
                .bind(record_id)
                .bind(database)
                .bind(table)
                .bind(&grantee.user)
                .bind(&grantee.role)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "update table permission"))?;
                row.map(TablePermissionRow::into_stored)
                    .ok_or_else(|| AppError::NotFound(format!("intent {id}")))
            }
            PermissionIntent::Column {
                database,
                table,
                column,
                mask,
                grantee,
            } => {
                let row = sqlx::query_as::<_, ColumnPermissionRow>(
                    r#"
                    UPDATE column_permissions
                    SET db_name = $2, table_name = $3, col_name = $4, mask_kind = $5,
                        user_name = $6, role_name = $7, updated_at = now()
                    WHERE id = $1
                    RETURNING id, db_name, table_name, col_name, mask_kind, user_name, role_name, created_at, updated_at
                    "#,
                )
                .bind(record_id)
                .bind(database)
                .bind(table)
                .bind(column)
                .bind(mask.as_str())
                .bind(&grantee.user)
                .bind(&grantee.role)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "update column permission"))?;
                match row {
                    Some(row) => row.into_stored(),
                    None => Err(AppError::NotFound(format!("intent {id}"))),
                }
            }
            PermissionIntent::Row {
                database,
                table,
                filter,
                grantee,
            } => {
                let row = sqlx::query_as::<_, RowPermissionRow>(
                    r#"
                    UPDATE row_permissions
                    SET db_name = $2, table_name = $3, row_filter = $4, user_name = $5,
                        role_name = $6, updated_at = now()
                    WHERE id = $1
                    RETURNING id, db_name, table_name, row_filter, user_name, role_name, created_at, updated_at
                    "#,
                )
                .bind(record_id)
                .bind(database)
                .bind(table)
                .bind(filter)
                .bind(&grantee.user)
                .bind(&grantee.role)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "update row permission"))?;
                row.map(RowPermissionRow::into_stored)
                    .ok_or_else(|| AppError::NotFound(format!("intent {id}")))
            }
            PermissionIntent::Quota {
                database,
                gigabytes,
            } => {
                let row = sqlx::query_as::<_, StorageQuotaRow>(
                    r#"
                    UPDATE storage_quotas
                    SET db_name = $2, quota_gb = $3, updated_at = now()
                    WHERE id = $1
                    RETURNING id, db_name, quota_gb, created_at, updated_at
                    "#,
                )
                .bind(record_id)
                .bind(database)
                .bind(gigabytes)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "update storage quota"))?;
                row.map(StorageQuotaRow::into_stored)
                    .ok_or_else(|| AppError::NotFound(format!("intent {id}")))
            }
        }
    }

    async fn delete(&self, id: IntentId) -> AppResult<bool> {
        let record_id = id.as_uuid();

        for table in [
            "table_permissions",
            "column_permissions",
            "row_permissions",
            "storage_quotas",
        ] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
                .bind(record_id)
                .execute(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "delete intent"))?;
            if result.rows_affected() > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn list(
        &self,
        kind: IntentKind,
        filter: &IntentFilter,
        page: &PageRequest,
    ) -> AppResult<Page<StoredIntent>> {
        let limit = i64::from(page.page_size);
        let offset = i64::try_from(page.offset())
            .map_err(|_| AppError::Validation("page offset is out of range".to_owned()))?;

        let (total, items): (i64, Vec<StoredIntent>) = match kind {
            IntentKind::Table => {
                let total = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT count(*) FROM table_permissions
                    WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')
                      AND ($2::text IS NULL OR table_name ILIKE '%' || $2 || '%')
                      AND ($3::text IS NULL OR user_name ILIKE '%' || $3 || '%')
                      AND ($4::text IS NULL OR role_name ILIKE '%' || $4 || '%')
                    "#,
                )
                .bind(&filter.database)
                .bind(&filter.table)
                .bind(&filter.user)
                .bind(&filter.role)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "count table permissions"))?;

                let rows = sqlx::query_as::<_, TablePermissionRow>(
                    r#"
                    SELECT id, db_name, table_name, user_name, role_name, created_at, updated_at
                    FROM table_permissions
                    WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')
                      AND ($2::text IS NULL OR table_name ILIKE '%' || $2 || '%')
                      AND ($3::text IS NULL OR user_name ILIKE '%' || $3 || '%')
                      AND ($4::text IS NULL OR role_name ILIKE '%' || $4 || '%')
                    ORDER BY created_at DESC
                    LIMIT $5 OFFSET $6
                    "#,
                )
                .bind(&filter.database)
                .bind(&filter.table)
                .bind(&filter.user)
                .bind(&filter.role)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "list table permissions"))?;

                (
                    total,
                    rows.into_iter()
                        .map(TablePermissionRow::into_stored)
                        .collect(),
                )
            }
            IntentKind::Column => {
                let total = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT count(*) FROM column_permissions
                    WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')
                      AND ($2::text IS NULL OR table_name ILIKE '%' || $2 || '%')
                      AND ($3::text IS NULL OR user_name ILIKE '%' || $3 || '%')
                      AND ($4::text IS NULL OR role_name ILIKE '%' || $4 || '%')
                    "#,
                )
                .bind(&filter.database)
                .bind(&filter.table)
                .bind(&filter.user)
                .bind(&filter.role)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "count column permissions"))?;

                let rows = sqlx::query_as::<_, ColumnPermissionRow>(
                    r#"
                    SELECT id, db_name, table_name, col_name, mask_kind, user_name, role_name,
                           created_at, updated_at
                    FROM column_permissions
                    WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')
                      AND ($2::text IS NULL OR table_name ILIKE '%' || $2 || '%')
                      AND ($3::text IS NULL OR user_name ILIKE '%' || $3 || '%')
                      AND ($4::text IS NULL OR role_name ILIKE '%' || $4 || '%')
                    ORDER BY created_at DESC
                    LIMIT $5 OFFSET $6
                    "#,
                )
                .bind(&filter.database)
                .bind(&filter.table)
                .bind(&filter.user)
                .bind(&filter.role)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "list column permissions"))?;

                let mut items = Vec::with_capacity(rows.len());
                for row in rows {
                    items.push(row.into_stored()?);
                }
                (total, items)
            }
            IntentKind::Row => {
                let total = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT count(*) FROM row_permissions
                    WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')
                      AND ($2::text IS NULL OR table_name ILIKE '%' || $2 || '%')
                      AND ($3::text IS NULL OR user_name ILIKE '%' || $3 || '%')
                      AND ($4::text IS NULL OR role_name ILIKE '%' || $4 || '%')
                    "#,
                )
                .bind(&filter.database)
                .bind(&filter.table)
                .bind(&filter.user)
                .bind(&filter.role)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "count row permissions"))?;

                let rows = sqlx::query_as::<_, RowPermissionRow>(
                    r#"
                    SELECT id, db_name, table_name, row_filter, user_name, role_name,
                           created_at, updated_at
                    FROM row_permissions
                    WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')
                      AND ($2::text IS NULL OR table_name ILIKE '%' || $2 || '%')
                      AND ($3::text IS NULL OR user_name ILIKE '%' || $3 || '%')
                      AND ($4::text IS NULL OR role_name ILIKE '%' || $4 || '%')
                    ORDER BY created_at DESC
                    LIMIT $5 OFFSET $6
                    "#,
                )
                .bind(&filter.database)
                .bind(&filter.table)
                .bind(&filter.user)
                .bind(&filter.role)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "list row permissions"))?;

                (
                    total,
                    rows.into_iter().map(RowPermissionRow::into_stored).collect(),
                )
            }
            IntentKind::Quota => {
                let total = sqlx::query_scalar::<_, i64>(
                    "SELECT count(*) FROM storage_quotas \
                     WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')",
                )
                .bind(&filter.database)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "count storage quotas"))?;

                let rows = sqlx::query_as::<_, StorageQuotaRow>(
                    r#"
                    SELECT id, db_name, quota_gb, created_at, updated_at
                    FROM storage_quotas
                    WHERE ($1::text IS NULL OR db_name ILIKE '%' || $1 || '%')
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(&filter.database)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|error| map_query_error(error, "list storage quotas"))?;

                (
                    total,
                    rows.into_iter().map(StorageQuotaRow::into_stored).collect(),
                )
            }
        };

        Ok(Page {
            total: u64::try_from(total).unwrap_or(0),
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
        let exclude_id = exclude.map(|id| id.as_uuid());

        let id = match intent {
            PermissionIntent::Table {
                database,
                table,
                grantee,
            } => sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT id FROM table_permissions
                WHERE db_name = $1 AND table_name = $2
                  AND user_name IS NOT DISTINCT FROM $3
                  AND role_name IS NOT DISTINCT FROM $4
                  AND ($5::uuid IS NULL OR id <> $5)
                LIMIT 1
                "#,
            )
            .bind(database)
            .bind(table)
            .bind(&grantee.user)
            .bind(&grantee.role)
            .bind(exclude_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_query_error(error, "check table permission uniqueness"))?,
            PermissionIntent::Column {
                database,
                table,
                column,
                grantee,
                ..
            } => sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT id FROM column_permissions
                WHERE db_name = $1 AND table_name = $2 AND col_name = $3
                  AND user_name IS NOT DISTINCT FROM $4
                  AND role_name IS NOT DISTINCT FROM $5
                  AND ($6::uuid IS NULL OR id <> $6)
                LIMIT 1
                "#,
            )
            .bind(database)
            .bind(table)
            .bind(column)
            .bind(&grantee.user)
            .bind(&grantee.role)
            .bind(exclude_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_query_error(error, "check column permission uniqueness"))?,
            PermissionIntent::Row {
                database,
                table,
                grantee,
                ..
            } => sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT id FROM row_permissions
                WHERE db_name = $1 AND table_name = $2
                  AND user_name IS NOT DISTINCT FROM $3
                  AND role_name IS NOT DISTINCT FROM $4
                  AND ($5::uuid IS NULL OR id <> $5)
                LIMIT 1
                "#,
            )
            .bind(database)
            .bind(table)
            .bind(&grantee.user)
            .bind(&grantee.role)
            .bind(exclude_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_query_error(error, "check row permission uniqueness"))?,
            PermissionIntent::Quota { database, .. } => sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT id FROM storage_quotas
                WHERE db_name = $1 AND ($2::uuid IS NULL OR id <> $2)
                LIMIT 1
                "#,
            )
            .bind(database)
            .bind(exclude_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_query_error(error, "check storage quota uniqueness"))?,
        };

        Ok(id.map(IntentId::from_uuid))
    }
}
