use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use lakewarden_core::{AppError, IntentId};
use lakewarden_domain::IntentKind;
use uuid::Uuid;

use crate::dto::{
    ImportQuery, ImportReportResponse, ListQuery, PageResponse, TablePermissionRequest,
    TablePermissionResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_table_permission_handler(
    State(state): State<AppState>,
    Json(request): Json<TablePermissionRequest>,
) -> ApiResult<(StatusCode, Json<TablePermissionResponse>)> {
    let stored = state.permissions.create(request.into_intent()).await?;
    Ok((
        StatusCode::CREATED,
        Json(TablePermissionResponse::from_stored(stored)?),
    ))
}

pub async fn list_table_permissions_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PageResponse<TablePermissionResponse>>> {
    let page = state
        .permissions
        .list(IntentKind::Table, &query.filter(), &query.page_request())
        .await?;
    Ok(Json(PageResponse::from_page(
        page,
        TablePermissionResponse::from_stored,
    )?))
}

pub async fn get_table_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<TablePermissionResponse>> {
    let id = IntentId::from_uuid(permission_id);
    let stored = state.permissions.get(id).await?;
    if stored.intent.kind() != IntentKind::Table {
        return Err(AppError::NotFound(format!("table permission {id}")).into());
    }
    Ok(Json(TablePermissionResponse::from_stored(stored)?))
}

pub async fn update_table_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
    Json(request): Json<TablePermissionRequest>,
) -> ApiResult<Json<TablePermissionResponse>> {
    let stored = state
        .permissions
        .update(IntentId::from_uuid(permission_id), request.into_intent())
        .await?;
    Ok(Json(TablePermissionResponse::from_stored(stored)?))
}

pub async fn delete_table_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .permissions
        .remove(IntentId::from_uuid(permission_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_table_permissions_handler(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(requests): Json<Vec<TablePermissionRequest>>,
) -> ApiResult<Json<ImportReportResponse<TablePermissionResponse>>> {
    let intents = requests
        .into_iter()
        .map(TablePermissionRequest::into_intent)
        .collect();
    let report = state.permissions.import_batch(query.mode, intents).await?;
    Ok(Json(ImportReportResponse::from_report(
        report,
        TablePermissionResponse::from_stored,
    )?))
}
