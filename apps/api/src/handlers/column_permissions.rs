use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use lakewarden_core::{AppError, IntentId};
use lakewarden_domain::IntentKind;
use uuid::Uuid;

use crate::dto::{
    ColumnPermissionRequest, ColumnPermissionResponse, ImportQuery, ImportReportResponse,
    ListQuery, PageResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_column_permission_handler(
    State(state): State<AppState>,
    Json(request): Json<ColumnPermissionRequest>,
) -> ApiResult<(StatusCode, Json<ColumnPermissionResponse>)> {
    let stored = state.permissions.create(request.into_intent()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(ColumnPermissionResponse::from_stored(stored)?),
    ))
}

pub async fn list_column_permissions_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PageResponse<ColumnPermissionResponse>>> {
    let page = state
        .permissions
        .list(IntentKind::Column, &query.filter(), &query.page_request())
        .await?;
    Ok(Json(PageResponse::from_page(
        page,
        ColumnPermissionResponse::from_stored,
    )?))
}

pub async fn get_column_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<ColumnPermissionResponse>> {
    let id = IntentId::from_uuid(permission_id);
    let stored = state.permissions.get(id).await?;
    if stored.intent.kind() != IntentKind::Column {
        return Err(AppError::NotFound(format!("column permission {id}")).into());
    }
    Ok(Json(ColumnPermissionResponse::from_stored(stored)?))
}

pub async fn update_column_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
    Json(request): Json<ColumnPermissionRequest>,
) -> ApiResult<Json<ColumnPermissionResponse>> {
    let stored = state
        .permissions
        .update(IntentId::from_uuid(permission_id), request.into_intent()?)
        .await?;
    Ok(Json(ColumnPermissionResponse::from_stored(stored)?))
}

pub async fn delete_column_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .permissions
        .remove(IntentId::from_uuid(permission_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_column_permissions_handler(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(requests): Json<Vec<ColumnPermissionRequest>>,
) -> ApiResult<Json<ImportReportResponse<ColumnPermissionResponse>>> {
    let mut intents = Vec::with_capacity(requests.len());
    for request in requests {
        intents.push(request.into_intent()?);
    }
    let report = state.permissions.import_batch(query.mode, intents).await?;
    Ok(Json(ImportReportResponse::from_report(
        report,
        ColumnPermissionResponse::from_stored,
    )?))
}
