use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use lakewarden_core::{AppError, IntentId};
use lakewarden_domain::IntentKind;
use uuid::Uuid;

use crate::dto::{
    ImportQuery, ImportReportResponse, ListQuery, PageResponse, RowPermissionRequest,
    RowPermissionResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_row_permission_handler(
    State(state): State<AppState>,
    Json(request): Json<RowPermissionRequest>,
) -> ApiResult<(StatusCode, Json<RowPermissionResponse>)> {
    let stored = state.permissions.create(request.into_intent()).await?;
    Ok((
        StatusCode::CREATED,
        Json(RowPermissionResponse::from_stored(stored)?),
    ))
}

pub async fn list_row_permissions_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PageResponse<RowPermissionResponse>>> {
    let page = state
        .permissions
        .list(IntentKind::Row, &query.filter(), &query.page_request())
        .await?;
    Ok(Json(PageResponse::from_page(
        page,
        RowPermissionResponse::from_stored,
    )?))
}

pub async fn get_row_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<RowPermissionResponse>> {
    let id = IntentId::from_uuid(permission_id);
    let stored = state.permissions.get(id).await?;
    if stored.intent.kind() != IntentKind::Row {
        return Err(AppError::NotFound(format!("row permission {id}")).into());
    }
    Ok(Json(RowPermissionResponse::from_stored(stored)?))
}

pub async fn update_row_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
    Json(request): Json<RowPermissionRequest>,
) -> ApiResult<Json<RowPermissionResponse>> {
    let stored = state
        .permissions
        .update(IntentId::from_uuid(permission_id), request.into_intent())
        .await?;
    Ok(Json(RowPermissionResponse::from_stored(stored)?))
}

pub async fn delete_row_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .permissions
        .remove(IntentId::from_uuid(permission_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_row_permissions_handler(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(requests): Json<Vec<RowPermissionRequest>>,
) -> ApiResult<Json<ImportReportResponse<RowPermissionResponse>>> {
    let intents = requests
        .into_iter()
        .map(RowPermissionRequest::into_intent)
        .collect();
    let report = state.permissions.import_batch(query.mode, intents).await?;
    Ok(Json(ImportReportResponse::from_report(
        report,
        RowPermissionResponse::from_stored,
    )?))
}
