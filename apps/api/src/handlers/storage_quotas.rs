use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use lakewarden_core::{AppError, IntentId};
use lakewarden_domain::IntentKind;
use uuid::Uuid;

use crate::dto::{
    ImportQuery, ImportReportResponse, ListQuery, PageResponse, StorageQuotaRequest,
    StorageQuotaResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_storage_quota_handler(
    State(state): State<AppState>,
    Json(request): Json<StorageQuotaRequest>,
) -> ApiResult<(StatusCode, Json<StorageQuotaResponse>)> {
    let stored = state.permissions.create(request.into_intent()).await?;
    Ok((
        StatusCode::CREATED,
        Json(StorageQuotaResponse::from_stored(stored)?),
    ))
}

pub async fn list_storage_quotas_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PageResponse<StorageQuotaResponse>>> {
    let page = state
        .permissions
        .list(IntentKind::Quota, &query.filter(), &query.page_request())
        .await?;
    Ok(Json(PageResponse::from_page(
        page,
        StorageQuotaResponse::from_stored,
    )?))
}

pub async fn get_storage_quota_handler(
    State(state): State<AppState>,
    Path(quota_id): Path<Uuid>,
) -> ApiResult<Json<StorageQuotaResponse>> {
    let id = IntentId::from_uuid(quota_id);
    let stored = state.permissions.get(id).await?;
    if stored.intent.kind() != IntentKind::Quota {
        return Err(AppError::NotFound(format!("storage quota {id}")).into());
    }
    Ok(Json(StorageQuotaResponse::from_stored(stored)?))
}

pub async fn update_storage_quota_handler(
    State(state): State<AppState>,
    Path(quota_id): Path<Uuid>,
    Json(request): Json<StorageQuotaRequest>,
) -> ApiResult<Json<StorageQuotaResponse>> {
    let stored = state
        .permissions
        .update(IntentId::from_uuid(quota_id), request.into_intent())
        .await?;
    Ok(Json(StorageQuotaResponse::from_stored(stored)?))
}

pub async fn delete_storage_quota_handler(
    State(state): State<AppState>,
    Path(quota_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .permissions
        .remove(IntentId::from_uuid(quota_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_storage_quotas_handler(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(requests): Json<Vec<StorageQuotaRequest>>,
) -> ApiResult<Json<ImportReportResponse<StorageQuotaResponse>>> {
    let intents = requests
        .into_iter()
        .map(StorageQuotaRequest::into_intent)
        .collect();
    let report = state.permissions.import_batch(query.mode, intents).await?;
    Ok(Json(ImportReportResponse::from_report(
        report,
        StorageQuotaResponse::from_stored,
    )?))
}
