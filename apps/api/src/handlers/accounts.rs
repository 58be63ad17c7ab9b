use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use lakewarden_application::DirectoryAccountSpec;

use crate::dto::{AccountRequest, RolesTouchedResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_account_handler(
    State(state): State<AppState>,
    Json(request): Json<AccountRequest>,
) -> ApiResult<StatusCode> {
    state
        .accounts
        .create_account(DirectoryAccountSpec {
            username: request.username,
            department: request.department,
            role_name: request.role_name,
        })
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_account_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<RolesTouchedResponse>> {
    let roles_touched = state.accounts.delete_account(username.as_str()).await?;
    Ok(Json(RolesTouchedResponse { roles_touched }))
}
