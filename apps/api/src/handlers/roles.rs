use axum::Json;
use axum::extract::{Path, State};

use crate::dto::{MembershipResponse, RoleMembershipRequest, RolesTouchedResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn ensure_role_membership_handler(
    State(state): State<AppState>,
    Json(request): Json<RoleMembershipRequest>,
) -> ApiResult<Json<MembershipResponse>> {
    let outcome = state
        .roles
        .ensure_membership(
            request.service.as_str(),
            request.role_name.as_str(),
            &request.principals(),
        )
        .await?;
    Ok(Json(MembershipResponse { outcome }))
}

pub async fn remove_role_membership_handler(
    State(state): State<AppState>,
    Json(request): Json<RoleMembershipRequest>,
) -> ApiResult<Json<MembershipResponse>> {
    let outcome = state
        .roles
        .remove_membership(
            request.service.as_str(),
            request.role_name.as_str(),
            &request.principals(),
        )
        .await?;
    Ok(Json(MembershipResponse { outcome }))
}

pub async fn remove_principal_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<RolesTouchedResponse>> {
    let roles_touched = state
        .roles
        .remove_principal_from_all_roles(username.as_str())
        .await?;
    Ok(Json(RolesTouchedResponse { roles_touched }))
}
