use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, cors_origin: Option<HeaderValue>) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);
    if let Some(origin) = cors_origin {
        cors = cors.allow_origin(origin);
    }

    Router::new()
        .route("/api/health", get(handlers::health_handler))
        .route(
            "/api/table-permissions",
            post(handlers::create_table_permission_handler)
                .get(handlers::list_table_permissions_handler),
        )
        .route(
            "/api/table-permissions/import",
            post(handlers::import_table_permissions_handler),
        )
        .route(
            "/api/table-permissions/{permission_id}",
            get(handlers::get_table_permission_handler)
                .put(handlers::update_table_permission_handler)
                .delete(handlers::delete_table_permission_handler),
        )
        .route(
            "/api/column-permissions",
            post(handlers::create_column_permission_handler)
                .get(handlers::list_column_permissions_handler),
        )
        .route(
            "/api/column-permissions/import",
            post(handlers::import_column_permissions_handler),
        )
        .route(
            "/api/column-permissions/{permission_id}",
            get(handlers::get_column_permission_handler)
                .put(handlers::update_column_permission_handler)
                .delete(handlers::delete_column_permission_handler),
        )
        .route(
            "/api/row-permissions",
            post(handlers::create_row_permission_handler)
                .get(handlers::list_row_permissions_handler),
        )
        .route(
            "/api/row-permissions/import",
            post(handlers::import_row_permissions_handler),
        )
        .route(
            "/api/row-permissions/{permission_id}",
            get(handlers::get_row_permission_handler)
                .put(handlers::update_row_permission_handler)
                .delete(handlers::delete_row_permission_handler),
        )
        .route(
            "/api/storage-quotas",
            post(handlers::create_storage_quota_handler)
                .get(handlers::list_storage_quotas_handler),
        )
        .route(
            "/api/storage-quotas/import",
            post(handlers::import_storage_quotas_handler),
        )
        .route(
            "/api/storage-quotas/{quota_id}",
            get(handlers::get_storage_quota_handler)
                .put(handlers::update_storage_quota_handler)
                .delete(handlers::delete_storage_quota_handler),
        )
        .route(
            "/api/roles/members",
            post(handlers::ensure_role_membership_handler)
                .delete(handlers::remove_role_membership_handler),
        )
        .route(
            "/api/roles/principals/{username}",
            delete(handlers::remove_principal_handler),
        )
        .route("/api/accounts", post(handlers::create_account_handler))
        .route(
            "/api/accounts/{username}",
            delete(handlers::delete_account_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
