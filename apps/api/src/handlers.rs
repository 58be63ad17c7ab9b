mod accounts;
mod column_permissions;
mod health;
mod roles;
mod row_permissions;
mod storage_quotas;
mod table_permissions;

pub use accounts::{create_account_handler, delete_account_handler};
pub use column_permissions::{
    create_column_permission_handler, delete_column_permission_handler,
    get_column_permission_handler, import_column_permissions_handler,
    list_column_permissions_handler, update_column_permission_handler,
};
pub use health::health_handler;
pub use roles::{
    ensure_role_membership_handler, remove_principal_handler, remove_role_membership_handler,
};
pub use row_permissions::{
    create_row_permission_handler, delete_row_permission_handler, get_row_permission_handler,
    import_row_permissions_handler, list_row_permissions_handler, update_row_permission_handler,
};
pub use storage_quotas::{
    create_storage_quota_handler, delete_storage_quota_handler, get_storage_quota_handler,
    import_storage_quotas_handler, list_storage_quotas_handler, update_storage_quota_handler,
};
pub use table_permissions::{
    create_table_permission_handler, delete_table_permission_handler,
    get_table_permission_handler, import_table_permissions_handler,
    list_table_permissions_handler, update_table_permission_handler,
};
