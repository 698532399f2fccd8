mod conversions;
mod types;

pub use types::{
    ListRolesQuery, PermissionAllowPayload, RoleDocumentResponse, RoleResponse,
    RoleSyncReportResponse, SaveRoleDocumentRequest, SaveRoleRequest, SyncedRoleResponse,
};
