use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Scope of one permission: `true` for everything or an explicit item list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-allow-payload.ts"
)]
pub enum PermissionAllowPayload {
    Flag(bool),
    Items(Vec<String>),
}

/// Incoming payload for saving a relational role.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/save-role-request.ts"
)]
pub struct SaveRoleRequest {
    #[ts(type = "number | null")]
    pub role_id: Option<i64>,
    pub name: String,
    pub default_landing_page: Option<String>,
    #[serde(default)]
    pub is_non_admin_editable: bool,
    #[ts(type = "number | null")]
    pub upstream_id: Option<i64>,
    #[serde(default)]
    pub permissions: BTreeMap<String, PermissionAllowPayload>,
    #[serde(default)]
    #[ts(type = "Array<number>")]
    pub assignable_by: Vec<i64>,
}

/// Incoming payload for saving a role through its document representation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/save-role-document-request.ts"
)]
pub struct SaveRoleDocumentRequest {
    pub name: Option<String>,
    pub default_landing_page: Option<String>,
    #[serde(default)]
    pub is_non_admin_editable: bool,
    #[serde(default)]
    pub is_archived: bool,
    pub upstream_id: Option<String>,
    #[serde(default)]
    pub permissions: BTreeMap<String, PermissionAllowPayload>,
    #[serde(default)]
    pub assignable_by: Vec<String>,
}

/// Query parameters for role listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListRolesQuery {
    #[serde(default)]
    pub include_archived: bool,
}

/// API representation of a relational role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub document_id: Option<String>,
    pub domain: String,
    pub name: Option<String>,
    pub default_landing_page: Option<String>,
    pub is_non_admin_editable: bool,
    pub is_archived: bool,
    #[ts(type = "number | null")]
    pub upstream_id: Option<i64>,
    pub permissions: BTreeMap<String, PermissionAllowPayload>,
    #[ts(type = "Array<number>")]
    pub assignable_by: Vec<i64>,
}

/// API representation of a document role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-document-response.ts"
)]
pub struct RoleDocumentResponse {
    pub id: String,
    pub domain: String,
    pub name: Option<String>,
    pub default_landing_page: Option<String>,
    pub is_non_admin_editable: bool,
    pub is_archived: bool,
    pub upstream_id: Option<String>,
    pub permissions: BTreeMap<String, PermissionAllowPayload>,
    pub assignable_by: Vec<String>,
}

/// Both representations of a role after a synchronised write.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/synced-role-response.ts"
)]
pub struct SyncedRoleResponse {
    pub role: RoleResponse,
    pub document: RoleDocumentResponse,
}

/// Outcome of reconciling every role of a domain.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-sync-report-response.ts"
)]
pub struct RoleSyncReportResponse {
    pub domain: String,
    pub synced: usize,
    pub created_documents: usize,
}
