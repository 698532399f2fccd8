use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use casewell_application::SaveRoleInput;

use crate::dto::{
    ListRolesQuery, RoleResponse, RoleSyncReportResponse, SaveRoleDocumentRequest,
    SaveRoleRequest, SyncedRoleResponse,
};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedSubject;
use crate::state::AppState;

mod documents;
mod relational;

pub use documents::save_role_document_handler;
pub use relational::{
    archive_role_handler, list_roles_handler, save_role_handler, sync_roles_handler,
};
