use std::collections::BTreeMap;
use std::str::FromStr;

use casewell_application::{RoleSyncReport, SaveRoleInput, SyncedRole};
use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::{
    LandingPage, PermissionAllowValue, Permissions, RoleDocument, RoleFields, RoleRecord,
};

use super::types::{
    PermissionAllowPayload, RoleDocumentResponse, RoleResponse, RoleSyncReportResponse,
    SaveRoleDocumentRequest, SaveRoleRequest, SyncedRoleResponse,
};

fn permissions_from_payload(
    payload: BTreeMap<String, PermissionAllowPayload>,
) -> AppResult<Permissions> {
    let values: BTreeMap<String, PermissionAllowValue> = payload
        .into_iter()
        .map(|(name, allow)| {
            let allow = match allow {
                PermissionAllowPayload::Flag(flag) => PermissionAllowValue::Flag(flag),
                PermissionAllowPayload::Items(items) => PermissionAllowValue::Items(items),
            };
            (name, allow)
        })
        .collect();

    Permissions::try_from(values)
}

fn permissions_to_payload(permissions: Permissions) -> BTreeMap<String, PermissionAllowPayload> {
    BTreeMap::<String, PermissionAllowValue>::from(permissions)
        .into_iter()
        .map(|(name, allow)| {
            let allow = match allow {
                PermissionAllowValue::Flag(flag) => PermissionAllowPayload::Flag(flag),
                PermissionAllowValue::Items(items) => PermissionAllowPayload::Items(items),
            };
            (name, allow)
        })
        .collect()
}

fn landing_page(value: Option<String>) -> AppResult<Option<LandingPage>> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(|value| LandingPage::from_str(value.trim()))
        .transpose()
}

impl TryFrom<SaveRoleRequest> for SaveRoleInput {
    type Error = AppError;

    fn try_from(value: SaveRoleRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            role_id: value.role_id,
            name: value.name,
            default_landing_page: landing_page(value.default_landing_page)?,
            is_non_admin_editable: value.is_non_admin_editable,
            upstream_id: value.upstream_id,
            permissions: permissions_from_payload(value.permissions)?,
            assignable_by: value.assignable_by,
        })
    }
}

impl SaveRoleDocumentRequest {
    /// Builds the document addressed by the request path.
    pub fn into_document(self, document_id: String, domain: DomainName) -> AppResult<RoleDocument> {
        let name = self
            .name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());

        Ok(RoleDocument {
            id: document_id,
            fields: RoleFields {
                domain,
                name,
                default_landing_page: landing_page(self.default_landing_page)?,
                is_non_admin_editable: self.is_non_admin_editable,
                is_archived: self.is_archived,
            },
            upstream_id: self.upstream_id,
            permissions: permissions_from_payload(self.permissions)?,
            assignable_by: self.assignable_by,
        })
    }
}

impl From<RoleRecord> for RoleResponse {
    fn from(value: RoleRecord) -> Self {
        let permissions = permissions_to_payload(value.permission_set());
        Self {
            id: value.id,
            document_id: value.document_id,
            domain: value.fields.domain.as_str().to_owned(),
            name: value.fields.name,
            default_landing_page: value
                .fields
                .default_landing_page
                .map(|page| page.as_str().to_owned()),
            is_non_admin_editable: value.fields.is_non_admin_editable,
            is_archived: value.fields.is_archived,
            upstream_id: value.upstream_id,
            permissions,
            assignable_by: value.assignable_by,
        }
    }
}

impl From<RoleDocument> for RoleDocumentResponse {
    fn from(value: RoleDocument) -> Self {
        Self {
            id: value.id,
            domain: value.fields.domain.as_str().to_owned(),
            name: value.fields.name,
            default_landing_page: value
                .fields
                .default_landing_page
                .map(|page| page.as_str().to_owned()),
            is_non_admin_editable: value.fields.is_non_admin_editable,
            is_archived: value.fields.is_archived,
            upstream_id: value.upstream_id,
            permissions: permissions_to_payload(value.permissions),
            assignable_by: value.assignable_by,
        }
    }
}

impl From<SyncedRole> for SyncedRoleResponse {
    fn from(value: SyncedRole) -> Self {
        Self {
            role: RoleResponse::from(value.record),
            document: RoleDocumentResponse::from(value.document),
        }
    }
}

impl From<RoleSyncReport> for RoleSyncReportResponse {
    fn from(value: RoleSyncReport) -> Self {
        Self {
            domain: value.domain.as_str().to_owned(),
            synced: value.synced,
            created_documents: value.created_documents,
        }
    }
}
