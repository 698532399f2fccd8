mod case_search;
mod common;
mod registries;
mod roles;

pub use case_search::{
    AncestorFilterResponse, CaseSearchConfigPayload, CaseSearchRequestBody, CaseSearchResponse,
    CompiledCaseSearchResponse, CriteriaValueRequest, DetailColumnRequest, FuzzyPropertiesPayload,
    IgnorePatternPayload,
};
pub use common::{HealthDependencyStatus, HealthResponse};
pub use registries::{
    CaseIndexResponse, CaseResponse, CreateRegistryRequest, GrantAccessRequest,
    InviteDomainRequest, RegistryCaseQuery, RegistryGrantResponse, RegistryInvitationResponse,
    RegistryResponse, VisibleDomainsResponse,
};
pub use roles::{
    ListRolesQuery, PermissionAllowPayload, RoleDocumentResponse, RoleResponse,
    RoleSyncReportResponse, SaveRoleDocumentRequest, SaveRoleRequest, SyncedRoleResponse,
};
