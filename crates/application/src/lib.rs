//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod authorization_service;
mod case_search_ports;
mod case_search_service;
mod extension_registry;
mod registry_ports;
mod registry_service;
mod role_sync_ports;
mod role_sync_service;

pub use audit_ports::{AuditEvent, AuditRepository};
pub use authorization_service::{AuthorizationRepository, AuthorizationService};
pub use case_search_ports::{
    CaseSearchBackend, CaseSearchConfigCache, CaseSearchConfigRepository, SearchHits,
};
pub use case_search_service::{
    AncestorFilter, CASE_SEARCH_EXTRA_FILTERS_POINT, CaseSearchCriteria, CaseSearchPorts,
    CaseSearchRequest, CaseSearchResults, CaseSearchService, CaseSearchSettings,
    CompiledCaseSearch, RelatedCaseResolver, RelatedCaseScope, define_case_search_extension_points,
};
pub use extension_registry::{
    DOMAIN_ARG, Extension, ExtensionArgs, ExtensionHandler, ExtensionPoint, ExtensionRegistry,
};
pub use registry_ports::RegistryRepository;
pub use registry_service::RegistryService;
pub use role_sync_ports::{
    DocumentRoleRepository, RelationalRoleRepository, RoleSyncReport, RoleWrite, SaveRoleInput,
    SyncedRole,
};
pub use role_sync_service::RoleSyncService;
