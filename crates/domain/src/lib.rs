//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod case;
mod case_search;
mod permission;
mod registry;
mod role;
pub mod search_query;

pub use audit::AuditAction;
pub use case::{CaseDocument, CaseIndex, CaseProperty, DetailColumn};
pub use case_search::{
    BLACKLISTED_OWNER_ID_KEY, CASE_TYPE_KEY, CUSTOM_KEY_PREFIX, CaseSearchConfig, CriteriaValue,
    DEFAULT_MAX_RESULTS, DateRange, FuzzyProperties, INDEXED_METADATA_KEYS, IgnorePattern,
    OWNER_ID_KEY, PATH_SEPARATOR, RANGE_VALUE_PREFIX, REGISTRY_KEY, RELEVANCE_SCORE_KEY,
    UNSEARCHABLE_KEYS, XPATH_QUERY_KEY, flatten_result, flatten_source,
};
pub use permission::{
    Permission, PermissionAllow, PermissionAllowValue, PermissionChanges, PermissionInfo,
    Permissions,
};
pub use registry::{
    DataRegistry, InvitationStatus, RegistryGrant, RegistryInvitation, slugify,
};
pub use role::{LandingPage, RoleDocument, RoleFields, RoleRecord, StaticRole, USER_ROLE_PREFIX};
pub use search_query::{BoolClause, CaseSearchQuery, RangeBounds, RangeKind, SearchClause};
