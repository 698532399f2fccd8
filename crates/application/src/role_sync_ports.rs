use async_trait::async_trait;
use casewell_core::{AppResult, DomainName};
use casewell_domain::{LandingPage, Permissions, RoleDocument, RoleFields, RoleRecord};

/// Repository port for the relational role representation.
#[async_trait]
pub trait RelationalRoleRepository: Send + Sync {
    /// Finds a role by primary key, including permission and assignable-by rows.
    async fn find_role(&self, role_id: i64) -> AppResult<Option<RoleRecord>>;

    /// Finds the role linked to a document id.
    async fn find_role_by_document_id(&self, document_id: &str) -> AppResult<Option<RoleRecord>>;

    /// Lists roles of a domain ordered by id.
    async fn list_roles(
        &self,
        domain: &DomainName,
        include_archived: bool,
    ) -> AppResult<Vec<RoleRecord>>;

    /// Inserts a role row without permissions or assignable-by rows.
    async fn insert_role(
        &self,
        fields: &RoleFields,
        upstream_id: Option<i64>,
        document_id: Option<&str>,
    ) -> AppResult<RoleRecord>;

    /// Updates the synchronised fields and the upstream link.
    async fn update_role(
        &self,
        role_id: i64,
        fields: &RoleFields,
        upstream_id: Option<i64>,
    ) -> AppResult<()>;

    /// Writes a role row with its permission and assignable-by rows in one
    /// transaction, inserting the row when `role_id` is `None`. Returns the role id.
    async fn write_role(&self, write: &RoleWrite) -> AppResult<i64>;

    /// Links a role to its document counterpart.
    async fn set_document_id(&self, role_id: i64, document_id: &str) -> AppResult<()>;

    /// Applies the row diff turning stored grants into the given set.
    async fn set_permissions(&self, role_id: i64, permissions: &Permissions) -> AppResult<()>;

    /// Replaces assignable-by rows, creating missing and deleting removed ones.
    async fn set_assignable_by(&self, role_id: i64, assignable_by: &[i64]) -> AppResult<()>;
}

/// Repository port for the document role representation.
#[async_trait]
pub trait DocumentRoleRepository: Send + Sync {
    /// Finds a role document.
    async fn find_role(&self, document_id: &str) -> AppResult<Option<RoleDocument>>;

    /// Lists role documents of a domain.
    async fn list_roles(&self, domain: &DomainName) -> AppResult<Vec<RoleDocument>>;

    /// Inserts or replaces a role document.
    async fn save_role(&self, role: &RoleDocument) -> AppResult<()>;
}

/// Input payload for saving a role through the relational representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRoleInput {
    /// Existing role id, or `None` to create a role.
    pub role_id: Option<i64>,
    /// Role name.
    pub name: String,
    /// Landing page override.
    pub default_landing_page: Option<LandingPage>,
    /// Whether non-admin users may edit the role.
    pub is_non_admin_editable: bool,
    /// Upstream role id.
    pub upstream_id: Option<i64>,
    /// Desired permission set.
    pub permissions: Permissions,
    /// Relational ids of roles allowed to assign this role.
    pub assignable_by: Vec<i64>,
}

/// Complete relational state of one role, written atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleWrite {
    /// Existing role id, or `None` to insert a row.
    pub role_id: Option<i64>,
    /// Synchronised fields.
    pub fields: RoleFields,
    /// Upstream role id.
    pub upstream_id: Option<i64>,
    /// Desired permission set.
    pub permissions: Permissions,
    /// Relational ids of roles allowed to assign this role.
    pub assignable_by: Vec<i64>,
}

/// Both representations of a role after synchronisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedRole {
    /// Relational representation.
    pub record: RoleRecord,
    /// Document representation.
    pub document: RoleDocument,
}

/// Outcome of reconciling every role of a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSyncReport {
    /// Reconciled domain.
    pub domain: DomainName,
    /// Number of roles written to the document store.
    pub synced: usize,
    /// Number of roles that had no document counterpart before.
    pub created_documents: usize,
}
