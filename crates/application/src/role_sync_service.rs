use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use casewell_core::{AppError, AppResult, DomainName, UserIdentity};
use casewell_domain::{AuditAction, Permission, RoleDocument, RoleFields, RoleRecord};
use tracing::{debug, info};
use uuid::Uuid;

use crate::AuthorizationService;
use crate::audit_ports::{AuditEvent, AuditRepository};
use crate::role_sync_ports::{
    DocumentRoleRepository, RelationalRoleRepository, RoleSyncReport, RoleWrite, SaveRoleInput,
    SyncedRole,
};


/// Application service keeping relational and document roles consistent.
///
/// Every write goes through one representation and is synchronised into the
/// other before the call returns. Cross-references between roles (upstream
/// link and assignable-by) are translated between relational ids and
/// document ids, creating counterparts for referenced roles when needed.
#[derive(Clone)]
pub struct RoleSyncService {
    authorization_service: AuthorizationService,
    relational: Arc<dyn RelationalRoleRepository>,
    documents: Arc<dyn DocumentRoleRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl RoleSyncService {
    /// Creates a new role sync service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        relational: Arc<dyn RelationalRoleRepository>,
        documents: Arc<dyn DocumentRoleRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            authorization_service,
            relational,
            documents,
            audit_repository,
        }
    }

    /// Writes the relational role into the document store.
    ///
    /// Referenced roles without a document counterpart are synchronised in
    /// the same call. Returns the document of the requested role.
    pub async fn sync_down(&self, role_id: i64) -> AppResult<RoleDocument> {
        let mut pending = VecDeque::from([role_id]);
        let mut visited = HashSet::new();
        let mut root = None;

        while let Some(current) = pending.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            let record = self.relational_role(current).await?;
            let document_id = self.ensure_document_id(&record).await?;

            let upstream_id = match record.upstream_id {
                Some(upstream_id) => Some(
                    self.linked_document_id(upstream_id, &visited, &mut pending)
                        .await?,
                ),
                None => None,
            };

            let mut assignable_by = Vec::with_capacity(record.assignable_by.len());
            for assigner_id in &record.assignable_by {
                assignable_by.push(
                    self.linked_document_id(*assigner_id, &visited, &mut pending)
                        .await?,
                );
            }

            let document = RoleDocument::project(&record, document_id, upstream_id, assignable_by);
            self.documents.save_role(&document).await?;
            debug!(role_id = record.id, document_id = %document.id, "role synced to document store");

            if root.is_none() {
                root = Some(document);
            }
        }

        root.ok_or_else(|| AppError::Internal(format!("role {role_id} was not synchronised")))
    }

    /// Writes the role document into the relational store.
    ///
    /// The relational row is created when missing; referenced documents
    /// without a relational counterpart are synchronised in the same call.
    pub async fn sync_up(&self, document_id: &str) -> AppResult<RoleRecord> {
        let mut pending = VecDeque::from([document_id.to_owned()]);
        let mut visited = HashSet::new();
        let mut root = None;

        while let Some(current) = pending.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            let document = self
                .documents
                .find_role(&current)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("role document '{current}' not found")))?;
            let record = self.ensure_relational_role(&document).await?;
            let domain = &document.fields.domain;

            let upstream_id = match document.upstream_id.as_deref() {
                Some(upstream_id) => Some(
                    self.linked_role_id(upstream_id, domain, &visited, &mut pending)
                        .await?,
                ),
                None => None,
            };

            let mut assignable_by = Vec::with_capacity(document.assignable_by.len());
            for assigner_id in &document.assignable_by {
                assignable_by.push(
                    self.linked_role_id(assigner_id, domain, &visited, &mut pending)
                        .await?,
                );
            }
            assignable_by.sort_unstable();
            assignable_by.dedup();

            self.relational
                .write_role(&RoleWrite {
                    role_id: Some(record.id),
                    fields: document.fields.clone(),
                    upstream_id,
                    permissions: document.permissions.clone(),
                    assignable_by,
                })
                .await?;
            debug!(role_id = record.id, document_id = %document.id, "role synced to relational store");

            if root.is_none() {
                root = Some(record.id);
            }
        }

        let root_id = root.ok_or_else(|| {
            AppError::Internal(format!("role document '{document_id}' was not synchronised"))
        })?;
        self.relational_role(root_id).await
    }

    /// Creates or updates a role through the relational representation.
    pub async fn save_relational_role(
        &self,
        actor: &UserIdentity,
        input: SaveRoleInput,
    ) -> AppResult<SyncedRole> {
        self.authorization_service
            .require_permission(actor, Permission::EditWebUsers)
            .await?;

        let mut fields = RoleFields::new(actor.domain().clone(), input.name)?;
        fields.default_landing_page = input.default_landing_page;
        fields.is_non_admin_editable = input.is_non_admin_editable;

        let existing = match input.role_id {
            Some(role_id) => Some(self.domain_role(actor.domain(), role_id).await?),
            None => None,
        };

        for assigner_id in &input.assignable_by {
            let assigner = self.relational_role(*assigner_id).await?;
            if assigner.fields.domain != *actor.domain() {
                return Err(AppError::Validation(format!(
                    "role {assigner_id} belongs to another domain and cannot assign this role"
                )));
            }
        }
        if let Some(upstream_id) = input.upstream_id {
            let upstream = self.relational_role(upstream_id).await?;
            if upstream.fields.domain != *actor.domain() {
                return Err(AppError::Validation(format!(
                    "upstream role {upstream_id} belongs to another domain"
                )));
            }
        }

        if let Some(existing) = &existing {
            fields.is_archived = existing.fields.is_archived;
        }
        let role_id = self
            .relational
            .write_role(&RoleWrite {
                role_id: existing.map(|existing| existing.id),
                fields,
                upstream_id: input.upstream_id,
                permissions: input.permissions,
                assignable_by: input.assignable_by,
            })
            .await?;

        let document = self.sync_down(role_id).await?;
        let record = self.relational_role(role_id).await?;

        self.audit(
            actor,
            AuditAction::RoleSaved,
            role_id.to_string(),
            Some(record.to_json().to_string()),
        )
        .await?;
        info!(domain = %actor.domain(), role_id, document_id = %document.id, "role saved");

        Ok(SyncedRole { record, document })
    }

    /// Creates or replaces a role through the document representation.
    ///
    /// An empty document id is replaced by a freshly allocated one.
    pub async fn save_document_role(
        &self,
        actor: &UserIdentity,
        document: RoleDocument,
    ) -> AppResult<SyncedRole> {
        self.authorization_service
            .require_permission(actor, Permission::EditWebUsers)
            .await?;

        if document.fields.domain != *actor.domain() {
            return Err(AppError::Validation(format!(
                "role document domain '{}' does not match '{}'",
                document.fields.domain,
                actor.domain()
            )));
        }

        let mut document = document;
        if document.id.trim().is_empty() {
            document.id = new_document_id();
        } else if let Some(stored) = self.documents.find_role(&document.id).await?
            && stored.fields.domain != *actor.domain()
        {
            return Err(AppError::NotFound(format!(
                "role document '{}' not found",
                document.id
            )));
        }

        self.check_document_references(actor.domain(), &document)
            .await?;

        self.documents.save_role(&document).await?;
        let record = self.sync_up(&document.id).await?;

        self.audit(
            actor,
            AuditAction::RoleSaved,
            record.id.to_string(),
            Some(record.to_json().to_string()),
        )
        .await?;
        info!(domain = %actor.domain(), role_id = record.id, document_id = %document.id, "role document saved");

        Ok(SyncedRole { record, document })
    }

    /// Archives a role in both representations.
    pub async fn archive_role(&self, actor: &UserIdentity, role_id: i64) -> AppResult<SyncedRole> {
        self.authorization_service
            .require_permission(actor, Permission::EditWebUsers)
            .await?;

        let record = self.domain_role(actor.domain(), role_id).await?;
        let mut fields = record.fields.clone();
        fields.is_archived = true;
        self.relational
            .update_role(record.id, &fields, record.upstream_id)
            .await?;

        let document = self.sync_down(record.id).await?;
        let record = self.relational_role(record.id).await?;

        self.audit(actor, AuditAction::RoleArchived, role_id.to_string(), None)
            .await?;
        info!(domain = %actor.domain(), role_id, "role archived");

        Ok(SyncedRole { record, document })
    }

    /// Lists relational roles of the actor's domain.
    pub async fn list_roles(
        &self,
        actor: &UserIdentity,
        include_archived: bool,
    ) -> AppResult<Vec<RoleRecord>> {
        self.authorization_service
            .require_permission(actor, Permission::ViewWebUsers)
            .await?;

        self.relational
            .list_roles(actor.domain(), include_archived)
            .await
    }

    /// Synchronises every relational role of a domain into the document store.
    pub async fn reconcile_domain(&self, domain: &DomainName) -> AppResult<RoleSyncReport> {
        let roles = self.relational.list_roles(domain, true).await?;
        let mut report = RoleSyncReport {
            domain: domain.clone(),
            synced: 0,
            created_documents: 0,
        };

        for listed in roles {
            let record = self.relational_role(listed.id).await?;
            let has_document = match record.document_id.as_deref() {
                Some(document_id) => self.documents.find_role(document_id).await?.is_some(),
                None => false,
            };

            self.sync_down(record.id).await?;
            report.synced += 1;
            if !has_document {
                report.created_documents += 1;
            }
        }

        info!(
            domain = %domain,
            synced = report.synced,
            created_documents = report.created_documents,
            "roles reconciled"
        );

        Ok(report)
    }

    /// Reconciles the actor's domain and records the run in the audit log.
    pub async fn reconcile_for_actor(&self, actor: &UserIdentity) -> AppResult<RoleSyncReport> {
        self.authorization_service
            .require_permission(actor, Permission::EditWebUsers)
            .await?;

        let report = self.reconcile_domain(actor.domain()).await?;
        self.audit(
            actor,
            AuditAction::RolesSynced,
            actor.domain().to_string(),
            Some(format!(
                "synced={} created_documents={}",
                report.synced, report.created_documents
            )),
        )
        .await?;

        Ok(report)
    }

    async fn relational_role(&self, role_id: i64) -> AppResult<RoleRecord> {
        self.relational
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} not found")))
    }

    async fn domain_role(&self, domain: &DomainName, role_id: i64) -> AppResult<RoleRecord> {
        let record = self.relational_role(role_id).await?;
        if record.fields.domain != *domain {
            return Err(AppError::NotFound(format!("role {role_id} not found")));
        }

        Ok(record)
    }

    async fn ensure_document_id(&self, record: &RoleRecord) -> AppResult<String> {
        if let Some(document_id) = &record.document_id {
            return Ok(document_id.clone());
        }

        let document_id = new_document_id();
        self.relational
            .set_document_id(record.id, &document_id)
            .await?;

        Ok(document_id)
    }

    /// Translates a relational reference, queueing roles whose document is missing.
    async fn linked_document_id(
        &self,
        role_id: i64,
        visited: &HashSet<i64>,
        pending: &mut VecDeque<i64>,
    ) -> AppResult<String> {
        let referenced = self.relational.find_role(role_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("referenced role {role_id} does not exist"))
        })?;
        let document_id = self.ensure_document_id(&referenced).await?;

        if !visited.contains(&role_id) && self.documents.find_role(&document_id).await?.is_none()
        {
            pending.push_back(role_id);
        }

        Ok(document_id)
    }

    async fn ensure_relational_role(&self, document: &RoleDocument) -> AppResult<RoleRecord> {
        if let Some(record) = self
            .relational
            .find_role_by_document_id(&document.id)
            .await?
        {
            return Ok(record);
        }

        self.relational
            .insert_role(&document.fields, None, Some(&document.id))
            .await
    }

    /// Translates a document reference, creating and queueing missing relational rows.
    async fn linked_role_id(
        &self,
        document_id: &str,
        domain: &DomainName,
        visited: &HashSet<String>,
        pending: &mut VecDeque<String>,
    ) -> AppResult<i64> {
        let referenced = self.referenced_document(document_id).await?;
        if referenced.fields.domain != *domain {
            return Err(foreign_reference(document_id, domain));
        }

        if let Some(record) = self
            .relational
            .find_role_by_document_id(document_id)
            .await?
        {
            return Ok(record.id);
        }

        let record = self
            .relational
            .insert_role(&referenced.fields, None, Some(document_id))
            .await?;
        if !visited.contains(document_id) {
            pending.push_back(document_id.to_owned());
        }

        Ok(record.id)
    }

    async fn referenced_document(&self, document_id: &str) -> AppResult<RoleDocument> {
        self.documents.find_role(document_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("referenced role document '{document_id}' does not exist"))
        })
    }

    /// Rejects upstream and assignable-by references to documents of other domains.
    async fn check_document_references(
        &self,
        domain: &DomainName,
        document: &RoleDocument,
    ) -> AppResult<()> {
        for document_id in document.upstream_id.iter().chain(&document.assignable_by) {
            if *document_id == document.id {
                continue;
            }

            let referenced = self.referenced_document(document_id).await?;
            if referenced.fields.domain != *domain {
                return Err(foreign_reference(document_id, domain));
            }
        }

        Ok(())
    }

    async fn audit(
        &self,
        actor: &UserIdentity,
        action: AuditAction,
        resource_id: String,
        detail: Option<String>,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                domain: actor.domain().clone(),
                subject: actor.subject().to_owned(),
                action,
                resource_type: "role".to_owned(),
                resource_id,
                detail,
            })
            .await
    }
}

fn foreign_reference(document_id: &str, domain: &DomainName) -> AppError {
    AppError::Validation(format!(
        "role document '{document_id}' belongs to another domain than '{domain}'"
    ))
}

fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}
