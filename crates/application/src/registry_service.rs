use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use casewell_core::{AppError, AppResult, DomainName, UserIdentity};
use casewell_domain::{AuditAction, CaseDocument, DataRegistry, Permission};
use chrono::Utc;
use tracing::info;

use crate::AuthorizationService;
use crate::audit_ports::{AuditEvent, AuditRepository};
use crate::case_search_ports::CaseSearchBackend;
use crate::registry_ports::RegistryRepository;

/// Application service for data registries and cross-domain case access.
#[derive(Clone)]
pub struct RegistryService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn RegistryRepository>,
    backend: Arc<dyn CaseSearchBackend>,
    audit_repository: Arc<dyn AuditRepository>,
    max_hierarchy_cases: usize,
}

impl RegistryService {
    /// Creates a new registry service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn RegistryRepository>,
        backend: Arc<dyn CaseSearchBackend>,
        audit_repository: Arc<dyn AuditRepository>,
        max_hierarchy_cases: usize,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            backend,
            audit_repository,
            max_hierarchy_cases,
        }
    }

    /// Creates a registry owned by the actor's domain.
    pub async fn create_registry(
        &self,
        actor: &UserIdentity,
        name: &str,
        case_types: Vec<String>,
    ) -> AppResult<DataRegistry> {
        self.authorization_service
            .require_permission(actor, Permission::ManageDataRegistry)
            .await?;

        let registry = DataRegistry::new(actor.domain().clone(), name, case_types, Utc::now())?;
        if self
            .repository
            .find_owned(actor.domain(), registry.slug())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "registry '{}' already exists in domain '{}'",
                registry.slug(),
                actor.domain()
            )));
        }

        self.repository.create_registry(&registry).await?;
        self.audit(
            actor,
            AuditAction::RegistryCreated,
            &registry,
            Some(format!("case_types={}", registry.case_types().join(","))),
        )
        .await?;

        info!(domain = %actor.domain(), slug = registry.slug(), "data registry created");
        Ok(registry)
    }

    /// Lists registries owned by the actor's domain.
    pub async fn list_owned(&self, actor: &UserIdentity) -> AppResult<Vec<DataRegistry>> {
        self.authorization_service
            .require_permission(actor, Permission::ManageDataRegistry)
            .await?;

        self.repository.list_owned(actor.domain()).await
    }

    /// Invites another domain to a registry owned by the actor's domain.
    pub async fn invite_domain(
        &self,
        actor: &UserIdentity,
        slug: &str,
        domain: DomainName,
    ) -> AppResult<DataRegistry> {
        self.require_manage(actor, slug).await?;

        let mut registry = self.owned_registry(actor.domain(), slug).await?;
        let invitation = registry.invite(domain.clone())?.clone();
        self.repository
            .save_invitation(registry.id(), &invitation)
            .await?;
        self.audit(
            actor,
            AuditAction::RegistryInvitationSent,
            &registry,
            Some(format!("invited_domain={domain}")),
        )
        .await?;

        Ok(registry)
    }

    /// Accepts the invitation of the actor's domain.
    pub async fn accept_invitation(
        &self,
        actor: &UserIdentity,
        slug: &str,
    ) -> AppResult<DataRegistry> {
        self.require_manage(actor, slug).await?;

        let mut registry = self.invited_registry(actor.domain(), slug).await?;
        let invitation = registry
            .accept_invitation(actor.domain(), Utc::now())?
            .clone();
        self.repository
            .save_invitation(registry.id(), &invitation)
            .await?;
        self.audit(actor, AuditAction::RegistryInvitationAccepted, &registry, None)
            .await?;

        Ok(registry)
    }

    /// Rejects the invitation of the actor's domain.
    pub async fn reject_invitation(
        &self,
        actor: &UserIdentity,
        slug: &str,
    ) -> AppResult<DataRegistry> {
        self.require_manage(actor, slug).await?;

        let mut registry = self.invited_registry(actor.domain(), slug).await?;
        let invitation = registry
            .reject_invitation(actor.domain(), Utc::now())?
            .clone();
        self.repository
            .save_invitation(registry.id(), &invitation)
            .await?;
        self.audit(actor, AuditAction::RegistryInvitationRejected, &registry, None)
            .await?;

        Ok(registry)
    }

    /// Lets the listed domains see the actor's domain data through the registry.
    pub async fn grant_access(
        &self,
        actor: &UserIdentity,
        slug: &str,
        to_domains: BTreeSet<DomainName>,
    ) -> AppResult<DataRegistry> {
        self.require_manage(actor, slug).await?;

        let mut registry = self.invited_registry(actor.domain(), slug).await?;
        let grant = registry.grant(actor.domain().clone(), to_domains)?.clone();
        self.repository.save_grant(registry.id(), &grant).await?;
        self.audit(
            actor,
            AuditAction::RegistryGrantSaved,
            &registry,
            Some(format!(
                "to_domains={}",
                grant
                    .to_domains
                    .iter()
                    .map(DomainName::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            )),
        )
        .await?;

        Ok(registry)
    }

    /// Deactivates a registry owned by the actor's domain.
    pub async fn deactivate(&self, actor: &UserIdentity, slug: &str) -> AppResult<DataRegistry> {
        self.require_manage(actor, slug).await?;

        let mut registry = self.owned_registry(actor.domain(), slug).await?;
        registry.deactivate();
        self.repository.set_active(registry.id(), false).await?;
        self.audit(actor, AuditAction::RegistryDeactivated, &registry, None)
            .await?;

        Ok(registry)
    }

    /// Returns the domains whose data the actor's domain sees through the registry.
    pub async fn visible_domains(
        &self,
        actor: &UserIdentity,
        slug: &str,
    ) -> AppResult<BTreeSet<DomainName>> {
        self.require_view(actor, slug).await?;

        let registry = self.invited_registry(actor.domain(), slug).await?;
        registry.visible_domains(actor.domain())
    }

    /// Fetches one case through the registry.
    pub async fn get_case(
        &self,
        actor: &UserIdentity,
        slug: &str,
        case_id: &str,
        case_type: &str,
    ) -> AppResult<CaseDocument> {
        self.require_view(actor, slug).await?;

        let registry = self.invited_registry(actor.domain(), slug).await?;
        let (case, _) = self
            .fetch_case(actor, &registry, case_id, case_type)
            .await?;
        Ok(case)
    }

    /// Fetches a case with its open descendants through the registry.
    ///
    /// The case itself is included only while open.
    pub async fn get_case_hierarchy(
        &self,
        actor: &UserIdentity,
        slug: &str,
        case_id: &str,
        case_type: &str,
    ) -> AppResult<Vec<CaseDocument>> {
        self.require_view(actor, slug).await?;

        let registry = self.invited_registry(actor.domain(), slug).await?;
        let (case, visible_domains) = self
            .fetch_case(actor, &registry, case_id, case_type)
            .await?;

        let mut seen: HashSet<String> = HashSet::from([case.case_id.clone()]);
        let mut frontier = vec![case.case_id.clone()];
        let mut hierarchy = vec![case];

        while !frontier.is_empty() {
            let children = self
                .backend
                .find_cases_indexing(
                    &visible_domains,
                    None,
                    &frontier,
                    &[],
                    self.max_hierarchy_cases.saturating_add(1),
                )
                .await?;

            frontier = Vec::new();
            for child in children {
                if !seen.insert(child.case_id.clone()) {
                    continue;
                }
                frontier.push(child.case_id.clone());
                hierarchy.push(child);
            }

            if hierarchy.len() > self.max_hierarchy_cases {
                return Err(AppError::Validation(format!(
                    "case hierarchy of '{case_id}' exceeds {} cases",
                    self.max_hierarchy_cases
                )));
            }
        }

        Ok(hierarchy.into_iter().filter(|case| !case.closed).collect())
    }

    async fn fetch_case(
        &self,
        actor: &UserIdentity,
        registry: &DataRegistry,
        case_id: &str,
        case_type: &str,
    ) -> AppResult<(CaseDocument, Vec<String>)> {
        registry.pre_access_check(case_type)?;
        let visible_domains: Vec<String> = registry
            .visible_domains(actor.domain())?
            .into_iter()
            .map(String::from)
            .collect();

        let case = self
            .backend
            .get_cases(&visible_domains, &[case_id.to_owned()])
            .await?
            .into_iter()
            .find(|case| case.case_id == case_id)
            .ok_or_else(|| AppError::NotFound(format!("case '{case_id}' not found")))?;

        if case.case_type != case_type {
            return Err(AppError::NotFound(format!(
                "case '{case_id}' not found: case type mismatch"
            )));
        }
        if !visible_domains.contains(&case.domain) {
            return Err(AppError::Forbidden(format!(
                "case '{case_id}' is not available in registry '{}'",
                registry.slug()
            )));
        }

        self.audit(
            actor,
            AuditAction::RegistryDataAccessed,
            registry,
            Some(format!(
                "case_domain={} case_type={case_type} case_id={case_id}",
                case.domain
            )),
        )
        .await?;

        Ok((case, visible_domains))
    }

    async fn require_manage(&self, actor: &UserIdentity, slug: &str) -> AppResult<()> {
        self.authorization_service
            .require_item_permission(actor, Permission::ManageDataRegistry, slug)
            .await
    }

    async fn require_view(&self, actor: &UserIdentity, slug: &str) -> AppResult<()> {
        self.authorization_service
            .require_item_permission(actor, Permission::ViewDataRegistryContents, slug)
            .await
    }

    async fn owned_registry(&self, owner: &DomainName, slug: &str) -> AppResult<DataRegistry> {
        self.repository
            .find_owned(owner, slug)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "registry '{slug}' does not exist in domain '{owner}'"
                ))
            })
    }

    async fn invited_registry(&self, domain: &DomainName, slug: &str) -> AppResult<DataRegistry> {
        self.repository
            .find_by_invited_domain(domain, slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("registry '{slug}' not found")))
    }

    async fn audit(
        &self,
        actor: &UserIdentity,
        action: AuditAction,
        registry: &DataRegistry,
        detail: Option<String>,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                domain: actor.domain().clone(),
                subject: actor.subject().to_owned(),
                action,
                resource_type: "data_registry".to_owned(),
                resource_id: registry.slug().to_owned(),
                detail,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use async_trait::async_trait;
    use casewell_core::{AppError, AppResult, DomainName, UserIdentity};
    use casewell_domain::{
        AuditAction, CaseDocument, CaseIndex, CaseSearchQuery, DataRegistry, Permissions,
        RegistryGrant, RegistryInvitation,
    };
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::RegistryService;
    use crate::{
        AuditEvent, AuditRepository, AuthorizationRepository, AuthorizationService,
        CaseSearchBackend, RegistryRepository, SearchHits,
    };

    #[derive(Default)]
    struct FakeRegistryRepository {
        registries: Mutex<HashMap<Uuid, DataRegistry>>,
    }

    impl FakeRegistryRepository {
        async fn update<F>(&self, registry_id: Uuid, apply: F) -> AppResult<()>
        where
            F: FnOnce(&DataRegistry) -> DataRegistry + Send,
        {
            let mut registries = self.registries.lock().await;
            let registry = registries
                .get(&registry_id)
                .ok_or_else(|| AppError::NotFound(format!("registry {registry_id}")))?;
            let updated = apply(registry);
            registries.insert(registry_id, updated);
            Ok(())
        }
    }

    fn rebuild(
        registry: &DataRegistry,
        is_active: bool,
        invitations: Vec<RegistryInvitation>,
        grants: Vec<RegistryGrant>,
    ) -> DataRegistry {
        DataRegistry::from_parts(
            registry.id(),
            registry.domain().clone(),
            registry.name().to_owned(),
            registry.slug().to_owned(),
            is_active,
            registry.case_types().to_vec(),
            invitations,
            grants,
        )
    }

    #[async_trait]
    impl RegistryRepository for FakeRegistryRepository {
        async fn create_registry(&self, registry: &DataRegistry) -> AppResult<()> {
            self.registries
                .lock()
                .await
                .insert(registry.id(), registry.clone());
            Ok(())
        }

        async fn find_owned(
            &self,
            owner: &DomainName,
            slug: &str,
        ) -> AppResult<Option<DataRegistry>> {
            Ok(self
                .registries
                .lock()
                .await
                .values()
                .find(|registry| registry.domain() == owner && registry.slug() == slug)
                .cloned())
        }

        async fn find_by_invited_domain(
            &self,
            domain: &DomainName,
            slug: &str,
        ) -> AppResult<Option<DataRegistry>> {
            Ok(self
                .registries
                .lock()
                .await
                .values()
                .find(|registry| registry.slug() == slug && registry.invitation(domain).is_some())
                .cloned())
        }

        async fn list_owned(&self, owner: &DomainName) -> AppResult<Vec<DataRegistry>> {
            Ok(self
                .registries
                .lock()
                .await
                .values()
                .filter(|registry| registry.domain() == owner)
                .cloned()
                .collect())
        }

        async fn save_invitation(
            &self,
            registry_id: Uuid,
            invitation: &RegistryInvitation,
        ) -> AppResult<()> {
            let invitation = invitation.clone();
            self.update(registry_id, move |registry| {
                let mut invitations: Vec<RegistryInvitation> = registry
                    .invitations()
                    .iter()
                    .filter(|existing| existing.domain() != invitation.domain())
                    .cloned()
                    .collect();
                invitations.push(invitation);
                rebuild(
                    registry,
                    registry.is_active(),
                    invitations,
                    registry.grants().to_vec(),
                )
            })
            .await
        }

        async fn save_grant(&self, registry_id: Uuid, grant: &RegistryGrant) -> AppResult<()> {
            let grant = grant.clone();
            self.update(registry_id, move |registry| {
                let mut grants: Vec<RegistryGrant> = registry
                    .grants()
                    .iter()
                    .filter(|existing| existing.from_domain != grant.from_domain)
                    .cloned()
                    .collect();
                grants.push(grant);
                rebuild(
                    registry,
                    registry.is_active(),
                    registry.invitations().to_vec(),
                    grants,
                )
            })
            .await
        }

        async fn set_active(&self, registry_id: Uuid, is_active: bool) -> AppResult<()> {
            self.update(registry_id, move |registry| {
                rebuild(
                    registry,
                    is_active,
                    registry.invitations().to_vec(),
                    registry.grants().to_vec(),
                )
            })
            .await
        }
    }

    struct FakeBackend {
        cases: Vec<CaseDocument>,
    }

    #[async_trait]
    impl CaseSearchBackend for FakeBackend {
        async fn search(&self, _query: &CaseSearchQuery) -> AppResult<SearchHits> {
            Ok(SearchHits::default())
        }

        async fn get_cases(
            &self,
            domains: &[String],
            case_ids: &[String],
        ) -> AppResult<Vec<CaseDocument>> {
            Ok(self
                .cases
                .iter()
                .filter(|case| domains.contains(&case.domain) && case_ids.contains(&case.case_id))
                .cloned()
                .collect())
        }

        async fn find_cases_indexing(
            &self,
            domains: &[String],
            _identifier: Option<&str>,
            referenced_ids: &[String],
            _case_types: &[String],
            _limit: usize,
        ) -> AppResult<Vec<CaseDocument>> {
            Ok(self
                .cases
                .iter()
                .filter(|case| {
                    domains.contains(&case.domain)
                        && case
                            .indices
                            .iter()
                            .any(|index| referenced_ids.contains(&index.referenced_id))
                })
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeAuditRepository {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditRepository for FakeAuditRepository {
        async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
            self.events.lock().await.push(event);
            Ok(())
        }
    }

    struct FakeAuthorizationRepository;

    #[async_trait]
    impl AuthorizationRepository for FakeAuthorizationRepository {
        async fn permissions_for_subject(
            &self,
            _domain: &DomainName,
            subject: &str,
        ) -> AppResult<Permissions> {
            if subject == "outsider" {
                return Ok(Permissions::none());
            }
            Ok(Permissions::max())
        }
    }

    fn domain(name: &str) -> DomainName {
        DomainName::new(name).unwrap_or_else(|_| panic!("valid domain"))
    }

    fn actor(subject: &str, domain_name: &str) -> UserIdentity {
        UserIdentity::new(subject, subject, domain(domain_name))
    }

    fn case(case_id: &str, domain: &str, case_type: &str, parent: Option<&str>) -> CaseDocument {
        CaseDocument {
            case_id: case_id.to_owned(),
            domain: domain.to_owned(),
            case_type: case_type.to_owned(),
            name: None,
            owner_id: None,
            closed: false,
            indices: parent
                .map(|parent| {
                    vec![CaseIndex {
                        identifier: "parent".to_owned(),
                        referenced_type: "household".to_owned(),
                        referenced_id: parent.to_owned(),
                        relationship: "child".to_owned(),
                    }]
                })
                .unwrap_or_default(),
            case_properties: Vec::new(),
        }
    }

    struct Harness {
        service: RegistryService,
        audit: Arc<FakeAuditRepository>,
    }

    fn harness(cases: Vec<CaseDocument>) -> Harness {
        let audit = Arc::new(FakeAuditRepository::default());
        let service = RegistryService::new(
            AuthorizationService::new(Arc::new(FakeAuthorizationRepository)),
            Arc::new(FakeRegistryRepository::default()),
            Arc::new(FakeBackend { cases }),
            audit.clone(),
            50,
        );
        Harness { service, audit }
    }

    async fn shared_registry(service: &RegistryService) {
        let owner = actor("alice", "owner");
        let created = service
            .create_registry(&owner, "The Patients of Region", vec!["household".to_owned()])
            .await;
        assert!(matches!(created, Ok(ref registry) if registry.slug() == "patients-region"));

        for invited in ["north", "south"] {
            assert!(
                service
                    .invite_domain(&owner, "patients-region", domain(invited))
                    .await
                    .is_ok()
            );
            assert!(
                service
                    .accept_invitation(&actor("bob", invited), "patients-region")
                    .await
                    .is_ok()
            );
        }
    }

    #[tokio::test]
    async fn duplicate_registry_in_domain_conflicts() {
        let harness = harness(Vec::new());
        shared_registry(&harness.service).await;

        let duplicate = harness
            .service
            .create_registry(
                &actor("alice", "owner"),
                "patients of the region",
                vec!["household".to_owned()],
            )
            .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn visibility_follows_grants() {
        let harness = harness(Vec::new());
        shared_registry(&harness.service).await;

        let north = actor("bob", "north");
        let before = harness
            .service
            .visible_domains(&north, "patients-region")
            .await;
        assert!(matches!(before, Ok(ref domains) if domains.len() == 1));

        let granted = harness
            .service
            .grant_access(
                &actor("carol", "south"),
                "patients-region",
                BTreeSet::from([domain("north")]),
            )
            .await;
        assert!(granted.is_ok());

        let after = harness
            .service
            .visible_domains(&north, "patients-region")
            .await
            .unwrap_or_default();
        assert_eq!(after, BTreeSet::from([domain("north"), domain("south")]));

        let south = harness
            .service
            .visible_domains(&actor("carol", "south"), "patients-region")
            .await
            .unwrap_or_default();
        assert_eq!(south, BTreeSet::from([domain("south")]));
    }

    #[tokio::test]
    async fn rejected_domain_loses_access() {
        let harness = harness(Vec::new());
        shared_registry(&harness.service).await;

        let south = actor("carol", "south");
        assert!(
            harness
                .service
                .reject_invitation(&south, "patients-region")
                .await
                .is_ok()
        );
        let result = harness
            .service
            .visible_domains(&south, "patients-region")
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn get_case_checks_type_and_visibility_and_audits() {
        let harness = harness(vec![
            case("h1", "south", "household", None),
            case("p1", "south", "person", Some("h1")),
        ]);
        shared_registry(&harness.service).await;
        let north = actor("bob", "north");

        let hidden = harness
            .service
            .get_case(&north, "patients-region", "h1", "household")
            .await;
        assert!(matches!(hidden, Err(AppError::NotFound(_))));

        assert!(
            harness
                .service
                .grant_access(
                    &actor("carol", "south"),
                    "patients-region",
                    BTreeSet::from([domain("north")]),
                )
                .await
                .is_ok()
        );

        let found = harness
            .service
            .get_case(&north, "patients-region", "h1", "household")
            .await;
        assert!(matches!(found, Ok(ref case) if case.domain == "south"));

        let unshared_type = harness
            .service
            .get_case(&north, "patients-region", "p1", "person")
            .await;
        assert!(matches!(unshared_type, Err(AppError::NotFound(_))));

        let events = harness.audit.events.lock().await;
        assert!(
            events
                .iter()
                .any(|event| event.action == AuditAction::RegistryDataAccessed
                    && event.detail.as_deref().is_some_and(|detail| detail.contains("case_id=h1")))
        );
    }

    #[tokio::test]
    async fn case_hierarchy_returns_open_descendants() {
        let mut closed_child = case("p2", "owner", "person", Some("h1"));
        closed_child.closed = true;
        let harness = harness(vec![
            case("h1", "owner", "household", None),
            case("p1", "owner", "person", Some("h1")),
            closed_child,
            case("v1", "owner", "visit", Some("p1")),
        ]);
        shared_registry(&harness.service).await;

        let hierarchy = harness
            .service
            .get_case_hierarchy(&actor("alice", "owner"), "patients-region", "h1", "household")
            .await
            .unwrap_or_default();
        let ids: Vec<&str> = hierarchy.iter().map(|case| case.case_id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "p1", "v1"]);
    }

    #[tokio::test]
    async fn outsider_cannot_manage_registries() {
        let harness = harness(Vec::new());
        let result = harness
            .service
            .create_registry(&actor("outsider", "owner"), "Patients", vec!["person".to_owned()])
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
