use std::collections::BTreeSet;
use std::sync::Arc;

use casewell_core::{AppError, AppResult, DomainName, UserIdentity};
use casewell_domain::{
    AuditAction, CaseDocument, CaseSearchConfig, CaseSearchQuery, DEFAULT_MAX_RESULTS,
    DetailColumn, Permission, SearchClause, flatten_result, flatten_source,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::AuthorizationService;
use crate::audit_ports::{AuditEvent, AuditRepository};
use crate::case_search_ports::{CaseSearchBackend, CaseSearchConfigCache, CaseSearchConfigRepository};
use crate::extension_registry::{DOMAIN_ARG, ExtensionArgs, ExtensionRegistry};
use crate::registry_ports::RegistryRepository;

mod criteria;
mod expression;
mod related_cases;

pub use criteria::{AncestorFilter, CaseSearchCriteria, CompiledCaseSearch};
pub use related_cases::{RelatedCaseResolver, RelatedCaseScope};

/// Extension point contributing extra backend filters to every case search.
pub const CASE_SEARCH_EXTRA_FILTERS_POINT: &str = "case_search_extra_filters";

/// Declares the extension points case search dispatches to.
pub fn define_case_search_extension_points(registry: &mut ExtensionRegistry) -> AppResult<()> {
    registry.define_point(
        CASE_SEARCH_EXTRA_FILTERS_POINT,
        [DOMAIN_ARG, "case_types", "criteria"],
    )
}

/// Tunables for case search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseSearchSettings {
    /// Maximum number of hits per search.
    pub max_results: usize,
    /// Maximum number of related cases per search.
    pub max_related_cases: usize,
    /// Lifetime of cached configuration.
    pub config_cache_ttl_seconds: u32,
}

impl Default for CaseSearchSettings {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            max_related_cases: DEFAULT_MAX_RESULTS,
            config_cache_ttl_seconds: 300,
        }
    }
}

/// Search request with optional detail columns driving related-case lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSearchRequest {
    /// Criteria to compile.
    pub criteria: CaseSearchCriteria,
    /// Detail columns displayed for results.
    pub detail_columns: Vec<DetailColumn>,
    /// Whether to include relevance scores in results.
    pub include_score: bool,
}

/// Flattened search results.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSearchResults {
    /// Total number of matching cases reported by the backend.
    pub total: u64,
    /// Flattened matching cases.
    pub cases: Vec<Map<String, Value>>,
    /// Flattened related cases.
    pub related_cases: Vec<Map<String, Value>>,
}

/// Application service for case search.
#[derive(Clone)]
pub struct CaseSearchService {
    authorization_service: AuthorizationService,
    config_repository: Arc<dyn CaseSearchConfigRepository>,
    config_cache: Arc<dyn CaseSearchConfigCache>,
    backend: Arc<dyn CaseSearchBackend>,
    registry_repository: Arc<dyn RegistryRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    extensions: Arc<ExtensionRegistry>,
    settings: CaseSearchSettings,
}

/// Ports used by [`CaseSearchService`].
#[derive(Clone)]
pub struct CaseSearchPorts {
    /// Stored configuration.
    pub config_repository: Arc<dyn CaseSearchConfigRepository>,
    /// Configuration cache.
    pub config_cache: Arc<dyn CaseSearchConfigCache>,
    /// Search backend.
    pub backend: Arc<dyn CaseSearchBackend>,
    /// Registry lookups for cross-domain searches.
    pub registry_repository: Arc<dyn RegistryRepository>,
    /// Audit sink.
    pub audit_repository: Arc<dyn AuditRepository>,
}

impl CaseSearchService {
    /// Creates a new case search service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        ports: CaseSearchPorts,
        extensions: Arc<ExtensionRegistry>,
        settings: CaseSearchSettings,
    ) -> Self {
        Self {
            authorization_service,
            config_repository: ports.config_repository,
            config_cache: ports.config_cache,
            backend: ports.backend,
            registry_repository: ports.registry_repository,
            audit_repository: ports.audit_repository,
            extensions,
            settings,
        }
    }

    /// Returns the stored configuration of the actor's domain or the default.
    pub async fn get_config(&self, actor: &UserIdentity) -> AppResult<CaseSearchConfig> {
        self.authorization_service
            .require_permission(actor, Permission::EditCaseSearchConfig)
            .await?;

        Ok(self
            .stored_config(actor.domain())
            .await?
            .unwrap_or_else(|| CaseSearchConfig::default_for(actor.domain().clone())))
    }

    /// Replaces the configuration of the actor's domain.
    pub async fn save_config(
        &self,
        actor: &UserIdentity,
        config: CaseSearchConfig,
    ) -> AppResult<CaseSearchConfig> {
        self.authorization_service
            .require_permission(actor, Permission::EditCaseSearchConfig)
            .await?;

        if &config.domain != actor.domain() {
            return Err(AppError::Validation(format!(
                "case search config for '{}' cannot be saved from domain '{}'",
                config.domain,
                actor.domain()
            )));
        }
        config.validate()?;

        self.config_repository.save_config(&config).await?;
        if let Err(error) = self.config_cache.invalidate(&config.domain).await {
            warn!(domain = %config.domain, %error, "failed to invalidate case search config cache");
        }

        self.audit_repository
            .append_event(AuditEvent {
                domain: config.domain.clone(),
                subject: actor.subject().to_owned(),
                action: AuditAction::CaseSearchConfigSaved,
                resource_type: "case_search_config".to_owned(),
                resource_id: config.domain.to_string(),
                detail: Some(format!(
                    "enabled={} fuzzy_case_types={} ignore_patterns={}",
                    config.enabled,
                    config.fuzzy_properties.len(),
                    config.ignore_patterns.len()
                )),
            })
            .await?;

        info!(domain = %config.domain, enabled = config.enabled, "case search config saved");
        Ok(config)
    }

    /// Compiles criteria into the backend query without running it.
    pub async fn compile(
        &self,
        actor: &UserIdentity,
        criteria: &CaseSearchCriteria,
    ) -> AppResult<CompiledCaseSearch> {
        self.authorize_search(actor, criteria).await?;
        let (compiled, _) = self.compile_criteria(criteria).await?;
        Ok(compiled)
    }

    /// Compiles and runs a search, flattening hits and resolving related cases.
    pub async fn search(
        &self,
        actor: &UserIdentity,
        request: &CaseSearchRequest,
    ) -> AppResult<CaseSearchResults> {
        self.authorize_search(actor, &request.criteria).await?;

        let (
            CompiledCaseSearch {
                mut query,
                ancestor_filters,
            },
            domains,
        ) = self.compile_criteria(&request.criteria).await?;

        for filter in &ancestor_filters {
            let case_ids = self.resolve_ancestor_filter(&domains, filter).await?;
            debug!(
                key = %filter.key,
                matches = case_ids.len(),
                "resolved ancestor filter"
            );
            query.case_ids(&case_ids);
        }

        let hits = self.backend.search(&query).await?;
        let cases: Vec<Map<String, Value>> = hits
            .hits
            .iter()
            .map(|hit| flatten_result(hit, request.include_score))
            .collect();

        let scope = RelatedCaseScope::from_detail(&request.detail_columns);
        let related_cases = if scope.is_empty() || hits.hits.is_empty() {
            Vec::new()
        } else {
            let found = self.backend.get_cases(&domains, &hits.case_ids()).await?;
            let resolver =
                RelatedCaseResolver::new(self.backend.clone(), self.settings.max_related_cases);
            resolver
                .resolve(&domains, &found, &scope)
                .await?
                .iter()
                .map(flatten_case)
                .collect::<AppResult<Vec<_>>>()?
        };

        debug!(
            domain = %request.criteria.domain(),
            total = hits.total,
            returned = cases.len(),
            related = related_cases.len(),
            "case search completed"
        );

        Ok(CaseSearchResults {
            total: hits.total,
            cases,
            related_cases,
        })
    }

    async fn authorize_search(
        &self,
        actor: &UserIdentity,
        criteria: &CaseSearchCriteria,
    ) -> AppResult<()> {
        if criteria.domain() != actor.domain() {
            return Err(AppError::Forbidden(format!(
                "subject '{}' cannot search cases of domain '{}'",
                actor.subject(),
                criteria.domain()
            )));
        }

        self.authorization_service
            .require_permission(actor, Permission::AccessWebApps)
            .await
    }

    async fn compile_criteria(
        &self,
        criteria: &CaseSearchCriteria,
    ) -> AppResult<(CompiledCaseSearch, Vec<String>)> {
        let config = self.searchable_config(criteria.domain()).await?;
        let domains = self.search_domains(criteria).await?;
        let mut compiled =
            criteria.compile_for_domains(domains.clone(), &config, self.settings.max_results)?;

        for clause in self.extra_filters(criteria)? {
            compiled.query.filter(clause);
        }

        Ok((compiled, domains))
    }

    async fn search_domains(&self, criteria: &CaseSearchCriteria) -> AppResult<Vec<String>> {
        let Some(slug) = criteria.registry_slug()? else {
            return Ok(vec![criteria.domain().as_str().to_owned()]);
        };

        let registry = self
            .registry_repository
            .find_by_invited_domain(criteria.domain(), slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("data registry '{slug}' not found")))?;
        for case_type in criteria.case_types() {
            registry.pre_access_check(case_type)?;
        }

        Ok(registry
            .visible_domains(criteria.domain())?
            .into_iter()
            .map(String::from)
            .collect())
    }

    fn extra_filters(&self, criteria: &CaseSearchCriteria) -> AppResult<Vec<SearchClause>> {
        if self
            .extensions
            .point(CASE_SEARCH_EXTRA_FILTERS_POINT)
            .is_none()
        {
            return Ok(Vec::new());
        }

        let mut args = ExtensionArgs::new();
        args.insert(DOMAIN_ARG.to_owned(), json!(criteria.domain().as_str()));
        args.insert("case_types".to_owned(), json!(criteria.case_types()));
        args.insert("criteria".to_owned(), json!(criteria.criteria()));

        let mut clauses = Vec::new();
        for contribution in self
            .extensions
            .contributions(CASE_SEARCH_EXTRA_FILTERS_POINT, &args)?
        {
            match contribution {
                Value::Array(items) => clauses.extend(items.into_iter().map(SearchClause::Raw)),
                other => clauses.push(SearchClause::Raw(other)),
            }
        }
        Ok(clauses)
    }

    async fn resolve_ancestor_filter(
        &self,
        domains: &[String],
        filter: &AncestorFilter,
    ) -> AppResult<Vec<String>> {
        let mut ancestor_query =
            CaseSearchQuery::new(domains.to_vec(), Vec::new(), self.settings.max_results)
                .include_closed();
        ancestor_query.filter(filter.clause.clone());

        let hits = self.backend.search(&ancestor_query).await?;
        let mut case_ids = hits.case_ids();
        if hits.total > case_ids.len() as u64 {
            return Err(too_many_ancestors(filter, hits.total));
        }

        for identifier in filter.path.iter().rev() {
            if case_ids.is_empty() {
                break;
            }

            let indexing = self
                .backend
                .find_cases_indexing(
                    domains,
                    Some(identifier),
                    &case_ids,
                    &[],
                    self.settings.max_results.saturating_add(1),
                )
                .await?;
            let unique: BTreeSet<String> = indexing.into_iter().map(|case| case.case_id).collect();
            if unique.len() > self.settings.max_results {
                return Err(too_many_ancestors(filter, unique.len() as u64));
            }
            case_ids = unique.into_iter().collect();
        }

        Ok(case_ids)
    }

    async fn searchable_config(&self, domain: &DomainName) -> AppResult<CaseSearchConfig> {
        match self.stored_config(domain).await? {
            Some(config) if !config.enabled => Err(AppError::Forbidden(format!(
                "case search not enabled for domain '{domain}'"
            ))),
            Some(config) => Ok(config),
            None => {
                warn!(%domain, "case search config missing; using defaults");
                Ok(CaseSearchConfig::default_for(domain.clone()))
            }
        }
    }

    async fn stored_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>> {
        match self.config_cache.get_config(domain).await {
            Ok(Some(config)) => return Ok(Some(config)),
            Ok(None) => {}
            Err(error) => {
                warn!(%domain, %error, "failed to read case search config cache");
            }
        }

        let Some(config) = self.config_repository.find_config(domain).await? else {
            return Ok(None);
        };

        if let Err(error) = self
            .config_cache
            .set_config(&config, self.settings.config_cache_ttl_seconds)
            .await
        {
            warn!(%domain, %error, "failed to cache case search config");
        }

        Ok(Some(config))
    }
}

fn too_many_ancestors(filter: &AncestorFilter, matched: u64) -> AppError {
    AppError::invalid_filter(
        filter.key.as_str(),
        format!("{matched} related cases match, narrow the filter"),
    )
}

fn flatten_case(case: &CaseDocument) -> AppResult<Map<String, Value>> {
    let source = serde_json::to_value(case).map_err(|error| {
        AppError::Internal(format!(
            "failed to serialize case '{}': {error}",
            case.case_id
        ))
    })?;
    Ok(flatten_source(&source))
}

#[cfg(test)]
mod tests;
