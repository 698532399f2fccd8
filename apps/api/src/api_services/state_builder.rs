use std::sync::Arc;

use casewell_application::{
    AuthorizationService, CaseSearchConfigCache, CaseSearchPorts, CaseSearchService,
    CaseSearchSettings, DocumentRoleRepository, ExtensionRegistry, RegistryService,
    RoleSyncService, define_case_search_extension_points,
};
use casewell_core::AppError;
use casewell_infrastructure::{
    ElasticsearchCaseSearchBackend, InMemoryCaseSearchConfigCache, InMemoryRoleDocumentRepository,
    MongoRoleDocumentRepository, PostgresAuditRepository, PostgresAuthorizationRepository,
    PostgresCaseSearchConfigRepository, PostgresRegistryRepository, PostgresRoleRepository,
    RedisCaseSearchConfigCache,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::document_store::connect_document_store;
use super::redis::build_redis_client;

const CONFIG_CACHE_KEY_PREFIX: &str = "casewell:case_search_config";

pub async fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;
    let document_database = match config.mongodb_url.as_deref() {
        Some(url) => Some(connect_document_store(url, &config.mongodb_database).await?),
        None => None,
    };

    let authorization_service =
        AuthorizationService::new(Arc::new(PostgresAuthorizationRepository::new(pool.clone())));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let registry_repository = Arc::new(PostgresRegistryRepository::new(pool.clone()));

    let backend = Arc::new(ElasticsearchCaseSearchBackend::new(
        reqwest::Client::new(),
        &config.search_backend_url,
        &config.search_index,
    )?);
    info!(url = %backend.search_url(), "case search backend configured");

    let config_cache: Arc<dyn CaseSearchConfigCache> = match redis_client.clone() {
        Some(client) => Arc::new(RedisCaseSearchConfigCache::new(
            client,
            CONFIG_CACHE_KEY_PREFIX,
        )),
        None => Arc::new(InMemoryCaseSearchConfigCache::new()),
    };

    let document_repository: Arc<dyn DocumentRoleRepository> = match &document_database {
        Some(database) => Arc::new(MongoRoleDocumentRepository::new(database)),
        None => {
            warn!("MONGODB_URL is not set, role documents are kept in memory");
            Arc::new(InMemoryRoleDocumentRepository::new())
        }
    };

    let mut extensions = ExtensionRegistry::new();
    define_case_search_extension_points(&mut extensions)?;
    extensions.lock();
    let extensions = Arc::new(extensions);

    let case_search_service = CaseSearchService::new(
        authorization_service.clone(),
        CaseSearchPorts {
            config_repository: Arc::new(PostgresCaseSearchConfigRepository::new(pool.clone())),
            config_cache,
            backend: backend.clone(),
            registry_repository: registry_repository.clone(),
            audit_repository: audit_repository.clone(),
        },
        extensions,
        CaseSearchSettings {
            max_results: config.case_search_max_results,
            max_related_cases: config.max_related_cases,
            config_cache_ttl_seconds: config.case_search_config_cache_ttl_seconds,
        },
    );

    let role_sync_service = RoleSyncService::new(
        authorization_service.clone(),
        Arc::new(PostgresRoleRepository::new(pool.clone())),
        document_repository,
        audit_repository.clone(),
    );

    let registry_service = RegistryService::new(
        authorization_service,
        registry_repository,
        backend,
        audit_repository,
        config.max_related_cases,
    );

    Ok(AppState {
        case_search_service,
        role_sync_service,
        registry_service,
        postgres_pool: pool,
        redis_client,
        document_database,
        api_shared_secret: config.api_shared_secret.clone(),
    })
}
