use casewell_application::{CaseSearchService, RegistryService, RoleSyncService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub case_search_service: CaseSearchService,
    pub role_sync_service: RoleSyncService,
    pub registry_service: RegistryService,
    pub postgres_pool: sqlx::PgPool,
    pub redis_client: Option<redis::Client>,
    pub document_database: Option<mongodb::Database>,
    pub api_shared_secret: String,
}
