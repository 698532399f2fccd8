//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod elasticsearch_case_search_backend;
mod in_memory_case_search_config_cache;
mod in_memory_role_document_repository;
mod mongo_role_document_repository;
mod postgres_audit_repository;
mod postgres_authorization_repository;
mod postgres_case_search_config_repository;
mod postgres_registry_repository;
mod postgres_role_repository;
mod redis_case_search_config_cache;

pub use elasticsearch_case_search_backend::ElasticsearchCaseSearchBackend;
pub use in_memory_case_search_config_cache::InMemoryCaseSearchConfigCache;
pub use in_memory_role_document_repository::InMemoryRoleDocumentRepository;
pub use mongo_role_document_repository::MongoRoleDocumentRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use postgres_case_search_config_repository::PostgresCaseSearchConfigRepository;
pub use postgres_registry_repository::PostgresRegistryRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use redis_case_search_config_cache::RedisCaseSearchConfigCache;
