use async_trait::async_trait;
use casewell_core::{AppResult, DomainName};
use casewell_domain::{CaseDocument, CaseSearchConfig, CaseSearchQuery};
use serde_json::Value;

/// Repository port for stored case search configuration.
#[async_trait]
pub trait CaseSearchConfigRepository: Send + Sync {
    /// Returns the stored configuration of a domain, if any.
    async fn find_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>>;

    /// Replaces the configuration of a domain.
    async fn save_config(&self, config: &CaseSearchConfig) -> AppResult<()>;
}

/// Cache port for case search configuration, invalidated on every write.
#[async_trait]
pub trait CaseSearchConfigCache: Send + Sync {
    /// Returns a cached configuration.
    async fn get_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>>;

    /// Stores a configuration with ttl.
    async fn set_config(&self, config: &CaseSearchConfig, ttl_seconds: u32) -> AppResult<()>;

    /// Drops the cached configuration of a domain.
    async fn invalidate(&self, domain: &DomainName) -> AppResult<()>;
}

/// Raw search backend response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    /// Total number of matching cases.
    pub total: u64,
    /// Raw hits with `_id`, `_score` and `_source`.
    pub hits: Vec<Value>,
}

impl SearchHits {
    /// Returns the case ids of all hits.
    #[must_use]
    pub fn case_ids(&self) -> Vec<String> {
        self.hits
            .iter()
            .filter_map(|hit| hit.get("_id").and_then(Value::as_str))
            .map(str::to_owned)
            .collect()
    }
}

/// Port for the case search index.
#[async_trait]
pub trait CaseSearchBackend: Send + Sync {
    /// Runs a compiled query.
    async fn search(&self, query: &CaseSearchQuery) -> AppResult<SearchHits>;

    /// Fetches cases by id within the given domains, closed cases included.
    async fn get_cases(&self, domains: &[String], case_ids: &[String])
    -> AppResult<Vec<CaseDocument>>;

    /// Fetches cases indexing any of the referenced cases.
    async fn find_cases_indexing(
        &self,
        domains: &[String],
        identifier: Option<&str>,
        referenced_ids: &[String],
        case_types: &[String],
        limit: usize,
    ) -> AppResult<Vec<CaseDocument>>;
}
