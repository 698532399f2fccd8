//! Case search backend speaking the Elasticsearch `_search` HTTP API.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use casewell_application::{CaseSearchBackend, SearchHits};
use casewell_core::{AppError, AppResult};
use casewell_domain::search_query::indexed_case;
use casewell_domain::{CaseDocument, CaseSearchQuery};

/// HTTP implementation of the case search backend port.
#[derive(Clone)]
pub struct ElasticsearchCaseSearchBackend {
    http_client: reqwest::Client,
    search_url: Url,
}

impl ElasticsearchCaseSearchBackend {
    /// Creates a backend posting queries to `<base_url>/<index>/_search`.
    pub fn new(http_client: reqwest::Client, base_url: &Url, index: &str) -> AppResult<Self> {
        let mut search_url = base_url.clone();
        search_url
            .path_segments_mut()
            .map_err(|()| {
                AppError::Validation(format!("search backend url '{base_url}' cannot be a base"))
            })?
            .pop_if_empty()
            .push(index)
            .push("_search");

        Ok(Self {
            http_client,
            search_url,
        })
    }

    /// Returns the endpoint queries are posted to.
    #[must_use]
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    async fn fetch_documents(&self, query: &CaseSearchQuery) -> AppResult<Vec<CaseDocument>> {
        let hits = self.search(query).await?;
        hits.hits.iter().map(hit_to_case).collect()
    }
}

#[async_trait]
impl CaseSearchBackend for ElasticsearchCaseSearchBackend {
    async fn search(&self, query: &CaseSearchQuery) -> AppResult<SearchHits> {
        let body = query.to_json();
        debug!(url = %self.search_url, size = query.size(), "posting case search query");

        let response = self
            .http_client
            .post(self.search_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to reach case search backend: {error}"))
            })?
            .error_for_status()
            .map_err(|error| {
                AppError::Internal(format!("case search backend rejected query: {error}"))
            })?;

        let payload: Value = response.json().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to decode case search backend response: {error}"
            ))
        })?;

        parse_hits(&payload)
    }

    async fn get_cases(
        &self,
        domains: &[String],
        case_ids: &[String],
    ) -> AppResult<Vec<CaseDocument>> {
        if case_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query =
            CaseSearchQuery::new(domains.to_vec(), Vec::new(), case_ids.len()).include_closed();
        query.case_ids(case_ids);

        self.fetch_documents(&query).await
    }

    async fn find_cases_indexing(
        &self,
        domains: &[String],
        identifier: Option<&str>,
        referenced_ids: &[String],
        case_types: &[String],
        limit: usize,
    ) -> AppResult<Vec<CaseDocument>> {
        if referenced_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query =
            CaseSearchQuery::new(domains.to_vec(), case_types.to_vec(), limit).include_closed();
        query.filter(indexed_case(identifier, referenced_ids));

        self.fetch_documents(&query).await
    }
}

/// Reads total and hits from a `_search` response.
///
/// Accepts both the object and the legacy integer form of `hits.total`.
fn parse_hits(payload: &Value) -> AppResult<SearchHits> {
    let hits = payload.get("hits").ok_or_else(|| {
        AppError::Internal("case search backend response has no 'hits' section".to_owned())
    })?;

    let total = match hits.get("total") {
        Some(Value::Number(total)) => total.as_u64(),
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .ok_or_else(|| {
        AppError::Internal("case search backend response has no hit total".to_owned())
    })?;

    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(SearchHits { total, hits })
}

fn hit_to_case(hit: &Value) -> AppResult<CaseDocument> {
    let case_id = hit.get("_id").and_then(Value::as_str).ok_or_else(|| {
        AppError::Internal("case search hit has no '_id'".to_owned())
    })?;
    let mut source = hit
        .get("_source")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| {
            AppError::Internal(format!("case search hit '{case_id}' has no '_source'"))
        })?;
    source.insert("_id".to_owned(), Value::String(case_id.to_owned()));

    serde_json::from_value(Value::Object(source)).map_err(|error| {
        AppError::Internal(format!("case search hit '{case_id}' is malformed: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;

    use super::{ElasticsearchCaseSearchBackend, hit_to_case, parse_hits};

    #[test]
    fn search_url_appends_index_and_endpoint() {
        let base = Url::parse("http://search.internal:9200/").unwrap_or_else(|_| panic!("url"));
        let backend = ElasticsearchCaseSearchBackend::new(reqwest::Client::new(), &base, "cases")
            .unwrap_or_else(|_| panic!("backend should build"));

        assert_eq!(
            backend.search_url().as_str(),
            "http://search.internal:9200/cases/_search"
        );
    }

    #[test]
    fn hits_accept_both_total_shapes() {
        let modern = parse_hits(&json!({"hits": {"total": {"value": 3, "relation": "eq"}, "hits": [{"_id": "a"}]}}));
        assert!(matches!(modern, Ok(hits) if hits.total == 3 && hits.case_ids() == vec!["a".to_owned()]));

        let legacy = parse_hits(&json!({"hits": {"total": 7, "hits": []}}));
        assert!(matches!(legacy, Ok(hits) if hits.total == 7 && hits.hits.is_empty()));

        assert!(parse_hits(&json!({"error": "index missing"})).is_err());
    }

    #[test]
    fn hit_source_becomes_case_document() {
        let hit = json!({
            "_id": "p1",
            "_score": 1.2,
            "_source": {
                "domain": "demo",
                "type": "person",
                "name": "Amina",
                "closed": false,
                "indices": [{"identifier": "parent", "referenced_type": "household", "referenced_id": "h1"}],
                "case_properties": [{"key": "dob", "value": "2020-03-02"}]
            }
        });

        let case = hit_to_case(&hit).unwrap_or_else(|error| panic!("hit should decode: {error}"));
        assert_eq!(case.case_id, "p1");
        assert_eq!(case.property("dob"), Some("2020-03-02"));
        assert_eq!(case.indices[0].relationship, "child");
        assert!(hit_to_case(&json!({"_id": "p2"})).is_err());
    }
}
