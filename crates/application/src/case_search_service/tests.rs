use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use casewell_core::{AppError, AppResult, DomainName, UserIdentity};
use casewell_domain::search_query::{case_property_exact, case_property_fuzzy, case_property_missing};
use casewell_domain::{
    AuditAction, CaseDocument, CaseIndex, CaseProperty, CaseSearchConfig, CaseSearchQuery,
    CriteriaValue, DataRegistry, DetailColumn, FuzzyProperties, IgnorePattern, Permission,
    PermissionAllow, PermissionInfo, Permissions, RegistryGrant, RegistryInvitation, SearchClause,
};
use proptest::prelude::*;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::criteria::strip_ignore_patterns;
use super::{
    CASE_SEARCH_EXTRA_FILTERS_POINT, CaseSearchCriteria, CaseSearchPorts, CaseSearchRequest,
    CaseSearchService, CaseSearchSettings, RelatedCaseResolver, RelatedCaseScope,
    define_case_search_extension_points,
};
use crate::{
    AuditEvent, AuditRepository, AuthorizationRepository, AuthorizationService, CaseSearchBackend,
    CaseSearchConfigCache, CaseSearchConfigRepository, Extension, ExtensionArgs,
    ExtensionRegistry, RegistryRepository, SearchHits,
};

fn domain(name: &str) -> DomainName {
    DomainName::new(name).unwrap_or_else(|_| panic!("valid domain"))
}

fn criteria(pairs: &[(&str, CriteriaValue)]) -> CaseSearchCriteria {
    CaseSearchCriteria::new(
        domain("demo"),
        vec!["person".to_owned()],
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect(),
    )
}

fn single(value: &str) -> CriteriaValue {
    CriteriaValue::Single(value.to_owned())
}

fn multiple(values: &[&str]) -> CriteriaValue {
    CriteriaValue::Multiple(values.iter().map(|value| (*value).to_owned()).collect())
}

fn config() -> CaseSearchConfig {
    CaseSearchConfig {
        domain: domain("demo"),
        enabled: true,
        fuzzy_properties: vec![FuzzyProperties {
            case_type: "person".to_owned(),
            properties: vec!["name".to_owned()],
        }],
        ignore_patterns: vec![IgnorePattern {
            case_type: "person".to_owned(),
            case_property: "phone".to_owned(),
            regex: "+".to_owned(),
        }],
    }
}

fn compiled_json(criteria: &CaseSearchCriteria) -> Value {
    criteria
        .compile(&config(), 500)
        .unwrap_or_else(|error| panic!("criteria should compile: {error}"))
        .query
        .to_json()
}

#[test]
fn plain_and_fuzzy_properties_compile_to_must_clauses() {
    let criteria = criteria(&[("name", single("Jon")), ("village", single("Kisumu"))]);
    let compiled = criteria
        .compile(&config(), 500)
        .unwrap_or_else(|error| panic!("criteria should compile: {error}"));

    assert_eq!(
        compiled.query.must_clauses(),
        &[
            case_property_fuzzy("name", "Jon"),
            case_property_exact("village", "Kisumu"),
        ]
    );
    assert!(compiled.ancestor_filters.is_empty());
}

#[test]
fn empty_value_among_multiple_compiles_to_missing_or_values() {
    let criteria = criteria(&[("village", multiple(&["", "Kisumu", "Nairobi"]))]);
    let compiled = criteria
        .compile(&config(), 500)
        .unwrap_or_else(|error| panic!("criteria should compile: {error}"));

    assert_eq!(
        compiled.query.must_clauses(),
        &[SearchClause::or(vec![
            case_property_missing("village"),
            case_property_exact("village", "Kisumu"),
            case_property_exact("village", "Nairobi"),
        ])]
    );
}

#[test]
fn single_empty_value_compiles_to_missing() {
    let criteria = criteria(&[("village", single(""))]);
    let compiled = criteria
        .compile(&config(), 500)
        .unwrap_or_else(|error| panic!("criteria should compile: {error}"));
    assert_eq!(
        compiled.query.must_clauses(),
        &[case_property_missing("village")]
    );
}

#[test]
fn date_range_compiles_to_inclusive_filter() {
    let value = compiled_json(&criteria(&[(
        "foo",
        single("__range__2020-03-02__2020-03-03"),
    )]));

    let range = &value["query"]["bool"]["filter"][3]["nested"]["query"]["bool"]["filter"][1];
    assert_eq!(
        range,
        &json!({"range": {"case_properties.value.date": {"gte": "2020-03-02", "lte": "2020-03-03"}}})
    );
    assert_eq!(value["query"]["bool"]["must"], json!([{"match_all": {}}]));
}

#[test]
fn date_ranges_ignore_property_ignore_patterns() {
    let mut config = config();
    for property in ["dob", "visit"] {
        config.ignore_patterns.push(IgnorePattern {
            case_type: "person".to_owned(),
            case_property: property.to_owned(),
            regex: "-".to_owned(),
        });
    }

    let compiled = criteria(&[
        ("dob", single("__range__2020-03-02__2020-03-03")),
        ("parent/visit", single("__range__2021-01-01__2021-01-31")),
    ])
    .compile(&config, 500)
    .unwrap_or_else(|error| panic!("criteria should compile: {error}"));

    let value = compiled.query.to_json();
    let range = &value["query"]["bool"]["filter"][3]["nested"]["query"]["bool"]["filter"][1];
    assert_eq!(
        range,
        &json!({"range": {"case_properties.value.date": {"gte": "2020-03-02", "lte": "2020-03-03"}}})
    );

    assert_eq!(compiled.ancestor_filters.len(), 1);
    let ancestor = compiled.ancestor_filters[0].clause.to_json();
    assert_eq!(
        ancestor["nested"]["query"]["bool"]["filter"][1],
        json!({"range": {"case_properties.value.date": {"gte": "2021-01-01", "lte": "2021-01-31"}}})
    );
}

#[test]
fn owner_and_blacklist_compile_to_owner_terms() {
    let value = compiled_json(&criteria(&[
        ("owner_id", single("u1")),
        ("commcare_blacklisted_owner_ids", single("a b")),
    ]));

    assert_eq!(
        value["query"]["bool"]["filter"][3],
        json!({"term": {"owner_id": "u1"}})
    );
    assert_eq!(
        value["query"]["bool"]["must_not"],
        json!([{"term": {"owner_id": "a"}}, {"term": {"owner_id": "b"}}])
    );
}

#[test]
fn blacklist_with_multiple_values_is_invalid_filter() {
    let result = criteria(&[("commcare_blacklisted_owner_ids", multiple(&["a", "b"]))])
        .compile(&config(), 500);
    assert!(matches!(
        result,
        Err(AppError::InvalidFilter { ref key, .. }) if key == "commcare_blacklisted_owner_ids"
    ));
}

#[test]
fn reserved_and_custom_keys_are_not_property_clauses() {
    let compiled = criteria(&[
        ("case_type", single("person")),
        ("_custom_sort", single("name")),
    ])
    .compile(&config(), 500)
    .unwrap_or_else(|error| panic!("criteria should compile: {error}"));
    assert!(compiled.query.must_clauses().is_empty());
    assert!(compiled.query.filter_clauses().is_empty());
}

#[test]
fn query_expression_becomes_must_clause() {
    let compiled = criteria(&[("_xpath_query", single("dob = ''"))])
        .compile(&config(), 500)
        .unwrap_or_else(|error| panic!("criteria should compile: {error}"));
    assert_eq!(
        compiled.query.must_clauses(),
        &[case_property_missing("dob")]
    );
}

#[test]
fn path_keys_become_ancestor_filters() {
    let compiled = criteria(&[("parent/host/name", single("Jon"))])
        .compile(&config(), 500)
        .unwrap_or_else(|error| panic!("criteria should compile: {error}"));

    assert!(compiled.query.must_clauses().is_empty());
    assert_eq!(compiled.ancestor_filters.len(), 1);
    let filter = &compiled.ancestor_filters[0];
    assert_eq!(filter.path, vec!["parent".to_owned(), "host".to_owned()]);
    assert_eq!(filter.property, "name");
    assert_eq!(filter.clause, case_property_exact("name", "Jon"));

    let empty_segment = criteria(&[("parent//name", single("Jon"))]).compile(&config(), 500);
    assert!(matches!(empty_segment, Err(AppError::InvalidFilter { .. })));
}

#[test]
fn ignore_patterns_are_removed_repeatedly() {
    assert_eq!(
        strip_ignore_patterns(vec!["+1++2"], &["+"]),
        vec!["12".to_owned()]
    );
    assert_eq!(
        strip_ignore_patterns(vec!["aacbb"], &["ab", "c"]),
        vec![String::new()]
    );
}

fn reserved_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("owner_id".to_owned()),
        Just("commcare_blacklisted_owner_ids".to_owned()),
        Just("_xpath_query".to_owned()),
        "[a-z]{1,8}/[a-z]{1,8}",
    ]
}

proptest! {
    #[test]
    fn reserved_keys_reject_multiple_values(
        key in reserved_key(),
        values in prop::collection::vec("[a-z0-9]{1,6}", 2..5),
    ) {
        let result = CaseSearchCriteria::new(
            domain("demo"),
            vec!["person".to_owned()],
            BTreeMap::from([(key.clone(), CriteriaValue::Multiple(values))]),
        )
        .compile(&config(), 500);

        let rejected = matches!(result, Err(AppError::InvalidFilter { key: ref rejected, .. }) if rejected == &key);
        prop_assert!(rejected);
    }

    #[test]
    fn plain_keys_accept_multiple_values(
        key in "[a-z]{1,10}",
        values in prop::collection::vec("[a-z0-9]{0,6}", 1..5),
    ) {
        let result = CaseSearchCriteria::new(
            domain("demo"),
            vec!["person".to_owned()],
            BTreeMap::from([(key, CriteriaValue::Multiple(values))]),
        )
        .compile(&config(), 500);

        prop_assert!(result.is_ok());
    }

    #[test]
    fn ignore_pattern_never_reaches_the_query(
        prefix in "[0-9+]{0,6}",
        suffix in "[0-9+]{0,6}",
    ) {
        let value = format!("{prefix}+{suffix}");
        let compiled = CaseSearchCriteria::new(
            domain("demo"),
            vec!["person".to_owned()],
            BTreeMap::from([("phone".to_owned(), CriteriaValue::Single(value))]),
        )
        .compile(&config(), 500);

        let rendered = compiled
            .map(|compiled| compiled.query.to_json().to_string())
            .unwrap_or_default();
        prop_assert!(!rendered.is_empty());
        prop_assert!(!rendered.contains('+'));
    }
}

#[derive(Default)]
struct FakeConfigRepository {
    configs: Mutex<HashMap<DomainName, CaseSearchConfig>>,
    reads: Mutex<usize>,
}

#[async_trait]
impl CaseSearchConfigRepository for FakeConfigRepository {
    async fn find_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>> {
        *self.reads.lock().await += 1;
        Ok(self.configs.lock().await.get(domain).cloned())
    }

    async fn save_config(&self, config: &CaseSearchConfig) -> AppResult<()> {
        self.configs
            .lock()
            .await
            .insert(config.domain.clone(), config.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeConfigCache {
    entries: Mutex<HashMap<DomainName, CaseSearchConfig>>,
}

#[async_trait]
impl CaseSearchConfigCache for FakeConfigCache {
    async fn get_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>> {
        Ok(self.entries.lock().await.get(domain).cloned())
    }

    async fn set_config(&self, config: &CaseSearchConfig, _ttl_seconds: u32) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .insert(config.domain.clone(), config.clone());
        Ok(())
    }

    async fn invalidate(&self, domain: &DomainName) -> AppResult<()> {
        self.entries.lock().await.remove(domain);
        Ok(())
    }
}

#[derive(Default)]
struct FakeBackend {
    cases: Vec<CaseDocument>,
    queries: Mutex<Vec<Value>>,
}

impl FakeBackend {
    fn matches(case: &CaseDocument, clause: &Value) -> bool {
        let Some(nested) = clause.get("nested") else {
            return true;
        };
        let filters = &nested["query"]["bool"]["filter"];
        let key = filters[0]["term"]["case_properties.key.exact"].as_str();
        let value = filters[1]["term"]["case_properties.value.exact"].as_str();
        match (key, value) {
            (Some(key), Some(value)) => case.property(key) == Some(value),
            _ => true,
        }
    }
}

#[async_trait]
impl CaseSearchBackend for FakeBackend {
    async fn search(&self, query: &CaseSearchQuery) -> AppResult<SearchHits> {
        let body = query.to_json();
        self.queries.lock().await.push(body.clone());

        let filters: Vec<Value> = ["filter", "must"]
            .iter()
            .filter_map(|section| body["query"]["bool"][*section].as_array())
            .flatten()
            .cloned()
            .collect();
        let hits: Vec<Value> = self
            .cases
            .iter()
            .filter(|case| {
                filters.iter().all(|filter| {
                    if filter.get("match_none").is_some() {
                        return false;
                    }
                    if let Some(ids) = filter["terms"]["_id"].as_array() {
                        return ids.iter().any(|id| id.as_str() == Some(case.case_id.as_str()));
                    }
                    if let Some(types) = filter["terms"]["type.exact"].as_array() {
                        return types
                            .iter()
                            .any(|case_type| case_type.as_str() == Some(case.case_type.as_str()));
                    }
                    Self::matches(case, filter)
                })
            })
            .map(|case| {
                json!({
                    "_id": case.case_id,
                    "_score": 1.0,
                    "_source": serde_json::to_value(case).unwrap_or_default(),
                })
            })
            .collect();

        let total = hits.len() as u64;
        let size = body["size"].as_u64().and_then(|size| usize::try_from(size).ok());
        Ok(SearchHits {
            total,
            hits: hits.into_iter().take(size.unwrap_or(usize::MAX)).collect(),
        })
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
        identifier: Option<&str>,
        referenced_ids: &[String],
        case_types: &[String],
        limit: usize,
    ) -> AppResult<Vec<CaseDocument>> {
        Ok(self
            .cases
            .iter()
            .filter(|case| {
                domains.contains(&case.domain)
                    && (case_types.is_empty() || case_types.contains(&case.case_type))
                    && case.indices.iter().any(|index| {
                        referenced_ids.contains(&index.referenced_id)
                            && identifier.is_none_or(|identifier| index.identifier == identifier)
                    })
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

struct FakeRegistryRepository {
    registry: Option<DataRegistry>,
}

#[async_trait]
impl RegistryRepository for FakeRegistryRepository {
    async fn create_registry(&self, _registry: &DataRegistry) -> AppResult<()> {
        Ok(())
    }

    async fn find_owned(&self, owner: &DomainName, slug: &str) -> AppResult<Option<DataRegistry>> {
        Ok(self
            .registry
            .clone()
            .filter(|registry| registry.domain() == owner && registry.slug() == slug))
    }

    async fn find_by_invited_domain(
        &self,
        domain: &DomainName,
        slug: &str,
    ) -> AppResult<Option<DataRegistry>> {
        Ok(self
            .registry
            .clone()
            .filter(|registry| registry.slug() == slug && registry.invitation(domain).is_some()))
    }

    async fn list_owned(&self, _owner: &DomainName) -> AppResult<Vec<DataRegistry>> {
        Ok(Vec::new())
    }

    async fn save_invitation(
        &self,
        _registry_id: Uuid,
        _invitation: &RegistryInvitation,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn save_grant(&self, _registry_id: Uuid, _grant: &RegistryGrant) -> AppResult<()> {
        Ok(())
    }

    async fn set_active(&self, _registry_id: Uuid, _is_active: bool) -> AppResult<()> {
        Ok(())
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
        Ok(match subject {
            "admin" => Permissions::max(),
            "worker" => Permissions::from_list([PermissionInfo {
                permission: Permission::AccessWebApps,
                allow: PermissionAllow::All,
            }]),
            _ => Permissions::none(),
        })
    }
}

fn case(
    case_id: &str,
    case_type: &str,
    properties: &[(&str, &str)],
    indices: &[(&str, &str)],
) -> CaseDocument {
    CaseDocument {
        case_id: case_id.to_owned(),
        domain: "demo".to_owned(),
        case_type: case_type.to_owned(),
        name: Some(case_id.to_owned()),
        owner_id: None,
        closed: false,
        indices: indices
            .iter()
            .map(|(identifier, referenced_id)| CaseIndex {
                identifier: (*identifier).to_owned(),
                referenced_type: "household".to_owned(),
                referenced_id: (*referenced_id).to_owned(),
                relationship: "child".to_owned(),
            })
            .collect(),
        case_properties: properties
            .iter()
            .map(|(key, value)| CaseProperty {
                key: (*key).to_owned(),
                value: (*value).to_owned(),
            })
            .collect(),
    }
}

fn sample_cases() -> Vec<CaseDocument> {
    vec![
        case("v1", "village", &[("name", "Kisumu")], &[]),
        case("h1", "household", &[("size", "4")], &[("host", "v1")]),
        case("h2", "household", &[("size", "2")], &[]),
        case("p1", "person", &[("dob", "2020-03-02")], &[("parent", "h1")]),
        case("p2", "person", &[("dob", "2020-03-04")], &[("parent", "h2")]),
        case("t1", "task", &[], &[("parent", "p1")]),
    ]
}

struct Harness {
    service: CaseSearchService,
    repository: Arc<FakeConfigRepository>,
    backend: Arc<FakeBackend>,
    audit: Arc<FakeAuditRepository>,
}

async fn harness(stored_config: Option<CaseSearchConfig>, extensions: ExtensionRegistry) -> Harness {
    harness_with(
        stored_config,
        extensions,
        sample_cases(),
        CaseSearchSettings::default(),
    )
    .await
}

async fn harness_with(
    stored_config: Option<CaseSearchConfig>,
    extensions: ExtensionRegistry,
    cases: Vec<CaseDocument>,
    settings: CaseSearchSettings,
) -> Harness {
    let repository = Arc::new(FakeConfigRepository::default());
    if let Some(stored_config) = stored_config {
        assert!(repository.save_config(&stored_config).await.is_ok());
    }
    let backend = Arc::new(FakeBackend {
        cases,
        queries: Mutex::new(Vec::new()),
    });
    let audit = Arc::new(FakeAuditRepository::default());

    let mut registry = DataRegistry::new(
        domain("demo"),
        "Shared people",
        vec!["person".to_owned()],
        chrono::Utc::now(),
    )
    .unwrap_or_else(|error| panic!("registry should build: {error}"));
    assert!(registry.invite(domain("partner")).is_ok());

    let service = CaseSearchService::new(
        AuthorizationService::new(Arc::new(FakeAuthorizationRepository)),
        CaseSearchPorts {
            config_repository: repository.clone(),
            config_cache: Arc::new(FakeConfigCache::default()),
            backend: backend.clone(),
            registry_repository: Arc::new(FakeRegistryRepository {
                registry: Some(registry),
            }),
            audit_repository: audit.clone(),
        },
        Arc::new(extensions),
        settings,
    );

    Harness {
        service,
        repository,
        backend,
        audit,
    }
}

fn worker() -> UserIdentity {
    UserIdentity::new("worker", "Worker", domain("demo"))
}

fn admin() -> UserIdentity {
    UserIdentity::new("admin", "Admin", domain("demo"))
}

fn request(pairs: &[(&str, CriteriaValue)], detail_columns: Vec<DetailColumn>) -> CaseSearchRequest {
    CaseSearchRequest {
        criteria: criteria(pairs),
        detail_columns,
        include_score: false,
    }
}

fn case_ids(cases: &[serde_json::Map<String, Value>]) -> Vec<&str> {
    cases
        .iter()
        .filter_map(|case| case.get("_id").and_then(Value::as_str))
        .collect()
}

#[tokio::test]
async fn search_requires_web_apps_access() {
    let harness = harness(Some(config()), ExtensionRegistry::new()).await;
    let outsider = UserIdentity::new("nobody", "Nobody", domain("demo"));

    let result = harness
        .service
        .search(&outsider, &request(&[("dob", single("2020-03-02"))], Vec::new()))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn disabled_config_forbids_search() {
    let mut disabled = config();
    disabled.enabled = false;
    let harness = harness(Some(disabled), ExtensionRegistry::new()).await;

    let result = harness
        .service
        .search(&worker(), &request(&[("dob", single("2020-03-02"))], Vec::new()))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(message)) if message.contains("not enabled")));
}

#[tokio::test]
async fn missing_config_falls_back_to_defaults() {
    let harness = harness(None, ExtensionRegistry::new()).await;

    let results = harness
        .service
        .search(&worker(), &request(&[("dob", single("2020-03-02"))], Vec::new()))
        .await
        .unwrap_or_else(|error| panic!("search should succeed: {error}"));
    assert_eq!(case_ids(&results.cases), vec!["p1"]);
}

#[tokio::test]
async fn config_is_cached_and_invalidated_on_save() {
    let harness = harness(Some(config()), ExtensionRegistry::new()).await;

    for _ in 0..2 {
        assert!(
            harness
                .service
                .compile(&worker(), &criteria(&[("dob", single("x"))]))
                .await
                .is_ok()
        );
    }
    assert_eq!(*harness.repository.reads.lock().await, 1);

    let mut updated = config();
    updated.fuzzy_properties.clear();
    assert!(harness.service.save_config(&admin(), updated).await.is_ok());

    let compiled = harness
        .service
        .compile(&worker(), &criteria(&[("name", single("Jon"))]))
        .await
        .unwrap_or_else(|error| panic!("compile should succeed: {error}"));
    assert_eq!(*harness.repository.reads.lock().await, 2);
    assert_eq!(
        compiled.query.must_clauses(),
        &[case_property_exact("name", "Jon")]
    );

    let events = harness.audit.events.lock().await;
    assert!(
        events
            .iter()
            .any(|event| event.action == AuditAction::CaseSearchConfigSaved)
    );
}

#[tokio::test]
async fn save_config_requires_permission_and_valid_patterns() {
    let harness = harness(Some(config()), ExtensionRegistry::new()).await;

    let forbidden = harness.service.save_config(&worker(), config()).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden(_))));

    let mut invalid = config();
    invalid.ignore_patterns[0].regex.clear();
    let rejected = harness.service.save_config(&admin(), invalid).await;
    assert!(matches!(rejected, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn ancestor_filters_restrict_results_through_relationships() {
    let harness = harness(Some(config()), ExtensionRegistry::new()).await;

    let results = harness
        .service
        .search(
            &worker(),
            &request(&[("parent/host/name", single("Kisumu"))], Vec::new()),
        )
        .await
        .unwrap_or_else(|error| panic!("search should succeed: {error}"));
    assert_eq!(case_ids(&results.cases), vec!["p1"]);

    let none = harness
        .service
        .search(
            &worker(),
            &request(&[("parent/host/name", single("Nairobi"))], Vec::new()),
        )
        .await
        .unwrap_or_else(|error| panic!("search should succeed: {error}"));
    assert!(none.cases.is_empty());
    let queries = harness.backend.queries.lock().await;
    assert!(
        queries
            .iter()
            .any(|query| query["query"]["bool"]["filter"]
                .as_array()
                .is_some_and(|filters| filters.contains(&json!({"match_none": {}}))))
    );
}

#[tokio::test]
async fn ancestor_filters_reject_truncated_matches() {
    let settings = CaseSearchSettings {
        max_results: 1,
        ..CaseSearchSettings::default()
    };

    let villages = vec![
        case("v1", "village", &[("name", "Kisumu")], &[]),
        case("v2", "village", &[("name", "Kisumu")], &[]),
        case("h1", "household", &[], &[("host", "v1")]),
    ];
    let harness = harness_with(Some(config()), ExtensionRegistry::new(), villages, settings).await;
    let result = harness
        .service
        .search(
            &worker(),
            &request(&[("host/name", single("Kisumu"))], Vec::new()),
        )
        .await;
    assert!(matches!(
        result,
        Err(AppError::InvalidFilter { ref key, .. }) if key == "host/name"
    ));

    let households = vec![
        case("v1", "village", &[("name", "Kisumu")], &[]),
        case("h1", "household", &[], &[("host", "v1")]),
        case("h2", "household", &[], &[("host", "v1")]),
        case("p1", "person", &[], &[("parent", "h1")]),
    ];
    let harness = harness_with(Some(config()), ExtensionRegistry::new(), households, settings).await;
    let result = harness
        .service
        .search(
            &worker(),
            &request(&[("parent/host/name", single("Kisumu"))], Vec::new()),
        )
        .await;
    assert!(matches!(
        result,
        Err(AppError::InvalidFilter { ref key, .. }) if key == "parent/host/name"
    ));
}

#[tokio::test]
async fn extension_filters_are_appended() {
    let mut extensions = ExtensionRegistry::new();
    assert!(define_case_search_extension_points(&mut extensions).is_ok());
    assert!(
        extensions
            .register(
                Extension::new(
                    CASE_SEARCH_EXTRA_FILTERS_POINT,
                    ["domain", "case_types", "criteria"],
                    |_: &ExtensionArgs| Ok(Some(json!({"term": {"owner_id": "team-a"}}))),
                )
                .for_domains(["demo"]),
            )
            .is_ok()
    );
    extensions.lock();
    let harness = harness(Some(config()), extensions).await;

    let compiled = harness
        .service
        .compile(&worker(), &criteria(&[("dob", single("2020-03-02"))]))
        .await
        .unwrap_or_else(|error| panic!("compile should succeed: {error}"));
    assert_eq!(
        compiled.query.filter_clauses(),
        &[SearchClause::Raw(json!({"term": {"owner_id": "team-a"}}))]
    );
}

#[tokio::test]
async fn related_cases_follow_detail_paths_and_children() {
    let harness = harness(Some(config()), ExtensionRegistry::new()).await;
    let detail = vec![
        DetailColumn {
            field: "parent/host/name".to_owned(),
            nodeset_case_type: None,
        },
        DetailColumn {
            field: "dob".to_owned(),
            nodeset_case_type: Some("task".to_owned()),
        },
    ];

    let results = harness
        .service
        .search(&worker(), &request(&[("dob", single("2020-03-02"))], detail))
        .await
        .unwrap_or_else(|error| panic!("search should succeed: {error}"));

    assert_eq!(case_ids(&results.cases), vec!["p1"]);
    let mut related = case_ids(&results.related_cases);
    related.sort_unstable();
    assert_eq!(related, vec!["h1", "t1", "v1"]);
    let household = results
        .related_cases
        .iter()
        .find(|case| case.get("_id") == Some(&json!("h1")));
    assert_eq!(household.and_then(|case| case.get("size")), Some(&json!("4")));
    assert!(
        results
            .related_cases
            .iter()
            .all(|case| !case.contains_key("case_properties"))
    );
}

#[tokio::test]
async fn related_case_limit_is_enforced() {
    let cases = sample_cases();
    let backend = Arc::new(FakeBackend {
        cases,
        queries: Mutex::new(Vec::new()),
    });
    let resolver = RelatedCaseResolver::new(backend, 1);
    let initial: Vec<CaseDocument> = sample_cases()
        .into_iter()
        .filter(|case| case.case_id == "p1")
        .collect();
    let scope = RelatedCaseScope::from_detail(&[
        DetailColumn {
            field: "parent/host/name".to_owned(),
            nodeset_case_type: None,
        },
        DetailColumn {
            field: "name".to_owned(),
            nodeset_case_type: Some("task".to_owned()),
        },
    ]);

    let result = resolver
        .resolve(&["demo".to_owned()], &initial, &scope)
        .await;
    assert!(matches!(result, Err(AppError::Validation(message)) if message.contains("too many related cases")));
}

#[tokio::test]
async fn registry_search_spans_visible_domains() {
    let harness = harness(Some(config()), ExtensionRegistry::new()).await;
    let request = request(
        &[
            ("commcare_registry", single("shared-people")),
            ("dob", single("2020-03-02")),
        ],
        Vec::new(),
    );

    assert!(harness.service.search(&worker(), &request).await.is_ok());
    let queries = harness.backend.queries.lock().await;
    assert_eq!(
        queries[0]["query"]["bool"]["filter"][0],
        json!({"term": {"domain.exact": "demo"}})
    );

    let unknown = CaseSearchRequest {
        criteria: criteria(&[("commcare_registry", single("missing"))]),
        detail_columns: Vec::new(),
        include_score: false,
    };
    drop(queries);
    let result = harness.service.search(&worker(), &unknown).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
