use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

/// One criteria value: a single string or a multi-select list.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(untagged)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/criteria-value-request.ts"
)]
pub enum CriteriaValueRequest {
    Single(String),
    Multiple(Vec<String>),
}

/// Detail column of the application screen showing results.
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/detail-column-request.ts"
)]
pub struct DetailColumnRequest {
    pub field: String,
    #[serde(default)]
    pub nodeset_case_type: Option<String>,
}

/// Incoming case search payload.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/case-search-request.ts"
)]
pub struct CaseSearchRequestBody {
    pub case_types: Vec<String>,
    #[serde(default)]
    pub criteria: BTreeMap<String, CriteriaValueRequest>,
    #[serde(default)]
    pub detail_columns: Vec<DetailColumnRequest>,
    #[serde(default)]
    pub include_score: bool,
}

/// Flattened case search results.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/case-search-response.ts"
)]
pub struct CaseSearchResponse {
    #[ts(type = "number")]
    pub total: u64,
    #[ts(type = "Array<Record<string, unknown>>")]
    pub cases: Vec<Map<String, Value>>,
    #[ts(type = "Array<Record<string, unknown>>")]
    pub related_cases: Vec<Map<String, Value>>,
}

/// Filter evaluated against ancestor cases before the main query.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/ancestor-filter-response.ts"
)]
pub struct AncestorFilterResponse {
    pub key: String,
    pub path: Vec<String>,
    pub property: String,
    #[ts(type = "Record<string, unknown>")]
    pub clause: Value,
}

/// Compiled backend query returned for debugging.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/compiled-case-search-response.ts"
)]
pub struct CompiledCaseSearchResponse {
    #[ts(type = "Record<string, unknown>")]
    pub query: Value,
    pub ancestor_filters: Vec<AncestorFilterResponse>,
}

/// Fuzzy-matched properties of one case type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/fuzzy-properties-payload.ts"
)]
pub struct FuzzyPropertiesPayload {
    pub case_type: String,
    pub properties: Vec<String>,
}

/// Substring stripped from one case property before matching.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/ignore-pattern-payload.ts"
)]
pub struct IgnorePatternPayload {
    pub case_type: String,
    pub case_property: String,
    pub regex: String,
}

/// Case search configuration of a domain.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/case-search-config-payload.ts"
)]
pub struct CaseSearchConfigPayload {
    pub enabled: bool,
    #[serde(default)]
    pub fuzzy_properties: Vec<FuzzyPropertiesPayload>,
    #[serde(default)]
    pub ignore_patterns: Vec<IgnorePatternPayload>,
}
