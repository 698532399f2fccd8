use std::collections::BTreeSet;

use casewell_core::{AppError, AppResult, DomainName};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Criteria key carrying a free-text query expression.
pub const XPATH_QUERY_KEY: &str = "_xpath_query";
/// Criteria key restricting results to one owner.
pub const OWNER_ID_KEY: &str = "owner_id";
/// Criteria key carrying space separated owner ids to exclude.
pub const BLACKLISTED_OWNER_ID_KEY: &str = "commcare_blacklisted_owner_ids";
/// Criteria key naming the requested case types.
pub const CASE_TYPE_KEY: &str = "case_type";
/// Criteria key naming a data registry.
pub const REGISTRY_KEY: &str = "commcare_registry";
/// Prefix of keys reserved for client-side custom parameters.
pub const CUSTOM_KEY_PREFIX: &str = "_custom_";
/// Prefix of date range values.
pub const RANGE_VALUE_PREFIX: &str = "__range__";
/// Separator of relationship path keys such as `parent/name`.
pub const PATH_SEPARATOR: char = '/';
/// Result key holding the relevance score.
pub const RELEVANCE_SCORE_KEY: &str = "commcare_search_score";
/// Default maximum number of search hits.
pub const DEFAULT_MAX_RESULTS: usize = 500;

/// Criteria keys that never compile into property clauses.
pub const UNSEARCHABLE_KEYS: &[&str] = &[CASE_TYPE_KEY, REGISTRY_KEY];

/// Index bookkeeping keys dropped when flattening case properties.
pub const INDEXED_METADATA_KEYS: &[&str] = &[
    "@case_id",
    "@case_type",
    "@owner_id",
    "@status",
    "name",
    "case_name",
    "external_id",
    "date_opened",
    "closed_on",
    "last_modified",
];

/// Properties matched approximately for one case type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyProperties {
    /// Case type.
    pub case_type: String,
    /// Property names.
    pub properties: Vec<String>,
}

/// Literal pattern stripped from one property before comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnorePattern {
    /// Case type.
    pub case_type: String,
    /// Property name.
    pub case_property: String,
    /// Pattern text, matched literally.
    pub regex: String,
}

/// Per-domain case search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSearchConfig {
    /// Owning domain.
    pub domain: DomainName,
    /// Whether case search is turned on.
    pub enabled: bool,
    /// Fuzzy properties by case type.
    #[serde(default)]
    pub fuzzy_properties: Vec<FuzzyProperties>,
    /// Ignore patterns by case type and property.
    #[serde(default)]
    pub ignore_patterns: Vec<IgnorePattern>,
}

impl CaseSearchConfig {
    /// Returns the empty configuration used when a domain has none stored.
    #[must_use]
    pub fn default_for(domain: DomainName) -> Self {
        Self {
            domain,
            enabled: false,
            fuzzy_properties: Vec::new(),
            ignore_patterns: Vec::new(),
        }
    }

    /// Rejects empty names and empty patterns.
    pub fn validate(&self) -> AppResult<()> {
        for fuzzy in &self.fuzzy_properties {
            if fuzzy.case_type.trim().is_empty() {
                return Err(AppError::Validation(
                    "fuzzy property case type must not be empty".to_owned(),
                ));
            }
            if fuzzy.properties.iter().any(|name| name.trim().is_empty()) {
                return Err(AppError::Validation(format!(
                    "fuzzy properties for case type '{}' must not be empty",
                    fuzzy.case_type
                )));
            }
        }

        for pattern in &self.ignore_patterns {
            if pattern.case_type.trim().is_empty() || pattern.case_property.trim().is_empty() {
                return Err(AppError::Validation(
                    "ignore pattern case type and property must not be empty".to_owned(),
                ));
            }
            if pattern.regex.is_empty() {
                return Err(AppError::Validation(format!(
                    "ignore pattern for '{}' must not be empty",
                    pattern.case_property
                )));
            }
        }

        Ok(())
    }

    /// Returns fuzzy property names across the requested case types.
    #[must_use]
    pub fn fuzzy_properties_for(&self, case_types: &[String]) -> BTreeSet<&str> {
        self.fuzzy_properties
            .iter()
            .filter(|fuzzy| case_types.contains(&fuzzy.case_type))
            .flat_map(|fuzzy| fuzzy.properties.iter().map(String::as_str))
            .collect()
    }

    /// Returns ignore patterns for one property across the requested case types.
    #[must_use]
    pub fn ignore_patterns_for(&self, case_types: &[String], case_property: &str) -> Vec<&str> {
        let mut patterns: Vec<&str> = self
            .ignore_patterns
            .iter()
            .filter(|pattern| {
                pattern.case_property == case_property && case_types.contains(&pattern.case_type)
            })
            .map(|pattern| pattern.regex.as_str())
            .collect();
        patterns.sort_unstable();
        patterns.dedup();
        patterns
    }
}

/// Raw criteria value: one string or a multi-select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriteriaValue {
    /// One value.
    Single(String),
    /// Several values.
    Multiple(Vec<String>),
}

impl CriteriaValue {
    /// Returns the values in input order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Returns whether the input was a list.
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }
}

/// Inclusive calendar date range encoded as `__range__START__END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// First included date.
    pub start: NaiveDate,
    /// Last included date.
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns whether a raw value uses the range encoding.
    #[must_use]
    pub fn is_range_value(value: &str) -> bool {
        value.starts_with(RANGE_VALUE_PREFIX)
    }

    /// Parses a range value for a criteria key.
    pub fn parse(key: &str, value: &str) -> AppResult<Self> {
        let Some(encoded) = value.strip_prefix(RANGE_VALUE_PREFIX) else {
            return Err(AppError::invalid_filter(
                key,
                format!("'{value}' is not a date range"),
            ));
        };

        let Some((start, end)) = encoded.split_once("__") else {
            return Err(AppError::invalid_filter(
                key,
                format!("date range '{value}' must look like __range__YYYY-MM-DD__YYYY-MM-DD"),
            ));
        };

        let start = parse_date(key, start)?;
        let end = parse_date(key, end)?;
        if start > end {
            return Err(AppError::invalid_filter(
                key,
                format!("date range starts after it ends ({start} > {end})"),
            ));
        }

        Ok(Self { start, end })
    }
}

fn parse_date(key: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| AppError::invalid_filter(key, format!("invalid date '{value}': {error}")))
}

/// Flattens a raw backend hit into a plain property mapping.
///
/// Dynamic case properties are merged into the top level, except index
/// bookkeeping keys. The relevance score is added when requested.
#[must_use]
pub fn flatten_result(hit: &Value, include_score: bool) -> Map<String, Value> {
    let mut result = hit
        .get("_source")
        .map(flatten_source)
        .unwrap_or_default();

    if include_score {
        if let Some(score) = hit.get("_score") {
            result.insert(RELEVANCE_SCORE_KEY.to_owned(), score.clone());
        }
    }

    result
}

/// Flattens one case source document.
#[must_use]
pub fn flatten_source(source: &Value) -> Map<String, Value> {
    let mut result = source.as_object().cloned().unwrap_or_default();
    let properties = result.remove("case_properties");

    if let Some(Value::Array(properties)) = properties {
        for property in properties {
            let (Some(key), Some(value)) = (
                property.get("key").and_then(Value::as_str),
                property.get("value"),
            ) else {
                continue;
            };
            if INDEXED_METADATA_KEYS.contains(&key) {
                continue;
            }
            result.insert(key.to_owned(), value.clone());
        }
    }

    result
}
