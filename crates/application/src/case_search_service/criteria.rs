use std::collections::{BTreeMap, BTreeSet};

use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::search_query::{
    case_property_exact, case_property_fuzzy, case_property_missing, case_property_range,
};
use casewell_domain::{
    BLACKLISTED_OWNER_ID_KEY, CUSTOM_KEY_PREFIX, CaseSearchConfig, CaseSearchQuery,
    CriteriaValue, DateRange, OWNER_ID_KEY, PATH_SEPARATOR, REGISTRY_KEY, RangeBounds, RangeKind,
    SearchClause, UNSEARCHABLE_KEYS, XPATH_QUERY_KEY,
};
use regex::Regex;

use super::expression::parse_expression;

/// Keys that only ever carry one value.
const SINGLE_VALUE_KEYS: &[&str] = &[
    XPATH_QUERY_KEY,
    OWNER_ID_KEY,
    BLACKLISTED_OWNER_ID_KEY,
    REGISTRY_KEY,
];

/// Flat search parameters submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSearchCriteria {
    domain: DomainName,
    case_types: Vec<String>,
    criteria: BTreeMap<String, CriteriaValue>,
}

/// Filter on cases reached through a relationship path.
#[derive(Debug, Clone, PartialEq)]
pub struct AncestorFilter {
    /// Full criteria key, e.g. `parent/host/name`.
    pub key: String,
    /// Relationship identifiers from the searched case outward.
    pub path: Vec<String>,
    /// Property on the ancestor case.
    pub property: String,
    /// Clause the ancestor case must match.
    pub clause: SearchClause,
}

/// Result of compiling criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCaseSearch {
    /// Main backend query.
    pub query: CaseSearchQuery,
    /// Filters resolved against ancestor cases before the main query runs.
    pub ancestor_filters: Vec<AncestorFilter>,
}

impl CaseSearchCriteria {
    /// Creates criteria for a domain and the requested case types.
    #[must_use]
    pub fn new(
        domain: DomainName,
        case_types: Vec<String>,
        criteria: BTreeMap<String, CriteriaValue>,
    ) -> Self {
        Self {
            domain,
            case_types,
            criteria,
        }
    }

    /// Returns the searching domain.
    #[must_use]
    pub fn domain(&self) -> &DomainName {
        &self.domain
    }

    /// Returns the requested case types.
    #[must_use]
    pub fn case_types(&self) -> &[String] {
        &self.case_types
    }

    /// Returns the raw criteria.
    #[must_use]
    pub fn criteria(&self) -> &BTreeMap<String, CriteriaValue> {
        &self.criteria
    }

    /// Returns the registry slug the search runs against, if any.
    pub fn registry_slug(&self) -> AppResult<Option<&str>> {
        self.single_value(REGISTRY_KEY)
    }

    /// Compiles the criteria against the searching domain only.
    pub fn compile(
        &self,
        config: &CaseSearchConfig,
        max_results: usize,
    ) -> AppResult<CompiledCaseSearch> {
        self.compile_for_domains(vec![self.domain.as_str().to_owned()], config, max_results)
    }

    /// Compiles the criteria into a query over the given domains.
    pub fn compile_for_domains(
        &self,
        domains: Vec<String>,
        config: &CaseSearchConfig,
        max_results: usize,
    ) -> AppResult<CompiledCaseSearch> {
        self.validate_value_counts()?;

        let mut query = CaseSearchQuery::new(domains, self.case_types.clone(), max_results);

        if let Some(expression) = self.single_value(XPATH_QUERY_KEY)?
            && !expression.trim().is_empty()
        {
            query.must(parse_expression(expression)?);
        }

        if let Some(owner_id) = self.single_value(OWNER_ID_KEY)? {
            query.owner(owner_id);
        }

        if let Some(blacklisted) = self.single_value(BLACKLISTED_OWNER_ID_KEY)? {
            for owner_id in blacklisted.split_whitespace() {
                query.exclude_owner(owner_id);
            }
        }

        let fuzzy_properties = config.fuzzy_properties_for(&self.case_types);
        let mut ancestor_filters = Vec::new();
        let mut property_clauses = Vec::new();

        for (key, value) in self.property_criteria() {
            let raw_values = value.values();
            if let [raw] = raw_values.as_slice()
                && DateRange::is_range_value(raw)
            {
                if key.contains(PATH_SEPARATOR) {
                    ancestor_filters.push(ancestor_filter(key, raw)?);
                } else {
                    query.filter(date_range_clause(key, key, raw)?);
                }
                continue;
            }

            let property = leaf_property(key);
            let values = strip_ignore_patterns(
                raw_values,
                &config.ignore_patterns_for(&self.case_types, property),
            );
            if values.is_empty() {
                continue;
            }

            if key.contains(PATH_SEPARATOR) {
                let value = values.first().map(String::as_str).unwrap_or_default();
                ancestor_filters.push(ancestor_filter(key, value)?);
                continue;
            }

            if let Some(clause) = property_clause(key, &values, &fuzzy_properties) {
                property_clauses.push(clause);
            }
        }

        for clause in property_clauses {
            query.must(clause);
        }

        Ok(CompiledCaseSearch {
            query,
            ancestor_filters,
        })
    }

    fn property_criteria(&self) -> impl Iterator<Item = (&String, &CriteriaValue)> {
        self.criteria.iter().filter(|(key, _)| {
            !SINGLE_VALUE_KEYS.contains(&key.as_str())
                && !UNSEARCHABLE_KEYS.contains(&key.as_str())
                && !key.starts_with(CUSTOM_KEY_PREFIX)
        })
    }

    fn single_value(&self, key: &str) -> AppResult<Option<&str>> {
        let Some(value) = self.criteria.get(key) else {
            return Ok(None);
        };

        match value.values().as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(*value)),
            _ => Err(AppError::invalid_filter(
                key,
                "multiple values are not supported",
            )),
        }
    }

    fn validate_value_counts(&self) -> AppResult<()> {
        for (key, value) in &self.criteria {
            let values = value.values();
            if values.len() < 2 {
                continue;
            }

            if SINGLE_VALUE_KEYS.contains(&key.as_str()) || key.contains(PATH_SEPARATOR) {
                return Err(AppError::invalid_filter(
                    key.as_str(),
                    "multiple values are not supported",
                ));
            }

            if values.iter().any(|value| DateRange::is_range_value(value)) {
                return Err(AppError::invalid_filter(
                    key.as_str(),
                    "date ranges do not accept multiple values",
                ));
            }
        }

        Ok(())
    }
}

fn leaf_property(key: &str) -> &str {
    key.rsplit(PATH_SEPARATOR).next().unwrap_or(key)
}

/// Removes every ignore pattern from every value until none matches.
pub(crate) fn strip_ignore_patterns(values: Vec<&str>, patterns: &[&str]) -> Vec<String> {
    let patterns: Vec<Regex> = patterns
        .iter()
        .filter(|pattern| !pattern.is_empty())
        .filter_map(|pattern| Regex::new(&regex::escape(pattern)).ok())
        .collect();

    values
        .into_iter()
        .map(|value| {
            let mut value = value.to_owned();
            while let Some(pattern) = patterns.iter().find(|pattern| pattern.is_match(&value)) {
                value = pattern.replace_all(&value, "").into_owned();
            }
            value
        })
        .collect()
}

fn date_range_clause(key: &str, property: &str, value: &str) -> AppResult<SearchClause> {
    let range = DateRange::parse(key, value)?;
    Ok(case_property_range(
        property,
        RangeKind::Date,
        RangeBounds::inclusive(range.start.to_string(), range.end.to_string()),
    ))
}

fn value_clause(key: &str, value: &str, fuzzy: bool) -> SearchClause {
    if value.is_empty() {
        case_property_missing(key)
    } else if fuzzy {
        case_property_fuzzy(key, value)
    } else {
        case_property_exact(key, value)
    }
}

fn property_clause(
    key: &str,
    values: &[String],
    fuzzy_properties: &BTreeSet<&str>,
) -> Option<SearchClause> {
    let fuzzy = fuzzy_properties.contains(key);

    match values {
        [] => None,
        [value] => Some(value_clause(key, value, fuzzy)),
        _ => {
            let mut alternatives = Vec::with_capacity(values.len());
            if values.iter().any(String::is_empty) {
                alternatives.push(case_property_missing(key));
            }
            alternatives.extend(
                values
                    .iter()
                    .filter(|value| !value.is_empty())
                    .map(|value| value_clause(key, value, fuzzy)),
            );
            Some(SearchClause::or(alternatives))
        }
    }
}

fn ancestor_filter(key: &str, value: &str) -> AppResult<AncestorFilter> {
    let segments: Vec<&str> = key.split(PATH_SEPARATOR).collect();
    if segments.iter().any(|segment| segment.trim().is_empty()) {
        return Err(AppError::invalid_filter(
            key,
            "relationship path segments must not be empty",
        ));
    }

    let Some((property, path)) = segments.split_last() else {
        return Err(AppError::invalid_filter(key, "relationship path is empty"));
    };

    let clause = if DateRange::is_range_value(value) {
        date_range_clause(key, property, value)?
    } else {
        value_clause(property, value, false)
    };

    Ok(AncestorFilter {
        key: key.to_owned(),
        path: path.iter().map(|segment| (*segment).to_owned()).collect(),
        property: (*property).to_owned(),
        clause,
    })
}
