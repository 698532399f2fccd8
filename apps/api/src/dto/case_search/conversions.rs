use casewell_application::{AncestorFilter, CaseSearchResults, CompiledCaseSearch};
use casewell_core::DomainName;
use casewell_domain::{
    CaseSearchConfig, CriteriaValue, DetailColumn, FuzzyProperties, IgnorePattern,
};

use super::types::{
    AncestorFilterResponse, CaseSearchConfigPayload, CaseSearchResponse,
    CompiledCaseSearchResponse, CriteriaValueRequest, DetailColumnRequest, FuzzyPropertiesPayload,
    IgnorePatternPayload,
};

impl From<CriteriaValueRequest> for CriteriaValue {
    fn from(value: CriteriaValueRequest) -> Self {
        match value {
            CriteriaValueRequest::Single(value) => Self::Single(value),
            CriteriaValueRequest::Multiple(values) => Self::Multiple(values),
        }
    }
}

impl From<DetailColumnRequest> for DetailColumn {
    fn from(value: DetailColumnRequest) -> Self {
        Self {
            field: value.field,
            nodeset_case_type: value.nodeset_case_type,
        }
    }
}

impl From<CaseSearchResults> for CaseSearchResponse {
    fn from(value: CaseSearchResults) -> Self {
        Self {
            total: value.total,
            cases: value.cases,
            related_cases: value.related_cases,
        }
    }
}

impl From<AncestorFilter> for AncestorFilterResponse {
    fn from(value: AncestorFilter) -> Self {
        Self {
            clause: value.clause.to_json(),
            key: value.key,
            path: value.path,
            property: value.property,
        }
    }
}

impl From<CompiledCaseSearch> for CompiledCaseSearchResponse {
    fn from(value: CompiledCaseSearch) -> Self {
        Self {
            query: value.query.to_json(),
            ancestor_filters: value
                .ancestor_filters
                .into_iter()
                .map(AncestorFilterResponse::from)
                .collect(),
        }
    }
}

impl From<CaseSearchConfig> for CaseSearchConfigPayload {
    fn from(value: CaseSearchConfig) -> Self {
        Self {
            enabled: value.enabled,
            fuzzy_properties: value
                .fuzzy_properties
                .into_iter()
                .map(|fuzzy| FuzzyPropertiesPayload {
                    case_type: fuzzy.case_type,
                    properties: fuzzy.properties,
                })
                .collect(),
            ignore_patterns: value
                .ignore_patterns
                .into_iter()
                .map(|pattern| IgnorePatternPayload {
                    case_type: pattern.case_type,
                    case_property: pattern.case_property,
                    regex: pattern.regex,
                })
                .collect(),
        }
    }
}

impl CaseSearchConfigPayload {
    /// Binds the payload to the domain addressed by the request.
    #[must_use]
    pub fn into_config(self, domain: DomainName) -> CaseSearchConfig {
        CaseSearchConfig {
            domain,
            enabled: self.enabled,
            fuzzy_properties: self
                .fuzzy_properties
                .into_iter()
                .map(|fuzzy| FuzzyProperties {
                    case_type: fuzzy.case_type,
                    properties: fuzzy.properties,
                })
                .collect(),
            ignore_patterns: self
                .ignore_patterns
                .into_iter()
                .map(|pattern| IgnorePattern {
                    case_type: pattern.case_type,
                    case_property: pattern.case_property,
                    regex: pattern.regex,
                })
                .collect(),
        }
    }
}
