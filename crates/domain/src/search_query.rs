//! Typed subset of the search backend boolean query language.

use serde_json::{Map, Value, json};

/// Nested field holding dynamic case properties.
pub const CASE_PROPERTIES_PATH: &str = "case_properties";
const CASE_PROPERTY_KEY: &str = "case_properties.key.exact";
const CASE_PROPERTY_VALUE_EXACT: &str = "case_properties.value.exact";
const CASE_PROPERTY_VALUE_TEXT: &str = "case_properties.value";
const CASE_PROPERTY_VALUE_DATE: &str = "case_properties.value.date";
const CASE_PROPERTY_VALUE_NUMERIC: &str = "case_properties.value.numeric";
const INDICES_PATH: &str = "indices";

/// Inclusive or exclusive bounds of a range clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    /// Strictly greater than.
    pub gt: Option<Value>,
    /// Greater than or equal.
    pub gte: Option<Value>,
    /// Strictly less than.
    pub lt: Option<Value>,
    /// Less than or equal.
    pub lte: Option<Value>,
}

impl RangeBounds {
    /// Inclusive range between two values.
    #[must_use]
    pub fn inclusive(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            gte: Some(start.into()),
            lte: Some(end.into()),
            ..Self::default()
        }
    }

    fn to_json(&self) -> Value {
        let mut bounds = Map::new();
        for (name, bound) in [
            ("gt", &self.gt),
            ("gte", &self.gte),
            ("lt", &self.lt),
            ("lte", &self.lte),
        ] {
            if let Some(bound) = bound {
                bounds.insert(name.to_owned(), bound.clone());
            }
        }
        Value::Object(bounds)
    }
}

/// Value type a case property range compares on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// Calendar dates.
    Date,
    /// Numbers.
    Numeric,
}

/// Boolean combination of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolClause {
    /// Non-scoring clauses that must match.
    pub filter: Vec<SearchClause>,
    /// Scoring clauses that must match.
    pub must: Vec<SearchClause>,
    /// Alternatives.
    pub should: Vec<SearchClause>,
    /// Clauses that must not match.
    pub must_not: Vec<SearchClause>,
    /// Minimum number of matching alternatives.
    pub minimum_should_match: Option<u32>,
}

/// One clause of a backend query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchClause {
    /// Matches every document.
    MatchAll,
    /// Matches no document.
    MatchNone,
    /// Exact value match.
    Term {
        /// Field name.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// Exact match against any listed value.
    Terms {
        /// Field name.
        field: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// Range comparison.
    Range {
        /// Field name.
        field: String,
        /// Range bounds.
        bounds: RangeBounds,
    },
    /// Analysed text match, optionally fuzzy.
    Match {
        /// Field name.
        field: String,
        /// Query text.
        query: String,
        /// Fuzziness setting such as `AUTO`.
        fuzziness: Option<String>,
    },
    /// Field presence.
    Exists {
        /// Field name.
        field: String,
    },
    /// Query against a nested object path.
    Nested {
        /// Nested path.
        path: String,
        /// Inner query.
        query: Box<SearchClause>,
    },
    /// Boolean combination.
    Bool(BoolClause),
    /// Clause contributed verbatim by an extension.
    Raw(Value),
}

impl SearchClause {
    /// Exact term clause.
    #[must_use]
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Terms clause over string values.
    #[must_use]
    pub fn terms<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Terms {
            field: field.into(),
            values: values
                .into_iter()
                .map(|value| Value::String(value.into()))
                .collect(),
        }
    }

    /// All clauses must match.
    #[must_use]
    pub fn and(clauses: Vec<SearchClause>) -> Self {
        Self::Bool(BoolClause {
            must: clauses,
            ..BoolClause::default()
        })
    }

    /// At least one clause must match.
    #[must_use]
    pub fn or(clauses: Vec<SearchClause>) -> Self {
        Self::Bool(BoolClause {
            should: clauses,
            minimum_should_match: Some(1),
            ..BoolClause::default()
        })
    }

    /// The clause must not match.
    #[must_use]
    pub fn not(clause: SearchClause) -> Self {
        Self::Bool(BoolClause {
            must_not: vec![clause],
            ..BoolClause::default()
        })
    }

    /// Renders the clause as backend JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({"match_all": {}}),
            Self::MatchNone => json!({"match_none": {}}),
            Self::Term { field, value } => json!({"term": {field.as_str(): value}}),
            Self::Terms { field, values } => json!({"terms": {field.as_str(): values}}),
            Self::Range { field, bounds } => json!({"range": {field.as_str(): bounds.to_json()}}),
            Self::Match {
                field,
                query,
                fuzziness,
            } => {
                let mut options = Map::new();
                options.insert("query".to_owned(), Value::String(query.clone()));
                if let Some(fuzziness) = fuzziness {
                    options.insert("fuzziness".to_owned(), Value::String(fuzziness.clone()));
                }
                json!({"match": {field.as_str(): options}})
            }
            Self::Exists { field } => json!({"exists": {"field": field}}),
            Self::Nested { path, query } => {
                json!({"nested": {"path": path, "query": query.to_json()}})
            }
            Self::Bool(clause) => {
                let mut body = Map::new();
                for (name, clauses) in [
                    ("filter", &clause.filter),
                    ("must", &clause.must),
                    ("should", &clause.should),
                    ("must_not", &clause.must_not),
                ] {
                    if !clauses.is_empty() {
                        body.insert(
                            name.to_owned(),
                            Value::Array(clauses.iter().map(SearchClause::to_json).collect()),
                        );
                    }
                }
                if let Some(minimum) = clause.minimum_should_match {
                    body.insert("minimum_should_match".to_owned(), json!(minimum));
                }
                json!({"bool": body})
            }
            Self::Raw(value) => value.clone(),
        }
    }
}

fn case_property_query(key: &str, value_clauses: Vec<SearchClause>, scored: bool) -> SearchClause {
    let mut inner = BoolClause {
        filter: vec![SearchClause::term(CASE_PROPERTY_KEY, key)],
        ..BoolClause::default()
    };
    if scored {
        inner.must = value_clauses;
    } else {
        inner.filter.extend(value_clauses);
    }

    SearchClause::Nested {
        path: CASE_PROPERTIES_PATH.to_owned(),
        query: Box::new(SearchClause::Bool(inner)),
    }
}

/// Case property equals a value exactly.
#[must_use]
pub fn case_property_exact(key: &str, value: &str) -> SearchClause {
    case_property_query(
        key,
        vec![SearchClause::term(CASE_PROPERTY_VALUE_EXACT, value)],
        false,
    )
}

/// Case property approximately matches a value.
#[must_use]
pub fn case_property_fuzzy(key: &str, value: &str) -> SearchClause {
    case_property_query(
        key,
        vec![SearchClause::Match {
            field: CASE_PROPERTY_VALUE_TEXT.to_owned(),
            query: value.to_owned(),
            fuzziness: Some("AUTO".to_owned()),
        }],
        true,
    )
}

/// Case lacks the property or holds an empty value for it.
#[must_use]
pub fn case_property_missing(key: &str) -> SearchClause {
    let present = SearchClause::Nested {
        path: CASE_PROPERTIES_PATH.to_owned(),
        query: Box::new(SearchClause::term(CASE_PROPERTY_KEY, key)),
    };
    SearchClause::or(vec![
        SearchClause::not(present),
        case_property_exact(key, ""),
    ])
}

/// Case property falls inside a range.
#[must_use]
pub fn case_property_range(key: &str, kind: RangeKind, bounds: RangeBounds) -> SearchClause {
    let field = match kind {
        RangeKind::Date => CASE_PROPERTY_VALUE_DATE,
        RangeKind::Numeric => CASE_PROPERTY_VALUE_NUMERIC,
    };
    case_property_query(
        key,
        vec![SearchClause::Range {
            field: field.to_owned(),
            bounds,
        }],
        false,
    )
}

/// Case indexes one of the given cases, optionally through one relationship.
#[must_use]
pub fn indexed_case(identifier: Option<&str>, referenced_ids: &[String]) -> SearchClause {
    let mut inner = BoolClause {
        filter: vec![SearchClause::terms(
            "indices.referenced_id",
            referenced_ids.iter().cloned(),
        )],
        ..BoolClause::default()
    };
    if let Some(identifier) = identifier {
        inner
            .filter
            .push(SearchClause::term("indices.identifier", identifier));
    }

    SearchClause::Nested {
        path: INDICES_PATH.to_owned(),
        query: Box::new(SearchClause::Bool(inner)),
    }
}

/// Top-level case search query.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSearchQuery {
    domains: Vec<String>,
    case_types: Vec<String>,
    include_closed: bool,
    filters: Vec<SearchClause>,
    must: Vec<SearchClause>,
    must_not: Vec<SearchClause>,
    size: usize,
}

impl CaseSearchQuery {
    /// Starts a query over open cases of the given types in the given domains.
    ///
    /// An empty case type list does not restrict case types.
    #[must_use]
    pub fn new(domains: Vec<String>, case_types: Vec<String>, size: usize) -> Self {
        Self {
            domains,
            case_types,
            include_closed: false,
            filters: Vec::new(),
            must: Vec::new(),
            must_not: Vec::new(),
            size,
        }
    }

    /// Includes closed cases.
    #[must_use]
    pub fn include_closed(mut self) -> Self {
        self.include_closed = true;
        self
    }

    /// Restricts results to one owner.
    pub fn owner(&mut self, owner_id: &str) {
        self.filters.push(SearchClause::term("owner_id", owner_id));
    }

    /// Excludes one owner.
    pub fn exclude_owner(&mut self, owner_id: &str) {
        self.must_not.push(SearchClause::term("owner_id", owner_id));
    }

    /// Restricts results to the given case ids.
    pub fn case_ids(&mut self, case_ids: &[String]) {
        if case_ids.is_empty() {
            self.filters.push(SearchClause::MatchNone);
        } else {
            self.filters
                .push(SearchClause::terms("_id", case_ids.iter().cloned()));
        }
    }

    /// Adds a non-scoring clause.
    pub fn filter(&mut self, clause: SearchClause) {
        self.filters.push(clause);
    }

    /// Adds a scoring clause.
    pub fn must(&mut self, clause: SearchClause) {
        self.must.push(clause);
    }

    /// Returns the maximum number of hits requested.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the scoring clauses.
    #[must_use]
    pub fn must_clauses(&self) -> &[SearchClause] {
        &self.must
    }

    /// Returns the non-scoring clauses added on top of the base filters.
    #[must_use]
    pub fn filter_clauses(&self) -> &[SearchClause] {
        &self.filters
    }

    /// Returns the exclusion clauses.
    #[must_use]
    pub fn must_not_clauses(&self) -> &[SearchClause] {
        &self.must_not
    }

    /// Renders the backend request body.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut filter = Vec::new();
        match self.domains.as_slice() {
            [domain] => filter.push(SearchClause::term("domain.exact", domain.as_str())),
            domains => filter.push(SearchClause::terms("domain.exact", domains.iter().cloned())),
        }
        if !self.case_types.is_empty() {
            filter.push(SearchClause::terms(
                "type.exact",
                self.case_types.iter().cloned(),
            ));
        }
        if !self.include_closed {
            filter.push(SearchClause::term("closed", false));
        }
        filter.extend(self.filters.iter().cloned());

        let must = if self.must.is_empty() {
            vec![SearchClause::MatchAll]
        } else {
            self.must.clone()
        };

        let query = SearchClause::Bool(BoolClause {
            filter,
            must,
            must_not: self.must_not.clone(),
            ..BoolClause::default()
        });

        json!({"query": query.to_json(), "size": self.size})
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        CaseSearchQuery, RangeBounds, RangeKind, case_property_exact, case_property_fuzzy,
        case_property_missing, case_property_range,
    };

    #[test]
    fn exact_clause_matches_backend_shape() {
        assert_eq!(
            case_property_exact("name", "Jon").to_json(),
            json!({"nested": {"path": "case_properties", "query": {"bool": {"filter": [
                {"term": {"case_properties.key.exact": "name"}},
                {"term": {"case_properties.value.exact": "Jon"}}
            ]}}}})
        );
    }

    #[test]
    fn fuzzy_clause_scores_value_match() {
        assert_eq!(
            case_property_fuzzy("name", "Jon").to_json(),
            json!({"nested": {"path": "case_properties", "query": {"bool": {
                "filter": [{"term": {"case_properties.key.exact": "name"}}],
                "must": [{"match": {"case_properties.value": {"query": "Jon", "fuzziness": "AUTO"}}}]
            }}}})
        );
    }

    #[test]
    fn missing_clause_accepts_absent_or_empty() {
        let value = case_property_missing("phone").to_json();
        assert_eq!(value["bool"]["minimum_should_match"], 1);
        assert_eq!(
            value["bool"]["should"][0]["bool"]["must_not"][0]["nested"]["query"],
            json!({"term": {"case_properties.key.exact": "phone"}})
        );
        assert_eq!(
            value["bool"]["should"][1],
            case_property_exact("phone", "").to_json()
        );
    }

    #[test]
    fn date_range_is_inclusive() {
        let value = case_property_range(
            "dob",
            RangeKind::Date,
            RangeBounds::inclusive("2020-03-02", "2020-03-03"),
        )
        .to_json();

        assert_eq!(
            value["nested"]["query"]["bool"]["filter"][1],
            json!({"range": {"case_properties.value.date": {"gte": "2020-03-02", "lte": "2020-03-03"}}})
        );
    }

    #[test]
    fn base_query_filters_domain_type_and_open_cases() {
        let mut query = CaseSearchQuery::new(vec!["demo".to_owned()], vec!["person".to_owned()], 500);
        query.exclude_owner("123");

        assert_eq!(
            query.to_json(),
            json!({"query": {"bool": {
                "filter": [
                    {"term": {"domain.exact": "demo"}},
                    {"terms": {"type.exact": ["person"]}},
                    {"term": {"closed": false}}
                ],
                "must": [{"match_all": {}}],
                "must_not": [{"term": {"owner_id": "123"}}]
            }}, "size": 500})
        );
    }

    #[test]
    fn empty_case_id_restriction_matches_nothing() {
        let mut query = CaseSearchQuery::new(vec!["demo".to_owned()], Vec::new(), 10);
        query.case_ids(&[]);
        assert_eq!(
            query.to_json()["query"]["bool"]["filter"][2],
            json!({"match_none": {}})
        );
    }
}
