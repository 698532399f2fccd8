use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use casewell_core::{AppError, AppResult};
use casewell_domain::{CaseDocument, DetailColumn, PATH_SEPARATOR};
use tracing::debug;

use crate::case_search_ports::CaseSearchBackend;

/// Relationship paths and child case types a search detail displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedCaseScope {
    paths: BTreeSet<String>,
    child_case_types: BTreeSet<String>,
}

impl RelatedCaseScope {
    /// Collects the scope from detail columns.
    #[must_use]
    pub fn from_detail(columns: &[DetailColumn]) -> Self {
        let mut scope = Self::default();
        for column in columns {
            if let Some((path, _)) = column.field.rsplit_once(PATH_SEPARATOR)
                && !path.is_empty()
            {
                scope.paths.insert(path.to_owned());
            }
            if let Some(case_type) = &column.nodeset_case_type {
                scope.child_case_types.insert(case_type.clone());
            }
        }
        scope
    }

    /// Returns relationship paths such as `parent/host`.
    #[must_use]
    pub fn paths(&self) -> &BTreeSet<String> {
        &self.paths
    }

    /// Returns child case types.
    #[must_use]
    pub fn child_case_types(&self) -> &BTreeSet<String> {
        &self.child_case_types
    }

    /// Returns whether nothing needs to be resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.child_case_types.is_empty()
    }
}

/// Fetches cases related to search results.
#[derive(Clone)]
pub struct RelatedCaseResolver {
    backend: Arc<dyn CaseSearchBackend>,
    max_related_cases: usize,
}

impl RelatedCaseResolver {
    /// Creates a resolver with an upper bound on the number of related cases.
    #[must_use]
    pub fn new(backend: Arc<dyn CaseSearchBackend>, max_related_cases: usize) -> Self {
        Self {
            backend,
            max_related_cases,
        }
    }

    /// Resolves every path and child case type of the scope.
    ///
    /// Returns the related cases once each, excluding the initial cases.
    pub async fn resolve(
        &self,
        domains: &[String],
        cases: &[CaseDocument],
        scope: &RelatedCaseScope,
    ) -> AppResult<Vec<CaseDocument>> {
        if cases.is_empty() || scope.is_empty() {
            return Ok(Vec::new());
        }

        let initial_ids: HashSet<&str> = cases.iter().map(|case| case.case_id.as_str()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut related = Vec::new();

        let path_cases = self.resolve_paths(domains, cases, scope.paths()).await?;
        let child_cases = self.resolve_children(domains, cases, scope).await?;

        for case in path_cases.into_iter().chain(child_cases) {
            if initial_ids.contains(case.case_id.as_str()) || !seen.insert(case.case_id.clone()) {
                continue;
            }
            related.push(case);
            self.check_limit(related.len())?;
        }

        debug!(
            initial = cases.len(),
            related = related.len(),
            "resolved related cases"
        );
        Ok(related)
    }

    async fn resolve_paths(
        &self,
        domains: &[String],
        cases: &[CaseDocument],
        paths: &BTreeSet<String>,
    ) -> AppResult<Vec<CaseDocument>> {
        let split_paths: Vec<Vec<&str>> = paths
            .iter()
            .map(|path| path.split(PATH_SEPARATOR).collect())
            .collect();
        let max_depth = split_paths.iter().map(Vec::len).max().unwrap_or(0);

        let mut by_prefix: BTreeMap<String, Vec<CaseDocument>> = BTreeMap::new();
        for depth in 1..=max_depth {
            let prefixes: BTreeSet<Vec<&str>> = split_paths
                .iter()
                .filter(|segments| segments.len() >= depth)
                .map(|segments| segments[..depth].to_vec())
                .collect();

            for prefix in prefixes {
                let key = prefix.join("/");
                if by_prefix.contains_key(&key) {
                    continue;
                }

                let Some((identifier, parent_prefix)) = prefix.split_last() else {
                    continue;
                };
                let sources: &[CaseDocument] = if parent_prefix.is_empty() {
                    cases
                } else {
                    by_prefix
                        .get(&parent_prefix.join("/"))
                        .map(Vec::as_slice)
                        .unwrap_or_default()
                };

                let referenced_ids: BTreeSet<String> = sources
                    .iter()
                    .flat_map(|case| case.referenced_ids(identifier))
                    .map(str::to_owned)
                    .collect();
                let referenced_ids: Vec<String> = referenced_ids.into_iter().collect();
                self.check_limit(referenced_ids.len())?;

                let found = if referenced_ids.is_empty() {
                    Vec::new()
                } else {
                    self.backend.get_cases(domains, &referenced_ids).await?
                };
                by_prefix.insert(key, found);
            }
        }

        Ok(by_prefix.into_values().flatten().collect())
    }

    async fn resolve_children(
        &self,
        domains: &[String],
        cases: &[CaseDocument],
        scope: &RelatedCaseScope,
    ) -> AppResult<Vec<CaseDocument>> {
        if scope.child_case_types().is_empty() {
            return Ok(Vec::new());
        }

        let parent_ids: Vec<String> = cases.iter().map(|case| case.case_id.clone()).collect();
        let case_types: Vec<String> = scope.child_case_types().iter().cloned().collect();
        let children = self
            .backend
            .find_cases_indexing(
                domains,
                None,
                &parent_ids,
                &case_types,
                self.max_related_cases.saturating_add(1),
            )
            .await?;
        self.check_limit(children.len())?;

        Ok(children)
    }

    fn check_limit(&self, count: usize) -> AppResult<()> {
        if count > self.max_related_cases {
            return Err(AppError::Validation(format!(
                "too many related cases: more than {} requested",
                self.max_related_cases
            )));
        }
        Ok(())
    }
}
