use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use casewell_application::CaseSearchConfigRepository;
use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::{CaseSearchConfig, FuzzyProperties, IgnorePattern};

/// PostgreSQL-backed case search configuration repository.
#[derive(Clone)]
pub struct PostgresCaseSearchConfigRepository {
    pool: PgPool,
}

impl PostgresCaseSearchConfigRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ConfigRow {
    enabled: bool,
}

#[derive(Debug, FromRow)]
struct FuzzyPropertiesRow {
    case_type: String,
    properties: Vec<String>,
}

#[derive(Debug, FromRow)]
struct IgnorePatternRow {
    case_type: String,
    case_property: String,
    regex: String,
}

#[async_trait]
impl CaseSearchConfigRepository for PostgresCaseSearchConfigRepository {
    async fn find_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>> {
        let config = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT enabled
            FROM case_search_config
            WHERE domain = $1
            "#,
        )
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load case search config for domain '{domain}': {error}"
            ))
        })?;

        let Some(config) = config else {
            return Ok(None);
        };

        let fuzzy_properties = sqlx::query_as::<_, FuzzyPropertiesRow>(
            r#"
            SELECT case_type, properties
            FROM case_search_fuzzy_properties
            WHERE domain = $1
            ORDER BY case_type
            "#,
        )
        .bind(domain.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load fuzzy properties for domain '{domain}': {error}"
            ))
        })?;

        let ignore_patterns = sqlx::query_as::<_, IgnorePatternRow>(
            r#"
            SELECT case_type, case_property, regex
            FROM case_search_ignore_patterns
            WHERE domain = $1
            ORDER BY id
            "#,
        )
        .bind(domain.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load ignore patterns for domain '{domain}': {error}"
            ))
        })?;

        Ok(Some(CaseSearchConfig {
            domain: domain.clone(),
            enabled: config.enabled,
            fuzzy_properties: fuzzy_properties
                .into_iter()
                .map(|row| FuzzyProperties {
                    case_type: row.case_type,
                    properties: row.properties,
                })
                .collect(),
            ignore_patterns: ignore_patterns
                .into_iter()
                .map(|row| IgnorePattern {
                    case_type: row.case_type,
                    case_property: row.case_property,
                    regex: row.regex,
                })
                .collect(),
        }))
    }

    async fn save_config(&self, config: &CaseSearchConfig) -> AppResult<()> {
        let domain = config.domain.as_str();
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO case_search_config (domain, enabled)
            VALUES ($1, $2)
            ON CONFLICT (domain)
            DO UPDATE SET enabled = EXCLUDED.enabled, updated_at = now()
            "#,
        )
        .bind(domain)
        .bind(config.enabled)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save case search config for domain '{domain}': {error}"
            ))
        })?;

        for table in ["case_search_fuzzy_properties", "case_search_ignore_patterns"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE domain = $1"))
                .bind(domain)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to clear {table} for domain '{domain}': {error}"
                    ))
                })?;
        }

        for fuzzy in &config.fuzzy_properties {
            sqlx::query(
                r#"
                INSERT INTO case_search_fuzzy_properties (domain, case_type, properties)
                VALUES ($1, $2, $3)
                ON CONFLICT (domain, case_type)
                DO UPDATE SET properties = EXCLUDED.properties
                "#,
            )
            .bind(domain)
            .bind(fuzzy.case_type.as_str())
            .bind(&fuzzy.properties)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to save fuzzy properties for case type '{}': {error}",
                    fuzzy.case_type
                ))
            })?;
        }

        for pattern in &config.ignore_patterns {
            sqlx::query(
                r#"
                INSERT INTO case_search_ignore_patterns (domain, case_type, case_property, regex)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(domain)
            .bind(pattern.case_type.as_str())
            .bind(pattern.case_property.as_str())
            .bind(pattern.regex.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to save ignore pattern for '{}.{}': {error}",
                    pattern.case_type, pattern.case_property
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }
}
