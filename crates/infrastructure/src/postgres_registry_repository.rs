use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use casewell_application::RegistryRepository;
use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::{DataRegistry, RegistryGrant, RegistryInvitation};

/// PostgreSQL-backed data registry repository.
#[derive(Clone)]
pub struct PostgresRegistryRepository {
    pool: PgPool,
}

impl PostgresRegistryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn assemble(&self, rows: Vec<RegistryRow>) -> AppResult<Vec<DataRegistry>> {
        let registry_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let invitation_rows = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT registry_id, domain, accepted_on, rejected_on
            FROM registry_invitations
            WHERE registry_id = ANY($1)
            ORDER BY created_at, domain
            "#,
        )
        .bind(&registry_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load registry invitations: {error}"))
        })?;

        let grant_rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT registry_id, from_domain, to_domains
            FROM registry_grants
            WHERE registry_id = ANY($1)
            ORDER BY from_domain
            "#,
        )
        .bind(&registry_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load registry grants: {error}")))?;

        let mut invitations: HashMap<Uuid, Vec<RegistryInvitation>> = HashMap::new();
        for row in invitation_rows {
            invitations
                .entry(row.registry_id)
                .or_default()
                .push(RegistryInvitation::from_parts(
                    stored_domain(&row.domain)?,
                    row.accepted_on,
                    row.rejected_on,
                ));
        }

        let mut grants: HashMap<Uuid, Vec<RegistryGrant>> = HashMap::new();
        for row in grant_rows {
            let to_domains = row
                .to_domains
                .iter()
                .map(|domain| stored_domain(domain))
                .collect::<AppResult<BTreeSet<_>>>()?;
            grants.entry(row.registry_id).or_default().push(RegistryGrant {
                from_domain: stored_domain(&row.from_domain)?,
                to_domains,
            });
        }

        rows.into_iter()
            .map(|row| {
                Ok(DataRegistry::from_parts(
                    row.id,
                    stored_domain(&row.domain)?,
                    row.name,
                    row.slug,
                    row.is_active,
                    row.case_types,
                    invitations.remove(&row.id).unwrap_or_default(),
                    grants.remove(&row.id).unwrap_or_default(),
                ))
            })
            .collect()
    }

    async fn assemble_one(&self, row: Option<RegistryRow>) -> AppResult<Option<DataRegistry>> {
        let Some(row) = row else {
            return Ok(None);
        };

        Ok(self.assemble(vec![row]).await?.into_iter().next())
    }
}

#[derive(Debug, FromRow)]
struct RegistryRow {
    id: Uuid,
    domain: String,
    name: String,
    slug: String,
    is_active: bool,
    case_types: Vec<String>,
}

#[derive(Debug, FromRow)]
struct InvitationRow {
    registry_id: Uuid,
    domain: String,
    accepted_on: Option<DateTime<Utc>>,
    rejected_on: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct GrantRow {
    registry_id: Uuid,
    from_domain: String,
    to_domains: Vec<String>,
}

#[async_trait]
impl RegistryRepository for PostgresRegistryRepository {
    async fn create_registry(&self, registry: &DataRegistry) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO data_registries (id, domain, name, slug, is_active, case_types)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(registry.id())
        .bind(registry.domain().as_str())
        .bind(registry.name())
        .bind(registry.slug())
        .bind(registry.is_active())
        .bind(registry.case_types())
        .execute(&mut *transaction)
        .await;

        if let Err(error) = inserted {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23505")
            {
                return Err(AppError::Conflict(format!(
                    "registry '{}' already exists for domain '{}'",
                    registry.slug(),
                    registry.domain()
                )));
            }

            return Err(AppError::Internal(format!(
                "failed to create registry '{}': {error}",
                registry.slug()
            )));
        }

        for invitation in registry.invitations() {
            sqlx::query(
                r#"
                INSERT INTO registry_invitations (registry_id, domain, accepted_on, rejected_on)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(registry.id())
            .bind(invitation.domain().as_str())
            .bind(invitation.accepted_on())
            .bind(invitation.rejected_on())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to store invitation for '{}': {error}",
                    invitation.domain()
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn find_owned(&self, owner: &DomainName, slug: &str) -> AppResult<Option<DataRegistry>> {
        let row = sqlx::query_as::<_, RegistryRow>(
            r#"
            SELECT id, domain, name, slug, is_active, case_types
            FROM data_registries
            WHERE domain = $1 AND slug = $2
            "#,
        )
        .bind(owner.as_str())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find registry '{slug}': {error}")))?;

        self.assemble_one(row).await
    }

    async fn find_by_invited_domain(
        &self,
        domain: &DomainName,
        slug: &str,
    ) -> AppResult<Option<DataRegistry>> {
        let row = sqlx::query_as::<_, RegistryRow>(
            r#"
            SELECT registries.id, registries.domain, registries.name, registries.slug,
                registries.is_active, registries.case_types
            FROM data_registries AS registries
            INNER JOIN registry_invitations AS invitations
                ON invitations.registry_id = registries.id
            WHERE invitations.domain = $1 AND registries.slug = $2
            ORDER BY registries.domain = $1 DESC, registries.created_at
            LIMIT 1
            "#,
        )
        .bind(domain.as_str())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find registry '{slug}' for invited domain '{domain}': {error}"
            ))
        })?;

        self.assemble_one(row).await
    }

    async fn list_owned(&self, owner: &DomainName) -> AppResult<Vec<DataRegistry>> {
        let rows = sqlx::query_as::<_, RegistryRow>(
            r#"
            SELECT id, domain, name, slug, is_active, case_types
            FROM data_registries
            WHERE domain = $1
            ORDER BY name
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list registries of '{owner}': {error}"))
        })?;

        self.assemble(rows).await
    }

    async fn save_invitation(
        &self,
        registry_id: Uuid,
        invitation: &RegistryInvitation,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO registry_invitations (registry_id, domain, accepted_on, rejected_on)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (registry_id, domain)
            DO UPDATE SET accepted_on = EXCLUDED.accepted_on, rejected_on = EXCLUDED.rejected_on
            "#,
        )
        .bind(registry_id)
        .bind(invitation.domain().as_str())
        .bind(invitation.accepted_on())
        .bind(invitation.rejected_on())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save invitation for '{}': {error}",
                invitation.domain()
            ))
        })?;

        Ok(())
    }

    async fn save_grant(&self, registry_id: Uuid, grant: &RegistryGrant) -> AppResult<()> {
        let to_domains: Vec<&str> = grant.to_domains.iter().map(DomainName::as_str).collect();

        sqlx::query(
            r#"
            INSERT INTO registry_grants (registry_id, from_domain, to_domains)
            VALUES ($1, $2, $3)
            ON CONFLICT (registry_id, from_domain)
            DO UPDATE SET to_domains = EXCLUDED.to_domains
            "#,
        )
        .bind(registry_id)
        .bind(grant.from_domain.as_str())
        .bind(&to_domains)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save grant from '{}': {error}",
                grant.from_domain
            ))
        })?;

        Ok(())
    }

    async fn set_active(&self, registry_id: Uuid, is_active: bool) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE data_registries
            SET is_active = $2
            WHERE id = $1
            "#,
        )
        .bind(registry_id)
        .bind(is_active)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update registry {registry_id}: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("registry {registry_id} not found")));
        }

        Ok(())
    }
}

fn stored_domain(value: &str) -> AppResult<DomainName> {
    DomainName::new(value).map_err(|error| {
        AppError::Internal(format!("persisted domain '{value}' is invalid: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use casewell_application::RegistryRepository;
    use casewell_core::{AppError, DomainName};
    use casewell_domain::{DataRegistry, RegistryGrant};
    use chrono::Utc;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    use super::PostgresRegistryRepository;

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    fn domain(prefix: &str) -> DomainName {
        DomainName::new(format!("{prefix}-{}", Uuid::new_v4().simple()))
            .unwrap_or_else(|_| panic!("valid domain"))
    }

    #[tokio::test]
    async fn registry_round_trips_with_invitations_and_grants() {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
            .unwrap_or_else(|error| panic!("failed to connect to DATABASE_URL in test: {error}"));
        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for registry repository tests: {error}");
        }

        let repository = PostgresRegistryRepository::new(pool);
        let owner = domain("owner");
        let partner = domain("partner");
        let mut registry =
            DataRegistry::new(owner.clone(), "Shared people", vec!["person".to_owned()], Utc::now())
                .unwrap_or_else(|_| panic!("valid registry"));
        assert!(repository.create_registry(&registry).await.is_ok());
        assert!(matches!(
            repository.create_registry(&registry).await,
            Err(AppError::Conflict(_))
        ));

        let invitation = registry
            .invite(partner.clone())
            .unwrap_or_else(|_| panic!("invite should succeed"))
            .clone();
        assert!(repository.save_invitation(registry.id(), &invitation).await.is_ok());
        let grant = RegistryGrant {
            from_domain: owner.clone(),
            to_domains: BTreeSet::from([partner.clone()]),
        };
        assert!(repository.save_grant(registry.id(), &grant).await.is_ok());

        let found = repository
            .find_by_invited_domain(&partner, registry.slug())
            .await
            .unwrap_or_else(|error| panic!("lookup should succeed: {error}"))
            .unwrap_or_else(|| panic!("partner should see the invitation"));
        assert_eq!(found.id(), registry.id());
        assert_eq!(found.invitations().len(), 2);
        assert_eq!(found.grants(), &[grant]);

        assert!(repository.set_active(registry.id(), false).await.is_ok());
        let owned = repository
            .list_owned(&owner)
            .await
            .unwrap_or_else(|error| panic!("list should succeed: {error}"));
        assert_eq!(owned.len(), 1);
        assert!(!owned[0].is_active());
    }
}
