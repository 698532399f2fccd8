use std::str::FromStr;

use async_trait::async_trait;

use casewell_application::AuthorizationRepository;
use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::{
    Permission, PermissionAllow, PermissionInfo, Permissions, StaticRole, USER_ROLE_PREFIX,
};

use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for subject permission lookups.
///
/// Subjects hold qualified role ids: the static `admin` role grants every
/// permission, `user-role:<document_id>` resolves to a stored role.
#[derive(Clone)]
pub struct PostgresAuthorizationRepository {
    pool: PgPool,
}

impl PostgresAuthorizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    role_qualified_id: String,
}

#[derive(Debug, FromRow)]
struct GrantRow {
    value: String,
    allow_all: bool,
    allowed_items: Vec<String>,
}

#[async_trait]
impl AuthorizationRepository for PostgresAuthorizationRepository {
    async fn permissions_for_subject(
        &self,
        domain: &DomainName,
        subject: &str,
    ) -> AppResult<Permissions> {
        let assignments = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT role_qualified_id
            FROM user_role_assignments
            WHERE domain = $1 AND subject = $2
            "#,
        )
        .bind(domain.as_str())
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role assignments: {error}")))?;

        if assignments
            .iter()
            .any(|row| row.role_qualified_id == StaticRole::ADMIN_QUALIFIED_ID)
        {
            return Ok(StaticRole::domain_admin(domain.clone()).permissions().clone());
        }

        let document_ids: Vec<&str> = assignments
            .iter()
            .filter_map(|row| row.role_qualified_id.strip_prefix(USER_ROLE_PREFIX))
            .collect();
        if document_ids.is_empty() {
            return Ok(Permissions::none());
        }

        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT permissions.value, grants.allow_all, grants.allowed_items
            FROM users_userrole AS roles
            INNER JOIN users_rolepermission AS grants
                ON grants.role_id = roles.id
            INNER JOIN users_permission AS permissions
                ON permissions.id = grants.permission_fk
            WHERE roles.domain = $1
                AND roles.document_id = ANY($2)
                AND NOT roles.is_archived
            "#,
        )
        .bind(domain.as_str())
        .bind(&document_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permissions: {error}")))?;

        let mut permissions = Permissions::none();
        for row in rows {
            let permission = Permission::from_str(row.value.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode permission '{}' for domain '{domain}': {error}",
                    row.value
                ))
            })?;
            let allow = PermissionAllow::from_columns(row.allow_all, row.allowed_items)?;
            permissions.merge(&Permissions::from_list([PermissionInfo { permission, allow }]));
        }

        Ok(permissions)
    }
}
