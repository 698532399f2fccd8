use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;

use casewell_application::{RelationalRoleRepository, RoleWrite};
use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::{
    LandingPage, Permission, PermissionAllow, PermissionChanges, PermissionInfo, Permissions,
    RoleFields, RoleRecord,
};


/// PostgreSQL-backed relational role repository.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_records(&self, rows: Vec<RoleRow>) -> AppResult<Vec<RoleRecord>> {
        let role_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

        let permission_rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT grants.role_id, permissions.value, grants.allow_all, grants.allowed_items
            FROM users_rolepermission AS grants
            INNER JOIN users_permission AS permissions
                ON permissions.id = grants.permission_fk
            WHERE grants.role_id = ANY($1)
            ORDER BY grants.role_id, permissions.value
            "#,
        )
        .bind(&role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role permissions: {error}")))?;

        let assignable_rows = sqlx::query_as::<_, AssignableByRow>(
            r#"
            SELECT role_id, assignable_by_role_id
            FROM users_roleassignableby
            WHERE role_id = ANY($1)
            ORDER BY role_id, assignable_by_role_id
            "#,
        )
        .bind(&role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load role assignable-by rows: {error}"))
        })?;

        let mut permissions: BTreeMap<i64, Vec<PermissionInfo>> = BTreeMap::new();
        for row in permission_rows {
            let role_id = row.role_id;
            permissions
                .entry(role_id)
                .or_default()
                .push(row.into_permission_info()?);
        }

        let mut assignable_by: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for row in assignable_rows {
            assignable_by
                .entry(row.role_id)
                .or_default()
                .push(row.assignable_by_role_id);
        }

        rows.into_iter()
            .map(|row| {
                let role_id = row.id;
                row.into_record(
                    permissions.remove(&role_id).unwrap_or_default(),
                    assignable_by.remove(&role_id).unwrap_or_default(),
                )
            })
            .collect()
    }

    async fn load_one(&self, row: Option<RoleRow>) -> AppResult<Option<RoleRecord>> {
        let Some(row) = row else {
            return Ok(None);
        };

        Ok(self.load_records(vec![row]).await?.into_iter().next())
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    domain: String,
    name: Option<String>,
    default_landing_page: Option<String>,
    is_non_admin_editable: bool,
    is_archived: bool,
    upstream_id: Option<i64>,
    document_id: Option<String>,
}

impl RoleRow {
    fn into_record(
        self,
        permissions: Vec<PermissionInfo>,
        assignable_by: Vec<i64>,
    ) -> AppResult<RoleRecord> {
        let domain = DomainName::new(self.domain.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "persisted role {} has invalid domain '{}': {error}",
                self.id, self.domain
            ))
        })?;
        let default_landing_page = self
            .default_landing_page
            .as_deref()
            .map(LandingPage::from_str)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!(
                    "persisted role {} has invalid landing page: {error}",
                    self.id
                ))
            })?;

        Ok(RoleRecord {
            id: self.id,
            fields: RoleFields {
                domain,
                name: self.name,
                default_landing_page,
                is_non_admin_editable: self.is_non_admin_editable,
                is_archived: self.is_archived,
            },
            upstream_id: self.upstream_id,
            document_id: self.document_id,
            permissions,
            assignable_by,
        })
    }
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: i64,
    value: String,
    allow_all: bool,
    allowed_items: Vec<String>,
}

impl RolePermissionRow {
    fn into_permission_info(self) -> AppResult<PermissionInfo> {
        let permission = Permission::from_str(self.value.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode permission '{}' for role {}: {error}",
                self.value, self.role_id
            ))
        })?;
        let allow = PermissionAllow::from_columns(self.allow_all, self.allowed_items).map_err(
            |error| {
                AppError::Internal(format!(
                    "persisted grant '{}' for role {} is invalid: {error}",
                    self.value, self.role_id
                ))
            },
        )?;

        Ok(PermissionInfo { permission, allow })
    }
}

#[derive(Debug, FromRow)]
struct AssignableByRow {
    role_id: i64,
    assignable_by_role_id: i64,
}

const ROLE_COLUMNS: &str = r#"
    id,
    domain,
    name,
    default_landing_page,
    is_non_admin_editable,
    is_archived,
    upstream_id,
    document_id
"#;

#[async_trait]
impl RelationalRoleRepository for PostgresRoleRepository {
    async fn find_role(&self, role_id: i64) -> AppResult<Option<RoleRecord>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM users_userrole WHERE id = $1"
        ))
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role {role_id}: {error}")))?;

        self.load_one(row).await
    }

    async fn find_role_by_document_id(&self, document_id: &str) -> AppResult<Option<RoleRecord>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM users_userrole WHERE document_id = $1"
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find role for document '{document_id}': {error}"
            ))
        })?;

        self.load_one(row).await
    }

    async fn list_roles(
        &self,
        domain: &DomainName,
        include_archived: bool,
    ) -> AppResult<Vec<RoleRecord>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            r#"
            SELECT {ROLE_COLUMNS}
            FROM users_userrole
            WHERE domain = $1 AND ($2 OR NOT is_archived)
            ORDER BY id
            "#
        ))
        .bind(domain.as_str())
        .bind(include_archived)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list roles for domain '{domain}': {error}"))
        })?;

        self.load_records(rows).await
    }

    async fn insert_role(
        &self,
        fields: &RoleFields,
        upstream_id: Option<i64>,
        document_id: Option<&str>,
    ) -> AppResult<RoleRecord> {
        let mut transaction = begin(&self.pool).await?;
        let role_id = insert_role_row(&mut transaction, fields, upstream_id, document_id).await?;
        commit(transaction).await?;

        Ok(RoleRecord {
            id: role_id,
            fields: fields.clone(),
            upstream_id,
            document_id: document_id.map(str::to_owned),
            permissions: Vec::new(),
            assignable_by: Vec::new(),
        })
    }

    async fn update_role(
        &self,
        role_id: i64,
        fields: &RoleFields,
        upstream_id: Option<i64>,
    ) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        update_role_row(&mut transaction, role_id, fields, upstream_id).await?;
        commit(transaction).await
    }

    async fn write_role(&self, write: &RoleWrite) -> AppResult<i64> {
        let mut transaction = begin(&self.pool).await?;

        let role_id = match write.role_id {
            Some(role_id) => {
                update_role_row(&mut transaction, role_id, &write.fields, write.upstream_id)
                    .await?;
                role_id
            }
            None => {
                insert_role_row(&mut transaction, &write.fields, write.upstream_id, None).await?
            }
        };
        apply_permissions(&mut transaction, role_id, &write.permissions).await?;
        replace_assignable_by(&mut transaction, role_id, &write.assignable_by).await?;

        commit(transaction).await?;
        debug!(role_id, domain = %write.fields.domain, "role written");

        Ok(role_id)
    }

    async fn set_document_id(&self, role_id: i64, document_id: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users_userrole
            SET document_id = $2, modified_at = now()
            WHERE id = $1
            "#,
        )
        .bind(role_id)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(|error| map_document_conflict(error, document_id))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role {role_id} not found")));
        }

        Ok(())
    }

    async fn set_permissions(&self, role_id: i64, permissions: &Permissions) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        apply_permissions(&mut transaction, role_id, permissions).await?;
        commit(transaction).await
    }

    async fn set_assignable_by(&self, role_id: i64, assignable_by: &[i64]) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        replace_assignable_by(&mut transaction, role_id, assignable_by).await?;
        commit(transaction).await
    }
}

async fn insert_role_row(
    transaction: &mut Transaction<'static, Postgres>,
    fields: &RoleFields,
    upstream_id: Option<i64>,
    document_id: Option<&str>,
) -> AppResult<i64> {
    let role_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO users_userrole (
            domain,
            name,
            default_landing_page,
            is_non_admin_editable,
            is_archived,
            upstream_id,
            document_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(fields.domain.as_str())
    .bind(fields.name.as_deref())
    .bind(fields.default_landing_page.map(|page| page.as_str()))
    .bind(fields.is_non_admin_editable)
    .bind(fields.is_archived)
    .bind(upstream_id)
    .bind(document_id)
    .fetch_one(&mut **transaction)
    .await
    .map_err(|error| map_document_conflict(error, document_id.unwrap_or_default()))?;

    debug!(role_id, domain = %fields.domain, "role row inserted");
    Ok(role_id)
}

async fn update_role_row(
    transaction: &mut Transaction<'static, Postgres>,
    role_id: i64,
    fields: &RoleFields,
    upstream_id: Option<i64>,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE users_userrole
        SET domain = $2,
            name = $3,
            default_landing_page = $4,
            is_non_admin_editable = $5,
            is_archived = $6,
            upstream_id = $7,
            modified_at = now()
        WHERE id = $1
        "#,
    )
    .bind(role_id)
    .bind(fields.domain.as_str())
    .bind(fields.name.as_deref())
    .bind(fields.default_landing_page.map(|page| page.as_str()))
    .bind(fields.is_non_admin_editable)
    .bind(fields.is_archived)
    .bind(upstream_id)
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to update role {role_id}: {error}")))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("role {role_id} not found")));
    }

    Ok(())
}

async fn apply_permissions(
    transaction: &mut Transaction<'static, Postgres>,
    role_id: i64,
    permissions: &Permissions,
) -> AppResult<()> {
    let existing = sqlx::query_as::<_, RolePermissionRow>(
        r#"
        SELECT grants.role_id, permissions.value, grants.allow_all, grants.allowed_items
        FROM users_rolepermission AS grants
        INNER JOIN users_permission AS permissions
            ON permissions.id = grants.permission_fk
        WHERE grants.role_id = $1
        FOR UPDATE OF grants
        "#,
    )
    .bind(role_id)
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to lock permissions of role {role_id}: {error}"
        ))
    })?
    .into_iter()
    .map(RolePermissionRow::into_permission_info)
    .collect::<AppResult<Vec<_>>>()?;

    let changes = PermissionChanges::between(&existing, permissions);
    if changes.is_empty() {
        return Ok(());
    }

    for row in &changes.insert {
        let permission_id = ensure_permission(transaction, row.permission).await?;
        let (allow_all, allowed_items) = row.allow.to_columns();
        sqlx::query(
            r#"
            INSERT INTO users_rolepermission (role_id, permission_fk, allow_all, allowed_items)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(allow_all)
        .bind(&allowed_items)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to grant '{}' to role {role_id}: {error}",
                row.permission.as_str()
            ))
        })?;
    }

    for row in &changes.update {
        let (allow_all, allowed_items) = row.allow.to_columns();
        sqlx::query(
            r#"
            UPDATE users_rolepermission AS grants
            SET allow_all = $3, allowed_items = $4
            FROM users_permission AS permissions
            WHERE grants.permission_fk = permissions.id
                AND grants.role_id = $1
                AND permissions.value = $2
            "#,
        )
        .bind(role_id)
        .bind(row.permission.as_str())
        .bind(allow_all)
        .bind(&allowed_items)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update '{}' on role {role_id}: {error}",
                row.permission.as_str()
            ))
        })?;
    }

    if !changes.delete.is_empty() {
        let removed: Vec<&str> = changes
            .delete
            .iter()
            .map(|permission| permission.as_str())
            .collect();
        sqlx::query(
            r#"
            DELETE FROM users_rolepermission AS grants
            USING users_permission AS permissions
            WHERE grants.permission_fk = permissions.id
                AND grants.role_id = $1
                AND permissions.value = ANY($2)
            "#,
        )
        .bind(role_id)
        .bind(&removed)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to revoke permissions of role {role_id}: {error}"
            ))
        })?;
    }

    debug!(
        role_id,
        inserted = changes.insert.len(),
        updated = changes.update.len(),
        deleted = changes.delete.len(),
        "role permissions updated"
    );

    Ok(())
}

async fn replace_assignable_by(
    transaction: &mut Transaction<'static, Postgres>,
    role_id: i64,
    assignable_by: &[i64],
) -> AppResult<()> {
    sqlx::query(
        r#"
        DELETE FROM users_roleassignableby
        WHERE role_id = $1 AND NOT (assignable_by_role_id = ANY($2))
        "#,
    )
    .bind(role_id)
    .bind(assignable_by)
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to remove assignable-by rows of role {role_id}: {error}"
        ))
    })?;

    sqlx::query(
        r#"
        INSERT INTO users_roleassignableby (role_id, assignable_by_role_id)
        SELECT $1, assigner_id
        FROM unnest($2::bigint[]) AS assigners (assigner_id)
        ON CONFLICT (role_id, assignable_by_role_id) DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(assignable_by)
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to add assignable-by rows of role {role_id}: {error}"
        ))
    })?;

    Ok(())
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

async fn commit(transaction: Transaction<'static, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

async fn ensure_permission(
    transaction: &mut Transaction<'static, Postgres>,
    permission: Permission,
) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO users_permission (value)
        VALUES ($1)
        ON CONFLICT (value) DO UPDATE SET value = EXCLUDED.value
        RETURNING id
        "#,
    )
    .bind(permission.as_str())
    .fetch_one(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to register permission '{}': {error}",
            permission.as_str()
        ))
    })
}

fn map_document_conflict(error: sqlx::Error, document_id: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "document id '{document_id}' is already linked to another role"
        ));
    }

    AppError::Internal(format!("failed to write role row: {error}"))
}
