use std::str::FromStr;

use casewell_core::{AppError, AppResult, DomainName};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{PermissionInfo, Permissions};

/// Page a user lands on after signing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingPage {
    /// Project dashboard.
    Dashboard,
    /// Web apps home.
    Webapps,
    /// Report list.
    Reports,
    /// Data downloads.
    Downloads,
}

impl LandingPage {
    /// Returns a stable storage value for this landing page.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Webapps => "webapps",
            Self::Reports => "reports",
            Self::Downloads => "downloads",
        }
    }
}

impl FromStr for LandingPage {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "dashboard" => Ok(Self::Dashboard),
            "webapps" => Ok(Self::Webapps),
            "reports" => Ok(Self::Reports),
            "downloads" => Ok(Self::Downloads),
            _ => Err(AppError::Validation(format!(
                "unknown landing page '{value}'"
            ))),
        }
    }
}

/// Fields copied verbatim between both role representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFields {
    /// Owning domain.
    pub domain: DomainName,
    /// Role name; unnamed roles are allowed for legacy defaults.
    pub name: Option<String>,
    /// Landing page override.
    pub default_landing_page: Option<LandingPage>,
    /// Whether non-admin users may edit the role.
    pub is_non_admin_editable: bool,
    /// Archived roles are kept for history but cannot be assigned.
    pub is_archived: bool,
}

impl RoleFields {
    /// Creates validated fields for a named role.
    pub fn new(domain: DomainName, name: impl Into<String>) -> AppResult<Self> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("role name must not be empty".to_owned()));
        }

        Ok(Self {
            domain,
            name: Some(name.to_owned()),
            default_landing_page: None,
            is_non_admin_editable: false,
            is_archived: false,
        })
    }
}

/// Relational representation of a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    /// Relational primary key.
    pub id: i64,
    /// Synchronised fields.
    pub fields: RoleFields,
    /// Upstream role this role was linked from.
    pub upstream_id: Option<i64>,
    /// Identifier of the document counterpart, once allocated.
    pub document_id: Option<String>,
    /// Permission grant rows.
    pub permissions: Vec<PermissionInfo>,
    /// Relational ids of roles allowed to assign this role.
    pub assignable_by: Vec<i64>,
}

impl RoleRecord {
    /// Returns the permission set assembled from grant rows.
    #[must_use]
    pub fn permission_set(&self) -> Permissions {
        Permissions::from_list(self.permissions.iter().cloned())
    }

    /// Returns the dictionary view of the relational role.
    ///
    /// `_id` is only present once the role is linked to a document.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "domain": self.fields.domain.as_str(),
            "name": self.fields.name,
            "default_landing_page": self.fields.default_landing_page.map(|page| page.as_str()),
            "is_non_admin_editable": self.fields.is_non_admin_editable,
            "is_archived": self.fields.is_archived,
            "upstream_id": self.upstream_id,
            "permissions": self.permission_set(),
            "assignable_by": self.assignable_by,
        });
        if self.document_id.is_some()
            && let Some(object) = value.as_object_mut()
        {
            object.insert("_id".to_owned(), json!(self.id));
        }
        value
    }
}

/// Document representation of a role, serialised in the document store shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDocument {
    /// Document identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Synchronised fields.
    #[serde(flatten)]
    pub fields: RoleFields,
    /// Upstream role document identifier.
    #[serde(default)]
    pub upstream_id: Option<String>,
    /// Full permission set.
    #[serde(default)]
    pub permissions: Permissions,
    /// Document ids of roles allowed to assign this role.
    #[serde(default)]
    pub assignable_by: Vec<String>,
}

impl RoleDocument {
    /// Projects a relational role onto its document counterpart.
    ///
    /// References are passed already translated to document ids.
    #[must_use]
    pub fn project(
        record: &RoleRecord,
        document_id: impl Into<String>,
        upstream_id: Option<String>,
        assignable_by: Vec<String>,
    ) -> Self {
        let mut assignable_by = assignable_by;
        assignable_by.sort();
        assignable_by.dedup();

        Self {
            id: document_id.into(),
            fields: record.fields.clone(),
            upstream_id,
            permissions: record.permission_set(),
            assignable_by,
        }
    }

    /// Returns the identifier used when assigning this role to users.
    #[must_use]
    pub fn qualified_id(&self) -> String {
        format!("{USER_ROLE_PREFIX}{}", self.id)
    }
}

/// Prefix of qualified ids that reference stored roles.
pub const USER_ROLE_PREFIX: &str = "user-role:";

/// Roles that exist in every domain without being stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRole {
    fields: RoleFields,
    permissions: Permissions,
}

impl StaticRole {
    /// Qualified id of the domain admin role.
    pub const ADMIN_QUALIFIED_ID: &'static str = "admin";

    /// Returns the admin role holding every permission.
    #[must_use]
    pub fn domain_admin(domain: DomainName) -> Self {
        Self {
            fields: RoleFields {
                domain,
                name: Some("Admin".to_owned()),
                default_landing_page: None,
                is_non_admin_editable: false,
                is_archived: false,
            },
            permissions: Permissions::max(),
        }
    }

    /// Returns the unnamed default role without permissions.
    #[must_use]
    pub fn domain_default(domain: DomainName) -> Self {
        Self {
            fields: RoleFields {
                domain,
                name: None,
                default_landing_page: None,
                is_non_admin_editable: false,
                is_archived: false,
            },
            permissions: Permissions::none(),
        }
    }

    /// Returns the role fields.
    #[must_use]
    pub fn fields(&self) -> &RoleFields {
        &self.fields
    }

    /// Returns the permission set.
    #[must_use]
    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// Returns the lower-case role name used as qualified id.
    #[must_use]
    pub fn qualified_id(&self) -> String {
        self.fields
            .name
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
    }
}
