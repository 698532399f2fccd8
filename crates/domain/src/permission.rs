use std::collections::BTreeMap;
use std::str::FromStr;

use casewell_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Named permissions a role can grant inside a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows managing web users and roles.
    EditWebUsers,
    /// Allows reading web users and roles.
    ViewWebUsers,
    /// Allows managing mobile workers.
    EditCommcareUsers,
    /// Allows reading mobile workers.
    ViewCommcareUsers,
    /// Allows managing groups.
    EditGroups,
    /// Allows reading groups.
    ViewGroups,
    /// Allows managing locations.
    EditLocations,
    /// Allows reading locations.
    ViewLocations,
    /// Allows editing submitted case and form data.
    EditData,
    /// Allows editing applications.
    EditApps,
    /// Allows reading applications.
    ViewApps,
    /// Allows editing reports.
    EditReports,
    /// Allows viewing reports, optionally limited to listed report slugs.
    ViewReports,
    /// Grants data access regardless of location assignment.
    AccessAllLocations,
    /// Allows API access.
    AccessApi,
    /// Allows using web apps, including case search.
    AccessWebApps,
    /// Allows managing data registries, optionally limited to listed slugs.
    ManageDataRegistry,
    /// Allows reading registry contents, optionally limited to listed slugs.
    ViewDataRegistryContents,
    /// Allows editing the domain case search configuration.
    EditCaseSearchConfig,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EditWebUsers => "edit_web_users",
            Self::ViewWebUsers => "view_web_users",
            Self::EditCommcareUsers => "edit_commcare_users",
            Self::ViewCommcareUsers => "view_commcare_users",
            Self::EditGroups => "edit_groups",
            Self::ViewGroups => "view_groups",
            Self::EditLocations => "edit_locations",
            Self::ViewLocations => "view_locations",
            Self::EditData => "edit_data",
            Self::EditApps => "edit_apps",
            Self::ViewApps => "view_apps",
            Self::EditReports => "edit_reports",
            Self::ViewReports => "view_reports",
            Self::AccessAllLocations => "access_all_locations",
            Self::AccessApi => "access_api",
            Self::AccessWebApps => "access_web_apps",
            Self::ManageDataRegistry => "manage_data_registry",
            Self::ViewDataRegistryContents => "view_data_registry_contents",
            Self::EditCaseSearchConfig => "edit_case_search_config",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::EditWebUsers,
            Permission::ViewWebUsers,
            Permission::EditCommcareUsers,
            Permission::ViewCommcareUsers,
            Permission::EditGroups,
            Permission::ViewGroups,
            Permission::EditLocations,
            Permission::ViewLocations,
            Permission::EditData,
            Permission::EditApps,
            Permission::ViewApps,
            Permission::EditReports,
            Permission::ViewReports,
            Permission::AccessAllLocations,
            Permission::AccessApi,
            Permission::AccessWebApps,
            Permission::ManageDataRegistry,
            Permission::ViewDataRegistryContents,
            Permission::EditCaseSearchConfig,
        ];

        ALL
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

/// Grant scope of one permission.
///
/// A grant is either unrestricted or limited to an explicit item list, so a row
/// can never carry both an allow-all flag and allowed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionAllow {
    /// Every item is allowed.
    All,
    /// Only the listed items are allowed.
    Items(Vec<String>),
}

impl PermissionAllow {
    /// Builds a grant from the relational `allow_all` / `allowed_items` column pair.
    pub fn from_columns(allow_all: bool, allowed_items: Vec<String>) -> AppResult<Self> {
        match (allow_all, allowed_items.is_empty()) {
            (true, true) => Ok(Self::All),
            (true, false) => Err(AppError::Validation(
                "allow_all grants must not list allowed items".to_owned(),
            )),
            (false, _) => Ok(Self::Items(normalize_items(allowed_items))),
        }
    }

    /// Returns the relational `allow_all` / `allowed_items` column pair.
    #[must_use]
    pub fn to_columns(&self) -> (bool, Vec<String>) {
        match self {
            Self::All => (true, Vec::new()),
            Self::Items(items) => (false, items.clone()),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Self::Items(items) if items.is_empty())
    }
}

fn normalize_items(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

/// One permission grant row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionInfo {
    /// Granted permission.
    pub permission: Permission,
    /// Grant scope.
    pub allow: PermissionAllow,
}

/// Full permission set of a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, PermissionAllowValue>",
    into = "BTreeMap<String, PermissionAllowValue>"
)]
pub struct Permissions {
    grants: BTreeMap<Permission, PermissionAllow>,
}

impl Permissions {
    /// Returns an empty permission set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns a permission set granting everything.
    #[must_use]
    pub fn max() -> Self {
        Self {
            grants: Permission::all()
                .iter()
                .map(|permission| (*permission, PermissionAllow::All))
                .collect(),
        }
    }

    /// Builds a permission set from grant rows. Empty item lists grant nothing.
    #[must_use]
    pub fn from_list(rows: impl IntoIterator<Item = PermissionInfo>) -> Self {
        let mut permissions = Self::default();
        for row in rows {
            permissions.grant(row.permission, row.allow);
        }
        permissions
    }

    /// Grants one permission, replacing any previous scope.
    pub fn grant(&mut self, permission: Permission, allow: PermissionAllow) {
        let allow = match allow {
            PermissionAllow::Items(items) => PermissionAllow::Items(normalize_items(items)),
            PermissionAllow::All => PermissionAllow::All,
        };

        if allow.is_empty() {
            self.grants.remove(&permission);
        } else {
            self.grants.insert(permission, allow);
        }
    }

    /// Widens this set with every grant of another set.
    ///
    /// `All` wins over item lists; item lists are unioned.
    pub fn merge(&mut self, other: &Permissions) {
        for (permission, allow) in &other.grants {
            let merged = match (self.grants.remove(permission), allow) {
                (Some(PermissionAllow::All), _) | (_, PermissionAllow::All) => PermissionAllow::All,
                (Some(PermissionAllow::Items(mut items)), PermissionAllow::Items(more)) => {
                    items.extend(more.iter().cloned());
                    PermissionAllow::Items(items)
                }
                (None, PermissionAllow::Items(items)) => PermissionAllow::Items(items.clone()),
            };
            self.grant(*permission, merged);
        }
    }

    /// Returns the grant rows in permission order.
    #[must_use]
    pub fn to_list(&self) -> Vec<PermissionInfo> {
        self.grants
            .iter()
            .map(|(permission, allow)| PermissionInfo {
                permission: *permission,
                allow: allow.clone(),
            })
            .collect()
    }

    /// Returns the grant scope of one permission.
    #[must_use]
    pub fn get(&self, permission: Permission) -> Option<&PermissionAllow> {
        self.grants.get(&permission)
    }

    /// Returns whether the permission is granted for every item.
    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        matches!(self.grants.get(&permission), Some(PermissionAllow::All))
    }

    /// Returns whether the permission is granted for one item.
    #[must_use]
    pub fn allows_item(&self, permission: Permission, item: &str) -> bool {
        match self.grants.get(&permission) {
            Some(PermissionAllow::All) => true,
            Some(PermissionAllow::Items(items)) => items.iter().any(|allowed| allowed == item),
            None => false,
        }
    }

    /// Returns whether nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

/// Transport value of one permission in the document representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionAllowValue {
    /// `true` grants everything, `false` grants nothing.
    Flag(bool),
    /// Explicit allowed items.
    Items(Vec<String>),
}

impl TryFrom<BTreeMap<String, PermissionAllowValue>> for Permissions {
    type Error = AppError;

    fn try_from(value: BTreeMap<String, PermissionAllowValue>) -> Result<Self, Self::Error> {
        let mut permissions = Self::default();
        for (name, allow) in value {
            let permission = Permission::from_str(name.as_str())?;
            match allow {
                PermissionAllowValue::Flag(true) => {
                    permissions.grant(permission, PermissionAllow::All);
                }
                PermissionAllowValue::Flag(false) => {}
                PermissionAllowValue::Items(items) => {
                    permissions.grant(permission, PermissionAllow::Items(items));
                }
            }
        }
        Ok(permissions)
    }
}

impl From<Permissions> for BTreeMap<String, PermissionAllowValue> {
    fn from(value: Permissions) -> Self {
        value
            .grants
            .into_iter()
            .map(|(permission, allow)| {
                let allow = match allow {
                    PermissionAllow::All => PermissionAllowValue::Flag(true),
                    PermissionAllow::Items(items) => PermissionAllowValue::Items(items),
                };
                (permission.as_str().to_owned(), allow)
            })
            .collect()
    }
}

/// Row-level changes that turn stored grant rows into a desired permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionChanges {
    /// Rows to insert.
    pub insert: Vec<PermissionInfo>,
    /// Rows whose scope changed.
    pub update: Vec<PermissionInfo>,
    /// Permissions whose rows must be removed.
    pub delete: Vec<Permission>,
}

impl PermissionChanges {
    /// Computes the diff between stored rows and a desired permission set.
    #[must_use]
    pub fn between(existing: &[PermissionInfo], desired: &Permissions) -> Self {
        let existing: BTreeMap<Permission, &PermissionAllow> = existing
            .iter()
            .map(|row| (row.permission, &row.allow))
            .collect();

        let mut changes = Self::default();
        for row in desired.to_list() {
            match existing.get(&row.permission) {
                None => changes.insert.push(row),
                Some(stored) if **stored != row.allow => changes.update.push(row),
                Some(_) => {}
            }
        }

        changes.delete = existing
            .keys()
            .filter(|permission| desired.get(**permission).is_none())
            .copied()
            .collect();

        changes
    }

    /// Returns whether no row changes are needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}
