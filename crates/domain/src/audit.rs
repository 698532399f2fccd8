use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a role is created or updated.
    RoleSaved,
    /// Emitted when a role is archived.
    RoleArchived,
    /// Emitted when roles of a domain are reconciled across stores.
    RolesSynced,
    /// Emitted when the case search configuration changes.
    CaseSearchConfigSaved,
    /// Emitted when a data registry is created.
    RegistryCreated,
    /// Emitted when a data registry is deactivated.
    RegistryDeactivated,
    /// Emitted when a domain is invited to a registry.
    RegistryInvitationSent,
    /// Emitted when an invitation is accepted.
    RegistryInvitationAccepted,
    /// Emitted when an invitation is rejected.
    RegistryInvitationRejected,
    /// Emitted when a registry grant changes.
    RegistryGrantSaved,
    /// Emitted when registry data from another domain is read.
    RegistryDataAccessed,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleSaved => "role.saved",
            Self::RoleArchived => "role.archived",
            Self::RolesSynced => "role.synced",
            Self::CaseSearchConfigSaved => "case_search.config.saved",
            Self::RegistryCreated => "registry.created",
            Self::RegistryDeactivated => "registry.deactivated",
            Self::RegistryInvitationSent => "registry.invitation.sent",
            Self::RegistryInvitationAccepted => "registry.invitation.accepted",
            Self::RegistryInvitationRejected => "registry.invitation.rejected",
            Self::RegistryGrantSaved => "registry.grant.saved",
            Self::RegistryDataAccessed => "registry.data.accessed",
        }
    }
}
