use async_trait::async_trait;
use casewell_core::{AppResult, DomainName};
use casewell_domain::{DataRegistry, RegistryGrant, RegistryInvitation};
use uuid::Uuid;

/// Repository port for data registries with their invitations and grants.
#[async_trait]
pub trait RegistryRepository: Send + Sync {
    /// Stores a new registry including its initial invitations.
    async fn create_registry(&self, registry: &DataRegistry) -> AppResult<()>;

    /// Finds a registry owned by a domain.
    async fn find_owned(&self, owner: &DomainName, slug: &str) -> AppResult<Option<DataRegistry>>;

    /// Finds a registry the domain has been invited to, whatever the invitation status.
    async fn find_by_invited_domain(
        &self,
        domain: &DomainName,
        slug: &str,
    ) -> AppResult<Option<DataRegistry>>;

    /// Lists registries owned by a domain.
    async fn list_owned(&self, owner: &DomainName) -> AppResult<Vec<DataRegistry>>;

    /// Inserts or updates one invitation.
    async fn save_invitation(
        &self,
        registry_id: Uuid,
        invitation: &RegistryInvitation,
    ) -> AppResult<()>;

    /// Inserts or replaces the grant issued by `grant.from_domain`.
    async fn save_grant(&self, registry_id: Uuid, grant: &RegistryGrant) -> AppResult<()>;

    /// Updates the active flag.
    async fn set_active(&self, registry_id: Uuid, is_active: bool) -> AppResult<()>;
}
