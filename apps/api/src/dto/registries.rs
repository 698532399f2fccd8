mod conversions;
mod types;

pub use types::{
    CaseIndexResponse, CaseResponse, CreateRegistryRequest, GrantAccessRequest,
    InviteDomainRequest, RegistryCaseQuery, RegistryGrantResponse, RegistryInvitationResponse,
    RegistryResponse, VisibleDomainsResponse,
};
