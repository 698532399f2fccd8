use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for registry creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-registry-request.ts"
)]
pub struct CreateRegistryRequest {
    pub name: String,
    pub case_types: Vec<String>,
}

/// Incoming payload for inviting a domain.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/invite-domain-request.ts"
)]
pub struct InviteDomainRequest {
    pub domain: String,
}

/// Incoming payload for granting the caller's data to other domains.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/grant-access-request.ts"
)]
pub struct GrantAccessRequest {
    pub to_domains: Vec<String>,
}

/// Query parameters of a registry case fetch.
#[derive(Debug, Deserialize)]
pub struct RegistryCaseQuery {
    pub case_type: String,
    #[serde(default)]
    pub include_descendants: bool,
}

/// API representation of a registry invitation.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/registry-invitation-response.ts"
)]
pub struct RegistryInvitationResponse {
    pub domain: String,
    pub status: String,
    pub accepted_on: Option<String>,
    pub rejected_on: Option<String>,
}

/// API representation of a registry grant.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/registry-grant-response.ts"
)]
pub struct RegistryGrantResponse {
    pub from_domain: String,
    pub to_domains: Vec<String>,
}

/// API representation of a data registry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/registry-response.ts"
)]
pub struct RegistryResponse {
    pub id: String,
    pub domain: String,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub case_types: Vec<String>,
    pub invitations: Vec<RegistryInvitationResponse>,
    pub grants: Vec<RegistryGrantResponse>,
}

/// Domains whose data is visible through a registry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/visible-domains-response.ts"
)]
pub struct VisibleDomainsResponse {
    pub domains: Vec<String>,
}

/// API representation of a case relationship.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/case-index-response.ts"
)]
pub struct CaseIndexResponse {
    pub identifier: String,
    pub referenced_type: String,
    pub referenced_id: String,
    pub relationship: String,
}

/// API representation of a case fetched through a registry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/case-response.ts"
)]
pub struct CaseResponse {
    pub case_id: String,
    pub domain: String,
    pub case_type: String,
    pub name: Option<String>,
    pub owner_id: Option<String>,
    pub closed: bool,
    pub indices: Vec<CaseIndexResponse>,
    pub properties: BTreeMap<String, String>,
}
