use casewell_domain::{CaseDocument, DataRegistry};

use super::types::{
    CaseIndexResponse, CaseResponse, RegistryGrantResponse, RegistryInvitationResponse,
    RegistryResponse,
};

impl From<DataRegistry> for RegistryResponse {
    fn from(value: DataRegistry) -> Self {
        Self {
            id: value.id().to_string(),
            domain: value.domain().as_str().to_owned(),
            name: value.name().to_owned(),
            slug: value.slug().to_owned(),
            is_active: value.is_active(),
            case_types: value.case_types().to_vec(),
            invitations: value
                .invitations()
                .iter()
                .map(|invitation| RegistryInvitationResponse {
                    domain: invitation.domain().as_str().to_owned(),
                    status: invitation.status().as_str().to_owned(),
                    accepted_on: invitation.accepted_on().map(|at| at.to_rfc3339()),
                    rejected_on: invitation.rejected_on().map(|at| at.to_rfc3339()),
                })
                .collect(),
            grants: value
                .grants()
                .iter()
                .map(|grant| RegistryGrantResponse {
                    from_domain: grant.from_domain.as_str().to_owned(),
                    to_domains: grant
                        .to_domains
                        .iter()
                        .map(|domain| domain.as_str().to_owned())
                        .collect(),
                })
                .collect(),
        }
    }
}

impl From<CaseDocument> for CaseResponse {
    fn from(value: CaseDocument) -> Self {
        Self {
            case_id: value.case_id,
            domain: value.domain,
            case_type: value.case_type,
            name: value.name,
            owner_id: value.owner_id,
            closed: value.closed,
            indices: value
                .indices
                .into_iter()
                .map(|index| CaseIndexResponse {
                    identifier: index.identifier,
                    referenced_type: index.referenced_type,
                    referenced_id: index.referenced_id,
                    relationship: index.relationship,
                })
                .collect(),
            properties: value
                .case_properties
                .into_iter()
                .map(|property| (property.key, property.value))
                .collect(),
        }
    }
}
