use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use casewell_core::DomainName;

use crate::dto::{
    CaseResponse, CreateRegistryRequest, GrantAccessRequest, InviteDomainRequest,
    RegistryCaseQuery, RegistryResponse, VisibleDomainsResponse,
};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedSubject;
use crate::state::AppState;

mod access;
mod management;

pub use access::{registry_case_handler, visible_domains_handler};
pub use management::{
    accept_invitation_handler, create_registry_handler, deactivate_registry_handler,
    grant_access_handler, invite_domain_handler, list_registries_handler,
    reject_invitation_handler,
};
