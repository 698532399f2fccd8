use std::collections::BTreeSet;

use casewell_core::{AppError, AppResult, DomainName, NonEmptyString};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const SLUG_STOP_WORDS: &[&str] = &["a", "an", "and", "of", "the"];

/// Builds a URL slug from a registry name, dropping stop words.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split(|character: char| !character.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .filter(|word| !SLUG_STOP_WORDS.contains(&word.as_str()))
        .collect::<Vec<_>>()
        .join("-")
}

/// Invitation of one domain to participate in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInvitation {
    domain: DomainName,
    accepted_on: Option<DateTime<Utc>>,
    rejected_on: Option<DateTime<Utc>>,
}

/// Response state of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    /// Not answered yet.
    Pending,
    /// Accepted and not rejected since.
    Accepted,
    /// Rejected.
    Rejected,
}

impl InvitationStatus {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl RegistryInvitation {
    /// Creates a pending invitation.
    #[must_use]
    pub fn new(domain: DomainName) -> Self {
        Self {
            domain,
            accepted_on: None,
            rejected_on: None,
        }
    }

    /// Restores an invitation from storage.
    #[must_use]
    pub fn from_parts(
        domain: DomainName,
        accepted_on: Option<DateTime<Utc>>,
        rejected_on: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            domain,
            accepted_on,
            rejected_on,
        }
    }

    /// Returns the invited domain.
    #[must_use]
    pub fn domain(&self) -> &DomainName {
        &self.domain
    }

    /// Returns the acceptance timestamp.
    #[must_use]
    pub fn accepted_on(&self) -> Option<DateTime<Utc>> {
        self.accepted_on
    }

    /// Returns the rejection timestamp.
    #[must_use]
    pub fn rejected_on(&self) -> Option<DateTime<Utc>> {
        self.rejected_on
    }

    /// Returns the response state.
    #[must_use]
    pub fn status(&self) -> InvitationStatus {
        match (self.accepted_on, self.rejected_on) {
            (_, Some(_)) => InvitationStatus::Rejected,
            (Some(_), None) => InvitationStatus::Accepted,
            (None, None) => InvitationStatus::Pending,
        }
    }

    /// Accepts the invitation, clearing any earlier rejection.
    pub fn accept(&mut self, now: DateTime<Utc>) {
        self.accepted_on = Some(now);
        self.rejected_on = None;
    }

    /// Rejects the invitation.
    pub fn reject(&mut self, now: DateTime<Utc>) {
        self.rejected_on = Some(now);
    }
}

/// Grant from one participating domain to others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryGrant {
    /// Domain whose data becomes visible.
    pub from_domain: DomainName,
    /// Domains that may see it.
    pub to_domains: BTreeSet<DomainName>,
}

/// Cross-domain data registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRegistry {
    id: Uuid,
    domain: DomainName,
    name: String,
    slug: String,
    is_active: bool,
    case_types: Vec<String>,
    invitations: Vec<RegistryInvitation>,
    grants: Vec<RegistryGrant>,
}

impl DataRegistry {
    /// Creates an active registry owned by a domain.
    ///
    /// The owning domain is invited and accepted on creation.
    pub fn new(
        domain: DomainName,
        name: impl Into<String>,
        case_types: Vec<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let name = String::from(NonEmptyString::new(name.into().trim())?);
        let slug = slugify(name.as_str());
        if slug.is_empty() {
            return Err(AppError::Validation(format!(
                "registry name '{name}' must contain at least one word"
            )));
        }

        let mut case_types: Vec<String> = case_types
            .into_iter()
            .map(|case_type| case_type.trim().to_owned())
            .filter(|case_type| !case_type.is_empty())
            .collect();
        case_types.sort();
        case_types.dedup();
        if case_types.is_empty() {
            return Err(AppError::Validation(
                "registry must declare at least one case type".to_owned(),
            ));
        }

        let mut owner_invitation = RegistryInvitation::new(domain.clone());
        owner_invitation.accept(now);

        Ok(Self {
            id: Uuid::new_v4(),
            domain,
            name,
            slug,
            is_active: true,
            case_types,
            invitations: vec![owner_invitation],
            grants: Vec::new(),
        })
    }

    /// Restores a registry from storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_parts(
        id: Uuid,
        domain: DomainName,
        name: String,
        slug: String,
        is_active: bool,
        case_types: Vec<String>,
        invitations: Vec<RegistryInvitation>,
        grants: Vec<RegistryGrant>,
    ) -> Self {
        Self {
            id,
            domain,
            name,
            slug,
            is_active,
            case_types,
            invitations,
            grants,
        }
    }

    /// Returns the registry id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the owning domain.
    #[must_use]
    pub fn domain(&self) -> &DomainName {
        &self.domain
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the slug.
    #[must_use]
    pub fn slug(&self) -> &str {
        self.slug.as_str()
    }

    /// Returns whether the registry is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the case types shared through the registry.
    #[must_use]
    pub fn case_types(&self) -> &[String] {
        &self.case_types
    }

    /// Returns all invitations.
    #[must_use]
    pub fn invitations(&self) -> &[RegistryInvitation] {
        &self.invitations
    }

    /// Returns all grants.
    #[must_use]
    pub fn grants(&self) -> &[RegistryGrant] {
        &self.grants
    }

    /// Returns the invitation of one domain.
    #[must_use]
    pub fn invitation(&self, domain: &DomainName) -> Option<&RegistryInvitation> {
        self.invitations
            .iter()
            .find(|invitation| invitation.domain() == domain)
    }

    /// Deactivates the registry.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Invites a domain.
    pub fn invite(&mut self, domain: DomainName) -> AppResult<&RegistryInvitation> {
        if self.invitation(&domain).is_some() {
            return Err(AppError::Conflict(format!(
                "domain '{domain}' is already invited to registry '{}'",
                self.slug
            )));
        }

        self.invitations.push(RegistryInvitation::new(domain));
        self.invitations
            .last()
            .ok_or_else(|| AppError::Internal("invitation was not recorded".to_owned()))
    }

    /// Accepts the invitation of a domain.
    pub fn accept_invitation(
        &mut self,
        domain: &DomainName,
        now: DateTime<Utc>,
    ) -> AppResult<&RegistryInvitation> {
        let invitation = self.invitation_mut(domain)?;
        invitation.accept(now);
        Ok(invitation)
    }

    /// Rejects the invitation of a domain.
    pub fn reject_invitation(
        &mut self,
        domain: &DomainName,
        now: DateTime<Utc>,
    ) -> AppResult<&RegistryInvitation> {
        if domain == &self.domain {
            return Err(AppError::Validation(
                "the owning domain cannot reject its own registry".to_owned(),
            ));
        }
        let invitation = self.invitation_mut(domain)?;
        invitation.reject(now);
        Ok(invitation)
    }

    fn invitation_mut(&mut self, domain: &DomainName) -> AppResult<&mut RegistryInvitation> {
        let slug = self.slug.clone();
        self.invitations
            .iter_mut()
            .find(|invitation| invitation.domain() == domain)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "domain '{domain}' is not invited to registry '{slug}'"
                ))
            })
    }

    /// Returns domains with an accepted, not rejected invitation.
    #[must_use]
    pub fn participating_domains(&self) -> BTreeSet<DomainName> {
        self.invitations
            .iter()
            .filter(|invitation| invitation.status() == InvitationStatus::Accepted)
            .map(|invitation| invitation.domain().clone())
            .collect()
    }

    /// Ensures a domain may use the registry.
    pub fn check_access(&self, domain: &DomainName) -> AppResult<()> {
        if !self.is_active {
            return Err(AppError::Forbidden(format!(
                "registry '{}' is not active",
                self.slug
            )));
        }

        match self.invitation(domain).map(RegistryInvitation::status) {
            Some(InvitationStatus::Accepted) => Ok(()),
            _ => Err(AppError::Forbidden(format!(
                "domain '{domain}' does not participate in registry '{}'",
                self.slug
            ))),
        }
    }

    /// Ensures a case type is shared through the registry.
    pub fn pre_access_check(&self, case_type: &str) -> AppResult<()> {
        if self.case_types.iter().any(|allowed| allowed == case_type) {
            return Ok(());
        }

        Err(AppError::NotFound(format!(
            "case type '{case_type}' is not part of registry '{}'",
            self.slug
        )))
    }

    /// Records a grant from a participating domain.
    pub fn grant(
        &mut self,
        from_domain: DomainName,
        to_domains: BTreeSet<DomainName>,
    ) -> AppResult<&RegistryGrant> {
        self.check_access(&from_domain)?;
        let to_domains: BTreeSet<DomainName> = to_domains
            .into_iter()
            .filter(|domain| domain != &from_domain)
            .collect();
        if to_domains.is_empty() {
            return Err(AppError::Validation(
                "grant must name at least one other domain".to_owned(),
            ));
        }

        let position = match self
            .grants
            .iter()
            .position(|grant| grant.from_domain == from_domain)
        {
            Some(position) => {
                self.grants[position].to_domains.extend(to_domains);
                position
            }
            None => {
                self.grants.push(RegistryGrant {
                    from_domain,
                    to_domains,
                });
                self.grants.len() - 1
            }
        };

        Ok(&self.grants[position])
    }

    /// Returns domains that granted access to the given domain.
    pub fn granted_domains(&self, domain: &DomainName) -> AppResult<BTreeSet<DomainName>> {
        self.check_access(domain)?;
        Ok(self
            .grants
            .iter()
            .filter(|grant| grant.to_domains.contains(domain))
            .map(|grant| grant.from_domain.clone())
            .collect())
    }

    /// Returns the domain itself plus every domain granting it access.
    pub fn visible_domains(&self, domain: &DomainName) -> AppResult<BTreeSet<DomainName>> {
        let mut visible = self.granted_domains(domain)?;
        visible.insert(domain.clone());
        Ok(visible)
    }
}
