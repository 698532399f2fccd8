use serde::{Deserialize, Serialize};

use crate::DomainName;

/// Caller identity scoped to the domain a request targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    display_name: String,
    domain: DomainName,
}

impl UserIdentity {
    /// Creates a user identity from authentication and tenancy data.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        domain: DomainName,
    ) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            domain,
        }
    }

    /// Returns the stable subject claim.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the domain the identity acts in.
    #[must_use]
    pub fn domain(&self) -> &DomainName {
        &self.domain
    }
}
