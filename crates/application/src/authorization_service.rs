use std::sync::Arc;

use async_trait::async_trait;
use casewell_core::{AppError, AppResult, DomainName, UserIdentity};
use casewell_domain::{Permission, Permissions};

/// Repository port for permission lookups.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Returns the effective permission set of a subject in a domain.
    async fn permissions_for_subject(
        &self,
        domain: &DomainName,
        subject: &str,
    ) -> AppResult<Permissions>;
}

/// Application service for domain-scoped authorization checks.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>) -> Self {
        Self { repository }
    }

    /// Ensures the actor holds an unrestricted grant of the permission.
    pub async fn require_permission(
        &self,
        actor: &UserIdentity,
        permission: Permission,
    ) -> AppResult<()> {
        let permissions = self
            .repository
            .permissions_for_subject(actor.domain(), actor.subject())
            .await?;

        if permissions.allows(permission) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{}' is missing permission '{}' in domain '{}'",
            actor.subject(),
            permission.as_str(),
            actor.domain()
        )))
    }

    /// Ensures the actor may use the permission for one item.
    pub async fn require_item_permission(
        &self,
        actor: &UserIdentity,
        permission: Permission,
        item: &str,
    ) -> AppResult<()> {
        let permissions = self
            .repository
            .permissions_for_subject(actor.domain(), actor.subject())
            .await?;

        if permissions.allows_item(permission, item) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{}' is missing permission '{}' for '{item}' in domain '{}'",
            actor.subject(),
            permission.as_str(),
            actor.domain()
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use casewell_core::{AppError, AppResult, DomainName, UserIdentity};
    use casewell_domain::{Permission, PermissionAllow, PermissionInfo, Permissions};

    use super::{AuthorizationRepository, AuthorizationService};

    struct FakeAuthorizationRepository {
        grants: HashMap<String, Permissions>,
    }

    #[async_trait]
    impl AuthorizationRepository for FakeAuthorizationRepository {
        async fn permissions_for_subject(
            &self,
            _domain: &DomainName,
            subject: &str,
        ) -> AppResult<Permissions> {
            Ok(self.grants.get(subject).cloned().unwrap_or_default())
        }
    }

    fn actor(subject: &str) -> UserIdentity {
        let domain = DomainName::new("demo").unwrap_or_else(|_| panic!("valid domain"));
        UserIdentity::new(subject, subject, domain)
    }

    fn service() -> AuthorizationService {
        AuthorizationService::new(Arc::new(FakeAuthorizationRepository {
            grants: HashMap::from([
                ("admin".to_owned(), Permissions::max()),
                (
                    "analyst".to_owned(),
                    Permissions::from_list([PermissionInfo {
                        permission: Permission::ViewDataRegistryContents,
                        allow: PermissionAllow::Items(vec!["patients".to_owned()]),
                    }]),
                ),
            ]),
        }))
    }

    #[tokio::test]
    async fn missing_permission_is_forbidden() {
        let result = service()
            .require_permission(&actor("nobody"), Permission::EditData)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn admin_passes_every_check() {
        let result = service()
            .require_permission(&actor("admin"), Permission::EditCaseSearchConfig)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn item_grants_are_checked_per_item() {
        let service = service();
        let analyst = actor("analyst");

        assert!(
            service
                .require_item_permission(&analyst, Permission::ViewDataRegistryContents, "patients")
                .await
                .is_ok()
        );
        assert!(
            service
                .require_item_permission(&analyst, Permission::ViewDataRegistryContents, "labs")
                .await
                .is_err()
        );
        assert!(
            service
                .require_permission(&analyst, Permission::ViewDataRegistryContents)
                .await
                .is_err()
        );
    }
}
