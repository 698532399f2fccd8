use std::collections::HashMap;

use async_trait::async_trait;
use casewell_application::DocumentRoleRepository;
use casewell_core::{AppResult, DomainName};
use casewell_domain::RoleDocument;
use tokio::sync::RwLock;

/// In-memory document role store used when no document database is configured.
#[derive(Default)]
pub struct InMemoryRoleDocumentRepository {
    documents: RwLock<HashMap<String, RoleDocument>>,
}

impl InMemoryRoleDocumentRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRoleRepository for InMemoryRoleDocumentRepository {
    async fn find_role(&self, document_id: &str) -> AppResult<Option<RoleDocument>> {
        Ok(self.documents.read().await.get(document_id).cloned())
    }

    async fn list_roles(&self, domain: &DomainName) -> AppResult<Vec<RoleDocument>> {
        let mut roles: Vec<RoleDocument> = self
            .documents
            .read()
            .await
            .values()
            .filter(|document| document.fields.domain == *domain)
            .cloned()
            .collect();
        roles.sort_by(|left, right| left.fields.name.cmp(&right.fields.name));

        Ok(roles)
    }

    async fn save_role(&self, role: &RoleDocument) -> AppResult<()> {
        self.documents
            .write()
            .await
            .insert(role.id.clone(), role.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use casewell_application::DocumentRoleRepository;
    use casewell_core::DomainName;
    use casewell_domain::{Permissions, RoleDocument, RoleFields};

    use super::InMemoryRoleDocumentRepository;

    fn document(id: &str, domain: &str, name: &str) -> RoleDocument {
        let domain = DomainName::new(domain).unwrap_or_else(|_| panic!("valid domain"));
        RoleDocument {
            id: id.to_owned(),
            fields: RoleFields::new(domain, name).unwrap_or_else(|_| panic!("valid fields")),
            upstream_id: None,
            permissions: Permissions::none(),
            assignable_by: Vec::new(),
        }
    }

    #[tokio::test]
    async fn save_replaces_and_list_filters_by_domain() {
        let repository = InMemoryRoleDocumentRepository::new();
        for role in [
            document("a", "demo", "Worker"),
            document("b", "demo", "Admin helper"),
            document("c", "partner", "Worker"),
            document("a", "demo", "Field worker"),
        ] {
            assert!(repository.save_role(&role).await.is_ok());
        }

        let demo = DomainName::new("demo").unwrap_or_else(|_| panic!("valid domain"));
        let listed = repository
            .list_roles(&demo)
            .await
            .unwrap_or_else(|_| panic!("list should succeed"));
        let names: Vec<Option<&str>> = listed
            .iter()
            .map(|role| role.fields.name.as_deref())
            .collect();

        assert_eq!(names, vec![Some("Admin helper"), Some("Field worker")]);
        assert!(matches!(repository.find_role("missing").await, Ok(None)));
    }
}
