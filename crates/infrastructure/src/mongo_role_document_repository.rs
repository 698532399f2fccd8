//! MongoDB-backed role document store.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use casewell_application::DocumentRoleRepository;
use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::RoleDocument;

/// MongoDB implementation of the document role port.
#[derive(Clone)]
pub struct MongoRoleDocumentRepository {
    collection: Collection<RoleDocument>,
}

impl MongoRoleDocumentRepository {
    const COLLECTION_NAME: &'static str = "user_roles";

    /// Creates a repository bound to the role collection of a database.
    #[must_use]
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(Self::COLLECTION_NAME),
        }
    }
}

#[async_trait]
impl DocumentRoleRepository for MongoRoleDocumentRepository {
    async fn find_role(&self, document_id: &str) -> AppResult<Option<RoleDocument>> {
        self.collection
            .find_one(doc! { "_id": document_id })
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to read role document '{document_id}': {error}"
                ))
            })
    }

    async fn list_roles(&self, domain: &DomainName) -> AppResult<Vec<RoleDocument>> {
        let cursor = self
            .collection
            .find(doc! { "domain": domain.as_str() })
            .sort(doc! { "name": 1 })
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to query role documents for domain '{domain}': {error}"
                ))
            })?;

        cursor.try_collect().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read role documents for domain '{domain}': {error}"
            ))
        })
    }

    async fn save_role(&self, role: &RoleDocument) -> AppResult<()> {
        self.collection
            .replace_one(doc! { "_id": role.id.as_str() }, role)
            .upsert(true)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write role document '{}': {error}",
                    role.id
                ))
            })?;

        Ok(())
    }
}
