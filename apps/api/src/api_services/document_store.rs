use casewell_core::AppError;
use mongodb::{Client, Database};

pub async fn connect_document_store(
    mongodb_url: &str,
    database_name: &str,
) -> Result<Database, AppError> {
    let client = Client::with_uri_str(mongodb_url)
        .await
        .map_err(|error| AppError::Validation(format!("invalid MONGODB_URL: {error}")))?;

    Ok(client.database(database_name))
}
