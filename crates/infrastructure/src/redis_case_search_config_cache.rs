//! Redis-backed case search configuration cache.

use async_trait::async_trait;
use casewell_application::CaseSearchConfigCache;
use casewell_core::{AppError, AppResult, DomainName};
use casewell_domain::CaseSearchConfig;
use redis::AsyncCommands;

/// Redis implementation of the case search config cache port.
#[derive(Clone)]
pub struct RedisCaseSearchConfigCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisCaseSearchConfigCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, domain: &DomainName) -> String {
        format!("{}:domain={}", self.key_prefix, domain.as_str())
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl CaseSearchConfigCache for RedisCaseSearchConfigCache {
    async fn get_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>> {
        let key = self.key_for(domain);
        let mut connection = self.connection().await?;

        let encoded: Option<String> = connection.get(key).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read case search config cache entry: {error}"
            ))
        })?;

        encoded.as_deref().map(decode_config).transpose()
    }

    async fn set_config(&self, config: &CaseSearchConfig, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let key = self.key_for(&config.domain);
        let value = serde_json::to_string(config).map_err(|error| {
            AppError::Internal(format!("failed to encode case search config: {error}"))
        })?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(key, value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write case search config cache entry: {error}"
                ))
            })
    }

    async fn invalidate(&self, domain: &DomainName) -> AppResult<()> {
        let key = self.key_for(domain);
        let mut connection = self.connection().await?;

        connection.del(key).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to delete case search config cache entry: {error}"
            ))
        })
    }
}

fn decode_config(value: &str) -> AppResult<CaseSearchConfig> {
    serde_json::from_str(value).map_err(|error| {
        AppError::Internal(format!(
            "invalid case search config cache value '{value}': {error}"
        ))
    })
}
