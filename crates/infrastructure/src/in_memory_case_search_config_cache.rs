use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use casewell_application::CaseSearchConfigCache;
use casewell_core::{AppResult, DomainName};
use casewell_domain::CaseSearchConfig;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct ConfigCacheEntry {
    config: CaseSearchConfig,
    expires_at: Instant,
}

/// In-memory cache adapter for case search configuration.
#[derive(Default)]
pub struct InMemoryCaseSearchConfigCache {
    entries: RwLock<HashMap<DomainName, ConfigCacheEntry>>,
}

impl InMemoryCaseSearchConfigCache {
    /// Creates an empty in-memory config cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaseSearchConfigCache for InMemoryCaseSearchConfigCache {
    async fn get_config(&self, domain: &DomainName) -> AppResult<Option<CaseSearchConfig>> {
        {
            let entries = self.entries.read().await;
            match entries.get(domain) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.config.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(domain)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(domain);
        }

        Ok(None)
    }

    async fn set_config(&self, config: &CaseSearchConfig, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries.write().await.insert(
            config.domain.clone(),
            ConfigCacheEntry {
                config: config.clone(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn invalidate(&self, domain: &DomainName) -> AppResult<()> {
        self.entries.write().await.remove(domain);
        Ok(())
    }
}
