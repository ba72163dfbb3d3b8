//! Click analytics served cache-aside from the `analytics:` namespace.
//!
//! The resolver deletes `analytics:<id>` after every counted click, so a
//! snapshot read after a completed redirect is always rebuilt from the store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{CacheLayer, GuardedCache, keys};
use crate::error::LinkError;
use crate::shortid::ShortId;
use crate::store::{UrlRecord, UrlStore};

/// Read-only summary of one short link, derived from its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub short_id: ShortId,
    pub original_url: Url,
    pub click_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<UrlRecord> for AnalyticsSnapshot {
    fn from(record: UrlRecord) -> Self {
        Self {
            short_id: record.short_id,
            original_url: record.original_url,
            click_count: record.click_count,
            created_at: record.created_at,
        }
    }
}

#[derive(Clone)]
pub struct AnalyticsAggregator<S, C> {
    store: S,
    cache: GuardedCache<C>,
    ttl: Duration,
}

impl<S, C> AnalyticsAggregator<S, C>
where
    S: UrlStore + Sync,
    C: CacheLayer + Sync,
{
    pub fn new(store: S, cache: GuardedCache<C>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Snapshot for `raw_id`, from cache when present. Never writes to the store.
    pub async fn get_analytics(&self, raw_id: &str) -> Result<AnalyticsSnapshot, LinkError> {
        let Ok(id) = ShortId::parse(raw_id) else {
            tracing::debug!(short_id = %raw_id, "Malformed short id, skipping lookup");
            return Err(LinkError::NotFound);
        };
        let key = keys::analytics(&id);

        if let Some(cached) = self.cache.get(&key).await {
            match serde_json::from_str::<AnalyticsSnapshot>(&cached) {
                Ok(snapshot) if snapshot.short_id == id => return Ok(snapshot),
                Ok(snapshot) => {
                    tracing::warn!(
                        short_id = %id,
                        cached_id = %snapshot.short_id,
                        "Cached analytics belong to another id, deleting"
                    );
                    self.cache.delete(&key).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, short_id = %id, "Undecodable analytics in cache, deleting");
                    self.cache.delete(&key).await;
                }
            }
        }

        let record = self
            .store
            .find_by_short_id(&id)
            .await?
            .ok_or(LinkError::NotFound)?;
        let snapshot = AnalyticsSnapshot::from(record);

        match serde_json::to_string(&snapshot) {
            Ok(json) => self.cache.set(&key, &json, self.ttl).await,
            Err(e) => {
                tracing::warn!(error = %e, short_id = %id, "Failed to serialize analytics snapshot")
            }
        }

        Ok(snapshot)
    }
}
