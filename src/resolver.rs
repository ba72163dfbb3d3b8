use std::time::Duration;

use url::Url;

use crate::cache::{CacheLayer, GuardedCache, keys};
use crate::error::LinkError;
use crate::shortid::ShortId;
use crate::store::UrlStore;

/// Turns a short id into its redirect target and records the click.
///
/// Order on every successful resolution:
/// 1. look up `resolution:<id>`, falling back to the store and populating the cache
/// 2. atomically add one click in the store
/// 3. delete `analytics:<id>`
///
/// The deletion runs only after the increment has been acknowledged, so any
/// analytics read that starts after this returns sees the new count.
#[derive(Clone)]
pub struct Resolver<S, C> {
    store: S,
    cache: GuardedCache<C>,
    ttl: Duration,
}

impl<S, C> Resolver<S, C>
where
    S: UrlStore + Sync,
    C: CacheLayer + Sync,
{
    pub fn new(store: S, cache: GuardedCache<C>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    pub async fn resolve(&self, raw_id: &str) -> Result<Url, LinkError> {
        let Ok(id) = ShortId::parse(raw_id) else {
            tracing::debug!(short_id = %raw_id, "Malformed short id, skipping lookup");
            return Err(LinkError::NotFound);
        };
        let resolution_key = keys::resolution(&id);

        let target = match self.cached_target(&id, &resolution_key).await {
            Some(url) => url,
            None => {
                let record = self
                    .store
                    .find_by_short_id(&id)
                    .await?
                    .ok_or(LinkError::NotFound)?;
                self.cache
                    .set(&resolution_key, record.original_url.as_str(), self.ttl)
                    .await;
                record.original_url
            }
        };

        if !self.store.increment_click_count(&id).await? {
            // Records are never removed through this service; drop the stale entry anyway.
            tracing::warn!(short_id = %id, "Click matched no stored record");
            self.cache.delete(&resolution_key).await;
        }

        self.cache.delete(&keys::analytics(&id)).await;

        tracing::info!(short_id = %id, "Resolved short link");
        Ok(target)
    }

    async fn cached_target(&self, id: &ShortId, key: &str) -> Option<Url> {
        let raw = self.cache.get(key).await?;
        match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, short_id = %id, "Unparsable URL in resolution cache, deleting");
                self.cache.delete(key).await;
                None
            }
        }
    }
}
