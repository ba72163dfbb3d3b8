use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{CacheLayer, CacheTtls, GuardedCache, keys};
use crate::error::LinkError;
use crate::shortid::GenerateShortId;
use crate::store::{NewUrl, OwnerId, UrlRecord, UrlStore};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// A normalized page request: `page >= 1`, `1 <= limit <= MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

impl PageRequest {
    /// Missing or zero values fall back to the defaults; oversized limits are clamped.
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        let page = page.filter(|&p| p > 0).unwrap_or(DEFAULT_PAGE);
        let limit = limit
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of an owner's links, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerPage {
    pub urls: Vec<UrlRecord>,
    pub total_urls: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

/// Creation and per-owner listing of short links.
#[derive(Clone)]
pub struct LinkRegistry<G, S, C> {
    generator: G,
    store: S,
    cache: GuardedCache<C>,
    ttls: CacheTtls,
    max_attempts: u32,
}

impl<G, S, C> LinkRegistry<G, S, C>
where
    G: GenerateShortId + Sync,
    S: UrlStore + Sync,
    C: CacheLayer + Sync,
{
    pub fn new(
        generator: G,
        store: S,
        cache: GuardedCache<C>,
        ttls: CacheTtls,
        max_attempts: u32,
    ) -> Self {
        Self {
            generator,
            store,
            cache,
            ttls,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Stores `original_url` under a freshly generated short id, drawing again
    /// on collision up to `max_attempts` times.
    pub async fn create(
        &self,
        original_url: Url,
        owner: Option<OwnerId>,
    ) -> Result<UrlRecord, LinkError> {
        if !matches!(original_url.scheme(), "http" | "https") {
            return Err(LinkError::InvalidUrl(format!(
                "unsupported scheme `{}`",
                original_url.scheme()
            )));
        }

        for attempt in 1..=self.max_attempts {
            let short_id = self.generator.generate();
            let new = NewUrl {
                short_id: short_id.clone(),
                original_url: original_url.clone(),
                owner_id: owner.clone(),
            };

            match self.store.insert_url(new).await {
                Ok(record) => {
                    self.cache
                        .set(
                            &keys::resolution(&record.short_id),
                            record.original_url.as_str(),
                            self.ttls.resolution,
                        )
                        .await;
                    tracing::info!(
                        short_id = %record.short_id,
                        owner_id = ?record.owner_id.as_ref().map(OwnerId::as_str),
                        attempt,
                        "Created short link"
                    );
                    return Ok(record);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(short_id = %short_id, attempt, "Short id collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(attempts = self.max_attempts, "Gave up generating a unique short id");
        Err(LinkError::ExcessiveShortIdCollisions)
    }

    /// One page of `owner`'s links. Pages are cached per (owner, page, limit) and
    /// are not invalidated by later creations; they age out with the listing TTL.
    pub async fn list_for_owner(
        &self,
        owner: &OwnerId,
        request: PageRequest,
    ) -> Result<OwnerPage, LinkError> {
        let key = keys::listing(owner, request.page(), request.limit());

        if let Some(cached) = self.cache.get(&key).await {
            match serde_json::from_str::<OwnerPage>(&cached) {
                Ok(page) => return Ok(page),
                Err(e) => {
                    tracing::warn!(error = %e, owner_id = %owner, "Undecodable listing in cache, deleting");
                    self.cache.delete(&key).await;
                }
            }
        }

        let total_urls = self.store.count_by_owner(owner).await?;
        let urls = self
            .store
            .list_by_owner(owner, request.offset(), request.limit())
            .await?;
        let page = OwnerPage {
            urls,
            total_urls,
            total_pages: total_urls.div_ceil(request.limit()),
            current_page: request.page(),
        };

        match serde_json::to_string(&page) {
            Ok(json) => self.cache.set(&key, &json, self.ttls.listing).await,
            Err(e) => tracing::warn!(error = %e, owner_id = %owner, "Failed to serialize listing"),
        }

        Ok(page)
    }
}
