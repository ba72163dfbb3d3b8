pub mod memory;
pub mod redis;

use std::{future::Future, time::Duration};

use crate::error::CacheError;
use crate::shortid::ShortId;
use crate::store::OwnerId;

/// Key-value store with per-entry expiration. Deleting an absent key succeeds.
#[trait_variant::make(Send)]
pub trait CacheLayer {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Key namespaces. Each namespace maps to exactly one value shape.
pub mod keys {
    use super::*;

    /// `resolution:<shortId>` holds the raw original URL.
    pub fn resolution(id: &ShortId) -> String {
        format!("resolution:{id}")
    }

    /// `analytics:<shortId>` holds a JSON analytics snapshot.
    pub fn analytics(id: &ShortId) -> String {
        format!("analytics:{id}")
    }

    /// `listing:<ownerId>:<page>:<limit>` holds one JSON page of an owner's links.
    pub fn listing(owner: &OwnerId, page: u64, limit: u64) -> String {
        format!("listing:{owner}:{page}:{limit}")
    }
}

/// Lifetimes of the three cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub resolution: Duration,
    pub analytics: Duration,
    pub listing: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            resolution: Duration::from_secs(3600),
            analytics: Duration::from_secs(3600),
            listing: Duration::from_secs(600),
        }
    }
}

/// Best-effort front for a [`CacheLayer`].
///
/// Every call is bounded by `timeout`. Failures and timeouts are logged and
/// collapse into a miss (for reads) or a no-op (for writes), so callers always
/// keep going on the durable path.
#[derive(Debug, Clone)]
pub struct GuardedCache<C> {
    inner: C,
    timeout: Duration,
}

impl<C> GuardedCache<C>
where
    C: CacheLayer + Sync,
{
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.bounded(self.inner.get(key)).await {
            Ok(Some(value)) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache degraded, treating get as a miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) {
        match self.bounded(self.inner.set(key, value, ttl)).await {
            Ok(()) => tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache set"),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache degraded, skipping set")
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        match self.bounded(self.inner.delete(key)).await {
            Ok(()) => tracing::debug!(key = %key, "Cache deleted"),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache degraded, skipping delete")
            }
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.timeout)))
    }
}
