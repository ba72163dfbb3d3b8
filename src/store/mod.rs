pub mod memory;
pub mod postgresql;

use std::{fmt, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StoreError;
use crate::shortid::ShortId;

/// Opaque owner reference handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Returns `None` for blank input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored short link. Only `click_count` and `updated_at` change after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    pub short_id: ShortId,
    pub original_url: Url,
    pub owner_id: Option<OwnerId>,
    pub click_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied at creation; the store fills in counters and timestamps.
#[derive(Debug, Clone)]
pub struct NewUrl {
    pub short_id: ShortId,
    pub original_url: Url,
    pub owner_id: Option<OwnerId>,
}

#[trait_variant::make(Send)]
pub trait UrlStore {
    /// Insert a new record. Fails with [`StoreError::Conflict`] if the short id is taken.
    async fn insert_url(&self, new: NewUrl) -> Result<UrlRecord, StoreError>;

    async fn find_by_short_id(&self, id: &ShortId) -> Result<Option<UrlRecord>, StoreError>;

    /// Atomically add one click. Returns `false` if no record has this id.
    async fn increment_click_count(&self, id: &ShortId) -> Result<bool, StoreError>;

    async fn count_by_owner(&self, owner: &OwnerId) -> Result<u64, StoreError>;

    /// One page of an owner's records, newest first.
    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UrlRecord>, StoreError>;
}

/// Puts a deadline on every call to the wrapped store. A call that outlives it
/// fails with [`StoreError::Unavailable`].
#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "Durable store call timed out");
                Err(StoreError::timed_out(operation, self.timeout))
            }
        }
    }
}

impl<S> UrlStore for TimedStore<S>
where
    S: UrlStore + Sync,
{
    async fn insert_url(&self, new: NewUrl) -> Result<UrlRecord, StoreError> {
        self.bounded("insert_url", self.inner.insert_url(new)).await
    }

    async fn find_by_short_id(&self, id: &ShortId) -> Result<Option<UrlRecord>, StoreError> {
        self.bounded("find_by_short_id", self.inner.find_by_short_id(id))
            .await
    }

    async fn increment_click_count(&self, id: &ShortId) -> Result<bool, StoreError> {
        self.bounded("increment_click_count", self.inner.increment_click_count(id))
            .await
    }

    async fn count_by_owner(&self, owner: &OwnerId) -> Result<u64, StoreError> {
        self.bounded("count_by_owner", self.inner.count_by_owner(owner))
            .await
    }

    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UrlRecord>, StoreError> {
        self.bounded(
            "list_by_owner",
            self.inner.list_by_owner(owner, offset, limit),
        )
        .await
    }
}
