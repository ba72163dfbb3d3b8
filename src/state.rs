use url::Url;

use crate::{
    analytics::AnalyticsAggregator,
    cache::{CacheLayer, CacheTtls, GuardedCache},
    links::LinkRegistry,
    resolver::Resolver,
    shortid::{GenerateShortId, random::RandomShortId},
    store::{TimedStore, UrlStore, postgresql::PgStore},
};

/// Application state shared across all request handlers.
///
/// Generic over the short id generator, the durable store and the cache
/// backend so the same handlers serve Postgres/Redis in production and the
/// in-process backends in tests.
#[derive(Clone)]
pub struct AppState<Gen = RandomShortId, Store = TimedStore<PgStore>, Cache = crate::cache::redis::RedisCache>
{
    /// Base URL that short links are built on.
    pub base_url: Url,
    pub resolver: Resolver<Store, Cache>,
    pub analytics: AnalyticsAggregator<Store, Cache>,
    pub links: LinkRegistry<Gen, Store, Cache>,
}

impl<Gen, Store, Cache> AppState<Gen, Store, Cache>
where
    Gen: GenerateShortId + Sync,
    Store: UrlStore + Clone + Sync,
    Cache: CacheLayer + Clone + Sync,
{
    pub fn new(
        base_url: Url,
        generator: Gen,
        store: Store,
        cache: GuardedCache<Cache>,
        ttls: CacheTtls,
        shortid_max_retries: u32,
    ) -> Self {
        Self {
            base_url: as_join_base(base_url),
            resolver: Resolver::new(store.clone(), cache.clone(), ttls.resolution),
            analytics: AnalyticsAggregator::new(store.clone(), cache.clone(), ttls.analytics),
            links: LinkRegistry::new(generator, store, cache, ttls, shortid_max_retries),
        }
    }
}

/// Short links are `<base>/<id>`. `Url::join` replaces the last path segment
/// unless the base path ends in `/`, so make sure it does.
fn as_join_base(mut base_url: Url) -> Url {
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    base_url
}
