use crate::{model::site_config::SiteConfig, store::StoreError};
use moka::future::Cache;
use std::time::Duration;

/// Backing lookup for the approved-site configuration.
pub trait ConfigStore {
    async fn fetch(&self) -> Result<Option<SiteConfig>, StoreError>;
}

/// TTL-bounded cache in front of the config store. A missing or
/// unreachable store must never block attendance recording, so `get()`
/// is infallible and falls back to the static defaults from the
/// environment. Readers observe either the old or the fully-updated
/// value; moka handles the swap atomically.
pub struct SiteConfigCache<S> {
    cache: Cache<(), SiteConfig>,
    store: S,
    defaults: SiteConfig,
}

impl<S: ConfigStore> SiteConfigCache<S> {
    pub fn new(store: S, defaults: SiteConfig, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            cache,
            store,
            defaults,
        }
    }

    /// Cached value while fresh; otherwise refetch. Failures and absent
    /// rows yield the defaults without caching them, so the next call
    /// retries the store.
    pub async fn get(&self) -> SiteConfig {
        if let Some(config) = self.cache.get(&()).await {
            return config;
        }

        match self.store.fetch().await {
            Ok(Some(config)) if config.is_valid() => {
                self.cache.insert((), config.clone()).await;
                config
            }
            Ok(Some(_)) => {
                tracing::warn!("stored site config is invalid, using defaults");
                self.defaults.clone()
            }
            Ok(None) => {
                tracing::info!("no site config stored, using defaults");
                self.defaults.clone()
            }
            Err(e) => {
                tracing::warn!(error = %e, "site config fetch failed, using defaults");
                self.defaults.clone()
            }
        }
    }

    /// Drops the cached value so the next `get()` refetches. Called when
    /// an operator updates the approved location.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Mode {
        Found(SiteConfig),
        Empty,
        Fail,
    }

    struct FakeStore {
        mode: Mode,
        fetches: AtomicUsize,
    }

    impl FakeStore {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ConfigStore for &FakeStore {
        async fn fetch(&self) -> Result<Option<SiteConfig>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &self.mode {
                Mode::Found(config) => Ok(Some(config.clone())),
                Mode::Empty => Ok(None),
                Mode::Fail => Err(StoreError::Unavailable("connection refused".into())),
            }
        }
    }

    fn defaults() -> SiteConfig {
        SiteConfig::new(0.0, 0.0, 500)
    }

    #[actix_web::test]
    async fn second_read_within_ttl_hits_the_cache() {
        let store = FakeStore::new(Mode::Found(SiteConfig::new(40.0, -3.7, 250)));
        let cache = SiteConfigCache::new(&store, defaults(), Duration::from_secs(60));

        assert_eq!(cache.get().await.radius_m, 250);
        assert_eq!(cache.get().await.radius_m, 250);
        assert_eq!(store.fetch_count(), 1);
    }

    #[actix_web::test]
    async fn expired_entry_is_refetched() {
        let store = FakeStore::new(Mode::Found(SiteConfig::new(40.0, -3.7, 250)));
        let cache = SiteConfigCache::new(&store, defaults(), Duration::from_millis(50));

        cache.get().await;
        actix_web::rt::time::sleep(Duration::from_millis(80)).await;
        cache.get().await;
        assert_eq!(store.fetch_count(), 2);
    }

    #[actix_web::test]
    async fn missing_row_falls_back_to_defaults_without_caching() {
        let store = FakeStore::new(Mode::Empty);
        let cache = SiteConfigCache::new(&store, defaults(), Duration::from_secs(60));

        assert_eq!(cache.get().await.radius_m, 500);
        assert_eq!(cache.get().await.radius_m, 500);
        // defaults are not cached, so every call retries the store
        assert_eq!(store.fetch_count(), 2);
    }

    #[actix_web::test]
    async fn store_failure_falls_back_to_defaults() {
        let store = FakeStore::new(Mode::Fail);
        let cache = SiteConfigCache::new(&store, defaults(), Duration::from_secs(60));

        assert_eq!(cache.get().await.radius_m, 500);
        assert_eq!(store.fetch_count(), 1);
    }

    #[actix_web::test]
    async fn invalidate_forces_a_refetch() {
        let store = FakeStore::new(Mode::Found(SiteConfig::new(40.0, -3.7, 250)));
        let cache = SiteConfigCache::new(&store, defaults(), Duration::from_secs(60));

        cache.get().await;
        cache.invalidate().await;
        cache.get().await;
        assert_eq!(store.fetch_count(), 2);
    }
}
