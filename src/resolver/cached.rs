//! Caching resolver for slow or serialized backing stores.
//!
//! Object stores behind a vendor API typically allow one request at a time
//! and answer slowly. This wrapper provides:
//! - LRU cache for lookup results
//! - Serialized access to the wrapped resolver

use parking_lot::Mutex;
use quick_cache::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::{ObjectKind, ObjectResolver, Resolution};

/// Default cache capacity (number of entries).
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Cached, serialized wrapper around another resolver.
///
/// Found and not-found answers are cached; timeouts are not, so a later
/// row gets a fresh attempt. A caller that cannot acquire the backend
/// before its deadline gets [`Resolution::TimedOut`] without a backend call.
///
/// # Example
///
/// ```
/// use fwaudit::resolver::{CachedResolver, ObjectKind, ObjectResolver, StaticResolver};
/// use std::time::{Duration, Instant};
///
/// let backing = StaticResolver::new().with_address("web", ["10.0.0.10"]);
/// let resolver = CachedResolver::new(backing);
///
/// let deadline = Instant::now() + Duration::from_secs(1);
/// resolver.resolve(ObjectKind::Address, "web", deadline);
/// resolver.resolve(ObjectKind::Address, "web", deadline);
/// assert_eq!(resolver.backend_calls(), 1);
/// ```
pub struct CachedResolver<R> {
    /// The wrapped resolver; the lock serializes backend access.
    inner: Mutex<R>,
    /// LRU cache for lookup results.
    cache: Option<Cache<(ObjectKind, String), Option<Vec<String>>>>,
    /// Number of lookups forwarded to the wrapped resolver.
    backend_calls: AtomicU64,
}

impl<R: ObjectResolver> CachedResolver<R> {
    /// Wrap a resolver with the default cache capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap a resolver with a cache of `capacity` entries; 0 disables caching.
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(inner),
            cache: (capacity > 0).then(|| Cache::new(capacity)),
            backend_calls: AtomicU64::new(0),
        }
    }

    /// Number of lookups that reached the wrapped resolver.
    pub fn backend_calls(&self) -> u64 {
        self.backend_calls.load(Ordering::Relaxed)
    }

    /// Drop all cached answers.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Unwrap the inner resolver.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    fn lookup_backend(&self, kind: ObjectKind, name: &str, deadline: Instant) -> Resolution {
        let Some(guard) = self.inner.try_lock_until(deadline) else {
            log::warn!("Resolver busy past deadline for {} object {}", kind, name);
            return Resolution::TimedOut;
        };
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        guard.resolve(kind, name, deadline)
    }
}

impl<R: ObjectResolver> ObjectResolver for CachedResolver<R> {
    fn resolve(&self, kind: ObjectKind, name: &str, deadline: Instant) -> Resolution {
        let Some(ref cache) = self.cache else {
            return self.lookup_backend(kind, name, deadline);
        };

        let key = (kind, name.to_string());
        if let Some(cached) = cache.get(&key) {
            return match cached {
                Some(members) => Resolution::Found(members),
                None => Resolution::NotFound,
            };
        }

        let resolution = self.lookup_backend(kind, name, deadline);
        match &resolution {
            Resolution::Found(members) => cache.insert(key, Some(members.clone())),
            Resolution::NotFound => cache.insert(key, None),
            Resolution::TimedOut => {}
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use std::time::Duration;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    /// Resolver that always times out.
    struct Unresponsive;

    impl ObjectResolver for Unresponsive {
        fn resolve(&self, _kind: ObjectKind, _name: &str, _deadline: Instant) -> Resolution {
            Resolution::TimedOut
        }
    }

    #[test]
    fn test_cache_hits() {
        let backing = StaticResolver::new().with_address("web", ["10.0.0.10"]);
        let resolver = CachedResolver::new(backing);

        for _ in 0..10 {
            assert_eq!(
                resolver.resolve(ObjectKind::Address, "web", deadline()),
                Resolution::Found(vec!["10.0.0.10".to_string()])
            );
        }
        assert_eq!(resolver.backend_calls(), 1);
    }

    #[test]
    fn test_not_found_is_cached() {
        let resolver = CachedResolver::new(StaticResolver::new());
        resolver.resolve(ObjectKind::Service, "missing", deadline());
        assert_eq!(
            resolver.resolve(ObjectKind::Service, "missing", deadline()),
            Resolution::NotFound
        );
        assert_eq!(resolver.backend_calls(), 1);
    }

    #[test]
    fn test_timeouts_not_cached() {
        let resolver = CachedResolver::new(Unresponsive);
        resolver.resolve(ObjectKind::Address, "web", deadline());
        resolver.resolve(ObjectKind::Address, "web", deadline());
        assert_eq!(resolver.backend_calls(), 2);
    }

    #[test]
    fn test_kinds_cached_separately() {
        let backing = StaticResolver::new()
            .with_address("web", ["10.0.0.10"])
            .with_service("web", ["tcp/80"]);
        let resolver = CachedResolver::new(backing);

        resolver.resolve(ObjectKind::Address, "web", deadline());
        assert_eq!(
            resolver.resolve(ObjectKind::Service, "web", deadline()),
            Resolution::Found(vec!["tcp/80".to_string()])
        );
        assert_eq!(resolver.backend_calls(), 2);
    }

    #[test]
    fn test_no_cache() {
        let backing = StaticResolver::new().with_address("web", ["10.0.0.10"]);
        let resolver = CachedResolver::with_capacity(backing, 0);
        resolver.resolve(ObjectKind::Address, "web", deadline());
        resolver.resolve(ObjectKind::Address, "web", deadline());
        assert_eq!(resolver.backend_calls(), 2);

        resolver.clear_cache();
        let _inner: StaticResolver = resolver.into_inner();
    }

    #[test]
    fn test_busy_backend_times_out_at_deadline() {
        let backing = StaticResolver::new().with_address("web", ["10.0.0.10"]);
        let resolver = CachedResolver::new(backing);

        let guard = resolver.inner.lock();
        let start = Instant::now();
        let short = start + Duration::from_millis(20);
        assert_eq!(
            resolver.resolve(ObjectKind::Address, "web", short),
            Resolution::TimedOut
        );
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(resolver.backend_calls(), 0);
        drop(guard);

        // The timeout left nothing in the cache.
        assert_eq!(
            resolver.resolve(ObjectKind::Address, "web", deadline()),
            Resolution::Found(vec!["10.0.0.10".to_string()])
        );
        assert_eq!(resolver.backend_calls(), 1);
    }

    #[test]
    fn test_concurrent_callers_share_one_backend() {
        let backing = StaticResolver::new().with_address("web", ["10.0.0.10"]);
        let resolver = CachedResolver::with_capacity(backing, 0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert_eq!(
                        resolver.resolve(ObjectKind::Address, "web", deadline()),
                        Resolution::Found(vec!["10.0.0.10".to_string()])
                    );
                });
            }
        });
        assert_eq!(resolver.backend_calls(), 8);
    }
}
