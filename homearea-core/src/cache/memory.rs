//! Process-local in-memory cache.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::{Cache, CacheKey};

type StoredValue = Arc<dyn Any + Send + Sync>;
type Slot = Arc<Mutex<Option<StoredValue>>>;

/// Hit and miss counters for a [`MemoryCache`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a stored value.
    pub hits: u64,
    /// Lookups that ran the computation.
    pub misses: u64,
}

/// In-memory cache with a lock per key.
///
/// Concurrent callers asking for the same key wait on that key's lock, so the
/// computation runs at most once while it is succeeding. Different keys never
/// block each other.
#[derive(Default)]
pub struct MemoryCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a stored value.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| lock(slot).is_some())
            .count()
    }

    /// Whether no value is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored value.
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    /// Current hit and miss counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, key: CacheKey) -> Slot {
        Arc::clone(lock(&self.slots).entry(key).or_default())
    }
}

impl Cache for MemoryCache {
    fn get_or_compute<V, E, F>(&self, key: CacheKey, compute: F) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        let mut stored = lock(&slot);
        if let Some(value) = stored.as_ref().and_then(|value| value.downcast_ref::<V>()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("cache miss for {} ({:016x})", key.stage(), key.fingerprint());
        let value = compute()?;
        *stored = Some(Arc::new(value.clone()));
        Ok(value)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[fixture]
    fn cache() -> MemoryCache {
        MemoryCache::new()
    }

    #[rstest]
    fn stored_value_is_returned(cache: MemoryCache) {
        let key = CacheKey::new("stage", &"input");

        let first: Result<String, ()> = cache.get_or_compute(key, || Ok("computed".to_owned()));
        let second: Result<String, ()> =
            cache.get_or_compute(key, || Ok("recomputed".to_owned()));

        assert_eq!(first, Ok("computed".to_owned()));
        assert_eq!(second, Ok("computed".to_owned()));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[rstest]
    fn errors_are_not_cached(cache: MemoryCache) {
        let key = CacheKey::new("stage", &"input");

        let failed: Result<u32, &str> = cache.get_or_compute(key, || Err("boom"));
        let retried: Result<u32, &str> = cache.get_or_compute(key, || Ok(3));

        assert_eq!(failed, Err("boom"));
        assert_eq!(retried, Ok(3));
        assert_eq!(cache.len(), 1);
    }

    #[rstest]
    fn concurrent_callers_compute_once(cache: MemoryCache) {
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new("slow", &42_u32);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let value: Result<u32, ()> = cache.get_or_compute(key, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok(42)
                    });
                    assert_eq!(value, Ok(42));
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn clear_forgets_values(cache: MemoryCache) {
        let key = CacheKey::new("stage", &1_u32);
        let _: Result<u32, ()> = cache.get_or_compute(key, || Ok(1));

        cache.clear();

        assert!(cache.is_empty());
    }
}
