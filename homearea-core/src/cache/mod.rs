//! Get-or-compute memoization injected into the engine.
//!
//! Each expensive stage wraps its work in [`Cache::get_or_compute`] keyed by
//! a [`CacheKey`] built from the stage name and a fingerprint of every input.
//! Failures are never stored, so a later call retries the computation.

mod fingerprint;
mod memory;

use std::sync::Arc;

pub use fingerprint::{Fingerprint, Fingerprinter};
pub use memory::{CacheStats, MemoryCache};

/// Identifies one stage invocation by stage name and input fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    stage: &'static str,
    fingerprint: u64,
}

impl CacheKey {
    /// Build a key for `stage` from its inputs.
    ///
    /// # Examples
    ///
    /// ```
    /// use homearea_core::cache::CacheKey;
    ///
    /// let first = CacheKey::new("geocode", &"10 Downing Street");
    /// let second = CacheKey::new("geocode", &"10 Downing Street");
    /// assert_eq!(first, second);
    /// assert_ne!(first, CacheKey::new("isochrone", &"10 Downing Street"));
    /// ```
    #[must_use]
    pub fn new(stage: &'static str, inputs: &impl Fingerprint) -> Self {
        let mut state = Fingerprinter::new();
        state.write_str(stage);
        inputs.fingerprint(&mut state);
        Self {
            stage,
            fingerprint: state.finish(),
        }
    }

    /// Name of the stage this key belongs to.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        self.stage
    }

    /// Fingerprint of the stage inputs.
    #[must_use]
    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Memoizes stage results.
///
/// Implementations must return the stored value when one exists for `key`
/// and otherwise run `compute`, storing its value on success.
pub trait Cache: Send + Sync {
    /// Return the cached value for `key`, computing it if absent.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns. Errors are not cached.
    fn get_or_compute<V, E, F>(&self, key: CacheKey, compute: F) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V, E>;
}

impl<C: Cache> Cache for Arc<C> {
    fn get_or_compute<V, E, F>(&self, key: CacheKey, compute: F) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V, E>,
    {
        (**self).get_or_compute(key, compute)
    }
}

impl<C: Cache> Cache for &C {
    fn get_or_compute<V, E, F>(&self, key: CacheKey, compute: F) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V, E>,
    {
        (**self).get_or_compute(key, compute)
    }
}

/// A cache that stores nothing and always computes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn get_or_compute<V, E, F>(&self, _key: CacheKey, compute: F) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V, E>,
    {
        compute()
    }
}
