//! Argument-keyed memoization.
use crate::error::Result;
use crate::types::cached::{Cache, CacheConfig, MemoryCache};
use dashmap::DashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

/// A callable that caches its function's results per distinct argument.
///
/// The argument itself is the cache key, so it must be `Hash + Eq`; values
/// that should be told apart must compare unequal. Multi-argument functions
/// can take a tuple.
///
/// The cache is not locked while the function runs. Unless
/// [`single_flight`](Memoized::single_flight) is enabled, concurrent callers
/// with the same uncached key may each run the function once.
pub struct Memoized<K, V, F, C = MemoryCache<K, V>> {
    inner: F,
    cache: C,
    in_flight: Option<DashMap<K, Arc<Mutex<()>>>>,
    _output: PhantomData<fn() -> V>,
}

/// Wraps `f` with an unbounded cache: one entry per distinct argument, never evicted.
///
/// ```
/// use callguard::memoize;
///
/// let square = memoize(|n: u64| n * n);
/// assert_eq!(square.call(12), 144);
/// assert_eq!(square.call(12), 144);
/// assert_eq!(square.cache().len(), 1);
/// ```
pub fn memoize<K, V, F>(f: F) -> Memoized<K, V, F>
where
    F: Fn(K) -> V,
{
    Memoized::with_cache(f, MemoryCache::default())
}

/// Wraps `f` with a cache bounded by `config`.
///
/// Fails with [`Error::InvalidCapacity`](crate::Error::InvalidCapacity) if
/// `max_capacity` is zero.
pub fn memoize_with<K, V, F>(f: F, config: CacheConfig) -> Result<Memoized<K, V, F>>
where
    F: Fn(K) -> V,
    K: Hash + Eq,
    V: Clone,
{
    Ok(Memoized::with_cache(f, MemoryCache::new(config)?))
}

impl<K, V, F, C> Memoized<K, V, F, C> {
    pub fn with_cache(inner: F, cache: C) -> Self {
        Self { inner, cache, in_flight: None, _output: PhantomData }
    }

    /// Makes concurrent callers with the same uncached key wait for the first
    /// one's computation instead of running the function again.
    pub fn single_flight(mut self) -> Self
    where
        K: Hash + Eq,
    {
        self.in_flight = Some(DashMap::new());
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<K, V, F, C> Memoized<K, V, F, C>
where
    F: Fn(K) -> V,
    C: Cache<Input = K, Output = V>,
    K: Clone + Hash + Eq,
    V: Clone,
{
    /// Returns the cached result for `arg`, running the function on a miss.
    pub fn call(&self, arg: K) -> V {
        if let Some(cached) = self.cache.get(&arg) {
            tracing::trace!("memoize hit");
            return cached;
        }
        let Some(in_flight) = &self.in_flight else {
            return self.compute(arg);
        };

        let lock = in_flight.entry(arg.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            match self.cache.get(&arg) {
                Some(cached) => {
                    tracing::trace!("memoize hit after waiting for in-flight computation");
                    cached
                }
                None => self.compute(arg.clone()),
            }
        };
        in_flight.remove_if(&arg, |_, current| Arc::ptr_eq(current, &lock));
        result
    }

    fn compute(&self, arg: K) -> V {
        tracing::trace!("memoize miss");
        let result = (self.inner)(arg.clone());
        self.cache.set(arg, result.clone());
        result
    }
}

impl<K, V, F, C> Debug for Memoized<K, V, F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized").field("single_flight", &self.in_flight.is_some()).finish()
    }
}
