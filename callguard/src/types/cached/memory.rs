use super::{check_capacity, Cache, CacheConfig};
use crate::error::Result;
use lru::LruCache;
use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

enum Store<I, O> {
    Lru(LruCache<I, O>),
    HashMap(HashMap<I, O>),
}

impl<I, O> Store<I, O>
where
    I: Hash + Eq,
    O: Clone,
{
    fn get(&mut self, key: &I) -> Option<O> {
        match self {
            Self::Lru(cache) => cache.get(key).cloned(),
            Self::HashMap(map) => map.get(key).cloned(),
        }
    }
    fn set(&mut self, key: I, value: O) {
        match self {
            Self::Lru(cache) => {
                cache.put(key, value);
            }
            Self::HashMap(map) => {
                map.insert(key, value);
            }
        }
    }
    fn del(&mut self, key: &I) {
        match self {
            Self::Lru(cache) => {
                cache.pop(key);
            }
            Self::HashMap(map) => {
                map.remove(key);
            }
        }
    }
    fn len(&self) -> usize {
        match self {
            Self::Lru(cache) => cache.len(),
            Self::HashMap(map) => map.len(),
        }
    }
}

// saturates instead of truncating where usize is narrower than u64
fn lru_capacity(max_capacity: u64) -> Option<NonZeroUsize> {
    NonZeroUsize::new(usize::try_from(max_capacity).unwrap_or(usize::MAX))
}

#[derive(Clone, Debug)]
struct ValueWithInstant<O> {
    value: O,
    instant: Instant,
}

/// A mutex-guarded in-process cache.
///
/// Without a `max_capacity` this is a plain `HashMap` that grows by one entry
/// per distinct key and never evicts. With one, the least recently used entry
/// is evicted first.
pub struct MemoryCache<I, O> {
    inner: Mutex<Store<I, ValueWithInstant<O>>>,
    expiration: Option<Duration>,
}

impl<I, O> MemoryCache<I, O> {
    fn lock(&self) -> MutexGuard<'_, Store<I, ValueWithInstant<O>>> {
        // no user code runs under this lock, so a poisoned store is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<I, O> MemoryCache<I, O>
where
    I: Hash + Eq,
    O: Clone,
{
    /// Number of stored entries, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<I, O> Default for MemoryCache<I, O> {
    fn default() -> Self {
        Self { inner: Mutex::new(Store::HashMap(HashMap::new())), expiration: None }
    }
}

impl<I, O> Cache for MemoryCache<I, O>
where
    I: Hash + Eq,
    O: Clone,
{
    type Input = I;
    type Output = O;

    fn new(config: CacheConfig) -> Result<Self> {
        check_capacity(&config)?;
        let store = match config.max_capacity.and_then(lru_capacity) {
            Some(capacity) => Store::Lru(LruCache::new(capacity)),
            None => Store::HashMap(HashMap::new()),
        };
        Ok(Self { inner: Mutex::new(store), expiration: config.time_to_live })
    }
    fn get(&self, key: &Self::Input) -> Option<Self::Output> {
        let mut cache = self.lock();
        let ValueWithInstant { value, instant } = cache.get(key)?;
        if let Some(expiration) = self.expiration {
            if instant.elapsed() >= expiration {
                cache.del(key);
                return None;
            }
        }
        Some(value)
    }
    fn set(&self, key: Self::Input, value: Self::Output) {
        self.lock().set(key, ValueWithInstant { value, instant: Instant::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_unbounded() {
        let cache = MemoryCache::<u32, String>::default();
        for i in 0..100 {
            cache.set(i, i.to_string());
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get(&0).as_deref(), Some("0"));
        assert_eq!(cache.get(&99).as_deref(), Some("99"));
        assert_eq!(cache.get(&100), None);
    }

    #[test]
    fn test_max_capacity() {
        let cache = MemoryCache::<&str, u32>::new(CacheConfig {
            max_capacity: Some(2),
            ..Default::default()
        })
        .expect("failed to create cache");
        cache.set("k1", 1);
        cache.set("k2", 2);
        assert_eq!(cache.get(&"k1"), Some(1));
        cache.set("k3", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"k2"), None);
        assert_eq!(cache.get(&"k1"), Some(1));
        assert_eq!(cache.get(&"k3"), Some(3));
    }

    #[test]
    fn test_large_capacity_stays_bounded() {
        assert_eq!(lru_capacity(0), None);
        assert_eq!(lru_capacity(2).map(NonZeroUsize::get), Some(2));
        let expected = usize::try_from(1u64 << 32).unwrap_or(usize::MAX);
        assert_eq!(lru_capacity(1 << 32).map(NonZeroUsize::get), Some(expected));
        assert_eq!(lru_capacity(u64::MAX).map(NonZeroUsize::get), Some(usize::MAX));
    }

    #[test]
    fn test_time_to_live() {
        let cache = MemoryCache::<&str, u32>::new(CacheConfig {
            time_to_live: Some(Duration::from_millis(10)),
            ..Default::default()
        })
        .expect("failed to create cache");
        cache.set("k1", 1);
        assert_eq!(cache.get(&"k1"), Some(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"k1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity() {
        let result = MemoryCache::<u32, u32>::new(CacheConfig {
            max_capacity: Some(0),
            ..Default::default()
        });
        assert_eq!(result.err(), Some(Error::InvalidCapacity));
    }
}
