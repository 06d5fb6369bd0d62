mod memory;
mod moka;

pub use self::memory::MemoryCache;
pub use self::moka::MokaCache;

use crate::error::Result;
use crate::memoize::Memoized;
use std::hash::Hash;
use std::time::Duration;

/// Bounds for a memoization cache.
///
/// The default config is unbounded: entries are never evicted.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    pub max_capacity: Option<u64>,
    pub time_to_live: Option<Duration>,
}

/// Storage behind a [`Memoized`] wrapper.
///
/// Implementations must be safe to share behind `&self`.
pub trait Cache {
    type Input: Hash + Eq;
    type Output: Clone;

    fn new(config: CacheConfig) -> Result<Self>
    where
        Self: Sized;
    fn get(&self, key: &Self::Input) -> Option<Self::Output>;
    fn set(&self, key: Self::Input, value: Self::Output);
}

pub trait Cacheable<C>
where
    Self: Sized,
{
    fn cached<K, V>(self, cache: C) -> Memoized<K, V, Self, C>
    where
        C: Cache<Input = K, Output = V>;
}

impl<F, C> Cacheable<C> for F {
    fn cached<K, V>(self, cache: C) -> Memoized<K, V, Self, C>
    where
        C: Cache<Input = K, Output = V>,
    {
        Memoized::with_cache(self, cache)
    }
}

pub(crate) fn check_capacity(config: &CacheConfig) -> Result<()> {
    match config.max_capacity {
        Some(0) => Err(crate::Error::InvalidCapacity),
        _ => Ok(()),
    }
}
