use super::{check_capacity, Cache, CacheConfig};
use crate::error::Result;
use moka::policy::EvictionPolicy;
use moka::sync::Cache as SyncCache;
use std::collections::hash_map::RandomState;
use std::hash::Hash;

/// A concurrent cache backed by [`moka`], for wrappers called from many threads.
pub struct MokaCache<I, O> {
    inner: SyncCache<I, O, RandomState>,
}

impl<I, O> MokaCache<I, O>
where
    I: Hash + Eq + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl<I, O> Cache for MokaCache<I, O>
where
    I: Hash + Eq + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    type Input = I;
    type Output = O;

    fn new(config: CacheConfig) -> Result<Self> {
        check_capacity(&config)?;
        let mut builder = SyncCache::<I, O, _>::builder().eviction_policy(EvictionPolicy::lru());
        if let Some(max_capacity) = config.max_capacity {
            builder = builder.max_capacity(max_capacity);
        }
        if let Some(time_to_live) = config.time_to_live {
            builder = builder.time_to_live(time_to_live);
        }
        Ok(Self { inner: builder.build() })
    }
    fn get(&self, key: &Self::Input) -> Option<Self::Output> {
        self.inner.run_pending_tasks();
        self.inner.get(key)
    }
    fn set(&self, key: Self::Input, value: Self::Output) {
        self.inner.insert(key, value);
    }
}
