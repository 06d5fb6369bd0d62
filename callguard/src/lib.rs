#![doc = include_str!("../README.md")]
pub mod delay;
pub mod each;
pub mod error;
pub mod memoize;
pub mod once;
mod runtime;
pub mod throttle;
pub mod types;

pub use crate::delay::{delay, Delayed};
pub use crate::each::{each, Traverse};
pub use crate::error::{Error, Result};
pub use crate::memoize::{memoize, memoize_with, Memoized};
pub use crate::once::{once, Once};
pub use crate::throttle::{throttle, Phase, Throttleable, Throttled};
pub use crate::types::cached::{Cache, CacheConfig, Cacheable, MemoryCache, MokaCache};
