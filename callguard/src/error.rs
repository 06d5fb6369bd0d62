#![doc = "Error types."]
use thiserror::Error;

/// Error type for this crate.
///
/// Every variant is a configuration error raised synchronously by a decorator
/// factory. Failures of the wrapped function itself are never converted into
/// this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("throttle window must be greater than zero")]
    InvalidWindow,
    #[error("cache max_capacity must be greater than zero")]
    InvalidCapacity,
    #[error("no tokio runtime available to schedule timers")]
    NoRuntime,
    #[error("tokio runtime has timers disabled")]
    TimersDisabled,
}

/// Type alias to use this crate's [`Error`](enum@crate::Error) type in a [`Result`](core::result::Result).
pub type Result<T> = core::result::Result<T, Error>;
