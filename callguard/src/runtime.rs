//! The tokio runtime that drives scheduled calls.
use crate::error::{Error, Result};
use std::panic;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Sleep;

/// Returns the current runtime, checking that its timer is enabled.
pub(crate) fn current() -> Result<Handle> {
    let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
    sleep_on(&runtime, Duration::ZERO)?;
    Ok(runtime)
}

/// Creates a [`Sleep`] bound to the timer of `runtime`.
///
/// tokio panics when a timer is created on a runtime built without
/// `enable_time`; that panic is reported here as [`Error::TimersDisabled`].
pub(crate) fn sleep_on(runtime: &Handle, wait: Duration) -> Result<Sleep> {
    let _guard = runtime.enter();
    panic::catch_unwind(|| tokio::time::sleep(wait)).map_err(|_| Error::TimersDisabled)
}
