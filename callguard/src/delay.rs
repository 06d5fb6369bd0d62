//! Deferred invocation.
use crate::error::Result;
use crate::runtime;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Handle to a call scheduled by [`delay`].
///
/// Dropping the handle does not cancel the call.
#[derive(Debug)]
pub struct Delayed {
    handle: AbortHandle,
}

impl Delayed {
    /// Cancels the call if it has not started yet.
    pub fn cancel(&self) {
        tracing::debug!("cancelling delayed call");
        self.handle.abort();
    }

    /// Whether the call has completed, panicked or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Schedules exactly one call `f(args)` no earlier than `wait` from now.
///
/// Returns immediately. The call runs as a task on the current tokio runtime;
/// if there is none, fails with [`Error::NoRuntime`](crate::Error::NoRuntime)
/// before scheduling anything, and with
/// [`Error::TimersDisabled`](crate::Error::TimersDisabled) if the runtime was
/// built without timers. What happens inside `f` is never reported back: `f` returns `()`
/// and a panic in it is contained in its task, so any failure has to be
/// handled by `f` itself.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use callguard::delay;
/// use std::time::Duration;
///
/// let (tx, rx) = tokio::sync::oneshot::channel();
/// let greet = move |(a, b): (&str, &str)| {
///     let _ = tx.send(format!("{a}, {b}"));
/// };
/// delay(greet, Duration::from_millis(5), ("hello", "world")).expect("no runtime");
/// assert_eq!(rx.await.expect("dropped"), "hello, world");
/// # }
/// ```
pub fn delay<A, F>(f: F, wait: Duration, args: A) -> Result<Delayed>
where
    F: FnOnce(A) + Send + 'static,
    A: Send + 'static,
{
    let handle = runtime::current()?;
    let sleep = runtime::sleep_on(&handle, wait)?;
    tracing::debug!(wait_ms = wait.as_millis() as u64, "scheduling delayed call");
    let task = handle.spawn(async move {
        sleep.await;
        tracing::debug!("running delayed call");
        f(args);
    });
    Ok(Delayed { handle: task.abort_handle() })
}
