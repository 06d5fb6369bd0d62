//! Time-windowed throttling with a coalesced trailing call.
//!
//! A [`Throttled`] wrapper moves through three phases:
//!
//! - [`Phase::Idle`]: no window is open. The next call runs the function
//!   immediately (the leading call) and opens a window.
//! - [`Phase::ActiveWindow`]: a window is open. A call inside it does not run
//!   the function; its arguments become pending and a timer is set for the end
//!   of the window.
//! - [`Phase::TrailingScheduled`]: later calls inside the window only replace
//!   the pending arguments. When the timer fires, the function runs once with
//!   the most recent arguments and a fresh window opens at that moment.
//!
//! A window that ends without any pending call simply lapses back to idle.
//! A call made exactly at the end of a window belongs to the next one.
use crate::error::{Error, Result};
use crate::runtime;
use std::fmt::{self, Debug};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Observable phase of a [`Throttled`] wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ActiveWindow,
    TrailingScheduled,
}

enum State<A> {
    Idle,
    Active { started: Instant },
    Trailing { started: Instant, pending: A, timer: AbortHandle },
}

struct Shared<A, F> {
    inner: F,
    window: Duration,
    runtime: Handle,
    state: Mutex<State<A>>,
}

impl<A, F> Shared<A, F> {
    fn lock(&self) -> MutexGuard<'_, State<A>> {
        // the wrapped function never runs under this lock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A callable that runs its function at most once per window, plus at most one
/// trailing call with the latest arguments received during the window.
///
/// Trailing calls are scheduled on the tokio runtime that was current when the
/// wrapper was created, so [`call`](Throttled::call) itself may be made from
/// any thread. Dropping the wrapper cancels a pending trailing call.
pub struct Throttled<A, F> {
    shared: Arc<Shared<A, F>>,
}

/// Wraps `f` so that it runs at most once per `window`, plus one trailing call.
///
/// Fails with [`Error::InvalidWindow`] for a zero window, with
/// [`Error::NoRuntime`] outside a tokio runtime, and with
/// [`Error::TimersDisabled`] on a runtime built without timers.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use callguard::throttle;
/// use std::time::Duration;
///
/// let resize = throttle(|width: u32| width, Duration::from_millis(50)).expect("invalid window");
/// assert_eq!(resize.call(640), Some(640));
/// assert_eq!(resize.call(800), None);
/// assert_eq!(resize.call(1024), None);
/// # }
/// ```
pub fn throttle<A, R, F>(f: F, window: Duration) -> Result<Throttled<A, F>>
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: Send + 'static,
{
    if window.is_zero() {
        return Err(Error::InvalidWindow);
    }
    let runtime = runtime::current()?;
    Ok(Throttled {
        shared: Arc::new(Shared { inner: f, window, runtime, state: Mutex::new(State::Idle) }),
    })
}

pub trait Throttleable
where
    Self: Sized,
{
    fn throttled<A, R>(self, window: Duration) -> Result<Throttled<A, Self>>
    where
        Self: Fn(A) -> R + Send + Sync + 'static,
        A: Send + 'static;
}

impl<F> Throttleable for F {
    fn throttled<A, R>(self, window: Duration) -> Result<Throttled<A, Self>>
    where
        Self: Fn(A) -> R + Send + Sync + 'static,
        A: Send + 'static,
    {
        throttle(self, window)
    }
}

impl<A, R, F> Throttled<A, F>
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Calls through the throttle.
    ///
    /// Returns the function's result if this call ran it immediately, or `None`
    /// if the arguments were kept for the trailing call. Results of trailing
    /// calls are discarded.
    pub fn call(&self, args: A) -> Option<R> {
        let shared = &self.shared;
        let now = Instant::now();
        let mut state = shared.lock();
        match mem::replace(&mut *state, State::Idle) {
            State::Active { started } if now < started + shared.window => {
                let timer = schedule(shared, started + shared.window);
                *state = State::Trailing { started, pending: args, timer };
                drop(state);
                tracing::debug!("throttled call deferred to end of window");
                None
            }
            State::Trailing { started, timer, .. } if now < started + shared.window => {
                *state = State::Trailing { started, pending: args, timer };
                drop(state);
                tracing::trace!("throttled call coalesced into pending trailing call");
                None
            }
            State::Trailing { pending, timer, .. } => {
                // the timer is due but has not run yet: fire it here, then this
                // call is the first one inside the new window
                timer.abort();
                let timer = schedule(shared, now + shared.window);
                *state = State::Trailing { started: now, pending: args, timer };
                drop(state);
                tracing::debug!("throttled trailing call fired at window boundary");
                let _ = (shared.inner)(pending);
                None
            }
            State::Idle | State::Active { .. } => {
                *state = State::Active { started: now };
                drop(state);
                tracing::debug!(
                    window_ms = shared.window.as_millis() as u64,
                    "throttled leading call"
                );
                Some((shared.inner)(args))
            }
        }
    }
}

impl<A, F> Throttled<A, F> {
    pub fn window(&self) -> Duration {
        self.shared.window
    }

    /// Current phase, treating a lapsed window as idle.
    pub fn phase(&self) -> Phase {
        match &*self.shared.lock() {
            State::Idle => Phase::Idle,
            State::Active { started } if Instant::now() >= *started + self.shared.window => {
                Phase::Idle
            }
            State::Active { .. } => Phase::ActiveWindow,
            State::Trailing { .. } => Phase::TrailingScheduled,
        }
    }

    /// Drops the pending trailing call, if any. The current window stays open.
    ///
    /// Returns `true` if a trailing call was cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.lock();
        match mem::replace(&mut *state, State::Idle) {
            State::Trailing { started, timer, .. } => {
                timer.abort();
                *state = State::Active { started };
                tracing::debug!("throttled trailing call cancelled");
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }
}

fn schedule<A, R, F>(shared: &Arc<Shared<A, F>>, deadline: Instant) -> AbortHandle
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: Send + 'static,
{
    let weak = Arc::downgrade(shared);
    shared
        .runtime
        .spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire_trailing(weak);
        })
        .abort_handle()
}

fn fire_trailing<A, R, F>(weak: Weak<Shared<A, F>>)
where
    F: Fn(A) -> R,
{
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let now = Instant::now();
    let mut state = shared.lock();
    match mem::replace(&mut *state, State::Idle) {
        // a call at the boundary may already have fired this window's trailing call
        State::Trailing { started, pending, .. } if now >= started + shared.window => {
            *state = State::Active { started: now };
            drop(state);
            tracing::debug!("throttled trailing call fired");
            let _ = (shared.inner)(pending);
        }
        other => *state = other,
    }
}

impl<A, F> Drop for Throttled<A, F> {
    fn drop(&mut self) {
        if let State::Trailing { timer, .. } = &*self.shared.lock() {
            timer.abort();
        }
    }
}

impl<A, F> Debug for Throttled<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("window", &self.shared.window)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    type Calls<A> = Arc<Mutex<Vec<(Duration, A)>>>;

    fn recorder<A>(start: Instant, calls: &Calls<A>) -> impl Fn(A) -> usize + Send + Sync + 'static
    where
        A: Send + 'static,
    {
        let calls = calls.clone();
        move |args| {
            let mut calls = calls.lock().expect("poisoned");
            calls.push((start.elapsed(), args));
            calls.len()
        }
    }

    fn args<A: Clone>(calls: &Calls<A>) -> Vec<A> {
        calls.lock().expect("poisoned").iter().map(|(_, args)| args.clone()).collect()
    }

    fn millis<A>(calls: &Calls<A>) -> Vec<u128> {
        calls.lock().expect("poisoned").iter().map(|(elapsed, _)| elapsed.as_millis()).collect()
    }

    async fn sleep_ms(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_and_trailing() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        assert_eq!(throttled.phase(), Phase::Idle);

        assert_eq!(throttled.call("t0"), Some(1));
        assert_eq!(throttled.phase(), Phase::ActiveWindow);
        sleep_ms(10).await;
        assert_eq!(throttled.call("t10"), None);
        assert_eq!(throttled.phase(), Phase::TrailingScheduled);
        sleep_ms(10).await;
        assert_eq!(throttled.call("t20"), None);
        assert_eq!(args(&calls), ["t0"]);

        sleep_ms(200).await;
        assert_eq!(args(&calls), ["t0", "t20"]);
        assert_eq!(millis(&calls), [0, 50]);
        assert_eq!(throttled.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_call() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        assert_eq!(throttled.call(0), Some(1));
        sleep_ms(200).await;
        assert_eq!(args(&calls), [0]);
        assert_eq!(throttled.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_lapses_without_calls() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        assert_eq!(throttled.call(0), Some(1));
        sleep_ms(50).await;
        assert_eq!(throttled.phase(), Phase::Idle);
        assert_eq!(throttled.call(50), Some(2));
        sleep_ms(100).await;
        assert_eq!(args(&calls), [0, 50]);
        assert_eq!(millis(&calls), [0, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_opens_new_window() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        assert_eq!(throttled.call(0), Some(1));
        sleep_ms(10).await;
        assert_eq!(throttled.call(10), None);
        sleep_ms(50).await;
        // the trailing call at 50 opened a window that is still active at 60
        assert_eq!(throttled.phase(), Phase::ActiveWindow);
        assert_eq!(throttled.call(60), None);
        sleep_ms(140).await;
        assert_eq!(throttled.call(200), Some(4));
        sleep_ms(100).await;
        assert_eq!(args(&calls), [0, 10, 60, 200]);
        assert_eq!(millis(&calls), [0, 50, 100, 200]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_at_boundary_belongs_to_next_window() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        assert_eq!(throttled.call(0), Some(1));
        sleep_ms(20).await;
        assert_eq!(throttled.call(20), None);
        sleep_ms(30).await;
        assert_eq!(throttled.call(50), None);
        sleep_ms(200).await;
        assert_eq!(args(&calls), [0, 20, 50]);
        assert_eq!(millis(&calls), [0, 50, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_stream() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        for i in 0..=20 {
            throttled.call(i * 10);
            sleep_ms(10).await;
        }
        sleep_ms(500).await;
        assert_eq!(args(&calls), [0, 40, 90, 140, 190, 200]);
        assert_eq!(millis(&calls), [0, 50, 100, 150, 200, 250]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        assert!(!throttled.cancel());
        assert_eq!(throttled.call(0), Some(1));
        sleep_ms(10).await;
        assert_eq!(throttled.call(10), None);
        assert!(throttled.cancel());
        assert_eq!(throttled.phase(), Phase::ActiveWindow);
        sleep_ms(100).await;
        assert_eq!(args(&calls), [0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_trailing() {
        let calls = Arc::default();
        let start = Instant::now();
        let throttled = throttle(recorder(start, &calls), Duration::from_millis(50))
            .expect("failed to throttle");
        assert_eq!(throttled.call(0), Some(1));
        assert_eq!(throttled.call(1), None);
        drop(throttled);
        sleep_ms(100).await;
        assert_eq!(args(&calls), [0]);
    }

    #[tokio::test]
    async fn test_invalid_window() {
        let result = throttle(|()| (), Duration::ZERO);
        assert_eq!(result.err().map(|err| err.to_string()), Some(Error::InvalidWindow.to_string()));
        let result = throttle(|n: u32| n, Duration::from_nanos(1));
        assert!(result.is_ok());
    }

    #[test]
    fn test_no_runtime() {
        let result = (|(): ()| ()).throttled(Duration::from_millis(50));
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[test]
    fn test_timers_disabled() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("failed to build runtime");
        let _guard = runtime.enter();
        let result = throttle(|n: u32| n, Duration::from_millis(50));
        assert!(matches!(result, Err(Error::TimersDisabled)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_callers() {
        let counts = Arc::new(AtomicUsize::new(0));
        let throttled = Arc::new(
            {
                let counts = counts.clone();
                move |_: usize| counts.fetch_add(1, Ordering::SeqCst)
            }
            .throttled(Duration::from_millis(200))
            .expect("failed to throttle"),
        );
        let handles = (0..8)
            .map(|i| {
                let throttled = throttled.clone();
                tokio::task::spawn_blocking(move || throttled.call(i))
            })
            .collect::<Vec<_>>();
        let leading = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|result| result.expect("task panicked"))
            .filter(Option::is_some)
            .count();
        assert_eq!(leading, 1);
        sleep_ms(400).await;
        assert_eq!(counts.load(Ordering::SeqCst), 2);
    }
}
