//! Run-once guard.
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

enum State<F, R> {
    Ready(F),
    Running,
    Done(R),
}

/// A callable that runs its function at most once.
///
/// The first [`call`](Once::call) runs the function and stores its return
/// value; every later call returns a clone of that value without running
/// anything, whatever arguments it is given.
///
/// A fallible function is expected to return a `Result`: an `Err` from the
/// first call is stored like any other value, so it is returned forever and the
/// function is never retried.
pub struct Once<A, R, F> {
    state: Mutex<State<F, R>>,
    _args: PhantomData<fn(A)>,
}

/// Wraps `f` in a [`Once`] guard.
///
/// ```
/// use callguard::once;
///
/// let init = once(|name: &str| format!("connected to {name}"));
/// assert_eq!(init.call("primary"), "connected to primary");
/// assert_eq!(init.call("replica"), "connected to primary");
/// ```
pub fn once<A, R, F>(f: F) -> Once<A, R, F>
where
    F: FnOnce(A) -> R,
{
    Once { state: Mutex::new(State::Ready(f)), _args: PhantomData }
}

impl<A, R, F> Once<A, R, F>
where
    F: FnOnce(A) -> R,
    R: Clone,
{
    /// Runs the function on the first call, then returns the stored result.
    ///
    /// Concurrent first callers block until the single run completes.
    ///
    /// # Panics
    ///
    /// If the function panicked during the first call, that call panics and so
    /// does every later one: the guard has been consumed and never retries.
    /// Calling the wrapper from inside its own function deadlocks.
    pub fn call(&self, args: A) -> R {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, State::Running) {
            State::Done(result) => {
                *state = State::Done(result.clone());
                result
            }
            State::Ready(f) => {
                tracing::trace!("running once-guarded function");
                let result = f(args);
                *state = State::Done(result.clone());
                result
            }
            State::Running => panic!("once-guarded function panicked during its first call"),
        }
    }

    /// Returns the stored result, if the function has already run.
    pub fn get(&self) -> Option<R> {
        match &*self.lock() {
            State::Done(result) => Some(result.clone()),
            _ => None,
        }
    }
}

impl<A, R, F> Once<A, R, F> {
    /// Whether the first call has happened (including one that panicked).
    pub fn is_invoked(&self) -> bool {
        !matches!(&*self.lock(), State::Ready(_))
    }

    fn lock(&self) -> MutexGuard<'_, State<F, R>> {
        // a panic in the wrapped function leaves `Running` behind, which `call` reports
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A, R, F> Debug for Once<A, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Once").field("invoked", &self.is_invoked()).finish()
    }
}
