use crate::cancel::CancelToken;
use crate::error::PipeError;
use std::sync::{Condvar, MutexGuard, PoisonError};
use std::time::Instant;

/// Blocks callers until a predicate over lock-protected state holds.
///
/// The lock is released while suspended and reacquired before the predicate
/// is re-tested. Wakeups are broadcast: every waiter re-checks its own
/// predicate, so spurious wakeups are harmless and a woken waiter is not
/// guaranteed to make progress.
#[derive(Debug, Default)]
pub struct WaitSet {
    cond: Condvar,
}

impl WaitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `predicate` holds, the token is cancelled, or `deadline`
    /// passes.
    ///
    /// The predicate is checked before the token, so an already-satisfied wait
    /// succeeds even under a cancelled token. On error the guard is dropped,
    /// leaving the lock released exactly as before the caller acquired it.
    pub fn wait_until<'a, T, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut predicate: F,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'a, T>, PipeError>
    where
        F: FnMut(&T) -> bool,
    {
        loop {
            if predicate(&*guard) {
                return Ok(guard);
            }
            if cancel.is_cancelled() {
                return Err(PipeError::Cancelled);
            }
            guard = match deadline {
                None => self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PipeError::TimedOut);
                    }
                    self.cond
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Wakes every waiter.
    #[inline]
    pub fn signal_all(&self) {
        self.cond.notify_all();
    }
}
