//! Cancellation tokens for blocked reads and writes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Something a blocked waiter sleeps on and that can be woken from outside.
///
/// Implementors must take the same lock the waiter holds while checking the
/// token before broadcasting, otherwise a cancel racing with the waiter's last
/// check could be lost.
pub(crate) trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

struct CancelInner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    /// Waiters currently suspended under this token.
    waiters: Mutex<Vec<(u64, Weak<dyn Interrupt>)>>,
}

/// A cloneable, sticky cancellation flag.
///
/// Cancelling wakes every operation currently blocked under this token; they
/// return [`PipeError::Cancelled`](crate::PipeError::Cancelled) without
/// transferring any bytes. Once cancelled, a token stays cancelled, so later
/// operations that would block fail immediately. Install a fresh token with
/// [`Handle::set_cancel_token`](crate::Handle::set_cancel_token) to resume.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cancels the token and wakes every waiter registered on it.
    ///
    /// Idempotent: later calls have no additional effect on waiters that
    /// already left.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        // Snapshot, then release our lock before taking any channel lock.
        let waiters: Vec<_> = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(_, w)| w.upgrade())
            .collect();

        for waiter in waiters {
            waiter.interrupt();
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns true if both tokens share the same flag.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers a waiter for the duration of the returned guard.
    pub(crate) fn register(&self, waiter: Weak<dyn Interrupt>) -> Registration<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, waiter));
        Registration { token: self, id }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Removes its waiter from the token on drop.
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}
