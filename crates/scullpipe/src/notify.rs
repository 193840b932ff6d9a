//! Readiness notification: poll masks and asynchronous subscribers.

use std::fmt;
use std::sync::Arc;

/// Event delivered to a [`ReadinessSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessEvent {
    /// A write completed; data is available to readers.
    Readable,
    /// A read completed; writers may have room.
    Writable,
}

/// Receiver of asynchronous readiness events.
///
/// Called after the channel lock is released, on the thread that completed
/// the transfer. Delivery is best-effort with no ordering across events.
/// Implementations must not block: a slow sink stalls the reader or writer
/// that triggered it.
pub trait ReadinessSink: Send + Sync {
    fn notify(&self, event: ReadinessEvent);
}

impl<F> ReadinessSink for F
where
    F: Fn(ReadinessEvent) + Send + Sync,
{
    fn notify(&self, event: ReadinessEvent) {
        self(event);
    }
}

/// Identifies a subscription returned by
/// [`Handle::subscribe`](crate::Handle::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// A registered sink, tagged with the handle that owns it.
#[derive(Clone)]
pub(crate) struct Subscriber {
    pub(crate) id: SubscriptionId,
    pub(crate) owner: u64,
    pub(crate) sink: Arc<dyn ReadinessSink>,
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Delivers `event` to every sink in `subscribers`.
///
/// Takes an owned snapshot so it can run after the lock is dropped.
pub(crate) fn deliver(subscribers: Vec<Arc<dyn ReadinessSink>>, event: ReadinessEvent) {
    for sink in subscribers {
        sink.notify(event);
    }
}

/// Point-in-time readiness of a handle, as a `poll` mask would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    /// The buffer holds data and the handle may read.
    pub readable: bool,
    /// The buffer has free space and the handle may write.
    pub writable: bool,
}

impl Readiness {
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.readable || self.writable
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.readable, self.writable) {
            (true, true) => f.write_str("readable|writable"),
            (true, false) => f.write_str("readable"),
            (false, true) => f.write_str("writable"),
            (false, false) => f.write_str("none"),
        }
    }
}
