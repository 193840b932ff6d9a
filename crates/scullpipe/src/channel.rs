use crate::cancel::{CancelToken, Interrupt};
use crate::handle::{AccessMode, Handle, OpenOptions};
use crate::invariants::debug_assert_buffer_presence;
use crate::notify::{
    deliver, Readiness, ReadinessEvent, ReadinessSink, Subscriber, SubscriptionId,
};
use crate::{Config, Metrics, PipeError, RingBuffer, WaitSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

// =============================================================================
// LOCKING PROTOCOL
// =============================================================================
//
// One mutex per channel guards the buffer, both counters, the subscriber list
// and the metrics. Channels never share a lock.
//
// - `readable` is signalled after every write (readers wait for "not empty").
// - `writable` is signalled after every read (writers wait for "not full").
// - Both signals and subscriber callbacks run after the guard is dropped.
// - A blocked waiter registers with its handle's `CancelToken`; `interrupt()`
//   takes the channel lock before broadcasting so a cancel is never lost
//   between the waiter's last token check and its suspension.
//
// =============================================================================

#[derive(Debug, Default)]
struct ChannelState {
    /// Present iff `readers + writers > 0`.
    buffer: Option<RingBuffer>,
    readers: usize,
    writers: usize,
    subscribers: Vec<Subscriber>,
    next_handle: u64,
    next_subscription: u64,
    metrics: Metrics,
}

impl ChannelState {
    /// The live buffer. Callers hold an open handle, so it exists.
    fn ring(&self) -> &RingBuffer {
        self.buffer
            .as_ref()
            .unwrap_or_else(|| unreachable!("channel buffer freed while a handle is open"))
    }

    fn ring_mut(&mut self) -> &mut RingBuffer {
        self.buffer
            .as_mut()
            .unwrap_or_else(|| unreachable!("channel buffer freed while a handle is open"))
    }

    fn sinks(&self) -> Vec<Arc<dyn ReadinessSink>> {
        self.subscribers.iter().map(|s| Arc::clone(&s.sink)).collect()
    }
}

/// One bounded byte-stream channel.
///
/// Any number of reader and writer [`Handle`]s may be open at once. The ring
/// buffer is allocated when the first handle opens and freed when the last one
/// closes, so a channel that was fully closed always reopens empty.
///
/// Bytes from one writer arrive in order. Concurrent writers interleave at
/// whole-call granularity with no framing.
pub struct Channel {
    index: usize,
    capacity: usize,
    enable_metrics: bool,
    state: Mutex<ChannelState>,
    /// Signalled after writes; readers wait here.
    readable: WaitSet,
    /// Signalled after reads; writers wait here.
    writable: WaitSet,
    weak_self: Weak<Channel>,
}

impl Channel {
    /// Creates an unallocated channel sized by `config`, which the owning
    /// [`ChannelTable`](crate::ChannelTable) has already validated.
    pub(crate) fn new(index: usize, config: &Config) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            index,
            capacity: config.buffer_capacity,
            enable_metrics: config.enable_metrics,
            state: Mutex::new(ChannelState::default()),
            readable: WaitSet::new(),
            writable: WaitSet::new(),
            weak_self: weak_self.clone(),
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Configured buffer size, including the reserved slot.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        // Every critical section leaves the state consistent, so a panic in
        // a sink or test thread does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---------------------------------------------------------------------
    // OPEN / CLOSE
    // ---------------------------------------------------------------------

    /// Opens a blocking handle.
    pub fn open(self: &Arc<Self>, mode: AccessMode) -> Result<Handle, PipeError> {
        self.open_with(OpenOptions::new(mode))
    }

    /// Opens a handle with explicit options.
    ///
    /// The first open after the channel was idle allocates a fresh, empty
    /// buffer. On allocation failure nothing changes.
    pub fn open_with(self: &Arc<Self>, options: OpenOptions) -> Result<Handle, PipeError> {
        let mode = options.mode;
        let mut state = self.lock();

        if state.buffer.is_none() {
            let ring = RingBuffer::try_new(self.capacity).inspect_err(|_| {
                warn!(channel = self.index, capacity = self.capacity, "buffer allocation failed");
            })?;
            state.buffer = Some(ring);
            debug!(channel = self.index, capacity = self.capacity, "buffer allocated");
        }

        if mode.can_read() {
            state.readers += 1;
        }
        if mode.can_write() {
            state.writers += 1;
        }
        let id = state.next_handle;
        state.next_handle += 1;

        debug_assert_buffer_presence!(state.buffer.is_some(), state.readers, state.writers);
        debug!(
            channel = self.index,
            %mode,
            readers = state.readers,
            writers = state.writers,
            "handle opened"
        );
        drop(state);

        Ok(Handle::new(Arc::clone(self), id, options))
    }

    /// Drops a handle's counts and subscriptions; frees the buffer when the
    /// last handle goes.
    pub(crate) fn release(&self, handle_id: u64, mode: AccessMode) {
        let mut state = self.lock();

        if mode.can_read() {
            state.readers -= 1;
        }
        if mode.can_write() {
            state.writers -= 1;
        }
        state.subscribers.retain(|s| s.owner != handle_id);

        if state.readers + state.writers == 0 {
            state.buffer = None;
            debug!(channel = self.index, "buffer freed");
        }

        debug_assert_buffer_presence!(state.buffer.is_some(), state.readers, state.writers);
        debug!(
            channel = self.index,
            readers = state.readers,
            writers = state.writers,
            "handle closed"
        );
    }

    // ---------------------------------------------------------------------
    // TRANSFER
    // ---------------------------------------------------------------------

    /// Copies up to `out.len()` bytes out of the buffer.
    ///
    /// Blocks while empty unless the handle is non-blocking. A short count is
    /// normal. Writers and subscribers are notified after every successful read.
    pub(crate) fn read(&self, handle: &Handle, out: &mut [u8]) -> Result<usize, PipeError> {
        if !handle.mode.can_read() {
            return Err(PipeError::InvalidMode {
                mode: handle.mode,
                op: crate::error::Operation::Read,
            });
        }
        if out.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock();
        if state.ring().is_empty() {
            if !handle.blocking {
                if self.enable_metrics {
                    state.metrics.would_block += 1;
                }
                return Err(PipeError::WouldBlock);
            }
            if self.enable_metrics {
                state.metrics.read_waits += 1;
            }
            debug!(channel = self.index, handle = handle.id, "reader going to sleep");
            let deadline = deadline_after(handle.read_timeout);
            state = self.suspend(state, &self.readable, &handle.cancel, deadline, |s| {
                !s.ring().is_empty()
            })?;
        }

        let n = state.ring_mut().read_into(out);
        if self.enable_metrics {
            state.metrics.add_read(n);
        }
        let sinks = state.sinks();
        drop(state);

        self.writable.signal_all();
        deliver(sinks, ReadinessEvent::Writable);
        trace!(channel = self.index, handle = handle.id, bytes = n, "read");
        Ok(n)
    }

    /// Copies as much of `data` as fits into the buffer.
    ///
    /// Blocks while full unless the handle is non-blocking. Returns the number
    /// of bytes accepted; the caller retries with the remainder. Readers and
    /// subscribers are notified after every successful write.
    pub(crate) fn write(&self, handle: &Handle, data: &[u8]) -> Result<usize, PipeError> {
        if !handle.mode.can_write() {
            return Err(PipeError::InvalidMode {
                mode: handle.mode,
                op: crate::error::Operation::Write,
            });
        }
        if data.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock();
        if state.ring().is_full() {
            if !handle.blocking {
                if self.enable_metrics {
                    state.metrics.would_block += 1;
                }
                return Err(PipeError::WouldBlock);
            }
            if self.enable_metrics {
                state.metrics.write_waits += 1;
            }
            debug!(channel = self.index, handle = handle.id, "writer going to sleep");
            let deadline = deadline_after(handle.write_timeout);
            state = self.suspend(state, &self.writable, &handle.cancel, deadline, |s| {
                !s.ring().is_full()
            })?;
        }

        let n = state.ring_mut().write_from(data);
        if self.enable_metrics {
            state.metrics.add_write(n);
        }
        let sinks = state.sinks();
        drop(state);

        self.readable.signal_all();
        deliver(sinks, ReadinessEvent::Readable);
        trace!(channel = self.index, handle = handle.id, bytes = n, "write");
        Ok(n)
    }

    /// Waits on `waits` with the caller registered for cancellation.
    fn suspend<'a, F>(
        &self,
        state: MutexGuard<'a, ChannelState>,
        waits: &WaitSet,
        cancel: &CancelToken,
        deadline: Option<Instant>,
        predicate: F,
    ) -> Result<MutexGuard<'a, ChannelState>, PipeError>
    where
        F: FnMut(&ChannelState) -> bool,
    {
        let waiter: Weak<dyn Interrupt> = self.weak_self.clone();
        let _registration = cancel.register(waiter);
        waits
            .wait_until(state, predicate, cancel, deadline)
            .inspect_err(|err| debug!(channel = self.index, %err, "wait abandoned"))
    }

    // ---------------------------------------------------------------------
    // READINESS
    // ---------------------------------------------------------------------

    pub(crate) fn poll(&self, mode: AccessMode) -> Readiness {
        let state = self.lock();
        match state.buffer.as_ref() {
            Some(ring) => Readiness {
                readable: mode.can_read() && !ring.is_empty(),
                writable: mode.can_write() && !ring.is_full(),
            },
            None => Readiness::default(),
        }
    }

    pub(crate) fn subscribe(
        &self,
        owner: u64,
        sink: Arc<dyn ReadinessSink>,
    ) -> SubscriptionId {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.subscribers.push(Subscriber { id, owner, sink });
        id
    }

    pub(crate) fn unsubscribe(&self, owner: u64, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|s| !(s.owner == owner && s.id == id));
        state.subscribers.len() != before
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Bytes currently queued; zero while unallocated.
    pub fn used_space(&self) -> usize {
        self.lock().buffer.as_ref().map_or(0, RingBuffer::used_space)
    }

    /// Returns true while at least one handle is open.
    pub fn is_allocated(&self) -> bool {
        self.lock().buffer.is_some()
    }

    /// Consistent snapshot of the channel, taken under its lock.
    pub fn status(&self) -> ChannelStatus {
        let state = self.lock();
        let ring = state.buffer.as_ref();
        ChannelStatus {
            index: self.index,
            capacity: self.capacity,
            allocated: ring.is_some(),
            used: ring.map_or(0, RingBuffer::used_space),
            free: ring.map_or(0, RingBuffer::free_space),
            read_pos: ring.map_or(0, RingBuffer::read_pos),
            write_pos: ring.map_or(0, RingBuffer::write_pos),
            readers: state.readers,
            writers: state.writers,
            subscribers: state.subscribers.len(),
            metrics: self.enable_metrics.then_some(state.metrics),
        }
    }
}

/// Deadline `timeout` from now. A timeout too large to represent means no
/// deadline at all.
fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

impl Interrupt for Channel {
    fn interrupt(&self) {
        let _state = self.lock();
        self.readable.signal_all();
        self.writable.signal_all();
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("index", &self.index)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Snapshot returned by [`Channel::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub index: usize,
    pub capacity: usize,
    pub allocated: bool,
    pub used: usize,
    pub free: usize,
    pub read_pos: usize,
    pub write_pos: usize,
    pub readers: usize,
    pub writers: usize,
    pub subscribers: usize,
    /// `None` unless metrics are enabled.
    pub metrics: Option<Metrics>,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device {}:", self.index)?;
        if self.allocated {
            writeln!(
                f,
                "   Buffer: {} bytes, {} used, {} free",
                self.capacity, self.used, self.free
            )?;
            writeln!(f, "   rp {}  wp {}", self.read_pos, self.write_pos)?;
        } else {
            writeln!(f, "   Buffer: not allocated")?;
        }
        writeln!(
            f,
            "   readers {}  writers {}  async {}",
            self.readers, self.writers, self.subscribers
        )?;
        if let Some(m) = self.metrics {
            writeln!(
                f,
                "   read {} bytes in {} calls ({} waits), wrote {} bytes in {} calls ({} waits), {} would-block",
                m.bytes_read, m.reads, m.read_waits, m.bytes_written, m.writes, m.write_waits, m.would_block
            )?;
        }
        Ok(())
    }
}
