//! Client handles and the options used to open them.

use crate::notify::{Readiness, ReadinessSink, SubscriptionId};
use crate::{CancelToken, Channel, ChannelTable, PipeError};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Direction(s) a handle was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    #[inline]
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    #[inline]
    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read-only"),
            Self::Write => f.write_str("write-only"),
            Self::ReadWrite => f.write_str("read-write"),
        }
    }
}

/// How to open a handle.
///
/// ```
/// use scullpipe::{AccessMode, ChannelTable, Config, OpenOptions};
///
/// let table = ChannelTable::new(Config::default()).unwrap();
/// let reader = OpenOptions::new(AccessMode::Read)
///     .nonblocking(true)
///     .open(&table, 0)
///     .unwrap();
/// assert!(!reader.is_blocking());
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub(crate) mode: AccessMode,
    pub(crate) nonblocking: bool,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) write_timeout: Option<Duration>,
    pub(crate) cancel: Option<CancelToken>,
}

impl OpenOptions {
    /// Blocking, no timeouts, a fresh cancellation token.
    pub fn new(mode: AccessMode) -> Self {
        Self {
            mode,
            nonblocking: false,
            read_timeout: None,
            write_timeout: None,
            cancel: None,
        }
    }

    pub fn nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Shares `token` with the new handle instead of creating one.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Opens channel `index` of `table`.
    pub fn open(self, table: &ChannelTable, index: usize) -> Result<Handle, PipeError> {
        table.channel(index)?.open_with(self)
    }
}

/// An open reference to a [`Channel`].
///
/// Dropping the handle closes it: its reader/writer count is released, its
/// subscriptions are removed, and if it was the last handle the buffer is
/// freed. Ownership makes a double close impossible.
///
/// `&Handle` is `Send + Sync`, so one handle may be shared by several threads;
/// their calls serialize on the channel lock.
pub struct Handle {
    pub(crate) channel: Arc<Channel>,
    pub(crate) id: u64,
    pub(crate) mode: AccessMode,
    pub(crate) blocking: bool,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) write_timeout: Option<Duration>,
    pub(crate) cancel: CancelToken,
}

impl Handle {
    pub(crate) fn new(channel: Arc<Channel>, id: u64, options: OpenOptions) -> Self {
        Self {
            channel,
            id,
            mode: options.mode,
            blocking: !options.nonblocking,
            read_timeout: options.read_timeout,
            write_timeout: options.write_timeout,
            cancel: options.cancel.unwrap_or_default(),
        }
    }

    #[inline]
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    #[inline]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Switches between blocking and non-blocking transfers.
    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.blocking = !nonblocking;
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// A clone of this handle's token; cancelling it aborts blocked calls.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Replaces the token, e.g. after a cancellation has been handled.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    // ---------------------------------------------------------------------
    // TRANSFER
    // ---------------------------------------------------------------------

    /// Reads up to `buf.len()` bytes.
    ///
    /// Blocks while the channel is empty (unless non-blocking) and returns as
    /// soon as any data is available, so short counts are normal.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, PipeError> {
        self.channel.read(self, buf)
    }

    /// Like [`read`](Self::read) but returns the bytes as a `Vec`.
    pub fn read_bytes(&self, max_len: usize) -> Result<Vec<u8>, PipeError> {
        let mut buf = vec![0u8; max_len];
        let n = self.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Writes as much of `data` as fits, blocking while full (unless
    /// non-blocking). Returns the accepted count; retry with the rest.
    pub fn write(&self, data: &[u8]) -> Result<usize, PipeError> {
        self.channel.write(self, data)
    }

    /// Writes all of `data`, retrying short writes.
    ///
    /// On error, an unknown prefix of `data` may already be in the channel.
    pub fn write_all(&self, mut data: &[u8]) -> Result<(), PipeError> {
        while !data.is_empty() {
            let n = self.write(data)?;
            data = &data[n..];
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // READINESS
    // ---------------------------------------------------------------------

    /// Current readiness for this handle's directions.
    pub fn poll(&self) -> Readiness {
        self.channel.poll(self.mode)
    }

    /// Registers `sink` for readiness events until unsubscribed or closed.
    pub fn subscribe<S>(&self, sink: S) -> SubscriptionId
    where
        S: ReadinessSink + 'static,
    {
        self.channel.subscribe(self.id, Arc::new(sink))
    }

    /// Removes one of this handle's subscriptions. Returns `false` if it was
    /// not registered by this handle.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channel.unsubscribe(self.id, id)
    }

    /// Closes the handle. Same as dropping it.
    pub fn close(self) {}
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.channel.release(self.id, self.mode);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("channel", &self.channel.index())
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("blocking", &self.blocking)
            .finish_non_exhaustive()
    }
}

impl io::Read for &Handle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Handle::read(*self, buf).map_err(io::Error::from)
    }
}

impl io::Read for Handle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Handle::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for &Handle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Handle::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for Handle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Handle::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
