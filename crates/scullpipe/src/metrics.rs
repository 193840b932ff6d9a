/// Optional per-channel counters.
///
/// Updated under the channel lock, and only when `Config::enable_metrics` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub reads: u64,
    pub writes: u64,
    /// Times a reader went to sleep on an empty buffer
    pub read_waits: u64,
    /// Times a writer went to sleep on a full buffer
    pub write_waits: u64,
    /// `WouldBlock` returns to non-blocking handles
    pub would_block: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_read(&mut self, n: usize) {
        self.reads += 1;
        self.bytes_read += n as u64;
    }

    pub(crate) fn add_write(&mut self, n: usize) {
        self.writes += 1;
        self.bytes_written += n as u64;
    }
}
