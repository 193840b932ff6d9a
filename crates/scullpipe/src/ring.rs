use crate::error::PipeError;
use crate::invariants::{
    debug_assert_cursor_in_bounds, debug_assert_no_overrun, debug_assert_space_conserved,
};

// =============================================================================
// CURSOR PROTOCOL
// =============================================================================
//
// `read_pos` and `write_pos` are wrapped indices into `storage`.
//
// - `read_pos == write_pos` always means EMPTY, never full.
// - One slot directly behind `read_pos` is never written, so a full buffer
//   holds `capacity - 1` bytes and `write_pos` stops one short of `read_pos`.
// - Readers own `[read_pos, write_pos)` (mod capacity), writers own the rest
//   minus the reserved slot.
//
// The buffer has no synchronization of its own. The owning `Channel` holds its
// lock around every call.
//
// =============================================================================

/// Fixed-capacity circular byte store.
///
/// Every copy in or out is split into at most two contiguous runs: the run up
/// to the end of `storage`, then the wrapped run starting at index 0.
#[derive(Debug)]
pub struct RingBuffer {
    /// Fixed-size allocation, never grows or shrinks.
    storage: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
}

impl RingBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes with both cursors at 0.
    ///
    /// Allocation failure is reported as [`PipeError::OutOfMemory`] instead of
    /// aborting.
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`; a smaller buffer could never hold a byte.
    pub fn try_new(capacity: usize) -> Result<Self, PipeError> {
        assert!(capacity >= 2, "ring capacity must be at least 2, got {capacity}");

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| PipeError::OutOfMemory { capacity })?;
        storage.resize(capacity, 0);

        Ok(Self {
            storage: storage.into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        })
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Total storage size, including the reserved slot.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    /// Returns true if `capacity - 1` bytes are queued.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_space() == 0
    }

    /// Bytes that may still be written without overtaking the reader.
    #[inline]
    pub fn free_space(&self) -> usize {
        if self.is_empty() {
            return self.capacity() - 1;
        }
        (self.read_pos + self.capacity() - self.write_pos) % self.capacity() - 1
    }

    /// Bytes available to read.
    #[inline]
    pub fn used_space(&self) -> usize {
        (self.write_pos + self.capacity() - self.read_pos) % self.capacity()
    }

    // ---------------------------------------------------------------------
    // CONTIGUOUS RUNS
    // ---------------------------------------------------------------------

    /// Longest run starting at `read_pos` readable in one pass, capped at
    /// `requested`. Zero when empty.
    #[inline]
    pub fn contiguous_readable_len(&self, requested: usize) -> usize {
        if self.is_empty() {
            return 0;
        }
        if self.write_pos > self.read_pos {
            requested.min(self.write_pos - self.read_pos)
        } else {
            requested.min(self.capacity() - self.read_pos)
        }
    }

    /// Longest run starting at `write_pos` writable in one pass without
    /// overtaking the reader, capped at `requested`.
    #[inline]
    pub fn contiguous_writable_len(&self, requested: usize) -> usize {
        if self.write_pos >= self.read_pos {
            requested
                .min(self.free_space())
                .min(self.capacity() - self.write_pos)
        } else {
            requested.min(self.read_pos - self.write_pos - 1)
        }
    }

    // ---------------------------------------------------------------------
    // CURSOR MOVEMENT
    // ---------------------------------------------------------------------

    /// Marks `n` bytes as consumed.
    #[inline]
    pub fn advance_read(&mut self, n: usize) {
        debug_assert_no_overrun!("read", n, self.used_space());
        self.read_pos = (self.read_pos + n) % self.capacity();
        debug_assert_cursor_in_bounds!("read", self.read_pos, self.capacity());
        debug_assert_space_conserved!(self.free_space(), self.used_space(), self.capacity());
    }

    /// Marks `n` bytes as produced.
    #[inline]
    pub fn advance_write(&mut self, n: usize) {
        debug_assert_no_overrun!("write", n, self.free_space());
        self.write_pos = (self.write_pos + n) % self.capacity();
        debug_assert_cursor_in_bounds!("write", self.write_pos, self.capacity());
        debug_assert_space_conserved!(self.free_space(), self.used_space(), self.capacity());
    }

    // ---------------------------------------------------------------------
    // COPY IN / OUT
    // ---------------------------------------------------------------------

    /// Readable run of at most `n` bytes starting at `read_pos`.
    ///
    /// The slice may be shorter than `n` if the data wraps; call again after
    /// [`advance_read`](Self::advance_read) to get the remainder.
    pub fn readable_slice(&self, n: usize) -> &[u8] {
        let len = self.contiguous_readable_len(n);
        &self.storage[self.read_pos..self.read_pos + len]
    }

    /// Writable run of at most `n` bytes starting at `write_pos`.
    ///
    /// Bytes become visible to readers only after
    /// [`advance_write`](Self::advance_write).
    pub fn writable_slice(&mut self, n: usize) -> &mut [u8] {
        let len = self.contiguous_writable_len(n);
        &mut self.storage[self.write_pos..self.write_pos + len]
    }

    /// Drains up to `out.len()` bytes into `out`, in at most two passes.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let mut done = 0;
        while done < out.len() {
            let run = self.readable_slice(out.len() - done);
            if run.is_empty() {
                break;
            }
            let n = run.len();
            out[done..done + n].copy_from_slice(run);
            self.advance_read(n);
            done += n;
        }
        done
    }

    /// Copies as much of `data` as fits, in at most two passes.
    ///
    /// Returns the number of bytes accepted; the tail that did not fit is
    /// left to the caller. Unread bytes are never overwritten.
    pub fn write_from(&mut self, data: &[u8]) -> usize {
        let mut done = 0;
        while done < data.len() {
            let run = self.writable_slice(data.len() - done);
            if run.is_empty() {
                break;
            }
            let n = run.len();
            run.copy_from_slice(&data[done..done + n]);
            self.advance_write(n);
            done += n;
        }
        done
    }
}
