//! Loom-based concurrency tests for scullpipe.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! Loom exhaustively explores all possible thread interleavings to find
//! concurrency bugs that might only occur under specific scheduling.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicBool, Ordering};
use loom::sync::{Arc, Condvar, Mutex};
use loom::thread;

/// Simplified pipe for loom testing.
///
/// Same protocol as `Channel`: one mutex over the cursors, a "readable"
/// condvar signalled after writes and a "writable" condvar signalled after
/// reads, with one reserved slot. Capacity is tiny to keep the state space
/// manageable.
struct LoomPipe {
    state: Mutex<PipeState>,
    readable: Condvar,
    writable: Condvar,
    cancelled: AtomicBool,
}

struct PipeState {
    buffer: [u8; 3],
    read_pos: usize,
    write_pos: usize,
}

impl PipeState {
    fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    fn is_full(&self) -> bool {
        (self.write_pos + 1) % self.buffer.len() == self.read_pos
    }
}

impl LoomPipe {
    fn new() -> Self {
        Self {
            state: Mutex::new(PipeState {
                buffer: [0; 3],
                read_pos: 0,
                write_pos: 0,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Blocking single-byte write.
    fn write(&self, byte: u8) -> Result<(), ()> {
        let mut state = self.state.lock().unwrap();
        while state.is_full() {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(());
            }
            state = self.writable.wait(state).unwrap();
        }
        let pos = state.write_pos;
        state.buffer[pos] = byte;
        state.write_pos = (pos + 1) % 3;
        drop(state);
        self.readable.notify_all();
        Ok(())
    }

    /// Blocking single-byte read.
    fn read(&self) -> Result<u8, ()> {
        let mut state = self.state.lock().unwrap();
        while state.is_empty() {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(());
            }
            state = self.readable.wait(state).unwrap();
        }
        let byte = state.buffer[state.read_pos];
        state.read_pos = (state.read_pos + 1) % 3;
        drop(state);
        self.writable.notify_all();
        Ok(byte)
    }

    /// Cancel: set the flag, then broadcast while holding the lock.
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _state = self.state.lock().unwrap();
        self.readable.notify_all();
        self.writable.notify_all();
    }
}

/// Writer fills past capacity, so it must block and be woken by the reader.
#[test]
fn loom_blocking_handoff_preserves_order() {
    loom::model(|| {
        let pipe = Arc::new(LoomPipe::new());
        let p = Arc::clone(&pipe);

        let writer = thread::spawn(move || {
            for byte in 1..=3 {
                p.write(byte).unwrap();
            }
        });

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(pipe.read().unwrap());
        }
        writer.join().unwrap();

        assert_eq!(received, vec![1, 2, 3]);
    });
}

/// A cancel racing with a reader going to sleep is never lost.
#[test]
fn loom_cancel_wakes_blocked_reader() {
    loom::model(|| {
        let pipe = Arc::new(LoomPipe::new());
        let p = Arc::clone(&pipe);

        let reader = thread::spawn(move || p.read());
        pipe.cancel();

        assert_eq!(reader.join().unwrap(), Err(()));
    });
}

/// Either the write lands before the cancel is observed, or the read is
/// cancelled with nothing consumed.
#[test]
fn loom_cancel_is_all_or_nothing() {
    loom::model(|| {
        let pipe = Arc::new(LoomPipe::new());
        let reader_pipe = Arc::clone(&pipe);
        let writer_pipe = Arc::clone(&pipe);

        let reader = thread::spawn(move || reader_pipe.read());
        let writer = thread::spawn(move || writer_pipe.write(9));
        pipe.cancel();

        let read = reader.join().unwrap();
        let _ = writer.join().unwrap();

        let state = pipe.state.lock().unwrap();
        match read {
            Ok(byte) => {
                assert_eq!(byte, 9);
                assert!(state.is_empty());
            }
            Err(()) => {
                assert!(!state.is_empty());
                assert_eq!(state.buffer[state.read_pos], 9);
            }
        }
    });
}
