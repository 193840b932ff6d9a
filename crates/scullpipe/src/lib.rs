//! scullpipe - Bounded Blocking Byte-Stream Channels
//!
//! A table of independent pipe devices. Each channel is a fixed-capacity ring
//! buffer shared by any number of reader and writer handles, with the classic
//! pipe semantics:
//!
//! - reads block while the buffer is empty, writes block while it is full
//! - non-blocking handles get [`PipeError::WouldBlock`] instead
//! - blocked calls can be cancelled ([`CancelToken`]) or time out
//! - short counts are normal; the caller retries with the remainder
//! - readiness can be polled ([`Handle::poll`]) or pushed to subscribers
//!   ([`Handle::subscribe`])
//!
//! The buffer exists only while a handle is open. Closing the last handle
//! frees it, and the next open starts empty.
//!
//! # Example
//!
//! ```
//! use scullpipe::{AccessMode, ChannelTable, Config};
//!
//! let table = ChannelTable::new(Config::default().with_buffer_capacity(8)).unwrap();
//! let writer = table.open(0, AccessMode::Write).unwrap();
//! let reader = table.open(0, AccessMode::Read).unwrap();
//!
//! // 7 usable bytes: the write is truncated, not blocked
//! assert_eq!(writer.write(b"HELLO, WORLD").unwrap(), 7);
//! assert_eq!(reader.read_bytes(16).unwrap(), b"HELLO, ");
//! ```

mod cancel;
mod channel;
mod config;
mod error;
mod handle;
mod invariants;
mod metrics;
mod notify;
mod ring;
mod table;
mod wait;

pub use cancel::CancelToken;
pub use channel::{Channel, ChannelStatus};
pub use config::{
    Config, DEFAULT_BUFFER_CAPACITY, DEFAULT_DEVICE_COUNT, LARGE_CONFIG, SMALL_CONFIG,
};
pub use error::{ConfigError, Operation, PipeError};
pub use handle::{AccessMode, Handle, OpenOptions};
pub use metrics::Metrics;
pub use notify::{Readiness, ReadinessEvent, ReadinessSink, SubscriptionId};
pub use ring::RingBuffer;
pub use table::ChannelTable;
pub use wait::WaitSet;
