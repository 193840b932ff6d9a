//! Error types for pipe operations.

use crate::handle::AccessMode;
use std::io;
use thiserror::Error;

/// Operation that was refused by [`PipeError::InvalidMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Errors returned by channel and handle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipeError {
    /// Non-blocking handle found the buffer empty (read) or full (write).
    #[error("operation would block")]
    WouldBlock,

    /// A blocked operation was cancelled. No bytes were transferred.
    #[error("operation cancelled while waiting")]
    Cancelled,

    /// A blocked operation hit the handle's deadline. No bytes were transferred.
    #[error("operation timed out while waiting")]
    TimedOut,

    /// The requested channel index is outside the configured range.
    #[error("no channel at index {index} (device count: {count})")]
    NotFound {
        /// The requested index.
        index: usize,
        /// The configured number of channels.
        count: usize,
    },

    /// The ring buffer could not be allocated on first open.
    #[error("failed to allocate {capacity}-byte buffer")]
    OutOfMemory {
        /// The configured buffer capacity.
        capacity: usize,
    },

    /// Read on a write-only handle or write on a read-only one.
    #[error("cannot {op} through a {mode} handle")]
    InvalidMode {
        /// The handle's access mode.
        mode: AccessMode,
        /// The refused operation.
        op: Operation,
    },
}

impl PipeError {
    /// Returns `true` if the caller may simply retry later.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WouldBlock | Self::Cancelled | Self::TimedOut)
    }

    /// Returns `true` if the attempt cannot succeed as issued.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::OutOfMemory { .. } | Self::InvalidMode { .. }
        )
    }
}

impl From<PipeError> for io::Error {
    fn from(err: PipeError) -> Self {
        let kind = match err {
            PipeError::WouldBlock => io::ErrorKind::WouldBlock,
            // Not `Interrupted`: std's `read_exact`/`write_all` retry those, and a
            // cancelled token stays cancelled.
            PipeError::Cancelled => io::ErrorKind::Other,
            PipeError::TimedOut => io::ErrorKind::TimedOut,
            PipeError::NotFound { .. } => io::ErrorKind::NotFound,
            PipeError::OutOfMemory { .. } => io::ErrorKind::OutOfMemory,
            PipeError::InvalidMode { .. } => io::ErrorKind::PermissionDenied,
        };
        io::Error::new(kind, err)
    }
}

/// Errors for invalid sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// At least one channel is required.
    #[error("device count must be at least 1")]
    NoDevices,

    /// One slot is always reserved, so fewer than two bytes holds nothing.
    #[error("buffer capacity {capacity} is too small (minimum: 2)")]
    CapacityTooSmall {
        /// The rejected capacity.
        capacity: usize,
    },
}
