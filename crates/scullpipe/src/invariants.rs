//! Debug assertion macros for ring buffer and channel invariants.
//!
//! Only active in debug builds (`debug_assert!`), so there is zero overhead in
//! release builds.
//!
//! Used by `RingBuffer` and `Channel`.

// =============================================================================
// Cursor bounds
// =============================================================================

/// Assert that a cursor lies inside the storage.
///
/// **Invariant**: `0 ≤ pos < capacity`
///
/// Used in: `advance_read()`, `advance_write()`
macro_rules! debug_assert_cursor_in_bounds {
    ($name:literal, $pos:expr, $capacity:expr) => {
        debug_assert!(
            $pos < $capacity,
            "{} cursor {} out of bounds for capacity {}",
            $name,
            $pos,
            $capacity
        )
    };
}

// =============================================================================
// Space conservation
// =============================================================================

/// Assert that free and used space always account for every usable slot.
///
/// **Invariant**: `free_space + used_space == capacity - 1`
///
/// Used in: `advance_read()`, `advance_write()` after moving a cursor
macro_rules! debug_assert_space_conserved {
    ($free:expr, $used:expr, $capacity:expr) => {
        debug_assert!(
            $free + $used == $capacity - 1,
            "space not conserved: free {} + used {} != capacity {} - 1",
            $free,
            $used,
            $capacity
        )
    };
}

// =============================================================================
// No overrun
// =============================================================================

/// Assert that an advance never moves past the data (read) or the reserved
/// slot in front of the reader (write).
///
/// **Invariant**: `n ≤ used_space` for reads, `n ≤ free_space` for writes
///
/// Used in: `advance_read()`, `advance_write()` before moving a cursor
macro_rules! debug_assert_no_overrun {
    ($name:literal, $n:expr, $limit:expr) => {
        debug_assert!(
            $n <= $limit,
            "{} advance of {} overruns available {}",
            $name,
            $n,
            $limit
        )
    };
}

// =============================================================================
// Buffer presence
// =============================================================================

/// Assert that the buffer exists exactly while some handle is open.
///
/// **Invariant**: `buffer.is_some() ⟺ readers + writers > 0`
///
/// Used in: `Channel::open()`, `Channel::release()`
macro_rules! debug_assert_buffer_presence {
    ($allocated:expr, $readers:expr, $writers:expr) => {
        debug_assert!(
            $allocated == ($readers + $writers > 0),
            "buffer allocated={} with {} readers and {} writers",
            $allocated,
            $readers,
            $writers
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_buffer_presence;
pub(crate) use debug_assert_cursor_in_bounds;
pub(crate) use debug_assert_no_overrun;
pub(crate) use debug_assert_space_conserved;
