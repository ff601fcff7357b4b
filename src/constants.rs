//! Vortex tuning constants.
//!
//! This module contains the handful of constants that govern ring buffer
//! sizing and wait-strategy backoff. Everything here is a plain compile-time
//! value; runtime configuration lives in [`crate::disruptor::RingBufferConfig`].

/// Default ring buffer size for callers that don't pick one explicitly.
pub const DEFAULT_RING_BUFFER_SIZE: usize = 1024 * 1024;

/// Largest ring size this crate will allocate (2^30 slots).
pub const MAX_RING_BUFFER_SIZE: usize = 1 << 30;

/// Cache line size used for padding calculations on most modern CPUs.
pub const CACHE_LINE_SIZE: usize = 64;

/// Spin iterations before a `Yielding` wait strategy calls `thread::yield_now`.
pub const YIELDING_SPIN_TRIES: usize = 100;

/// Spin iterations before a `Sleeping` wait strategy starts parking the thread.
pub const SLEEPING_SPIN_TRIES: usize = 100;

/// `thread::yield_now` iterations in the `Sleeping` backoff staircase, after
/// the initial spin phase and before it falls back to timed sleeps.
pub const SLEEPING_YIELD_TRIES: usize = 100;

/// Validate that the sizing constants are internally consistent.
pub fn validate_constants() -> Result<(), &'static str> {
    if !DEFAULT_RING_BUFFER_SIZE.is_power_of_two() {
        return Err("DEFAULT_RING_BUFFER_SIZE must be a power of 2");
    }
    if !MAX_RING_BUFFER_SIZE.is_power_of_two() {
        return Err("MAX_RING_BUFFER_SIZE must be a power of 2");
    }
    if CACHE_LINE_SIZE == 0 || !CACHE_LINE_SIZE.is_power_of_two() {
        return Err("CACHE_LINE_SIZE must be a power of 2");
    }
    if DEFAULT_RING_BUFFER_SIZE > MAX_RING_BUFFER_SIZE {
        return Err("DEFAULT_RING_BUFFER_SIZE must not exceed MAX_RING_BUFFER_SIZE");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_internally_consistent() {
        assert!(validate_constants().is_ok());
    }

    #[test]
    fn ring_buffer_sizes_are_powers_of_two() {
        assert!(DEFAULT_RING_BUFFER_SIZE.is_power_of_two());
        assert!(MAX_RING_BUFFER_SIZE.is_power_of_two());
    }

    #[test]
    fn max_ring_buffer_size_matches_spec_budget() {
        assert_eq!(MAX_RING_BUFFER_SIZE, 1 << 30);
    }
}
