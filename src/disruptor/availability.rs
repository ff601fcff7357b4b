//! Multi-producer availability tracking (C3).
//!
//! With a single producer, the cursor alone tells consumers what's safe to
//! read: whatever was claimed was published, in order. With multiple
//! producers racing to claim slots, a producer that claims sequence 105 can
//! finish publishing before the producer that claimed 104 does. The cursor
//! can't be bumped past 104 until 104 is actually visible, so something
//! else has to record "this one slot is done" independently of the cursor.
//!
//! This tracker stores, per slot, which lap of the ring last published
//! there. A slot is available for sequence `s` only if its recorded lap
//! equals `s / capacity`; once a lap completes, the flag is stale again
//! until next written, so a single `bool` per slot isn't enough.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicI32, Ordering};

/// Per-slot publication flags for a multi-producer ring buffer.
///
/// One `AvailabilityTracker` is shared by all producers of a given ring
/// buffer; `index_shift` is `log2(capacity)` so lap numbers can be computed
/// with a shift instead of a division.
pub struct AvailabilityTracker {
    flags: Vec<CachePadded<AtomicI32>>,
    mask: i64,
    index_shift: u32,
}

impl AvailabilityTracker {
    /// `capacity` must be a power of two; callers validate this once at ring
    /// buffer construction time.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let flags = (0..capacity)
            .map(|_| CachePadded::new(AtomicI32::new(-1)))
            .collect();
        Self {
            flags,
            mask: capacity as i64 - 1,
            index_shift: capacity.trailing_zeros(),
        }
    }

    /// Record that `sequence` has been fully published.
    #[inline]
    pub fn set_available(&self, sequence: i64) {
        let index = (sequence & self.mask) as usize;
        let lap = (sequence >> self.index_shift) as i32;
        self.flags[index].store(lap, Ordering::Release);
    }

    /// Whether `sequence` has been published (as opposed to merely claimed).
    #[inline]
    pub fn is_available(&self, sequence: i64) -> bool {
        let index = (sequence & self.mask) as usize;
        let expected_lap = (sequence >> self.index_shift) as i32;
        self.flags[index].load(Ordering::Acquire) == expected_lap
    }

    /// Highest sequence in `[lower_bound, available_sequence]` such that
    /// every slot from `lower_bound` up to and including it is available.
    ///
    /// Consumers must never read past a gap: a later slot being done first
    /// is exactly the scenario this tracker exists for.
    pub fn highest_published(&self, lower_bound: i64, available_sequence: i64) -> i64 {
        let mut sequence = lower_bound;
        while sequence <= available_sequence {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
            sequence += 1;
        }
        available_sequence
    }
}
