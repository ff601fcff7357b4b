//! Cache-line isolated monotonic sequence counter (C1).
//!
//! Mirrors `disruptor::Sequence` from the original LMAX-style implementation:
//! a signed 64-bit counter that names a position in the logical stream and
//! doubles as a progress report. Every producer cursor and every consumer's
//! read position is one of these.

use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam::utils::CachePadded;

/// Sentinel value for "nothing has been published/consumed yet".
pub const INITIAL_VALUE: i64 = -1;

/// A cache-line padded, atomically updated sequence number.
///
/// `CachePadded` guarantees at least one cache line of isolation on each
/// side, so two `Sequence`s placed back to back in memory (e.g. a producer
/// cursor next to a consumer sequence) never false-share.
#[derive(Debug)]
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a sequence starting at [`INITIAL_VALUE`] (-1).
    pub fn new() -> Self {
        Self::with_value(INITIAL_VALUE)
    }

    /// Create a sequence with an explicit initial value.
    pub fn with_value(initial: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial)),
        }
    }

    /// Acquire-load the current value.
    #[inline(always)]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Release-store a new value.
    #[inline(always)]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Sequentially consistent store, used where a full fence against every
    /// other thread is wanted (e.g. publishing the cursor on the
    /// multi-producer slow path right before waking blocked waiters).
    #[inline(always)]
    pub fn set_seq_cst(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Strong compare-and-set. Acquire-release on success, acquire on
    /// failure.
    #[inline(always)]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Atomically add one, returning the value after the increment.
    #[inline(always)]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Atomically add `n`, returning the value after the increment.
    #[inline(always)]
    pub fn add_and_get(&self, n: i64) -> i64 {
        self.value.fetch_add(n, Ordering::AcqRel) + n
    }

    /// Atomically add `n`, returning the value before the increment.
    #[inline(always)]
    pub fn get_and_add(&self, n: i64) -> i64 {
        self.value.fetch_add(n, Ordering::AcqRel)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum of a set of sequences, or `default` if the set is empty.
///
/// Used both for a producer's gating-sequence minimum and for a barrier's
/// dependent-sequence minimum.
pub fn min_sequence(sequences: &[std::sync::Arc<Sequence>], default: i64) -> i64 {
    sequences
        .iter()
        .map(|s| s.get())
        .min()
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;
    use std::sync::Arc;

    #[test]
    fn starts_at_initial_value() {
        let seq = Sequence::new();
        assert_eq!(seq.get(), INITIAL_VALUE);
    }

    #[test]
    fn set_and_get_round_trip() {
        let seq = Sequence::with_value(0);
        seq.set(42);
        assert_eq!(seq.get(), 42);
    }

    #[test]
    fn compare_and_set_succeeds_only_on_match() {
        let seq = Sequence::with_value(10);
        assert!(!seq.compare_and_set(9, 20));
        assert_eq!(seq.get(), 10);
        assert!(seq.compare_and_set(10, 20));
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn increment_and_add_return_post_value() {
        let seq = Sequence::with_value(0);
        assert_eq!(seq.increment_and_get(), 1);
        assert_eq!(seq.add_and_get(4), 5);
        assert_eq!(seq.get_and_add(10), 5);
        assert_eq!(seq.get(), 15);
    }

    #[test]
    fn min_sequence_of_empty_set_is_default() {
        let sequences: Vec<Arc<Sequence>> = Vec::new();
        assert_eq!(min_sequence(&sequences, 7), 7);
    }

    #[test]
    fn min_sequence_picks_the_lowest() {
        let sequences = vec![
            Arc::new(Sequence::with_value(5)),
            Arc::new(Sequence::with_value(2)),
            Arc::new(Sequence::with_value(9)),
        ];
        assert_eq!(min_sequence(&sequences, -1), 2);
    }

    /// Two Sequences placed adjacently must not share a cache line: the
    /// `CachePadded` wrapper must make `size_of::<Sequence>()` a full cache
    /// line (64 bytes on every platform crossbeam targets).
    #[test]
    fn adjacent_sequences_do_not_share_a_cache_line() {
        let pair = [Sequence::new(), Sequence::new()];
        let first = &pair[0] as *const Sequence as usize;
        let second = &pair[1] as *const Sequence as usize;
        assert!(second - first >= 64, "sequences are only {} bytes apart", second - first);
        assert!(size_of::<Sequence>() >= 64);
    }
}
