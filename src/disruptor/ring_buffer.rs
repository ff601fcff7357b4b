//! Pre-allocated ring buffer with single- or multi-producer claim/publish
//! protocols (C4).
//!
//! Grounded on `nano_stream::RingBuffer<T>` (`include/nano_stream/ring_buffer.h`)
//! for the single-producer `next`/`try_next`/`publish`/capacity-gating logic,
//! and on this repo's `flux::disruptor::ring_buffer`
//! `PaddedProducerSequence`/CAS-claim pattern for the multi-producer path.
//! Unlike the original single-producer-only template, slots live behind an
//! `UnsafeCell` so the same struct serves both producer modes: the claim
//! protocol is the only thing that differs between them.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::constants::MAX_RING_BUFFER_SIZE;
use crate::disruptor::availability::AvailabilityTracker;
use crate::disruptor::event::{EventFactory, EventTranslator};
use crate::disruptor::sequence::{min_sequence, Sequence, INITIAL_VALUE};
use crate::disruptor::wait_strategy::WaitStrategyType;
use crate::disruptor::sequence_barrier::SequenceBarrier;
use crate::error::{Result, VortexError};

static_assertions::assert_impl_all!(RingBuffer<i64>: Send, Sync);

/// Whether a ring buffer serializes producers externally (exactly one
/// publishing thread) or coordinates an arbitrary number of them internally
/// via CAS. A closed set of two, modeled as a tagged enum rather than a
/// generic `Sequencer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerType {
    /// Caller guarantees only one thread ever calls `next`/`publish`.
    Single,
    /// Any number of threads may call `next`/`publish` concurrently.
    Multi,
}

/// Construction-time configuration for a [`RingBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct RingBufferConfig {
    /// Number of slots; must be a power of two and at most [`MAX_RING_BUFFER_SIZE`].
    pub size: usize,
    /// Single- or multi-producer claim protocol.
    pub producer_type: ProducerType,
    /// Wait strategy new barriers built against this ring use by default.
    pub wait_strategy: WaitStrategyType,
}

impl RingBufferConfig {
    /// A single-producer config of the given size with a busy-spin barrier.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(VortexError::config("ring buffer size must be a power of two"));
        }
        if size > MAX_RING_BUFFER_SIZE {
            return Err(VortexError::config(format!(
                "ring buffer size {size} exceeds MAX_RING_BUFFER_SIZE ({MAX_RING_BUFFER_SIZE})"
            )));
        }
        Ok(Self {
            size,
            producer_type: ProducerType::Single,
            wait_strategy: WaitStrategyType::BusySpin,
        })
    }

    /// Switch to the multi-producer claim protocol.
    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    /// Pick the wait strategy barriers built against this ring use by default.
    pub fn with_wait_strategy(mut self, wait_strategy: WaitStrategyType) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }
}

/// A fixed-capacity, pre-allocated ring of slots coordinated by sequence
/// numbers instead of locks.
pub struct RingBuffer<T> {
    buffer: Box<[UnsafeCell<T>]>,
    mask: i64,
    capacity: i64,
    producer_type: ProducerType,
    wait_strategy: WaitStrategyType,

    /// Published boundary (single-producer) or claimed boundary
    /// (multi-producer, advanced via CAS and gated further by `availability`).
    cursor: Arc<Sequence>,
    /// Single-producer-only claim counter; not shared, so the producer can
    /// claim ahead of what it has published.
    single_next: AtomicI64,
    /// Cache of the last-observed minimum gating sequence, avoiding a full
    /// scan of `gating_sequences` on every claim.
    cached_gating: AtomicI64,
    gating_sequences: Mutex<Vec<Arc<Sequence>>>,
    /// Per-slot publication flags, `Some` only in multi-producer mode.
    availability: Option<Arc<AvailabilityTracker>>,
}

// SAFETY: slots are only accessed through sequence-gated claim/publish, which
// guarantees a single writer and happens-before ordering into readers via the
// cursor / availability tracker's Release/Acquire pair.
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Allocate a ring buffer, calling `factory` once per slot.
    pub fn new(config: RingBufferConfig, factory: &dyn EventFactory<T>) -> Result<Self> {
        let buffer: Box<[UnsafeCell<T>]> = (0..config.size)
            .map(|_| UnsafeCell::new(factory.new_instance()))
            .collect();

        let availability = match config.producer_type {
            ProducerType::Multi => Some(Arc::new(AvailabilityTracker::new(config.size))),
            ProducerType::Single => None,
        };

        Ok(Self {
            buffer,
            mask: config.size as i64 - 1,
            capacity: config.size as i64,
            producer_type: config.producer_type,
            wait_strategy: config.wait_strategy,
            cursor: Arc::new(Sequence::new()),
            single_next: AtomicI64::new(INITIAL_VALUE),
            cached_gating: AtomicI64::new(INITIAL_VALUE),
            gating_sequences: Mutex::new(Vec::new()),
            availability,
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    #[inline(always)]
    fn index_of(&self, sequence: i64) -> usize {
        (sequence & self.mask) as usize
    }

    /// Borrow the slot at `sequence`. Callers must only read slots they
    /// learned about through a barrier wait, and only write slots they
    /// claimed themselves.
    #[inline(always)]
    pub fn get(&self, sequence: i64) -> &T {
        // SAFETY: the sequence-gated claim/publish protocol ensures no two
        // live references to the same slot are ever handed to different
        // producers, and consumers only reach here after a barrier wait
        // confirms the slot was published.
        unsafe { &*self.buffer[self.index_of(sequence)].get() }
    }

    /// Mutably borrow the slot at `sequence`. Only valid between claiming and
    /// publishing that sequence for a producer, or while a processor holds
    /// the sole claim to it. Parallel handlers in the same fan-out group run
    /// concurrently with no ordering between them; if more than one mutates
    /// the same slot, each must write disjoint fields of `T` to stay
    /// race-free, the same caveat the upstream Disruptor's own docs carry
    /// for event objects shared across parallel consumers.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get_mut(&self, sequence: i64) -> &mut T {
        // SAFETY: see `get`; the caller holds a claim on `sequence` and no
        // other thread will claim it again until it wraps around the ring,
        // which gating sequences prevent before this slot is consumed.
        unsafe { &mut *self.buffer[self.index_of(sequence)].get() }
    }

    fn minimum_gating_sequence(&self, default: i64) -> i64 {
        let gating = self.gating_sequences.lock().unwrap();
        min_sequence(&gating, default)
    }

    /// Register consumer sequences the producer must not lap.
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating_sequences
            .lock()
            .unwrap()
            .extend(sequences.iter().cloned());
    }

    /// Claim the next sequence, blocking the caller (spin/yield, never
    /// parking) until capacity is available.
    pub fn next(&self) -> i64 {
        self.next_n(1)
            .expect("claiming a single sequence is always within capacity")
    }

    /// Claim the next `n` contiguous sequences, returning the highest one.
    pub fn next_n(&self, n: i64) -> Result<i64> {
        self.validate_batch_size(n)?;
        Ok(match self.producer_type {
            ProducerType::Single => self.next_single(n),
            ProducerType::Multi => self.next_multi(n),
        })
    }

    fn validate_batch_size(&self, n: i64) -> Result<()> {
        if n < 1 || n > self.capacity {
            return Err(VortexError::config(format!(
                "batch size {n} is out of range; must be between 1 and capacity {}",
                self.capacity
            )));
        }
        Ok(())
    }

    fn next_single(&self, n: i64) -> i64 {
        let current = self.single_next.load(Ordering::Relaxed);
        let next_sequence = current + n;
        let wrap_point = next_sequence - self.capacity;
        let cached = self.cached_gating.load(Ordering::Acquire);

        if wrap_point > cached || cached > current {
            // Publish our intent to claim up to `current` so gated consumers
            // can make progress while we wait for room.
            self.cursor.set(current);

            let mut min_seq;
            loop {
                min_seq = self.minimum_gating_sequence(current);
                if wrap_point <= min_seq {
                    break;
                }
                thread::yield_now();
            }
            self.cached_gating.store(min_seq, Ordering::Release);
        }

        self.single_next.store(next_sequence, Ordering::Release);
        next_sequence
    }

    fn next_multi(&self, n: i64) -> i64 {
        loop {
            let current = self.cursor.get();
            let next_sequence = current + n;
            let wrap_point = next_sequence - self.capacity;
            let cached = self.cached_gating.load(Ordering::Acquire);

            if wrap_point > cached {
                let min_seq = self.minimum_gating_sequence(current);
                if wrap_point > min_seq {
                    thread::yield_now();
                    continue;
                }
                self.cached_gating.store(min_seq, Ordering::Release);
            }

            if self.cursor.compare_and_set(current, next_sequence) {
                return next_sequence;
            }
            // Lost the race with another producer; re-read and retry.
        }
    }

    /// Claim the next sequence without waiting.
    pub fn try_next(&self) -> Result<i64> {
        self.try_next_n(1)
    }

    /// Claim the next `n` sequences without waiting.
    pub fn try_next_n(&self, n: i64) -> Result<i64> {
        self.validate_batch_size(n)?;
        match self.producer_type {
            ProducerType::Single => {
                if !self.has_available_capacity(n) {
                    return Err(VortexError::InsufficientCapacity {
                        requested: n as usize,
                    });
                }
                Ok(self.single_next.fetch_add(n, Ordering::AcqRel) + n)
            }
            ProducerType::Multi => loop {
                // Capacity must be re-checked on every retry, not just once
                // before the loop: by the time a losing CAS re-reads
                // `current`, another producer may have claimed slots that
                // make a claim that looked safe a moment ago overrun a
                // gating sequence now.
                let current = self.cursor.get();
                let next_sequence = current + n;
                let wrap_point = next_sequence - self.capacity;
                let cached = self.cached_gating.load(Ordering::Acquire);
                let min_seq = if wrap_point > cached {
                    let min_seq = self.minimum_gating_sequence(current);
                    self.cached_gating.store(min_seq, Ordering::Release);
                    min_seq
                } else {
                    cached
                };
                if wrap_point > min_seq {
                    return Err(VortexError::InsufficientCapacity {
                        requested: n as usize,
                    });
                }
                if self.cursor.compare_and_set(current, next_sequence) {
                    break Ok(next_sequence);
                }
            },
        }
    }

    /// Publish a single claimed sequence.
    pub fn publish(&self, sequence: i64) {
        self.publish_range(sequence, sequence);
    }

    /// Publish a contiguous range `[lo, hi]` claimed in one `next_n` call.
    pub fn publish_range(&self, lo: i64, hi: i64) {
        match self.producer_type {
            ProducerType::Single => self.cursor.set(hi),
            ProducerType::Multi => {
                let availability = self
                    .availability
                    .as_ref()
                    .expect("multi-producer ring buffer always has an availability tracker");
                for sequence in lo..=hi {
                    availability.set_available(sequence);
                }
            }
        }
    }

    /// Claim one slot, fill it via `translator`, and publish it.
    pub fn publish_event(&self, translator: &dyn EventTranslator<T>) -> i64 {
        let sequence = self.next();
        translator.translate_to(self.get_mut(sequence), sequence);
        self.publish(sequence);
        sequence
    }

    /// Whether `required_capacity` free slots are currently available.
    pub fn has_available_capacity(&self, required_capacity: i64) -> bool {
        let current = match self.producer_type {
            ProducerType::Single => self.single_next.load(Ordering::Relaxed),
            ProducerType::Multi => self.cursor.get(),
        };
        let wrap_point = current + required_capacity - self.capacity;
        let cached = self.cached_gating.load(Ordering::Acquire);
        if wrap_point <= cached {
            return true;
        }
        let min_seq = self.minimum_gating_sequence(current);
        self.cached_gating.store(min_seq, Ordering::Release);
        wrap_point <= min_seq
    }

    /// Number of free slots right now.
    pub fn remaining_capacity(&self) -> i64 {
        let current = match self.producer_type {
            ProducerType::Single => self.single_next.load(Ordering::Acquire),
            ProducerType::Multi => self.cursor.get(),
        };
        let consumed = self.minimum_gating_sequence(current);
        self.capacity - (current - consumed)
    }

    /// Current published cursor value (single-producer) or claim boundary
    /// (multi-producer — prefer a barrier's `wait_for` return value to learn
    /// the actually-readable boundary in that mode).
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    /// Whether `sequence` is safe to read.
    pub fn is_available(&self, sequence: i64) -> bool {
        match &self.availability {
            Some(tracker) => tracker.is_available(sequence),
            None => {
                let cursor = self.cursor.get();
                sequence <= cursor && sequence > cursor - self.capacity
            }
        }
    }

    /// Build a barrier that gates on this ring's cursor plus `dependencies`.
    /// An empty dependency list barriers directly on the producer cursor,
    /// matching `ProcessingSequenceBarrier`'s behavior when constructed with
    /// no upstream processors.
    pub fn new_barrier(&self, dependencies: Vec<Arc<Sequence>>) -> SequenceBarrier {
        SequenceBarrier::new(
            self.cursor.clone(),
            dependencies,
            self.wait_strategy.build(),
            self.availability.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single_producer_buffer(size: usize) -> RingBuffer<i64> {
        let config = RingBufferConfig::new(size).unwrap();
        RingBuffer::new(config, &(|| 0i64)).unwrap()
    }

    fn multi_producer_buffer(size: usize) -> RingBuffer<i64> {
        let config = RingBufferConfig::new(size)
            .unwrap()
            .with_producer_type(ProducerType::Multi);
        RingBuffer::new(config, &(|| 0i64)).unwrap()
    }

    #[test]
    fn rejects_non_power_of_two_size() {
        assert!(RingBufferConfig::new(3).is_err());
        assert!(RingBufferConfig::new(0).is_err());
    }

    #[test]
    fn single_producer_claim_publish_round_trip() {
        let rb = single_producer_buffer(8);
        let seq = rb.next();
        *rb.get_mut(seq) = 42;
        rb.publish(seq);
        assert_eq!(*rb.get(seq), 42);
        assert_eq!(rb.cursor(), seq);
    }

    #[test]
    fn publish_event_writes_through_translator() {
        let rb = single_producer_buffer(8);
        let seq = rb.publish_event(&|event: &mut i64, s: i64| *event = s * 10);
        assert_eq!(*rb.get(seq), seq * 10);
    }

    #[test]
    fn try_next_fails_when_ring_is_full_and_ungated() {
        let rb = single_producer_buffer(2);
        assert!(rb.try_next_n(2).is_ok());
        assert!(rb.try_next().is_err());
    }

    #[test]
    fn next_n_and_try_next_n_reject_out_of_range_batch_sizes() {
        let rb = single_producer_buffer(8);
        assert!(rb.next_n(0).is_err());
        assert!(rb.next_n(-3).is_err());
        assert!(rb.next_n(9).is_err());
        assert!(rb.try_next_n(0).is_err());
        assert!(rb.try_next_n(9).is_err());
    }

    #[test]
    fn multi_producer_try_next_never_overruns_a_stalled_consumer_under_contention() {
        use std::sync::Barrier;

        // N=2, a consumer gating sequence that never advances: no claim may
        // ever exceed `consumer + N`, even with several threads contending
        // on the CAS loop at once.
        let rb = Arc::new(multi_producer_buffer(2));
        let consumer_seq = Arc::new(Sequence::with_value(INITIAL_VALUE));
        rb.add_gating_sequences(&[consumer_seq]);

        let start = Arc::new(Barrier::new(8));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let rb = rb.clone();
            let start = start.clone();
            handles.push(thread::spawn(move || {
                start.wait();
                let mut claimed = Vec::new();
                for _ in 0..200 {
                    if let Ok(seq) = rb.try_next() {
                        claimed.push(seq);
                    }
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        assert_eq!(all.len(), 2, "an ungated ring of size 2 must yield exactly 2 claims");
        all.sort_unstable();
        assert_eq!(all, vec![0, 1]);
    }

    #[test]
    fn remaining_capacity_shrinks_as_slots_are_claimed() {
        let rb = single_producer_buffer(4);
        assert_eq!(rb.remaining_capacity(), 4);
        let seq = rb.try_next().unwrap();
        rb.publish(seq);
        assert_eq!(rb.remaining_capacity(), 3);
    }

    #[test]
    fn gating_sequence_blocks_producer_from_lapping_consumer() {
        let rb = single_producer_buffer(2);
        let consumer_seq = Arc::new(Sequence::with_value(INITIAL_VALUE));
        rb.add_gating_sequences(&[consumer_seq.clone()]);

        assert!(rb.try_next_n(2).is_ok());
        // Ring is full from the consumer's point of view: it hasn't moved.
        assert!(!rb.has_available_capacity(1));
    }

    #[test]
    fn multi_producer_claims_are_disjoint() {
        use std::collections::HashSet;
        use std::sync::Barrier;

        let rb = Arc::new(multi_producer_buffer(1024));
        let start = Arc::new(Barrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let rb = rb.clone();
            let start = start.clone();
            handles.push(thread::spawn(move || {
                start.wait();
                let mut claimed = Vec::with_capacity(100);
                for _ in 0..100 {
                    let seq = rb.next();
                    claimed.push(seq);
                    rb.publish(seq);
                }
                claimed
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for seq in handle.join().unwrap() {
                assert!(all.insert(seq), "sequence {seq} claimed twice");
            }
        }
        assert_eq!(all.len(), 400);
    }

    proptest! {
        /// `next_n` on a fresh, ungated 8-slot ring must accept exactly
        /// `1..=capacity` and reject everything else, for any `n` a caller
        /// might hand it.
        #[test]
        fn next_n_accepts_exactly_the_valid_batch_range(n in -16i64..32i64) {
            let rb = single_producer_buffer(8);
            let result = rb.next_n(n);
            if (1..=8).contains(&n) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }
    }

    #[test]
    fn multi_producer_availability_reflects_out_of_order_completion() {
        let rb = multi_producer_buffer(8);
        let lo = rb.next();
        let hi = rb.next();
        assert!(lo < hi);
        // Publish the later slot first.
        rb.publish(hi);
        assert!(rb.is_available(hi));
        assert!(!rb.is_available(lo));
        rb.publish(lo);
        assert!(rb.is_available(lo));
    }
}
