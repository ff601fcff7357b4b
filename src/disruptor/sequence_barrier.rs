//! Coordination point between a producer cursor and a set of dependent
//! consumers (C5).
//!
//! Grounded on `disruptor::ProcessingSequenceBarrier`
//! (`sequence_barrier.h`): gates on the producer cursor plus zero or more
//! upstream processor sequences, with an alert flag standing in for the
//! original's `AlertException` — Rust code propagates that as a
//! [`VortexError::Alert`] `Result` instead of throwing across the handler
//! loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::disruptor::availability::AvailabilityTracker;
use crate::disruptor::sequence::Sequence;
use crate::disruptor::wait_strategy::WaitStrategy;
use crate::error::Result;

/// Gates a consumer on a producer cursor and any upstream processors it
/// must stay behind.
pub struct SequenceBarrier {
    cursor: Arc<Sequence>,
    dependencies: Vec<Arc<Sequence>>,
    wait_strategy: Box<dyn WaitStrategy>,
    availability: Option<Arc<AvailabilityTracker>>,
    alerted: AtomicBool,
}

impl SequenceBarrier {
    pub(crate) fn new(
        cursor: Arc<Sequence>,
        dependencies: Vec<Arc<Sequence>>,
        wait_strategy: Box<dyn WaitStrategy>,
        availability: Option<Arc<AvailabilityTracker>>,
    ) -> Self {
        Self {
            cursor,
            dependencies,
            wait_strategy,
            availability,
            alerted: AtomicBool::new(false),
        }
    }

    /// Wait for `sequence` to become available for consumption, or for the
    /// barrier to be alerted. Returns the highest sequence that is safe to
    /// read, which may be higher than `sequence` if more was published in
    /// the meantime — or lower, in a multi-producer ring where a later slot
    /// finished publishing before an earlier one.
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        let available = self
            .wait_strategy
            .wait_for(sequence, &self.cursor, &self.dependencies, &self.alerted)?;

        if available < sequence {
            return Ok(available);
        }

        match &self.availability {
            Some(tracker) => Ok(tracker.highest_published(sequence, available)),
            None => Ok(available),
        }
    }

    /// The dependency set's current minimum, or the producer cursor if there
    /// are no dependencies.
    pub fn cursor(&self) -> i64 {
        if self.dependencies.is_empty() {
            self.cursor.get()
        } else {
            crate::disruptor::sequence::min_sequence(&self.dependencies, self.cursor.get())
        }
    }

    /// Raise the alert and wake anyone parked in `wait_for`.
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Lower the alert so the barrier can be reused.
    pub fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    /// Whether the barrier is currently alerted.
    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            Err(crate::error::VortexError::Alert)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::wait_strategy::WaitStrategyType;

    #[test]
    fn wait_for_returns_once_cursor_reaches_target() {
        let cursor = Arc::new(Sequence::with_value(5));
        let barrier = SequenceBarrier::new(cursor, Vec::new(), WaitStrategyType::BusySpin.build(), None);
        assert_eq!(barrier.wait_for(5).unwrap(), 5);
    }

    #[test]
    fn alert_short_circuits_wait_for() {
        let cursor = Arc::new(Sequence::new());
        let barrier = SequenceBarrier::new(cursor, Vec::new(), WaitStrategyType::BusySpin.build(), None);
        barrier.alert();
        assert!(barrier.wait_for(0).is_err());
        barrier.clear_alert();
        assert!(!barrier.is_alerted());
    }

    #[test]
    fn cursor_reflects_minimum_of_dependencies() {
        let cursor = Arc::new(Sequence::with_value(100));
        let deps = vec![
            Arc::new(Sequence::with_value(2)),
            Arc::new(Sequence::with_value(9)),
        ];
        let barrier = SequenceBarrier::new(cursor, deps, WaitStrategyType::BusySpin.build(), None);
        assert_eq!(barrier.cursor(), 2);
    }

    #[test]
    fn multi_producer_wait_for_narrows_to_highest_published() {
        let cursor = Arc::new(Sequence::with_value(5));
        let tracker = Arc::new(AvailabilityTracker::new(8));
        tracker.set_available(0);
        tracker.set_available(1);
        // Gap at 2.
        let barrier = SequenceBarrier::new(
            cursor,
            Vec::new(),
            WaitStrategyType::BusySpin.build(),
            Some(tracker),
        );
        assert_eq!(barrier.wait_for(0).unwrap(), 1);
    }
}
