//! Wait strategies for ring buffer consumers (C2).
//!
//! Each strategy trades latency against CPU usage while waiting for a
//! sequence to become available. The closed set is modeled as a tagged
//! enum rather than a trait-object hierarchy, matching how the ring buffer
//! already treats wait-strategy selection as config data.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::constants::{SLEEPING_SPIN_TRIES, SLEEPING_YIELD_TRIES, YIELDING_SPIN_TRIES};
use crate::disruptor::sequence::{min_sequence, Sequence};
use crate::error::{Result, VortexError};

/// Policy object consulted by a [`crate::disruptor::SequenceBarrier`] to
/// block/spin/yield/sleep until a target sequence is reached.
pub trait WaitStrategy: Send + Sync {
    /// Wait until `dependents` (and the cursor) reach at least `target`, or
    /// until `alert` is raised. Returns the highest sequence observed, which
    /// may be larger than `target` if publishers are running ahead.
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64>;

    /// Wake every thread currently parked in `wait_for`. Called whenever the
    /// barrier's alert flag flips so blocked waiters re-check it promptly.
    fn signal_all_when_blocking(&self);
}

#[inline(always)]
fn dependent_sequence(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    if dependents.is_empty() {
        cursor.get()
    } else {
        min_sequence(dependents, cursor.get())
    }
}

#[inline(always)]
fn check_alert(alert: &AtomicBool) -> Result<()> {
    if alert.load(Ordering::Acquire) {
        Err(VortexError::Alert)
    } else {
        Ok(())
    }
}

/// Busy spin: loop reading the cursor until it reaches the target.
///
/// Lowest latency, burns a full core. Interruptible only by re-checking the
/// alert flag on every iteration (no OS wait point to wake).
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        loop {
            check_alert(alert)?;
            let available = dependent_sequence(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op: nothing ever parks.
    }
}

/// Spin a bounded number of times, then yield the scheduler.
#[derive(Debug)]
pub struct YieldingWaitStrategy {
    spin_tries: usize,
}

impl YieldingWaitStrategy {
    pub fn new() -> Self {
        Self {
            spin_tries: YIELDING_SPIN_TRIES,
        }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        let mut counter = self.spin_tries;
        loop {
            check_alert(alert)?;
            let available = dependent_sequence(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            if counter > 0 {
                counter -= 1;
                std::hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op: nothing ever parks.
    }
}

/// Staircase backoff: spin, then yield, then sleep with increasing duration.
#[derive(Debug)]
pub struct SleepingWaitStrategy {
    spin_tries: usize,
    yield_tries: usize,
}

impl SleepingWaitStrategy {
    pub fn new() -> Self {
        Self {
            spin_tries: SLEEPING_SPIN_TRIES,
            yield_tries: SLEEPING_YIELD_TRIES,
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        let mut counter = self.spin_tries + self.yield_tries;
        loop {
            check_alert(alert)?;
            let available = dependent_sequence(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            if counter > self.yield_tries {
                counter -= 1;
                std::hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(Duration::from_micros(1));
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op: threads wake up on their own timer.
    }
}

/// Condition-variable based park. Highest latency, lowest CPU usage.
#[derive(Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl std::fmt::Debug for BlockingWaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingWaitStrategy").finish()
    }
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        loop {
            check_alert(alert)?;
            let available = dependent_sequence(cursor, dependents);
            if available >= target {
                return Ok(available);
            }

            let mut guard = self.mutex.lock();
            check_alert(alert)?;
            let available = dependent_sequence(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            // Bounded park: a lost wakeup between the check above and here
            // (e.g. alert() firing before we locked) must not hang forever.
            self.condvar.wait_for(&mut guard, Duration::from_millis(1));
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// [`BlockingWaitStrategy`] bounded by an overall deadline. Returns a
/// [`VortexError::Timeout`] (not [`VortexError::Alert`]) when the deadline
/// elapses before the target is reached, distinguishing "gave up" from
/// "shut down".
#[derive(Debug)]
pub struct TimeoutBlockingWaitStrategy {
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(
        &self,
        target: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        let deadline = Instant::now() + self.timeout;
        loop {
            check_alert(alert)?;
            let available = dependent_sequence(cursor, dependents);
            if available >= target {
                return Ok(available);
            }
            if Instant::now() >= deadline {
                return Err(VortexError::Timeout);
            }
            thread::sleep(Duration::from_micros(50));
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op: this variant polls rather than parking on a condvar.
    }
}

/// Which closed-set variant a [`crate::disruptor::RingBufferConfig`] picked.
///
/// Kept separate from the `WaitStrategy` trait so configuration stays
/// `Copy`/`Clone` without dragging the (non-cloneable) blocking primitives
/// along with it.
#[derive(Debug, Clone, Copy)]
pub enum WaitStrategyType {
    /// Lowest latency, highest CPU usage.
    BusySpin,
    /// Spin then yield.
    Yielding,
    /// Spin, yield, then sleep with staircase backoff.
    Sleeping,
    /// Park on a condition variable.
    Blocking,
    /// Park with a bounded overall deadline.
    TimeoutBlocking(Duration),
}

impl WaitStrategyType {
    /// Instantiate the corresponding concrete strategy.
    pub fn build(self) -> Box<dyn WaitStrategy> {
        match self {
            Self::BusySpin => Box::new(BusySpinWaitStrategy),
            Self::Yielding => Box::new(YieldingWaitStrategy::new()),
            Self::Sleeping => Box::new(SleepingWaitStrategy::new()),
            Self::Blocking => Box::new(BlockingWaitStrategy::new()),
            Self::TimeoutBlocking(dur) => Box::new(TimeoutBlockingWaitStrategy::new(dur)),
        }
    }
}
