//! A lock-free, single- or multi-producer ring buffer coordination engine
//! modeled on the LMAX Disruptor.
//!
//! Components are layered bottom-up, each depending only on the ones below
//! it:
//!
//! - [`sequence`] — the cache-line isolated monotonic counter everything
//!   else coordinates through.
//! - [`wait_strategy`] — how a consumer waits for a sequence to advance.
//! - [`availability`] — per-slot publication tracking for multi-producer
//!   rings, where the cursor alone can't tell a consumer what's safe to read.
//! - [`ring_buffer`] — the pre-allocated slot array and its claim/publish
//!   protocol.
//! - [`sequence_barrier`] — ties a producer cursor and consumer dependencies
//!   together behind one `wait_for`.
//! - [`processor`] — drives an [`event::EventHandler`] from a barrier on its
//!   own thread.
//! - [`dsl`] — wires ring buffer, barriers and processors into a dependency
//!   graph and starts/stops them as a unit.
//!
//! ```
//! use std::sync::Arc;
//! use vortex::disruptor::{Disruptor, RingBuffer, RingBufferConfig};
//!
//! let ring = Arc::new(RingBuffer::new(RingBufferConfig::new(1024).unwrap(), &(|| 0i64)).unwrap());
//! let mut disruptor = Disruptor::new(ring.clone());
//! disruptor.handle_events_with(vec![|event: &mut i64, _seq: i64, _end_of_batch: bool| {
//!     println!("got {event}");
//! }]);
//! disruptor.start();
//!
//! let seq = ring.next();
//! *ring.get_mut(seq) = 42;
//! ring.publish(seq);
//!
//! disruptor.stop();
//! ```

pub mod availability;
pub mod dsl;
pub mod event;
pub mod processor;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod wait_strategy;

pub use availability::AvailabilityTracker;
pub use dsl::{Disruptor, EventHandlerGroup};
pub use event::{EventFactory, EventHandler, EventTranslator, ExceptionHandler, LoggingExceptionHandler};
pub use processor::{BatchEventProcessor, ProcessorHandle};
pub use ring_buffer::{ProducerType, RingBuffer, RingBufferConfig};
pub use sequence::{min_sequence, Sequence, INITIAL_VALUE};
pub use sequence_barrier::SequenceBarrier;
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, TimeoutBlockingWaitStrategy,
    WaitStrategy, WaitStrategyType, YieldingWaitStrategy,
};
