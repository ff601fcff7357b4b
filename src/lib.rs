//! Vortex — a lock-free, in-process message-passing fabric modeled on the
//! LMAX Disruptor.
//!
//! A [`disruptor::RingBuffer`] is a fixed-size, pre-allocated array of slots
//! coordinated by monotonically increasing sequence numbers instead of
//! locks: producers claim a range of slots, fill them, and publish; consumers
//! wait on a [`disruptor::SequenceBarrier`] for sequences to become
//! available and drain them in batches. [`disruptor::Disruptor`] wires ring
//! buffer, barriers and consumer threads together with a small DSL
//! (`handle_events_with`, `.then(...)`).
//!
//! This crate is a coordination primitive, not a transport: it does not
//! touch the network, persist records, or cross process boundaries. See the
//! [`disruptor`] module for the full component breakdown.

pub mod constants;
pub mod disruptor;
pub mod error;

pub use disruptor::{
    Disruptor, EventFactory, EventHandler, EventHandlerGroup, EventTranslator, ExceptionHandler,
    ProducerType, RingBuffer, RingBufferConfig, Sequence, SequenceBarrier, WaitStrategy,
    WaitStrategyType,
};
pub use error::{Result, VortexError};

/// Crate version, as set in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
