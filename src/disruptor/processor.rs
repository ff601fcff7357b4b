//! Drives an [`EventHandler`] from a [`SequenceBarrier`] on its own thread
//! (C6).
//!
//! Grounded on `disruptor::BatchEventProcessor<T>`
//! (`batch_event_processor.h`): wait for a target sequence, process
//! everything newly available as one batch, advance the processor's own
//! gating sequence, repeat until alerted. A handler panic is caught per
//! event (standing in for the original catching `std::exception` per
//! event) and handed to the `ExceptionHandler` instead of unwinding the
//! whole processing thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::disruptor::event::{EventHandler, ExceptionHandler, LoggingExceptionHandler};
use crate::disruptor::ring_buffer::RingBuffer;
use crate::disruptor::sequence::Sequence;
use crate::disruptor::sequence_barrier::SequenceBarrier;
use crate::error::VortexError;

/// A not-yet-started consumer: a handler bound to a ring buffer and the
/// barrier it waits on. [`sequence`](Self::sequence) is available before
/// `start` so the DSL can wire downstream processors to depend on it.
pub struct BatchEventProcessor<T, H> {
    ring_buffer: Arc<RingBuffer<T>>,
    barrier: Arc<SequenceBarrier>,
    handler: H,
    exception_handler: Box<dyn ExceptionHandler<T>>,
    sequence: Arc<Sequence>,
}

impl<T, H> BatchEventProcessor<T, H>
where
    T: Send + Sync + 'static,
    H: EventHandler<T> + 'static,
{
    /// Build a processor. It does not start consuming until [`start`](Self::start)
    /// is called.
    pub fn new(ring_buffer: Arc<RingBuffer<T>>, barrier: Arc<SequenceBarrier>, handler: H) -> Self {
        Self {
            ring_buffer,
            barrier,
            handler,
            exception_handler: Box::new(LoggingExceptionHandler),
            sequence: Arc::new(Sequence::new()),
        }
    }

    /// Replace the default (log-and-continue) exception handler.
    pub fn with_exception_handler(mut self, handler: Box<dyn ExceptionHandler<T>>) -> Self {
        self.exception_handler = handler;
        self
    }

    /// This processor's gating sequence. Register it as a gating sequence on
    /// the ring buffer, or as a dependency of a downstream barrier, before
    /// starting.
    pub fn sequence(&self) -> Arc<Sequence> {
        self.sequence.clone()
    }

    /// Spawn the processing thread. Consumes `self`; use the returned handle
    /// to stop it.
    pub fn start(self) -> ProcessorHandle {
        let running = Arc::new(AtomicBool::new(true));
        let barrier = self.barrier.clone();
        let running_for_thread = running.clone();

        let join = thread::spawn(move || run(self, running_for_thread));

        ProcessorHandle {
            barrier,
            running,
            join: Some(join),
        }
    }
}

fn run<T, H>(mut processor: BatchEventProcessor<T, H>, running: Arc<AtomicBool>)
where
    T: Send + Sync + 'static,
    H: EventHandler<T>,
{
    let mut next_sequence = processor.sequence.get() + 1;

    while running.load(Ordering::Acquire) {
        match processor.barrier.wait_for(next_sequence) {
            Ok(available) if next_sequence <= available => {
                process_batch(
                    &processor.ring_buffer,
                    &mut processor.handler,
                    processor.exception_handler.as_mut(),
                    next_sequence,
                    available,
                );
                next_sequence = available + 1;
                processor.sequence.set(available);
            }
            Ok(_) => {
                // Wait strategy returned early (e.g. a timeout-bounded one)
                // with nothing new; loop and wait again.
            }
            Err(VortexError::Alert) => break,
            Err(_) => {
                // Recoverable wait error (e.g. a bounded timeout strategy);
                // re-check `running` and retry.
            }
        }
    }
}

fn process_batch<T, H>(
    ring_buffer: &RingBuffer<T>,
    handler: &mut H,
    exception_handler: &mut dyn ExceptionHandler<T>,
    start: i64,
    end: i64,
) where
    H: EventHandler<T>,
{
    for sequence in start..=end {
        let end_of_batch = sequence == end;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let event = ring_buffer.get_mut(sequence);
            handler.on_event(event, sequence, end_of_batch)
        }));
        if let Err(payload) = outcome {
            let event = ring_buffer.get_mut(sequence);
            exception_handler.handle_event_exception(payload, event, sequence);
        }
    }
}

/// Handle to a running [`BatchEventProcessor`]. Dropping it leaves the
/// processor running; call [`stop`](Self::stop) to shut it down.
pub struct ProcessorHandle {
    barrier: Arc<SequenceBarrier>,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ProcessorHandle {
    /// Alert the processor's barrier and join its thread. Idempotent.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.barrier.alert();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }

    /// Whether the processor's thread is still (meant to be) running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for ProcessorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
