//! Builder API for wiring ring buffer, barriers and processors together
//! (C7).
//!
//! Grounded on `disruptor::Disruptor<T>` / `EventHandlerGroup<T>`
//! (`disruptor_dsl.h`): `handle_events_with` fans a batch of handlers out in
//! parallel against the same barrier, and `.then(...)` chains a new group
//! that waits on every processor in the previous one. Only the handlers at
//! the end of a chain need to gate the producer — anything superseded by a
//! `.then()` is already protected by its successor having to wait for it.

use std::sync::Arc;

use crate::disruptor::event::EventHandler;
use crate::disruptor::processor::{BatchEventProcessor, ProcessorHandle};
use crate::disruptor::ring_buffer::RingBuffer;
use crate::disruptor::sequence::Sequence;
use crate::disruptor::sequence_barrier::SequenceBarrier;

trait Startable: Send {
    fn start(self: Box<Self>) -> ProcessorHandle;
}

impl<T, H> Startable for BatchEventProcessor<T, H>
where
    T: Send + Sync + 'static,
    H: EventHandler<T> + 'static,
{
    fn start(self: Box<Self>) -> ProcessorHandle {
        BatchEventProcessor::start(*self)
    }
}

/// Owns a ring buffer plus every processor wired against it, and starts or
/// stops them together.
pub struct Disruptor<T> {
    ring_buffer: Arc<RingBuffer<T>>,
    pending: Vec<Box<dyn Startable>>,
    handles: Vec<ProcessorHandle>,
    /// Sequences not yet superseded by a `.then()` — these are the ones that
    /// must gate the producer once `start()` registers them.
    terminal_sequences: Vec<Arc<Sequence>>,
    started: bool,
}

impl<T> Disruptor<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap a ring buffer for DSL-style wiring.
    pub fn new(ring_buffer: Arc<RingBuffer<T>>) -> Self {
        Self {
            ring_buffer,
            pending: Vec::new(),
            handles: Vec::new(),
            terminal_sequences: Vec::new(),
            started: false,
        }
    }

    /// Borrow the underlying ring buffer, e.g. to publish into it.
    pub fn ring_buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.ring_buffer
    }

    /// Attach handlers that process events directly from the ring buffer, in
    /// parallel with each other.
    pub fn handle_events_with<H>(&mut self, handlers: Vec<H>) -> EventHandlerGroup<'_, T>
    where
        H: EventHandler<T> + 'static,
    {
        self.create_processors(Vec::new(), handlers)
    }

    fn create_processors<H>(
        &mut self,
        dependencies: Vec<Arc<Sequence>>,
        handlers: Vec<H>,
    ) -> EventHandlerGroup<'_, T>
    where
        H: EventHandler<T> + 'static,
    {
        assert!(!handlers.is_empty(), "at least one handler must be provided");

        self.terminal_sequences
            .retain(|s| !dependencies.iter().any(|d| Arc::ptr_eq(s, d)));

        let mut sequences = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let barrier = Arc::new(self.ring_buffer.new_barrier(dependencies.clone()));
            let processor = BatchEventProcessor::new(self.ring_buffer.clone(), barrier, handler);
            let sequence = processor.sequence();
            sequences.push(sequence.clone());
            self.terminal_sequences.push(sequence);
            self.pending.push(Box::new(processor));
        }

        EventHandlerGroup {
            disruptor: self,
            sequences,
        }
    }

    /// Register terminal sequences as producer gating and start every
    /// processor's thread. No-op if already started.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.ring_buffer.add_gating_sequences(&self.terminal_sequences);
        for processor in self.pending.drain(..) {
            self.handles.push(processor.start());
        }
        self.started = true;
    }

    /// Alert every processor and join its thread. No-op if not started.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        for handle in &mut self.handles {
            handle.stop();
        }
        self.started = false;
    }

    /// Whether [`start`](Self::start) has run without a matching [`stop`](Self::stop).
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl<T> Drop for Disruptor<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A set of handlers created by the same `handle_events_with`/`then` call,
/// used to chain a dependent stage with `.then(...)`.
pub struct EventHandlerGroup<'d, T> {
    disruptor: &'d mut Disruptor<T>,
    sequences: Vec<Arc<Sequence>>,
}

impl<'d, T> EventHandlerGroup<'d, T>
where
    T: Send + Sync + 'static,
{
    /// Attach handlers that run only after every handler in this group has
    /// processed a given event.
    pub fn then<H>(self, handlers: Vec<H>) -> EventHandlerGroup<'d, T>
    where
        H: EventHandler<T> + 'static,
    {
        let disruptor = self.disruptor;
        disruptor.create_processors(self.sequences, handlers)
    }

    /// A barrier gated on every processor in this group, for wiring a
    /// hand-built consumer into the same dependency graph.
    pub fn as_sequence_barrier(&self) -> SequenceBarrier {
        self.disruptor.ring_buffer.new_barrier(self.sequences.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::ring_buffer::RingBufferConfig;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn ring(size: usize) -> Arc<RingBuffer<i64>> {
        Arc::new(RingBuffer::new(RingBufferConfig::new(size).unwrap(), &(|| 0i64)).unwrap())
    }

    fn wait_until(deadline: Instant, mut cond: impl FnMut() -> bool) {
        while !cond() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn single_stage_fan_out_processes_every_event() {
        let rb = ring(16);
        let mut disruptor = Disruptor::new(rb.clone());
        let a = Arc::new(Mutex::new(Vec::new()));
        let b = Arc::new(Mutex::new(Vec::new()));
        let (a2, b2) = (a.clone(), b.clone());

        disruptor.handle_events_with(vec![
            Box::new(move |e: &mut i64, _s: i64, _eob: bool| a2.lock().unwrap().push(*e)) as Box<dyn EventHandler<i64>>,
            Box::new(move |e: &mut i64, _s: i64, _eob: bool| b2.lock().unwrap().push(*e)) as Box<dyn EventHandler<i64>>,
        ]);
        disruptor.start();

        for i in 0..5 {
            let seq = rb.next();
            *rb.get_mut(seq) = i;
            rb.publish(seq);
        }

        wait_until(Instant::now() + Duration::from_secs(2), || {
            a.lock().unwrap().len() == 5 && b.lock().unwrap().len() == 5
        });

        disruptor.stop();
        assert_eq!(*a.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(*b.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn then_stage_only_sees_events_after_upstream_group() {
        let rb = ring(16);
        let mut disruptor = Disruptor::new(rb.clone());
        let order = Arc::new(Mutex::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());

        disruptor
            .handle_events_with(vec![
                Box::new(move |_e: &mut i64, _s: i64, _eob: bool| o1.lock().unwrap().push("upstream"))
                    as Box<dyn EventHandler<i64>>,
            ])
            .then(vec![
                Box::new(move |_e: &mut i64, _s: i64, _eob: bool| o2.lock().unwrap().push("downstream"))
                    as Box<dyn EventHandler<i64>>,
            ]);
        disruptor.start();

        let seq = rb.next();
        *rb.get_mut(seq) = 1;
        rb.publish(seq);

        wait_until(Instant::now() + Duration::from_secs(2), || {
            order.lock().unwrap().len() == 2
        });

        disruptor.stop();
        assert_eq!(*order.lock().unwrap(), vec!["upstream", "downstream"]);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let rb = ring(4);
        let mut disruptor = Disruptor::new(rb);
        disruptor.handle_events_with(vec![
            Box::new(|_: &mut i64, _: i64, _: bool| {}) as Box<dyn EventHandler<i64>>,
        ]);
        disruptor.start();
        disruptor.start();
        assert!(disruptor.is_started());
        disruptor.stop();
        disruptor.stop();
        assert!(!disruptor.is_started());
    }
}
