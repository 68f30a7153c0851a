use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::queue::Producer;

/// Completion barrier gating the close of a result queue.
///
/// The barrier owns the master producer of the queue and counts the parties
/// (tasks) still running. Each party holds a [`Party`] handle with its own
/// producer clone; dropping it drops that clone and decrements the count.
/// The master producer is dropped when the count reaches zero, so the queue
/// closes only once every party has permanently stopped, even if one of them
/// unwinds from a panic.
pub struct CompletionBarrier<T> {
    outstanding: AtomicUsize,
    master: Mutex<Option<Producer<T>>>,
}

impl<T> CompletionBarrier<T> {
    pub fn new(parties: usize, producer: Producer<T>) -> Self {
        let master = if parties == 0 { None } else { Some(producer) };
        Self {
            outstanding: AtomicUsize::new(parties),
            master: Mutex::new(master),
        }
    }

    /// Hand out a party handle. Must be called exactly `parties` times,
    /// before any party is dropped.
    pub fn join(&self) -> Party<'_, T> {
        let producer = self
            .master
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Party {
            producer,
            barrier: self,
        }
    }

    /// Number of parties still running
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    fn arrive(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("all parties arrived, closing result queue");
            self.master
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }
}

/// A running party of a [`CompletionBarrier`] holding its own result producer.
pub struct Party<'b, T> {
    producer: Option<Producer<T>>,
    barrier: &'b CompletionBarrier<T>,
}

impl<T> Party<'_, T> {
    /// Send a result; fails only when the queue has no consumer left.
    pub fn send(&self, item: T) -> Result<(), T> {
        match &self.producer {
            Some(producer) => producer.send(item),
            None => Err(item),
        }
    }
}

impl<T> Drop for Party<'_, T> {
    fn drop(&mut self) {
        // the party's own producer must be gone before it counts as arrived
        self.producer.take();
        self.barrier.arrive();
    }
}
