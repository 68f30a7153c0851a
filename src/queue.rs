//! Bounded, ordered producer/consumer queues.
//!
//! Thin wrappers over `crossbeam-channel` that turn the blocking ends into
//! cancellation points: a producer blocked on a full queue and a consumer
//! blocked on an empty one wake up every [`POLL_INTERVAL`] to check the
//! shared [`CancellationToken`]. The queue is closed once every producer has
//! been dropped.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::cancel::CancellationToken;

/// How often blocked queue operations check for cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Create a queue holding at most `capacity` items.
pub fn bounded<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (Producer { tx }, Consumer { rx })
}

/// Why an item could not be put; the item is handed back.
#[derive(Debug, PartialEq, Eq)]
pub enum PutError<T> {
    Cancelled(T),
    Closed(T),
}

/// Outcome of [`Consumer::get`].
#[derive(Debug, PartialEq, Eq)]
pub enum Get<T> {
    Item(T),
    Closed,
    Cancelled,
}

pub struct Producer<T> {
    tx: Sender<T>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Producer<T> {
    /// Put `item`, blocking while the queue is full unless `cancel` fires first.
    pub fn put(&self, item: T, cancel: &CancellationToken) -> Result<(), PutError<T>> {
        let mut item = item;
        loop {
            if cancel.is_cancelled() {
                return Err(PutError::Cancelled(item));
            }
            match self.tx.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(back)) => return Err(PutError::Closed(back)),
            }
        }
    }

    /// Put `item`, blocking while the queue is full. Used where the consumer is
    /// guaranteed to keep draining until the queue closes.
    pub fn send(&self, item: T) -> Result<(), T> {
        self.tx.send(item).map_err(|err| err.into_inner())
    }
}

pub struct Consumer<T> {
    rx: Receiver<T>,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> Consumer<T> {
    /// Take the next item, blocking while the queue is empty unless `cancel` fires first.
    pub fn get(&self, cancel: &CancellationToken) -> Get<T> {
        loop {
            if cancel.is_cancelled() {
                return Get::Cancelled;
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(item) => return Get::Item(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Get::Closed,
            }
        }
    }

    /// Blocking iterator over items until the queue is closed.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.rx.iter()
    }
}
