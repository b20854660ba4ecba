//! Bounded sample handoff between the worker and its consumer
//!
//! A full queue never loses data: the producer waits in short bounded
//! slices until the consumer frees a slot, rechecking its stop flag between
//! slices so shutdown is never blocked by a stalled consumer.

use crate::error::AcquisitionError;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Create a bounded queue holding at most `capacity` unread values
pub fn output_queue<T>(
    capacity: usize,
    backoff: Duration,
) -> Result<(Publisher<T>, Consumer<T>), AcquisitionError> {
    if capacity == 0 {
        return Err(AcquisitionError::InvalidConfig(
            "output queue capacity must be at least 1".to_string(),
        ));
    }

    let (tx, rx) = crossbeam_channel::bounded(capacity);
    Ok((Publisher { tx, backoff }, Consumer { rx, capacity }))
}

/// How a `publish` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Queued after `waits` bounded waits on a full queue
    Delivered { waits: u32 },
    /// The stop flag dropped while the queue was full; the value was not queued
    Cancelled,
    /// Every consumer is gone
    Disconnected,
}

/// Producing side of the output queue
#[derive(Clone)]
pub struct Publisher<T> {
    tx: Sender<T>,
    backoff: Duration,
}

impl<T> Publisher<T> {
    /// Non-blocking insert; hands the value back when the queue is full or closed
    pub fn try_publish(&self, value: T) -> Result<(), T> {
        self.tx.try_send(value).map_err(|err| match err {
            TrySendError::Full(value) | TrySendError::Disconnected(value) => value,
        })
    }

    /// Insert `value`, waiting for space while `running` stays set
    pub fn publish(&self, value: T, running: &AtomicBool) -> PublishOutcome {
        let mut value = match self.tx.try_send(value) {
            Ok(()) => return PublishOutcome::Delivered { waits: 0 },
            Err(TrySendError::Disconnected(_)) => return PublishOutcome::Disconnected,
            Err(TrySendError::Full(value)) => value,
        };

        let mut waits = 0;
        loop {
            if !running.load(Ordering::Acquire) {
                return PublishOutcome::Cancelled;
            }
            waits += 1;
            match self.tx.send_timeout(value, self.backoff) {
                Ok(()) => return PublishOutcome::Delivered { waits },
                Err(SendTimeoutError::Timeout(pending)) => value = pending,
                Err(SendTimeoutError::Disconnected(_)) => return PublishOutcome::Disconnected,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }
}

/// Consuming side of the output queue
#[derive(Clone)]
pub struct Consumer<T> {
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> Consumer<T> {
    /// Oldest unread value, `None` when nothing is queued
    pub fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Oldest unread value, waiting up to `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
