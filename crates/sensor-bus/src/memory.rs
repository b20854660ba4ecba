//! In-process edge source
//!
//! Edges are delivered over a crossbeam channel. An [`EdgeTrigger`] plays the
//! role of the interrupt pin: every `fire()` is one falling edge.

use crate::edge::{EdgeLine, EdgeSource, EdgeWait};
use crate::error::EdgeError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Edge source backed by a channel instead of hardware
pub struct MemoryEdgeSource {
    tx: Sender<()>,
    rx: Receiver<()>,
    reject: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl MemoryEdgeSource {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            reject: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle used to inject falling edges
    pub fn trigger(&self) -> EdgeTrigger {
        EdgeTrigger {
            tx: self.tx.clone(),
            reject: Arc::clone(&self.reject),
            active: Arc::clone(&self.active),
        }
    }

    /// Number of subscriptions currently armed and not yet released
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for MemoryEdgeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeSource for MemoryEdgeSource {
    type Line = MemoryEdgeLine;

    fn subscribe(&mut self, line: u32) -> Result<MemoryEdgeLine, EdgeError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(EdgeError::SubscriptionFailed {
                line,
                reason: "edge source rejected the subscription".to_string(),
            });
        }

        // Edges fired before the line was armed are not observable on hardware
        let stale = self.rx.try_iter().count();
        if stale > 0 {
            debug!("Discarded {} edges fired before subscription", stale);
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        debug!("Armed in-memory falling-edge subscription on line {}", line);

        Ok(MemoryEdgeLine {
            rx: self.rx.clone(),
            line,
            released: false,
            active: Arc::clone(&self.active),
        })
    }
}

/// Cloneable handle that injects edges into a [`MemoryEdgeSource`]
#[derive(Clone)]
pub struct EdgeTrigger {
    tx: Sender<()>,
    reject: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl EdgeTrigger {
    /// Deliver one falling edge
    pub fn fire(&self) {
        // The source owns a receiver for as long as it lives
        let _ = self.tx.send(());
    }

    /// Make subsequent subscriptions fail, or succeed again
    pub fn reject_subscriptions(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Number of subscriptions currently armed and not yet released
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// A subscription handed out by [`MemoryEdgeSource`]
pub struct MemoryEdgeLine {
    rx: Receiver<()>,
    line: u32,
    released: bool,
    active: Arc<AtomicUsize>,
}

impl MemoryEdgeLine {
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl EdgeLine for MemoryEdgeLine {
    fn wait(&mut self, timeout: Duration) -> Result<EdgeWait, EdgeError> {
        if self.released {
            return Ok(EdgeWait::Released);
        }

        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(EdgeWait::Edge),
            Err(RecvTimeoutError::Timeout) => Ok(EdgeWait::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Ok(EdgeWait::Released),
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
            debug!("Released in-memory edge subscription on line {}", self.line);
        }
    }
}

impl Drop for MemoryEdgeLine {
    fn drop(&mut self) {
        self.release();
    }
}
