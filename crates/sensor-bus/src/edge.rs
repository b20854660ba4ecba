//! Edge Notification

use crate::error::EdgeError;
use std::time::Duration;

/// Outcome of a single bounded wait on an edge line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeWait {
    /// A falling edge was observed
    Edge,
    /// The timeout elapsed without an edge
    TimedOut,
    /// The subscription was released; no further edges will be delivered
    Released,
}

/// An armed falling-edge subscription on one line.
///
/// Dropping the line releases the subscription.
pub trait EdgeLine: Send {
    /// Block until a falling edge occurs, the timeout elapses, or the
    /// subscription is released
    fn wait(&mut self, timeout: Duration) -> Result<EdgeWait, EdgeError>;

    /// Release the subscription. Further waits return [`EdgeWait::Released`].
    /// Calling this more than once is a no-op.
    fn release(&mut self);
}

/// Something that can arm falling-edge subscriptions on numbered lines
pub trait EdgeSource: Send {
    type Line: EdgeLine + 'static;

    /// Arm a falling-edge subscription on `line`
    fn subscribe(&mut self, line: u32) -> Result<Self::Line, EdgeError>;
}
