//! Bus and Edge Notification Error Types

use thiserror::Error;

/// Errors raised by a register bus transport
#[derive(Debug, Error)]
pub enum BusError {
    /// Transport-level I/O failure
    #[error("Bus I/O error: {0}")]
    Io(String),

    /// A block read asked for more bytes than one bus transaction can carry
    #[error("Block read of {requested} bytes exceeds bus limit of {limit}")]
    BurstTooLong { requested: usize, limit: usize },
}

/// Errors raised by an edge notification backend
#[derive(Debug, Error)]
pub enum EdgeError {
    /// The backend could not arm a falling-edge subscription
    #[error("Failed to subscribe to falling edge on line {line}: {reason}")]
    SubscriptionFailed { line: u32, reason: String },

    /// Waiting for or reading an edge event failed
    #[error("Edge notification I/O error: {0}")]
    Io(String),
}
