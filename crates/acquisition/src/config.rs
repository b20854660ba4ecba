//! Acquisition configuration

use crate::error::AcquisitionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Acquisition worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Interrupt line on the edge source (BCM pin number on GPIO hardware)
    pub edge_line: u32,
    /// Output queue capacity (>= 1)
    pub queue_capacity: usize,
    /// History ring slots (>= 1)
    pub history_capacity: usize,
    /// Longest single edge wait before the stop flag is rechecked (ms)
    pub edge_poll_interval_ms: u64,
    /// Bounded wait per attempt while the output queue is full (ms)
    pub publish_backoff_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            edge_line: 0,
            queue_capacity: 16,
            history_capacity: sample_ring::DEFAULT_STORAGE_SIZE,
            edge_poll_interval_ms: 100,
            publish_backoff_ms: 5,
        }
    }
}

impl AcquisitionConfig {
    pub fn validate(&self) -> Result<(), AcquisitionError> {
        if self.queue_capacity == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.edge_poll_interval_ms == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "edge_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.publish_backoff_ms == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "publish_backoff_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn edge_poll_interval(&self) -> Duration {
        Duration::from_millis(self.edge_poll_interval_ms)
    }

    pub fn publish_backoff(&self) -> Duration {
        Duration::from_millis(self.publish_backoff_ms)
    }
}
