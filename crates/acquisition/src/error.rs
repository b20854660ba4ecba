//! Acquisition Error Types

use max30102::SensorError;
use sensor_bus::EdgeError;
use thiserror::Error;

/// Errors surfaced to the owner of an [`crate::Acquisition`]
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// `start()` while the worker is running or stopping
    #[error("Acquisition is already running")]
    AlreadyRunning,

    /// Arming the edge subscription failed
    #[error("Edge notification error: {0}")]
    Edge(#[from] EdgeError),

    /// Sensor fault, either at setup or the fatal fault that ended the worker
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// The worker thread panicked; the sensor handle went down with it
    #[error("Acquisition worker panicked")]
    WorkerPanicked,

    /// The sensor is not available to start a new worker
    #[error("Sensor handle unavailable")]
    SensorUnavailable,

    /// The worker thread could not be spawned
    #[error("Failed to spawn acquisition worker: {0}")]
    Spawn(String),

    /// `stop()` was called on the worker thread itself
    #[error("stop() called from the acquisition worker thread")]
    StopFromWorker,

    /// Configuration rejected
    #[error("Invalid acquisition config: {0}")]
    InvalidConfig(String),
}
