//! Sensor Error Types

use sensor_bus::BusError;
use thiserror::Error;

/// Errors raised while configuring or draining the sensor
#[derive(Debug, Error)]
pub enum SensorError {
    /// Register transport failure
    #[error("Bus fault: {0}")]
    Bus(#[from] BusError),

    /// A burst was not a whole number of samples
    #[error("Malformed burst: {len} bytes is not a multiple of the {sample_len}-byte sample size")]
    MalformedBurst { len: usize, sample_len: usize },

    /// The bus cannot carry even one sample per transaction
    #[error("Bus burst limit of {max_burst} bytes is smaller than one {sample_len}-byte sample")]
    BurstTooSmall { max_burst: usize, sample_len: usize },

    /// The device at the address is not the expected part
    #[error("Unexpected part id: expected {expected:#04X}, found {found:#04X}")]
    PartIdMismatch { expected: u8, found: u8 },

    /// The reset bit did not clear in time
    #[error("Soft reset did not complete within {0}ms")]
    ResetTimeout(u64),

    /// LED slot number outside 1..=4
    #[error("Invalid LED slot {0}, expected 1-4")]
    InvalidSlot(u8),

    /// A configuration value the part does not support
    #[error("Unsupported {name}: {value}")]
    InvalidSetting { name: &'static str, value: u32 },
}

impl SensorError {
    /// Whether the error indicates a logic defect that must stop acquisition,
    /// as opposed to a transient transport fault
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SensorError::MalformedBurst { .. } | SensorError::BurstTooSmall { .. }
        )
    }
}
