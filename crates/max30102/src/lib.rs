//! MAX30102 Optical Sensor Driver
//!
//! One-shot register configuration, identity checks and the FIFO drain that
//! moves samples from the sensor's 32-slot on-chip buffer into a
//! [`sample_ring::HistoryRing`].

mod config;
mod decoder;
mod device;
mod error;
mod fifo;
pub mod registers;
mod sample;
pub mod sim;

pub use config::{InterruptConfig, LedMode, SensorConfig};
pub use decoder::{decode_burst, encode_reading};
pub use device::{InterruptStatus, Max30102, SlotDevice};
pub use error::SensorError;
pub use fifo::{aligned_burst_len, pending_samples, FIFO_DEPTH};
pub use sample::{ActiveChannels, Sample, ADC_MASK, BYTES_PER_READING};
pub use sim::SimulatedMax30102;

/// Default 7-bit I2C address
pub const DEFAULT_ADDRESS: u8 = 0x57;

/// Value of the part id register on a genuine part
pub const EXPECTED_PART_ID: u8 = 0x15;
