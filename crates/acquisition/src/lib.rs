//! PPG Acquisition Pipeline
//!
//! A dedicated worker thread waits for the sensor's interrupt line to fall,
//! drains the device FIFO into a history ring and hands the newest sample to
//! a consumer through a bounded queue that never drops unread entries.

mod config;
mod error;
mod queue;
mod worker;

pub use config::AcquisitionConfig;
pub use error::AcquisitionError;
pub use queue::{output_queue, Consumer, PublishOutcome, Publisher};
pub use worker::{Acquisition, WorkerState};

pub use max30102::Sample;
