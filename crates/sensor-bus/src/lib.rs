//! Sensor Bus Primitives
//!
//! The acquisition pipeline reaches its sensor through two collaborators:
//! a register bus (single-register access plus block reads) and an edge
//! source reporting falling edges on the sensor's interrupt line.
//!
//! Backends:
//! - [`linux`]: i2c-dev adapters and Raspberry Pi GPIO interrupts (Linux only)
//! - [`memory`]: in-process edge source for tests and simulation

mod bus;
mod edge;
mod error;
pub mod memory;

#[cfg(target_os = "linux")]
pub mod linux;

pub use bus::{RegisterBus, DEFAULT_MAX_BURST};
pub use edge::{EdgeLine, EdgeSource, EdgeWait};
pub use error::{BusError, EdgeError};
pub use memory::{EdgeTrigger, MemoryEdgeLine, MemoryEdgeSource};
