//! Sample Types

use serde::{Deserialize, Serialize};

/// Bytes the sensor emits per channel reading
pub const BYTES_PER_READING: usize = 3;

/// Significant ADC bits in a reading (18)
pub const ADC_MASK: u32 = 0x3_FFFF;

/// One FIFO sample: raw ADC codes for each active channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Red channel, always active
    pub red: u32,
    /// IR channel, `None` in red-only mode
    pub ir: Option<u32>,
}

impl Sample {
    pub fn red_only(red: u32) -> Self {
        Self { red, ir: None }
    }

    pub fn red_ir(red: u32, ir: u32) -> Self {
        Self { red, ir: Some(ir) }
    }

    /// `(ir, red)` pair, IR reading 0 when the channel is inactive
    pub fn ir_red(&self) -> (u32, u32) {
        (self.ir.unwrap_or(0), self.red)
    }
}

/// How many LED channels the sensor is sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveChannels {
    RedOnly,
    RedIr,
}

impl ActiveChannels {
    pub fn count(&self) -> usize {
        match self {
            ActiveChannels::RedOnly => 1,
            ActiveChannels::RedIr => 2,
        }
    }

    /// Size of one sample in the FIFO data stream
    pub fn bytes_per_sample(&self) -> usize {
        self.count() * BYTES_PER_READING
    }
}
