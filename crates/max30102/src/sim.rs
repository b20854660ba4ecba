//! Simulated MAX30102
//!
//! An in-memory register file with a 32-slot sample FIFO behind
//! `FIFO_DATA`, usable anywhere a [`RegisterBus`] is expected. Clones share
//! state, so a test can keep one handle to inject samples and inspect
//! traffic while the driver owns another.

use crate::decoder::encode_reading;
use crate::fifo::FIFO_DEPTH;
use crate::registers::*;
use crate::sample::{ActiveChannels, Sample, BYTES_PER_READING};
use crate::EXPECTED_PART_ID;
use sensor_bus::{BusError, RegisterBus, DEFAULT_MAX_BURST};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

const DEFAULT_REVISION: u8 = 0x03;

struct SimState {
    registers: [u8; 256],
    fifo: [Sample; FIFO_DEPTH],
    /// Bytes of the sample at the read pointer already clocked out
    byte_cursor: usize,
    max_burst: usize,
    block_reads: Vec<usize>,
    /// Successful block reads left before an injected fault
    fail_after: Option<usize>,
    reset_stuck: bool,
}

impl SimState {
    fn power_on() -> Self {
        let mut state = Self {
            registers: [0; 256],
            fifo: [Sample::default(); FIFO_DEPTH],
            byte_cursor: 0,
            max_burst: DEFAULT_MAX_BURST,
            block_reads: Vec::new(),
            fail_after: None,
            reset_stuck: false,
        };
        state.reset_registers();
        state
    }

    fn reset_registers(&mut self) {
        let revision = self.registers[REVISION_ID as usize];
        self.registers = [0; 256];
        self.registers[PART_ID as usize] = EXPECTED_PART_ID;
        self.registers[REVISION_ID as usize] = if revision == 0 { DEFAULT_REVISION } else { revision };
        self.byte_cursor = 0;
    }

    fn channels(&self) -> ActiveChannels {
        match self.registers[MODE_CONFIG as usize] & !MASK_LED_MODE {
            LED_MODE_RED_ONLY => ActiveChannels::RedOnly,
            _ => ActiveChannels::RedIr,
        }
    }

    fn read_ptr(&self) -> u8 {
        self.registers[FIFO_READ_PTR as usize] & FIFO_PTR_MASK
    }

    fn write_ptr(&self) -> u8 {
        self.registers[FIFO_WRITE_PTR as usize] & FIFO_PTR_MASK
    }

    fn set_read_ptr(&mut self, ptr: u8) {
        self.registers[FIFO_READ_PTR as usize] = ptr % FIFO_DEPTH as u8;
    }

    fn set_write_ptr(&mut self, ptr: u8) {
        self.registers[FIFO_WRITE_PTR as usize] = ptr % FIFO_DEPTH as u8;
    }

    fn push(&mut self, sample: Sample) {
        let write_ptr = self.write_ptr();
        let next = (write_ptr + 1) % FIFO_DEPTH as u8;
        let overflow = (self.registers[FIFO_OVERFLOW as usize] + 1).min(FIFO_PTR_MASK);

        if next == self.read_ptr() {
            // Full: pointers would become equal and read as empty
            self.registers[FIFO_OVERFLOW as usize] = overflow;
            if self.registers[FIFO_CONFIG as usize] & ROLLOVER_ENABLE == 0 {
                return;
            }
            self.set_read_ptr(self.read_ptr() + 1);
            self.byte_cursor = 0;
        }

        self.fifo[write_ptr as usize] = sample;
        self.set_write_ptr(next);
        self.registers[INT_STATUS_1 as usize] |= INT_DATA_RDY;
        if FIFO_DEPTH - crate::fifo::pending_samples(self.read_ptr(), self.write_ptr())
            <= (self.registers[FIFO_CONFIG as usize] & !MASK_A_FULL) as usize
        {
            self.registers[INT_STATUS_1 as usize] |= INT_A_FULL;
        }
    }

    /// Next byte of the FIFO data stream, zero when the FIFO is empty
    fn next_fifo_byte(&mut self) -> u8 {
        if self.read_ptr() == self.write_ptr() {
            return 0;
        }

        let channels = self.channels();
        let sample = self.fifo[self.read_ptr() as usize];
        let reading = if self.byte_cursor < BYTES_PER_READING {
            encode_reading(sample.red)
        } else {
            encode_reading(sample.ir.unwrap_or(0))
        };
        let byte = reading[self.byte_cursor % BYTES_PER_READING];

        self.byte_cursor += 1;
        if self.byte_cursor == channels.bytes_per_sample() {
            self.byte_cursor = 0;
            self.set_read_ptr(self.read_ptr() + 1);
        }
        byte
    }
}

/// Shared-state simulation of the sensor's register interface
#[derive(Clone)]
pub struct SimulatedMax30102 {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedMax30102 {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::power_on())),
        }
    }

    /// Limit block reads to `max_burst` bytes, like a small I2C adapter buffer
    pub fn with_max_burst(self, max_burst: usize) -> Self {
        self.lock().max_burst = max_burst;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a sample in the device FIFO as the sensor would after a conversion
    pub fn push_sample(&self, sample: Sample) {
        self.lock().push(sample);
    }

    /// `(read, write)` FIFO pointers
    pub fn fifo_pointers(&self) -> (u8, u8) {
        let state = self.lock();
        (state.read_ptr(), state.write_ptr())
    }

    /// Set the LED mode bits directly, bypassing configuration
    pub fn set_channels(&self, channels: ActiveChannels) {
        let mut state = self.lock();
        let mode = &mut state.registers[MODE_CONFIG as usize];
        let bits = match channels {
            ActiveChannels::RedOnly => LED_MODE_RED_ONLY,
            ActiveChannels::RedIr => LED_MODE_RED_IR,
        };
        *mode = (*mode & MASK_LED_MODE) | bits;
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.lock().registers[reg as usize]
    }

    pub fn set_register(&self, reg: u8, value: u8) {
        self.lock().registers[reg as usize] = value;
    }

    pub fn revision(&self) -> u8 {
        self.register(REVISION_ID)
    }

    pub fn is_shut_down(&self) -> bool {
        self.register(MODE_CONFIG) & SHUTDOWN != 0
    }

    /// Lengths of every `FIFO_DATA` block read so far
    pub fn block_reads(&self) -> Vec<usize> {
        self.lock().block_reads.clone()
    }

    /// Let `successes` more block reads through, then fail the next one
    pub fn fail_block_read_after(&self, successes: usize) {
        self.lock().fail_after = Some(successes);
    }

    /// Keep the reset bit set forever, as a wedged part would
    pub fn set_reset_stuck(&self, stuck: bool) {
        self.lock().reset_stuck = stuck;
    }
}

impl Default for SimulatedMax30102 {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for SimulatedMax30102 {
    fn read_register(&mut self, reg: u8) -> Result<u8, BusError> {
        let mut state = self.lock();
        let value = state.registers[reg as usize];
        match reg {
            // Status registers clear on read
            INT_STATUS_1 | INT_STATUS_2 => state.registers[reg as usize] = 0,
            FIFO_DATA => return Ok(state.next_fifo_byte()),
            _ => {}
        }
        Ok(value)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        let mut state = self.lock();
        match reg {
            PART_ID | REVISION_ID => {}
            MODE_CONFIG if value & RESET != 0 => {
                if state.reset_stuck {
                    state.registers[reg as usize] = value;
                } else {
                    state.reset_registers();
                    trace!("Simulated soft reset");
                }
            }
            FIFO_READ_PTR | FIFO_WRITE_PTR => {
                state.registers[reg as usize] = value & FIFO_PTR_MASK;
                state.byte_cursor = 0;
            }
            _ => state.registers[reg as usize] = value,
        }
        Ok(())
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        let mut state = self.lock();
        if buf.len() > state.max_burst {
            return Err(BusError::BurstTooLong {
                requested: buf.len(),
                limit: state.max_burst,
            });
        }

        if let Some(left) = state.fail_after {
            if left == 0 {
                state.fail_after = None;
                return Err(BusError::Io("simulated transfer failure".to_string()));
            }
            state.fail_after = Some(left - 1);
        }

        if reg == FIFO_DATA {
            state.block_reads.push(buf.len());
            for byte in buf.iter_mut() {
                *byte = state.next_fifo_byte();
            }
        } else {
            for (offset, byte) in buf.iter_mut().enumerate() {
                *byte = state.registers[(reg as usize + offset) % 256];
            }
        }
        Ok(())
    }

    fn max_burst_len(&self) -> usize {
        self.lock().max_burst
    }
}
