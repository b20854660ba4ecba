//! Linux Transport Backends
//!
//! [`I2cDevice`] drives `/dev/i2c-N` through `linux-embedded-hal`.
//! [`GpioEdgeSource`] arms falling-edge interrupts on a Raspberry Pi GPIO
//! header through `rppal`; line numbers are BCM pin numbers.

use crate::bus::{RegisterBus, DEFAULT_MAX_BURST};
use crate::edge::{EdgeLine, EdgeSource, EdgeWait};
use crate::error::{BusError, EdgeError};
use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use rppal::gpio::{Gpio, InputPin, Trigger};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

fn transfer_fault(reg: u8, err: impl fmt::Debug) -> BusError {
    BusError::Io(format!("register {:#04X}: {:?}", reg, err))
}

/// An i2c-dev adapter talking to a single 7-bit address
pub struct I2cDevice {
    i2c: I2cdev,
    path: PathBuf,
    address: u8,
    max_burst: usize,
}

impl I2cDevice {
    pub fn open(path: impl AsRef<Path>, address: u8) -> Result<Self, BusError> {
        let path = path.as_ref().to_path_buf();
        let i2c = I2cdev::new(&path)
            .map_err(|e| BusError::Io(format!("{}: {}", path.display(), e)))?;

        info!("Opened {} at address {:#04X}", path.display(), address);

        Ok(Self {
            i2c,
            path,
            address,
            max_burst: DEFAULT_MAX_BURST,
        })
    }

    /// Override the largest block transfer (adapter dependent)
    pub fn with_max_burst(mut self, max_burst: usize) -> Self {
        self.max_burst = max_burst.max(1);
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegisterBus for I2cDevice {
    fn read_register(&mut self, reg: u8) -> Result<u8, BusError> {
        let mut value = [0u8];
        self.i2c
            .write_read(self.address, &[reg], &mut value)
            .map_err(|e| transfer_fault(reg, e))?;
        Ok(value[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|e| transfer_fault(reg, e))
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        if buf.len() > self.max_burst {
            return Err(BusError::BurstTooLong {
                requested: buf.len(),
                limit: self.max_burst,
            });
        }
        if buf.is_empty() {
            return Ok(());
        }
        // Repeated start between the register write and the read
        self.i2c
            .write_read(self.address, &[reg], buf)
            .map_err(|e| transfer_fault(reg, e))
    }

    fn max_burst_len(&self) -> usize {
        self.max_burst
    }
}

/// BCM pin number for an edge line
fn bcm_pin(line: u32) -> Result<u8, EdgeError> {
    u8::try_from(line).map_err(|_| EdgeError::SubscriptionFailed {
        line,
        reason: "not a GPIO pin number".to_string(),
    })
}

/// Falling-edge interrupts on the Raspberry Pi GPIO header
pub struct GpioEdgeSource {
    gpio: Gpio,
}

impl GpioEdgeSource {
    pub fn new() -> Result<Self, EdgeError> {
        let gpio = Gpio::new().map_err(|e| EdgeError::Io(e.to_string()))?;
        Ok(Self { gpio })
    }
}

impl EdgeSource for GpioEdgeSource {
    type Line = GpioEdgeLine;

    fn subscribe(&mut self, line: u32) -> Result<GpioEdgeLine, EdgeError> {
        let failed = |e: rppal::gpio::Error| EdgeError::SubscriptionFailed {
            line,
            reason: e.to_string(),
        };

        // The sensor's INT output is open-drain
        let mut pin = self.gpio.get(bcm_pin(line)?).map_err(failed)?.into_input_pullup();
        pin.set_interrupt(Trigger::FallingEdge, None).map_err(failed)?;
        info!("Armed falling-edge interrupt on GPIO {}", line);

        Ok(GpioEdgeLine {
            pin: Some(pin),
            line,
        })
    }
}

/// A falling-edge interrupt subscription on one pin
pub struct GpioEdgeLine {
    pin: Option<InputPin>,
    line: u32,
}

impl GpioEdgeLine {
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl EdgeLine for GpioEdgeLine {
    fn wait(&mut self, timeout: Duration) -> Result<EdgeWait, EdgeError> {
        let Some(pin) = self.pin.as_mut() else {
            return Ok(EdgeWait::Released);
        };

        // Keep edges that arrived between two waits
        match pin.poll_interrupt(false, Some(timeout)) {
            Ok(Some(_)) => Ok(EdgeWait::Edge),
            Ok(None) => Ok(EdgeWait::TimedOut),
            Err(e) => Err(EdgeError::Io(e.to_string())),
        }
    }

    fn release(&mut self) {
        if let Some(mut pin) = self.pin.take() {
            if let Err(e) = pin.clear_interrupt() {
                warn!("Failed to disarm GPIO {}: {}", self.line, e);
            }
            debug!("Released GPIO {}", self.line);
        }
    }
}

impl Drop for GpioEdgeLine {
    fn drop(&mut self) {
        self.release();
    }
}
