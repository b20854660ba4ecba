//! Register Access

use crate::error::BusError;

/// Largest block transfer a typical SMBus/I2C adapter accepts in one transaction
pub const DEFAULT_MAX_BURST: usize = 32;

/// A register-addressed device bus, already opened and pointed at one device
pub trait RegisterBus: Send {
    /// Read a single register
    fn read_register(&mut self, reg: u8) -> Result<u8, BusError>;

    /// Write a single register
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError>;

    /// Fill `buf` with consecutive bytes read starting at `reg`.
    ///
    /// `buf.len()` must not exceed [`RegisterBus::max_burst_len`].
    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), BusError>;

    /// Maximum number of bytes a single `read_block` may transfer
    fn max_burst_len(&self) -> usize {
        DEFAULT_MAX_BURST
    }

    /// Read-modify-write: keep the bits selected by `keep_mask`, then OR in `value`
    fn update_register(&mut self, reg: u8, keep_mask: u8, value: u8) -> Result<(), BusError> {
        let current = self.read_register(reg)?;
        self.write_register(reg, (current & keep_mask) | value)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn read_register(&mut self, reg: u8) -> Result<u8, BusError> {
        (**self).read_register(reg)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        (**self).write_register(reg, value)
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        (**self).read_block(reg, buf)
    }

    fn max_burst_len(&self) -> usize {
        (**self).max_burst_len()
    }

    fn update_register(&mut self, reg: u8, keep_mask: u8, value: u8) -> Result<(), BusError> {
        (**self).update_register(reg, keep_mask, value)
    }
}
