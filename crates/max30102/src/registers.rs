//! MAX30102 register map
//!
//! Masks are "keep" masks for [`sensor_bus::RegisterBus::update_register`]:
//! the bits that survive before the new field value is OR-ed in.

// Status
pub const INT_STATUS_1: u8 = 0x00;
pub const INT_STATUS_2: u8 = 0x01;
pub const INT_ENABLE_1: u8 = 0x02;

// FIFO
pub const FIFO_WRITE_PTR: u8 = 0x04;
pub const FIFO_OVERFLOW: u8 = 0x05;
pub const FIFO_READ_PTR: u8 = 0x06;
pub const FIFO_DATA: u8 = 0x07;

// Configuration
pub const FIFO_CONFIG: u8 = 0x08;
pub const MODE_CONFIG: u8 = 0x09;
pub const PARTICLE_CONFIG: u8 = 0x0A;
pub const LED1_PULSE_AMP: u8 = 0x0C;
pub const LED2_PULSE_AMP: u8 = 0x0D;
pub const LED_PROX_AMP: u8 = 0x10;
pub const MULTI_LED_CONFIG_1: u8 = 0x11;
pub const MULTI_LED_CONFIG_2: u8 = 0x12;

// Proximity
pub const PROX_INT_THRESH: u8 = 0x30;

// Identity
pub const REVISION_ID: u8 = 0xFE;
pub const PART_ID: u8 = 0xFF;

/// Pointer registers hold 5 significant bits
pub const FIFO_PTR_MASK: u8 = 0x1F;

// Interrupt enable / status bits
pub const MASK_INT_A_FULL: u8 = 0x7F;
pub const INT_A_FULL: u8 = 0x80;
pub const MASK_INT_DATA_RDY: u8 = 0xBF;
pub const INT_DATA_RDY: u8 = 0x40;
pub const MASK_INT_ALC_OVF: u8 = 0xDF;
pub const INT_ALC_OVF: u8 = 0x20;
pub const INT_PWR_RDY: u8 = 0x01;
pub const INT_DIE_TEMP_RDY: u8 = 0x02;

// FIFO_CONFIG fields
pub const MASK_SAMPLE_AVG: u8 = 0x1F;
pub const MASK_ROLLOVER: u8 = 0xEF;
pub const ROLLOVER_ENABLE: u8 = 0x10;
pub const MASK_A_FULL: u8 = 0xF0;

// MODE_CONFIG fields
pub const MASK_SHUTDOWN: u8 = 0x7F;
pub const SHUTDOWN: u8 = 0x80;
pub const WAKE_UP: u8 = 0x00;
pub const MASK_RESET: u8 = 0xBF;
pub const RESET: u8 = 0x40;
pub const MASK_LED_MODE: u8 = 0xF8;
pub const LED_MODE_RED_ONLY: u8 = 0x02;
pub const LED_MODE_RED_IR: u8 = 0x03;

// PARTICLE_CONFIG fields
pub const MASK_ADC_RANGE: u8 = 0x9F;
pub const MASK_SAMPLE_RATE: u8 = 0xE3;
pub const MASK_PULSE_WIDTH: u8 = 0xFC;

// MULTI_LED_CONFIG slots
pub const MASK_SLOT1: u8 = 0xF8;
pub const MASK_SLOT2: u8 = 0x8F;
pub const MASK_SLOT3: u8 = 0xF8;
pub const MASK_SLOT4: u8 = 0x8F;

/// Field value for a sample average of `n` samples
pub fn sample_average_bits(n: u8) -> Option<u8> {
    match n {
        1 => Some(0x00),
        2 => Some(0x20),
        4 => Some(0x40),
        8 => Some(0x60),
        16 => Some(0x80),
        32 => Some(0xA0),
        _ => None,
    }
}

/// Field value for a full-scale ADC range in nA
pub fn adc_range_bits(range_na: u16) -> Option<u8> {
    match range_na {
        2048 => Some(0x00),
        4096 => Some(0x20),
        8192 => Some(0x40),
        16384 => Some(0x60),
        _ => None,
    }
}

/// Field value for a sample rate in Hz
pub fn sample_rate_bits(rate_hz: u16) -> Option<u8> {
    match rate_hz {
        50 => Some(0x00),
        100 => Some(0x04),
        200 => Some(0x08),
        400 => Some(0x0C),
        800 => Some(0x10),
        1000 => Some(0x14),
        1600 => Some(0x18),
        3200 => Some(0x1C),
        _ => None,
    }
}

/// Field value for an LED pulse width in µs. 411µs gives 18-bit resolution.
pub fn pulse_width_bits(width_us: u16) -> Option<u8> {
    match width_us {
        69 => Some(0x00),
        118 => Some(0x01),
        215 => Some(0x02),
        411 => Some(0x03),
        _ => None,
    }
}
