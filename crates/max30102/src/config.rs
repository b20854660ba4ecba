//! Sensor configuration

use crate::error::SensorError;
use crate::registers;
use crate::sample::ActiveChannels;
use serde::{Deserialize, Serialize};

/// Which LEDs take part in each sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedMode {
    RedOnly,
    RedIr,
}

impl LedMode {
    pub fn channels(&self) -> ActiveChannels {
        match self {
            LedMode::RedOnly => ActiveChannels::RedOnly,
            LedMode::RedIr => ActiveChannels::RedIr,
        }
    }

    pub(crate) fn register_bits(&self) -> u8 {
        match self {
            LedMode::RedOnly => registers::LED_MODE_RED_ONLY,
            LedMode::RedIr => registers::LED_MODE_RED_IR,
        }
    }
}

/// Interrupt sources that pull the INT line low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptConfig {
    /// FIFO almost full
    pub almost_full: bool,
    /// New sample ready
    pub data_ready: bool,
    /// Ambient light cancellation overflow
    pub alc_overflow: bool,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            almost_full: true,
            data_ready: true,
            alc_overflow: true,
        }
    }
}

/// One-shot sensor configuration applied before acquisition starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Active LEDs
    pub led_mode: LedMode,
    /// On-chip averaging (1, 2, 4, 8, 16 or 32 samples)
    pub sample_average: u8,
    /// Sample rate in Hz (50 to 3200)
    pub sample_rate_hz: u16,
    /// LED pulse width in µs (69, 118, 215 or 411)
    pub pulse_width_us: u16,
    /// ADC full-scale range in nA (2048, 4096, 8192 or 16384)
    pub adc_range_na: u16,
    /// LED drive amplitude, 0x00 (off) to 0xFF (50mA)
    pub led_power: u8,
    /// Let the FIFO overwrite old samples when full
    pub fifo_rollover: bool,
    /// Free FIFO slots remaining when the almost-full interrupt fires (0-15)
    pub fifo_almost_full: u8,
    /// Interrupt enables
    pub interrupts: InterruptConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            led_mode: LedMode::RedIr,
            sample_average: 4,
            sample_rate_hz: 400,
            pulse_width_us: 411,
            adc_range_na: 2048,
            led_power: 0x1F,
            fifo_rollover: true,
            fifo_almost_full: 0,
            interrupts: InterruptConfig::default(),
        }
    }
}

impl SensorConfig {
    /// Red LED only, for low-power presence detection
    pub fn red_only() -> Self {
        Self {
            led_mode: LedMode::RedOnly,
            ..Default::default()
        }
    }

    /// Check every field maps to a register value the part supports
    pub fn validate(&self) -> Result<(), SensorError> {
        self.sample_average_bits()?;
        self.sample_rate_bits()?;
        self.pulse_width_bits()?;
        self.adc_range_bits()?;
        if self.fifo_almost_full > 0x0F {
            return Err(SensorError::InvalidSetting {
                name: "FIFO almost-full threshold",
                value: self.fifo_almost_full as u32,
            });
        }
        Ok(())
    }

    pub(crate) fn sample_average_bits(&self) -> Result<u8, SensorError> {
        registers::sample_average_bits(self.sample_average).ok_or(SensorError::InvalidSetting {
            name: "sample average",
            value: self.sample_average as u32,
        })
    }

    pub(crate) fn sample_rate_bits(&self) -> Result<u8, SensorError> {
        registers::sample_rate_bits(self.sample_rate_hz).ok_or(SensorError::InvalidSetting {
            name: "sample rate (Hz)",
            value: self.sample_rate_hz as u32,
        })
    }

    pub(crate) fn pulse_width_bits(&self) -> Result<u8, SensorError> {
        registers::pulse_width_bits(self.pulse_width_us).ok_or(SensorError::InvalidSetting {
            name: "pulse width (us)",
            value: self.pulse_width_us as u32,
        })
    }

    pub(crate) fn adc_range_bits(&self) -> Result<u8, SensorError> {
        registers::adc_range_bits(self.adc_range_na).ok_or(SensorError::InvalidSetting {
            name: "ADC range (nA)",
            value: self.adc_range_na as u32,
        })
    }
}
