//! MAX30102 device handle and one-shot configuration

use crate::config::SensorConfig;
use crate::error::SensorError;
use crate::registers::{self, *};
use crate::sample::ActiveChannels;
use crate::EXPECTED_PART_ID;
use sensor_bus::RegisterBus;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a soft reset may take before we give up
const RESET_TIMEOUT_MS: u64 = 100;

/// What a multi-LED time slot fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDevice {
    None,
    RedLed,
    IrLed,
}

impl SlotDevice {
    fn bits(&self) -> u8 {
        match self {
            SlotDevice::None => 0x00,
            SlotDevice::RedLed => 0x01,
            SlotDevice::IrLed => 0x02,
        }
    }
}

/// Decoded interrupt status registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptStatus {
    pub almost_full: bool,
    pub data_ready: bool,
    pub alc_overflow: bool,
    pub power_ready: bool,
    pub die_temp_ready: bool,
}

impl InterruptStatus {
    fn from_registers(status_1: u8, status_2: u8) -> Self {
        Self {
            almost_full: status_1 & INT_A_FULL != 0,
            data_ready: status_1 & INT_DATA_RDY != 0,
            alc_overflow: status_1 & INT_ALC_OVF != 0,
            power_ready: status_1 & INT_PWR_RDY != 0,
            die_temp_ready: status_2 & INT_DIE_TEMP_RDY != 0,
        }
    }
}

/// A MAX30102 reachable over a register bus.
///
/// The handle owns its bus exclusively; several sensors on separate buses
/// can coexist.
pub struct Max30102<B> {
    pub(crate) bus: B,
    pub(crate) channels: ActiveChannels,
    pub(crate) max_burst: usize,
}

impl<B: RegisterBus> Max30102<B> {
    /// Wrap a bus already addressed at the sensor.
    ///
    /// Nothing is read or written until a method is called.
    pub fn new(bus: B, channels: ActiveChannels) -> Result<Self, SensorError> {
        let max_burst = bus.max_burst_len();
        check_burst(max_burst, channels)?;
        Ok(Self {
            bus,
            channels,
            max_burst,
        })
    }

    pub fn channels(&self) -> ActiveChannels {
        self.channels
    }

    pub fn max_burst(&self) -> usize {
        self.max_burst
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    pub fn part_id(&mut self) -> Result<u8, SensorError> {
        Ok(self.bus.read_register(PART_ID)?)
    }

    pub fn revision(&mut self) -> Result<u8, SensorError> {
        Ok(self.bus.read_register(REVISION_ID)?)
    }

    /// Confirm the part id and return the silicon revision
    pub fn verify_identity(&mut self) -> Result<u8, SensorError> {
        let found = self.part_id()?;
        if found != EXPECTED_PART_ID {
            return Err(SensorError::PartIdMismatch {
                expected: EXPECTED_PART_ID,
                found,
            });
        }
        let revision = self.revision()?;
        info!("MAX30102 detected, revision {:#04X}", revision);
        Ok(revision)
    }

    /// Restore every register to its power-on value
    pub fn soft_reset(&mut self) -> Result<(), SensorError> {
        self.bus.update_register(MODE_CONFIG, MASK_RESET, RESET)?;

        let deadline = Instant::now() + Duration::from_millis(RESET_TIMEOUT_MS);
        loop {
            if self.bus.read_register(MODE_CONFIG)? & RESET == 0 {
                debug!("Soft reset complete");
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("Soft reset still pending after {}ms", RESET_TIMEOUT_MS);
                return Err(SensorError::ResetTimeout(RESET_TIMEOUT_MS));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Apply the full configuration sequence and leave the FIFO empty
    pub fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        config.validate()?;
        let channels = config.led_mode.channels();
        check_burst(self.max_burst, channels)?;

        self.soft_reset()?;

        self.bus
            .update_register(FIFO_CONFIG, MASK_SAMPLE_AVG, config.sample_average_bits()?)?;
        self.set_fifo_rollover(config.fifo_rollover)?;
        self.set_fifo_almost_full(config.fifo_almost_full)?;

        self.set_interrupt(MASK_INT_A_FULL, INT_A_FULL, config.interrupts.almost_full)?;
        self.set_interrupt(MASK_INT_DATA_RDY, INT_DATA_RDY, config.interrupts.data_ready)?;
        self.set_interrupt(MASK_INT_ALC_OVF, INT_ALC_OVF, config.interrupts.alc_overflow)?;

        self.bus
            .update_register(MODE_CONFIG, MASK_LED_MODE, config.led_mode.register_bits())?;
        self.channels = channels;

        self.bus
            .update_register(PARTICLE_CONFIG, MASK_ADC_RANGE, config.adc_range_bits()?)?;
        self.bus
            .update_register(PARTICLE_CONFIG, MASK_SAMPLE_RATE, config.sample_rate_bits()?)?;
        self.bus
            .update_register(PARTICLE_CONFIG, MASK_PULSE_WIDTH, config.pulse_width_bits()?)?;

        self.set_pulse_amplitude_red(config.led_power)?;
        self.set_pulse_amplitude_ir(config.led_power)?;
        self.set_pulse_amplitude_proximity(config.led_power)?;

        self.disable_slots()?;
        self.enable_slot(1, SlotDevice::RedLed)?;
        if channels == ActiveChannels::RedIr {
            self.enable_slot(2, SlotDevice::IrLed)?;
        }

        self.clear_fifo()?;

        info!(
            "Sensor configured: {:?}, {}Hz, avg {}, {}us pulse, {}nA range",
            config.led_mode,
            config.sample_rate_hz,
            config.sample_average,
            config.pulse_width_us,
            config.adc_range_na
        );
        Ok(())
    }

    fn set_interrupt(&mut self, keep_mask: u8, bit: u8, enable: bool) -> Result<(), SensorError> {
        let value = if enable { bit } else { 0 };
        Ok(self.bus.update_register(INT_ENABLE_1, keep_mask, value)?)
    }

    /// Read (and thereby clear) both interrupt status registers
    pub fn interrupt_status(&mut self) -> Result<InterruptStatus, SensorError> {
        let status_1 = self.bus.read_register(INT_STATUS_1)?;
        let status_2 = self.bus.read_register(INT_STATUS_2)?;
        Ok(InterruptStatus::from_registers(status_1, status_2))
    }

    /// Enter low-power mode; registers stay accessible, sampling stops
    pub fn shutdown(&mut self) -> Result<(), SensorError> {
        Ok(self.bus.update_register(MODE_CONFIG, MASK_SHUTDOWN, SHUTDOWN)?)
    }

    pub fn wake_up(&mut self) -> Result<(), SensorError> {
        Ok(self.bus.update_register(MODE_CONFIG, MASK_SHUTDOWN, WAKE_UP)?)
    }

    pub fn set_fifo_rollover(&mut self, enable: bool) -> Result<(), SensorError> {
        let value = if enable { ROLLOVER_ENABLE } else { 0 };
        Ok(self.bus.update_register(FIFO_CONFIG, MASK_ROLLOVER, value)?)
    }

    pub fn set_fifo_almost_full(&mut self, free_slots: u8) -> Result<(), SensorError> {
        if free_slots > 0x0F {
            return Err(SensorError::InvalidSetting {
                name: "FIFO almost-full threshold",
                value: free_slots as u32,
            });
        }
        Ok(self.bus.update_register(FIFO_CONFIG, MASK_A_FULL, free_slots)?)
    }

    pub fn set_sample_rate(&mut self, rate_hz: u16) -> Result<(), SensorError> {
        let bits = registers::sample_rate_bits(rate_hz).ok_or(SensorError::InvalidSetting {
            name: "sample rate (Hz)",
            value: rate_hz as u32,
        })?;
        Ok(self.bus.update_register(PARTICLE_CONFIG, MASK_SAMPLE_RATE, bits)?)
    }

    pub fn set_pulse_amplitude_red(&mut self, amplitude: u8) -> Result<(), SensorError> {
        Ok(self.bus.write_register(LED1_PULSE_AMP, amplitude)?)
    }

    pub fn set_pulse_amplitude_ir(&mut self, amplitude: u8) -> Result<(), SensorError> {
        Ok(self.bus.write_register(LED2_PULSE_AMP, amplitude)?)
    }

    pub fn set_pulse_amplitude_proximity(&mut self, amplitude: u8) -> Result<(), SensorError> {
        Ok(self.bus.write_register(LED_PROX_AMP, amplitude)?)
    }

    /// IR ADC count (8 MSBs) that starts particle-sensing mode
    pub fn set_proximity_threshold(&mut self, threshold_msb: u8) -> Result<(), SensorError> {
        Ok(self.bus.write_register(PROX_INT_THRESH, threshold_msb)?)
    }

    /// Assign an LED to one of the four multi-LED time slots (1-4)
    pub fn enable_slot(&mut self, slot: u8, device: SlotDevice) -> Result<(), SensorError> {
        let bits = device.bits();
        let (reg, mask, value) = match slot {
            1 => (MULTI_LED_CONFIG_1, MASK_SLOT1, bits),
            2 => (MULTI_LED_CONFIG_1, MASK_SLOT2, bits << 4),
            3 => (MULTI_LED_CONFIG_2, MASK_SLOT3, bits),
            4 => (MULTI_LED_CONFIG_2, MASK_SLOT4, bits << 4),
            _ => return Err(SensorError::InvalidSlot(slot)),
        };
        Ok(self.bus.update_register(reg, mask, value)?)
    }

    pub fn disable_slots(&mut self) -> Result<(), SensorError> {
        self.bus.write_register(MULTI_LED_CONFIG_1, 0)?;
        self.bus.write_register(MULTI_LED_CONFIG_2, 0)?;
        Ok(())
    }

    /// Reset FIFO pointers and the overflow counter
    pub fn clear_fifo(&mut self) -> Result<(), SensorError> {
        self.bus.write_register(FIFO_WRITE_PTR, 0)?;
        self.bus.write_register(FIFO_OVERFLOW, 0)?;
        self.bus.write_register(FIFO_READ_PTR, 0)?;
        Ok(())
    }

    pub fn read_pointer(&mut self) -> Result<u8, SensorError> {
        Ok(self.bus.read_register(FIFO_READ_PTR)? & FIFO_PTR_MASK)
    }

    pub fn write_pointer(&mut self) -> Result<u8, SensorError> {
        Ok(self.bus.read_register(FIFO_WRITE_PTR)? & FIFO_PTR_MASK)
    }

    /// Samples lost to a full FIFO since the last clear
    pub fn overflow_count(&mut self) -> Result<u8, SensorError> {
        Ok(self.bus.read_register(FIFO_OVERFLOW)? & FIFO_PTR_MASK)
    }
}

fn check_burst(max_burst: usize, channels: ActiveChannels) -> Result<(), SensorError> {
    let sample_len = channels.bytes_per_sample();
    if max_burst < sample_len {
        return Err(SensorError::BurstTooSmall {
            max_burst,
            sample_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedMode;
    use crate::sample::Sample;
    use crate::sim::SimulatedMax30102;

    fn sensor(sim: &SimulatedMax30102) -> Max30102<SimulatedMax30102> {
        Max30102::new(sim.clone(), ActiveChannels::RedIr).unwrap()
    }

    #[test]
    fn test_verify_identity() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);
        assert_eq!(sensor.verify_identity().unwrap(), sim.revision());
    }

    #[test]
    fn test_identity_mismatch() {
        let sim = SimulatedMax30102::new();
        sim.set_register(PART_ID, 0x11);
        let mut sensor = sensor(&sim);

        assert!(matches!(
            sensor.verify_identity(),
            Err(SensorError::PartIdMismatch { expected: 0x15, found: 0x11 })
        ));
    }

    #[test]
    fn test_configure_writes_registers() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);
        sensor.configure(&SensorConfig::default()).unwrap();

        assert_eq!(sim.register(MODE_CONFIG) & !MASK_LED_MODE, LED_MODE_RED_IR);
        // average 4, rollover on, almost-full 0
        assert_eq!(sim.register(FIFO_CONFIG), 0x40 | ROLLOVER_ENABLE);
        // 2048nA, 400Hz, 411us
        assert_eq!(sim.register(PARTICLE_CONFIG), 0x00 | 0x0C | 0x03);
        assert_eq!(sim.register(INT_ENABLE_1), INT_A_FULL | INT_DATA_RDY | INT_ALC_OVF);
        assert_eq!(sim.register(LED1_PULSE_AMP), 0x1F);
        assert_eq!(sim.register(LED2_PULSE_AMP), 0x1F);
        assert_eq!(sim.register(MULTI_LED_CONFIG_1), 0x21);
        assert_eq!(sim.register(FIFO_WRITE_PTR), 0);
        assert_eq!(sim.register(FIFO_READ_PTR), 0);
    }

    #[test]
    fn test_configure_red_only_switches_channels() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);
        sensor.configure(&SensorConfig::red_only()).unwrap();

        assert_eq!(sensor.channels(), ActiveChannels::RedOnly);
        assert_eq!(sim.register(MULTI_LED_CONFIG_1), 0x01);
        assert_eq!(sim.register(MODE_CONFIG) & !MASK_LED_MODE, LED_MODE_RED_ONLY);
    }

    #[test]
    fn test_configure_rejects_invalid_without_touching_bus() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);
        let config = SensorConfig {
            pulse_width_us: 100,
            led_mode: LedMode::RedOnly,
            ..Default::default()
        };

        assert!(sensor.configure(&config).is_err());
        assert_eq!(sensor.channels(), ActiveChannels::RedIr);
        assert_eq!(sim.register(MODE_CONFIG), 0);
    }

    #[test]
    fn test_soft_reset_times_out_when_bit_sticks() {
        let sim = SimulatedMax30102::new();
        sim.set_reset_stuck(true);
        let mut sensor = sensor(&sim);

        assert!(matches!(sensor.soft_reset(), Err(SensorError::ResetTimeout(100))));
    }

    #[test]
    fn test_invalid_slot() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);
        assert!(matches!(
            sensor.enable_slot(5, SlotDevice::RedLed),
            Err(SensorError::InvalidSlot(5))
        ));

        sensor.enable_slot(4, SlotDevice::IrLed).unwrap();
        assert_eq!(sim.register(MULTI_LED_CONFIG_2), 0x20);
    }

    #[test]
    fn test_shutdown_and_wake() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);

        sensor.shutdown().unwrap();
        assert!(sim.is_shut_down());
        sensor.wake_up().unwrap();
        assert!(!sim.is_shut_down());
    }

    #[test]
    fn test_interrupt_status_decoding() {
        let status = InterruptStatus::from_registers(INT_A_FULL | INT_PWR_RDY, INT_DIE_TEMP_RDY);
        assert!(status.almost_full);
        assert!(!status.data_ready);
        assert!(status.power_ready);
        assert!(status.die_temp_ready);
    }

    #[test]
    fn test_burst_limit_must_fit_one_sample() {
        let sim = SimulatedMax30102::new().with_max_burst(4);
        assert!(matches!(
            Max30102::new(sim.clone(), ActiveChannels::RedIr),
            Err(SensorError::BurstTooSmall { max_burst: 4, sample_len: 6 })
        ));
        assert!(Max30102::new(sim, ActiveChannels::RedOnly).is_ok());
    }

    #[test]
    fn test_interrupt_status_reads_and_clears() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);
        sensor.configure(&SensorConfig::default()).unwrap();
        sim.push_sample(Sample::red_ir(1, 2));

        let status = sensor.interrupt_status().unwrap();
        assert!(status.data_ready);
        assert!(!status.alc_overflow);
        assert_eq!(sensor.interrupt_status().unwrap(), InterruptStatus::default());
    }

    #[test]
    fn test_overflow_count_without_rollover() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);
        sensor.set_fifo_rollover(false).unwrap();
        for i in 0..35u32 {
            sim.push_sample(Sample::red_ir(i, i));
        }

        assert_eq!(sensor.overflow_count().unwrap(), 4);
        sensor.clear_fifo().unwrap();
        assert_eq!(sensor.overflow_count().unwrap(), 0);
    }

    #[test]
    fn test_proximity_threshold_and_amplitude() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim);

        sensor.set_proximity_threshold(0x30).unwrap();
        sensor.set_pulse_amplitude_proximity(0x7F).unwrap();
        assert_eq!(sim.register(PROX_INT_THRESH), 0x30);
        assert_eq!(sim.register(LED_PROX_AMP), 0x7F);
    }
}
