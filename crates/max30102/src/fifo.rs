//! FIFO drain
//!
//! The device keeps up to 32 samples in an on-chip FIFO addressed by 5-bit
//! read and write pointers. Draining reads both pointers, then pulls the
//! pending samples out of `FIFO_DATA` in bursts no longer than the bus
//! allows, each trimmed so that no sample straddles two transactions.

use crate::decoder::decode_burst;
use crate::device::Max30102;
use crate::error::SensorError;
use crate::registers::{FIFO_DATA, FIFO_PTR_MASK};
use crate::sample::Sample;
use sample_ring::HistoryRing;
use sensor_bus::RegisterBus;
use tracing::debug;

/// Physical FIFO depth in samples
pub const FIFO_DEPTH: usize = 32;

/// Samples waiting in the device FIFO: `(write - read) mod 32`
pub fn pending_samples(read_ptr: u8, write_ptr: u8) -> usize {
    (write_ptr.wrapping_sub(read_ptr) & FIFO_PTR_MASK) as usize
}

/// Length of the next burst: at most `max_burst`, rounded down to whole samples
pub fn aligned_burst_len(remaining: usize, max_burst: usize, sample_len: usize) -> usize {
    let len = remaining.min(max_burst);
    len - len % sample_len
}

impl<B: RegisterBus> Max30102<B> {
    /// Move every pending FIFO sample into `history`.
    ///
    /// Returns the number of samples pulled from the device. On a bus fault
    /// the samples already appended stay in `history`; the device pointers
    /// remain the source of truth for the next call.
    pub fn check(&mut self, history: &mut HistoryRing<Sample>) -> Result<usize, SensorError> {
        let mut drained = Vec::new();
        let result = self.read_fifo(&mut drained);
        for sample in drained {
            history.append(sample);
        }
        result
    }

    /// Pull every pending FIFO sample onto the end of `out`, oldest first.
    ///
    /// Same transfers and fault behavior as [`Max30102::check`], without
    /// touching a history ring while the bus is busy.
    pub fn read_fifo(&mut self, out: &mut Vec<Sample>) -> Result<usize, SensorError> {
        let read_ptr = self.read_pointer()?;
        let write_ptr = self.write_pointer()?;
        if read_ptr == write_ptr {
            return Ok(0);
        }

        let pending = pending_samples(read_ptr, write_ptr);
        let sample_len = self.channels.bytes_per_sample();
        let mut remaining = pending * sample_len;
        let mut buf = vec![0u8; aligned_burst_len(remaining, self.max_burst, sample_len)];
        out.reserve(pending);

        while remaining > 0 {
            let len = aligned_burst_len(remaining, self.max_burst, sample_len);
            if len == 0 {
                // Unreachable while max_burst >= sample_len holds
                return Err(SensorError::BurstTooSmall {
                    max_burst: self.max_burst,
                    sample_len,
                });
            }

            let burst = &mut buf[..len];
            self.bus.read_block(FIFO_DATA, burst)?;
            out.extend(decode_burst(burst, self.channels)?);
            remaining -= len;
        }

        debug!(
            "Drained {} samples (rp={}, wp={}, {} bytes)",
            pending,
            read_ptr,
            write_ptr,
            pending * sample_len
        );
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ActiveChannels;
    use crate::sim::SimulatedMax30102;
    use proptest::prelude::*;

    fn sensor(sim: &SimulatedMax30102, channels: ActiveChannels) -> Max30102<SimulatedMax30102> {
        sim.set_channels(channels);
        Max30102::new(sim.clone(), channels).unwrap()
    }

    #[test]
    fn test_pending_samples_wraps() {
        assert_eq!(pending_samples(0, 5), 5);
        assert_eq!(pending_samples(30, 2), 4);
        assert_eq!(pending_samples(7, 7), 0);
        // Stray high bits in the register are ignored
        assert_eq!(pending_samples(0xE0, 0x03), 3);
    }

    #[test]
    fn test_aligned_burst_len() {
        assert_eq!(aligned_burst_len(30, 32, 6), 30);
        assert_eq!(aligned_burst_len(186, 32, 6), 30);
        assert_eq!(aligned_burst_len(30, 12, 6), 12);
        assert_eq!(aligned_burst_len(6, 12, 6), 6);
        assert_eq!(aligned_burst_len(93, 32, 3), 30);
    }

    #[test]
    fn test_empty_fifo_is_noop() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim, ActiveChannels::RedIr);
        let mut history = HistoryRing::new(32);

        assert_eq!(sensor.check(&mut history).unwrap(), 0);
        assert!(sim.block_reads().is_empty());
        assert_eq!(history.available(), 0);
    }

    #[test]
    fn test_five_samples_with_twelve_byte_bursts() {
        let sim = SimulatedMax30102::new().with_max_burst(12);
        let mut sensor = sensor(&sim, ActiveChannels::RedIr);
        for i in 0..5u32 {
            sim.push_sample(Sample::red_ir(1000 + i, 2000 + i));
        }
        assert_eq!(sim.fifo_pointers(), (0, 5));

        let mut history = HistoryRing::new(32);
        assert_eq!(sensor.check(&mut history).unwrap(), 5);

        assert_eq!(sim.block_reads(), vec![12, 12, 6]);
        assert_eq!(history.available(), 5);
        assert_eq!(history.newest(), Sample::red_ir(1004, 2004));
        assert_eq!(
            history.read_last(5).into_iter().rev().collect::<Vec<_>>(),
            (0..5).map(|i| Sample::red_ir(1000 + i, 2000 + i)).collect::<Vec<_>>()
        );
        assert_eq!(sim.fifo_pointers(), (5, 5));
    }

    #[test]
    fn test_red_only_drain() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim, ActiveChannels::RedOnly);
        for i in 0..12u32 {
            sim.push_sample(Sample::red_only(i));
        }

        let mut history = HistoryRing::new(32);
        assert_eq!(sensor.check(&mut history).unwrap(), 12);
        // 36 bytes, 32-byte cap, 3-byte samples
        assert_eq!(sim.block_reads(), vec![30, 6]);
        assert_eq!(history.newest(), Sample::red_only(11));
    }

    #[test]
    fn test_wrapped_device_pointers() {
        let sim = SimulatedMax30102::new();
        let mut sensor = sensor(&sim, ActiveChannels::RedIr);
        let mut history = HistoryRing::new(64);

        // Walk the pointers near the end of the FIFO, then across the wrap
        for i in 0..30u32 {
            sim.push_sample(Sample::red_ir(i, i));
        }
        assert_eq!(sensor.check(&mut history).unwrap(), 30);
        for i in 30..36u32 {
            sim.push_sample(Sample::red_ir(i, i));
        }
        assert_eq!(sim.fifo_pointers(), (30, 4));

        assert_eq!(sensor.check(&mut history).unwrap(), 6);
        assert_eq!(history.newest(), Sample::red_ir(35, 35));
        assert_eq!(history.available(), 36);
    }

    #[test]
    fn test_bus_fault_keeps_partial_progress() {
        let sim = SimulatedMax30102::new().with_max_burst(12);
        let mut sensor = sensor(&sim, ActiveChannels::RedIr);
        for i in 0..5u32 {
            sim.push_sample(Sample::red_ir(i, i));
        }
        sim.fail_block_read_after(1);

        let mut history = HistoryRing::new(32);
        let err = sensor.check(&mut history).unwrap_err();
        assert!(matches!(err, SensorError::Bus(_)));
        assert!(!err.is_fatal());
        assert_eq!(history.available(), 2);

        // The device pointers say three are left; the next pass picks them up
        assert_eq!(sensor.check(&mut history).unwrap(), 3);
        assert_eq!(history.available(), 5);
        assert_eq!(history.newest(), Sample::red_ir(4, 4));
    }

    #[test]
    fn test_read_fifo_appends_oldest_first() {
        let sim = SimulatedMax30102::new().with_max_burst(12);
        let mut sensor = sensor(&sim, ActiveChannels::RedIr);
        for i in 0..3u32 {
            sim.push_sample(Sample::red_ir(i, 10 + i));
        }

        let mut out = vec![Sample::red_only(99)];
        assert_eq!(sensor.read_fifo(&mut out).unwrap(), 3);
        assert_eq!(
            out,
            vec![
                Sample::red_only(99),
                Sample::red_ir(0, 10),
                Sample::red_ir(1, 11),
                Sample::red_ir(2, 12),
            ]
        );
    }

    proptest! {
        #[test]
        fn bursts_are_sample_aligned(
            pending in 0usize..32,
            cap in prop::sample::select(vec![8usize, 12, 16, 32]),
            red_only in any::<bool>(),
        ) {
            let channels = if red_only { ActiveChannels::RedOnly } else { ActiveChannels::RedIr };
            let sample_len = channels.bytes_per_sample();
            let sim = SimulatedMax30102::new().with_max_burst(cap);
            let mut sensor = sensor(&sim, channels);
            for i in 0..pending {
                sim.push_sample(Sample::red_ir(i as u32, i as u32));
            }
            // The simulated FIFO keeps at most 31 unread samples
            let queued = pending.min(FIFO_DEPTH - 1);

            let mut history = HistoryRing::new(64);
            let drained = sensor.check(&mut history).unwrap();
            let reads = sim.block_reads();

            prop_assert_eq!(drained, queued);
            prop_assert!(reads.iter().all(|len| *len % sample_len == 0 && *len > 0 && *len <= cap));
            prop_assert_eq!(reads.iter().sum::<usize>(), queued * sample_len);
            prop_assert_eq!(history.available(), queued);
        }
    }
}
