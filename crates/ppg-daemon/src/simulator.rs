//! Synthetic signal source for simulate mode
//!
//! A background thread plays the part of the sensor's conversion engine:
//! it pushes a pulse-shaped waveform into the simulated FIFO and pulls the
//! interrupt line low every `samples_per_edge` conversions.

use crate::config::SimulationConfig;
use max30102::{Sample, SimulatedMax30102, ADC_MASK};
use sensor_bus::EdgeTrigger;
use std::f64::consts::TAU;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

const RED_BASELINE: f64 = 110_000.0;
const IR_BASELINE: f64 = 130_000.0;
const RED_SWING: f64 = 1_800.0;
const IR_SWING: f64 = 2_600.0;

/// Sample `index` of a pulse wave at `heart_rate_bpm`, sampled every `interval_s`
pub fn synthetic_sample(index: u64, interval_s: f64, heart_rate_bpm: f64) -> Sample {
    let phase = TAU * index as f64 * interval_s * heart_rate_bpm / 60.0;
    // Systolic peak plus a dicrotic notch harmonic; absorption rises with each beat
    let pulse = phase.sin() + 0.35 * (2.0 * phase).sin();

    Sample::red_ir(
        to_reading(RED_BASELINE - RED_SWING * pulse),
        to_reading(IR_BASELINE - IR_SWING * pulse),
    )
}

fn to_reading(value: f64) -> u32 {
    (value.max(0.0) as u32).min(ADC_MASK)
}

/// Background generator feeding a [`SimulatedMax30102`]
pub struct SimulatedFeed {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl SimulatedFeed {
    pub fn spawn(
        sim: SimulatedMax30102,
        trigger: EdgeTrigger,
        config: &SimulationConfig,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let interval = config.sample_interval();
        let samples_per_edge = config.samples_per_edge.max(1);
        let heart_rate = config.heart_rate_bpm;

        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("ppg-sim-feed".to_string())
            .spawn(move || {
                let mut index = 0u64;
                while flag.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    sim.push_sample(synthetic_sample(index, interval.as_secs_f64(), heart_rate));
                    index += 1;
                    if index % samples_per_edge as u64 == 0 {
                        trigger.fire();
                    }
                }
                index
            })?;

        debug!(
            "Simulated feed started: {:?} per sample, edge every {} samples",
            interval, samples_per_edge
        );
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop generating and return the number of samples produced
    pub fn stop(&mut self) -> u64 {
        self.running.store(false, Ordering::Release);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(produced)) => {
                debug!("Simulated feed stopped after {} samples", produced);
                produced
            }
            Some(Err(_)) => {
                warn!("Simulated feed thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for SimulatedFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
