//! PPG Acquisition Daemon
//!
//! Wires the sensor driver, the acquisition worker and a transport (Linux
//! I2C plus GPIO interrupts, or the in-memory simulator) into a long-running service
//! that logs readings until interrupted.

mod config;
mod logging;
mod simulator;

pub use config::{
    load_config, parse_config, BusConfig, DaemonConfig, LoggingConfig, SimulationConfig,
};
pub use logging::init_logging;
pub use simulator::{synthetic_sample, SimulatedFeed};

use acquisition::{Acquisition, Sample};
use anyhow::Context;
use max30102::{Max30102, SimulatedMax30102};
use sensor_bus::{EdgeSource, MemoryEdgeSource, RegisterBus};
use std::future::Future;
use tracing::{debug, info, warn};

/// Running totals between two summary log lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingStats {
    pub count: u64,
    pub red_min: u32,
    pub red_max: u32,
    pub last: Option<Sample>,
}

impl ReadingStats {
    pub fn record(&mut self, sample: Sample) {
        if self.count == 0 {
            self.red_min = sample.red;
            self.red_max = sample.red;
        } else {
            self.red_min = self.red_min.min(sample.red);
            self.red_max = self.red_max.max(sample.red);
        }
        self.count += 1;
        self.last = Some(sample);
    }

    /// Peak-to-peak red swing over the window
    pub fn red_span(&self) -> u32 {
        self.red_max - self.red_min
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run until Ctrl-C or a fatal sensor fault
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    if config.simulate {
        run_simulated(config).await
    } else {
        run_hardware(config).await
    }
}

async fn run_simulated(config: DaemonConfig) -> anyhow::Result<()> {
    let sim = SimulatedMax30102::new();
    let sensor = prepare_sensor(sim.clone(), &config)?;

    let source = MemoryEdgeSource::new();
    let trigger = source.trigger();
    let acquisition = Acquisition::new(sensor, source, config.acquisition.clone())?;

    let mut feed = SimulatedFeed::spawn(sim, trigger, &config.simulation)
        .context("failed to start simulated feed")?;
    let result = supervise(acquisition, &config, ctrl_c()).await;
    feed.stop();
    result
}

#[cfg(target_os = "linux")]
async fn run_hardware(config: DaemonConfig) -> anyhow::Result<()> {
    use sensor_bus::linux::{GpioEdgeSource, I2cDevice};

    let bus = I2cDevice::open(&config.bus.i2c_device, config.bus.address)
        .with_context(|| format!("failed to open {}", config.bus.i2c_device))?;
    let sensor = prepare_sensor(bus, &config)?;

    let gpio = GpioEdgeSource::new().context("failed to access GPIO")?;
    let acquisition = Acquisition::new(sensor, gpio, config.acquisition.clone())?;

    supervise(acquisition, &config, ctrl_c()).await
}

#[cfg(not(target_os = "linux"))]
async fn run_hardware(_config: DaemonConfig) -> anyhow::Result<()> {
    anyhow::bail!("hardware transport is only available on Linux; set simulate = true")
}

fn prepare_sensor<B: RegisterBus>(bus: B, config: &DaemonConfig) -> anyhow::Result<Max30102<B>> {
    let mut sensor = Max30102::new(bus, config.sensor.led_mode.channels())?;
    sensor.verify_identity().context("sensor not detected")?;
    sensor.configure(&config.sensor).context("sensor configuration failed")?;
    Ok(sensor)
}

/// Resolves on the first Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Drain the output queue until `shutdown` resolves, then stop acquisition
async fn supervise<B, S, F>(
    mut acquisition: Acquisition<B, S>,
    config: &DaemonConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    B: RegisterBus + 'static,
    S: EdgeSource + 'static,
    F: Future<Output = ()>,
{
    acquisition.start()?;
    let consumer = acquisition.consumer();

    let mut poll = tokio::time::interval(config.poll_interval());
    let mut summary = tokio::time::interval(config.summary_interval());
    summary.tick().await;
    let mut stats = ReadingStats::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            _ = poll.tick() => {
                for sample in consumer.drain() {
                    debug!(red = sample.red, ir = ?sample.ir, "Reading");
                    stats.record(sample);
                }
                if !acquisition.is_running() {
                    warn!("Acquisition worker stopped on its own");
                    break;
                }
            }
            _ = summary.tick() => {
                match stats.last {
                    Some(last) => info!(
                        "{} readings, red span {}, last red={} ir={:?}, {} in history",
                        stats.count,
                        stats.red_span(),
                        last.red,
                        last.ir,
                        acquisition.available()
                    ),
                    None => warn!("No readings in the last {:?}", config.summary_interval()),
                }
                stats.reset();
            }
        }
    }

    tokio::task::spawn_blocking(move || acquisition.stop())
        .await
        .context("acquisition shutdown task failed")??;
    info!("Daemon stopped");
    Ok(())
}
