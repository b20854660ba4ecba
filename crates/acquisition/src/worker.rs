//! Acquisition worker
//!
//! Lifecycle: `Stopped --start()--> Running --stop()--> Stopping --join--> Stopped`.
//! The worker thread owns the sensor and the edge line while it runs and
//! hands both back when it exits, so a stopped acquisition can be started
//! again.

use crate::config::AcquisitionConfig;
use crate::error::AcquisitionError;
use crate::queue::{output_queue, Consumer, PublishOutcome, Publisher};
use max30102::{Max30102, Sample, SensorError};
use sample_ring::HistoryRing;
use sensor_bus::{EdgeLine, EdgeSource, EdgeWait, RegisterBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
    /// Shutdown requested, or the worker ended on a fatal fault and awaits `stop()`
    Stopping,
}

/// State shared between the owner and the worker thread
struct Shared {
    running: AtomicBool,
    history: Mutex<HistoryRing<Sample>>,
}

/// What the worker thread hands back when it exits
struct WorkerExit<B, L> {
    sensor: Max30102<B>,
    line: L,
    fault: Option<SensorError>,
}

/// Interrupt-driven acquisition from one sensor.
///
/// Only the owning thread calls `start`/`stop`; the worker thread is the
/// sole writer of the history ring and the sole producer into the queue.
pub struct Acquisition<B: RegisterBus + 'static, S: EdgeSource> {
    config: AcquisitionConfig,
    edge_source: S,
    sensor: Option<Max30102<B>>,
    shared: Arc<Shared>,
    publisher: Publisher<Sample>,
    consumer: Consumer<Sample>,
    state: WorkerState,
    worker: Option<JoinHandle<Option<WorkerExit<B, S::Line>>>>,
}

impl<B: RegisterBus + 'static, S: EdgeSource> Acquisition<B, S> {
    /// Build an acquisition around a sensor that has already been configured
    pub fn new(
        sensor: Max30102<B>,
        edge_source: S,
        config: AcquisitionConfig,
    ) -> Result<Self, AcquisitionError> {
        config.validate()?;
        let (publisher, consumer) = output_queue(config.queue_capacity, config.publish_backoff())?;
        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            history: Mutex::new(HistoryRing::new(config.history_capacity)),
        });

        Ok(Self {
            config,
            edge_source,
            sensor: Some(sensor),
            shared,
            publisher,
            consumer,
            state: WorkerState::Stopped,
            worker: None,
        })
    }

    /// Arm the edge subscription and spawn the worker thread
    pub fn start(&mut self) -> Result<(), AcquisitionError> {
        if self.state != WorkerState::Stopped {
            return Err(AcquisitionError::AlreadyRunning);
        }
        let sensor = self.sensor.take().ok_or(AcquisitionError::SensorUnavailable)?;

        let line = match self.edge_source.subscribe(self.config.edge_line) {
            Ok(line) => line,
            Err(e) => {
                error!("Cannot arm interrupt line {}: {}", self.config.edge_line, e);
                self.sensor = Some(sensor);
                return Err(e.into());
            }
        };

        *lock(&self.shared.history) = HistoryRing::new(self.config.history_capacity);
        let builder = thread::Builder::new().name("ppg-acquisition".to_string());
        self.spawn_worker(builder, sensor, line)?;

        self.state = WorkerState::Running;
        info!("Acquisition started on line {}", self.config.edge_line);
        Ok(())
    }

    /// Launch the worker on `builder`. If the thread cannot be created the
    /// sensor comes back to `self` and the line is released.
    fn spawn_worker(
        &mut self,
        builder: thread::Builder,
        sensor: Max30102<B>,
        line: S::Line,
    ) -> Result<(), AcquisitionError> {
        let handoff = Arc::new(Mutex::new(Some((sensor, line))));
        let worker_handoff = Arc::clone(&handoff);
        let shared = Arc::clone(&self.shared);
        let publisher = self.publisher.clone();
        let poll_interval = self.config.edge_poll_interval();

        self.shared.running.store(true, Ordering::Release);
        let spawned = builder.spawn(move || {
            let (sensor, line) = lock(&worker_handoff).take()?;
            Some(run_worker(sensor, line, shared, publisher, poll_interval))
        });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                if let Some((sensor, mut line)) = lock(&handoff).take() {
                    line.release();
                    self.sensor = Some(sensor);
                }
                error!("Cannot spawn acquisition worker: {}", e);
                Err(AcquisitionError::Spawn(e.to_string()))
            }
        }
    }

    /// Stop the worker and release the edge line.
    ///
    /// Blocks until the worker thread has exited. Calling it again once
    /// stopped is a no-op. Returns the fatal fault that ended the worker
    /// early, if any.
    pub fn stop(&mut self) -> Result<(), AcquisitionError> {
        let Some(handle) = self.worker.take() else {
            self.state = WorkerState::Stopped;
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            self.worker = Some(handle);
            return Err(AcquisitionError::StopFromWorker);
        }

        self.state = WorkerState::Stopping;
        self.shared.running.store(false, Ordering::Release);
        let exit = handle.join();
        self.state = WorkerState::Stopped;

        let WorkerExit {
            mut sensor,
            mut line,
            fault,
        } = match exit {
            Ok(Some(exit)) => exit,
            Ok(None) => return Err(AcquisitionError::SensorUnavailable),
            Err(_) => {
                error!("Acquisition worker panicked; sensor handle lost");
                return Err(AcquisitionError::WorkerPanicked);
            }
        };

        line.release();
        drop(line);
        if let Err(e) = sensor.shutdown() {
            warn!("Failed to put sensor into shutdown mode: {}", e);
        }
        self.sensor = Some(sensor);
        info!("Acquisition stopped");

        match fault {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> WorkerState {
        match self.state {
            WorkerState::Running if !self.shared.running.load(Ordering::Acquire) => {
                WorkerState::Stopping
            }
            state => state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Unread entries in the history ring
    pub fn available(&self) -> usize {
        lock(&self.shared.history).available()
    }

    /// Up to `count` history entries, most recent first
    pub fn recent(&self, count: usize) -> Vec<Sample> {
        lock(&self.shared.history).read_last(count)
    }

    /// Oldest unread published sample, `None` when nothing is queued
    pub fn latest(&self) -> Option<Sample> {
        self.consumer.pop()
    }

    /// Another handle on the output queue, for a dedicated consumer thread
    pub fn consumer(&self) -> Consumer<Sample> {
        self.consumer.clone()
    }

    /// The sensor, while no worker holds it
    pub fn sensor_mut(&mut self) -> Option<&mut Max30102<B>> {
        self.sensor.as_mut()
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }
}

impl<B: RegisterBus + 'static, S: EdgeSource> Drop for Acquisition<B, S> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                warn!("Acquisition stopped with error during drop: {}", e);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_worker<B: RegisterBus, L: EdgeLine>(
    mut sensor: Max30102<B>,
    mut line: L,
    shared: Arc<Shared>,
    publisher: Publisher<Sample>,
    poll_interval: Duration,
) -> WorkerExit<B, L> {
    debug!("Acquisition worker running");
    let mut fault = None;
    let mut consumer_gone = false;

    while shared.running.load(Ordering::Acquire) {
        match line.wait(poll_interval) {
            Ok(EdgeWait::Edge) => {}
            Ok(EdgeWait::TimedOut) => continue,
            Ok(EdgeWait::Released) => {
                debug!("Edge line released, worker exiting");
                break;
            }
            Err(e) => {
                warn!("Edge wait failed: {}", e);
                thread::sleep(poll_interval);
                continue;
            }
        }

        // Bus transfers run without the history lock held
        let mut drained = Vec::new();
        let result = sensor.read_fifo(&mut drained);

        let newest = {
            let mut history = lock(&shared.history);
            for sample in drained {
                history.append(sample);
            }
            // Nothing has been written yet on the first edges of a session
            (history.total_written() > 0).then(|| history.newest())
        };

        match result {
            Ok(count) => debug!("Edge: {} samples drained", count),
            Err(e) if e.is_fatal() => {
                error!("Fatal sensor fault, stopping acquisition: {}", e);
                fault = Some(e);
                shared.running.store(false, Ordering::Release);
                break;
            }
            Err(e) => warn!("FIFO drain failed, publishing what arrived: {}", e),
        }

        let Some(sample) = newest else { continue };
        match publisher.publish(sample, &shared.running) {
            PublishOutcome::Delivered { waits: 0 } => {}
            PublishOutcome::Delivered { waits } => {
                debug!("Output queue full, sample queued after {} waits", waits);
            }
            PublishOutcome::Cancelled => {
                debug!("Shutdown while output queue full, sample not queued");
            }
            PublishOutcome::Disconnected => {
                if !consumer_gone {
                    warn!("Output queue has no consumer");
                    consumer_gone = true;
                }
            }
        }
    }

    debug!("Acquisition worker exited");
    WorkerExit {
        sensor,
        line,
        fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use max30102::{ActiveChannels, SensorConfig, SimulatedMax30102};
    use sensor_bus::{EdgeTrigger, MemoryEdgeSource};
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(2);

    fn test_config() -> AcquisitionConfig {
        AcquisitionConfig {
            edge_line: 7,
            queue_capacity: 4,
            history_capacity: 32,
            edge_poll_interval_ms: 10,
            publish_backoff_ms: 1,
        }
    }

    fn setup() -> (
        Acquisition<SimulatedMax30102, MemoryEdgeSource>,
        SimulatedMax30102,
        EdgeTrigger,
    ) {
        let sim = SimulatedMax30102::new().with_max_burst(12);
        let mut sensor = Max30102::new(sim.clone(), ActiveChannels::RedIr).unwrap();
        sensor.configure(&SensorConfig::default()).unwrap();

        let source = MemoryEdgeSource::new();
        let trigger = source.trigger();
        let acquisition = Acquisition::new(sensor, source, test_config()).unwrap();
        (acquisition, sim, trigger)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_edge_drains_and_publishes_newest() {
        let (mut acquisition, sim, trigger) = setup();
        acquisition.start().unwrap();
        assert_eq!(acquisition.state(), WorkerState::Running);

        for i in 0..5u32 {
            sim.push_sample(Sample::red_ir(100 + i, 200 + i));
        }
        trigger.fire();

        let consumer = acquisition.consumer();
        assert_eq!(consumer.pop_timeout(WAIT), Some(Sample::red_ir(104, 204)));
        assert_eq!(acquisition.available(), 5);
        assert_eq!(sim.block_reads(), vec![12, 12, 6]);
        // One publish per edge, not per sample
        assert_eq!(acquisition.latest(), None);

        acquisition.stop().unwrap();
    }

    #[test]
    fn test_start_twice_rejected() {
        let (mut acquisition, _sim, trigger) = setup();
        acquisition.start().unwrap();

        assert!(matches!(acquisition.start(), Err(AcquisitionError::AlreadyRunning)));
        assert_eq!(trigger.active_subscriptions(), 1);

        acquisition.stop().unwrap();
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let (mut acquisition, sim, trigger) = setup();
        acquisition.start().unwrap();

        acquisition.stop().unwrap();
        assert_eq!(acquisition.state(), WorkerState::Stopped);
        assert_eq!(trigger.active_subscriptions(), 0);
        assert!(sim.is_shut_down());

        acquisition.stop().unwrap();
        assert_eq!(acquisition.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_stop_without_start() {
        let (mut acquisition, _sim, _trigger) = setup();
        assert!(acquisition.stop().is_ok());
        assert_eq!(acquisition.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_subscription_failure_leaves_stopped() {
        let (mut acquisition, _sim, trigger) = setup();
        trigger.reject_subscriptions(true);

        assert!(matches!(
            acquisition.start(),
            Err(AcquisitionError::Edge(sensor_bus::EdgeError::SubscriptionFailed { line: 7, .. }))
        ));
        assert_eq!(acquisition.state(), WorkerState::Stopped);
        assert!(acquisition.sensor_mut().is_some());

        trigger.reject_subscriptions(false);
        acquisition.start().unwrap();
        acquisition.stop().unwrap();
    }

    #[test]
    fn test_restart_after_stop() {
        let (mut acquisition, sim, trigger) = setup();
        acquisition.start().unwrap();
        acquisition.stop().unwrap();

        acquisition.sensor_mut().unwrap().wake_up().unwrap();
        acquisition.start().unwrap();
        assert_eq!(acquisition.available(), 0);

        sim.push_sample(Sample::red_ir(1, 2));
        trigger.fire();
        assert_eq!(acquisition.consumer().pop_timeout(WAIT), Some(Sample::red_ir(1, 2)));

        acquisition.stop().unwrap();
    }

    #[test]
    fn test_bus_fault_publishes_partial_drain() {
        let (mut acquisition, sim, trigger) = setup();
        acquisition.start().unwrap();
        let consumer = acquisition.consumer();

        for i in 0..5u32 {
            sim.push_sample(Sample::red_ir(i, i));
        }
        sim.fail_block_read_after(1);
        trigger.fire();

        // Two samples landed before the fault; the newest of them is published
        assert_eq!(consumer.pop_timeout(WAIT), Some(Sample::red_ir(1, 1)));
        assert_eq!(acquisition.available(), 2);
        assert!(acquisition.is_running());

        // The next edge picks up the rest from the device pointers
        trigger.fire();
        assert_eq!(consumer.pop_timeout(WAIT), Some(Sample::red_ir(4, 4)));
        assert_eq!(acquisition.available(), 5);

        acquisition.stop().unwrap();
    }

    #[test]
    fn test_every_edge_publishes_newest() {
        let (mut acquisition, sim, trigger) = setup();
        acquisition.start().unwrap();
        let consumer = acquisition.consumer();

        // Nothing has been sampled yet
        trigger.fire();
        assert_eq!(consumer.pop_timeout(Duration::from_millis(50)), None);

        sim.push_sample(Sample::red_ir(7, 8));
        trigger.fire();
        assert_eq!(consumer.pop_timeout(WAIT), Some(Sample::red_ir(7, 8)));

        // An edge with an empty FIFO republishes the newest history entry
        trigger.fire();
        assert_eq!(consumer.pop_timeout(WAIT), Some(Sample::red_ir(7, 8)));
        assert_eq!(acquisition.available(), 1);

        acquisition.stop().unwrap();
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn test_spawn_failure_returns_sensor() {
        let (mut acquisition, _sim, trigger) = setup();
        let sensor = acquisition.sensor.take().unwrap();
        let line = acquisition.edge_source.subscribe(7).unwrap();

        // No address space can hold this stack
        let builder = thread::Builder::new().stack_size(1 << 52);
        assert!(matches!(
            acquisition.spawn_worker(builder, sensor, line),
            Err(AcquisitionError::Spawn(_))
        ));
        assert!(acquisition.sensor_mut().is_some());
        assert_eq!(trigger.active_subscriptions(), 0);
        assert_eq!(acquisition.state(), WorkerState::Stopped);

        acquisition.start().unwrap();
        acquisition.stop().unwrap();
    }

    #[test]
    fn test_full_queue_applies_backpressure_without_loss() {
        let (mut acquisition, sim, trigger) = setup();
        acquisition.start().unwrap();
        let consumer = acquisition.consumer();

        // One more edge than the queue holds
        for i in 0..5u32 {
            sim.push_sample(Sample::red_ir(i, i));
            trigger.fire();
            if i < 4 {
                assert!(wait_until(|| consumer.len() == (i + 1) as usize));
            }
        }
        thread::sleep(Duration::from_millis(30));
        assert_eq!(consumer.len(), 4);

        let received: Vec<u32> = (0..5)
            .map(|_| consumer.pop_timeout(WAIT).map(|s| s.red).unwrap_or(u32::MAX))
            .collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);

        acquisition.stop().unwrap();
    }

    #[test]
    fn test_stop_while_publisher_blocked() {
        let (mut acquisition, sim, trigger) = setup();
        acquisition.start().unwrap();
        let consumer = acquisition.consumer();

        for i in 0..5u32 {
            sim.push_sample(Sample::red_only(i));
            trigger.fire();
            thread::sleep(Duration::from_millis(20));
        }

        // Nobody pops; stop must still return promptly
        let started = Instant::now();
        acquisition.stop().unwrap();
        assert!(started.elapsed() < WAIT);
        assert_eq!(consumer.len(), 4);
    }

    #[test]
    fn test_drop_stops_worker() {
        let (mut acquisition, _sim, trigger) = setup();
        acquisition.start().unwrap();
        assert_eq!(trigger.active_subscriptions(), 1);

        drop(acquisition);
        assert_eq!(trigger.active_subscriptions(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let sim = SimulatedMax30102::new();
        let sensor = Max30102::new(sim, ActiveChannels::RedIr).unwrap();
        let config = AcquisitionConfig {
            queue_capacity: 0,
            ..test_config()
        };

        assert!(matches!(
            Acquisition::new(sensor, MemoryEdgeSource::new(), config),
            Err(AcquisitionError::InvalidConfig(_))
        ));
    }
}
