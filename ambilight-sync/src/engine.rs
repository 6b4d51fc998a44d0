// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Sync engine
//!
//! Owns the worker thread that captures, processes and transmits frames at
//! a fixed rate, and the start/stop control surface used by the host.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::capture::CaptureSource;
use crate::config::ConfigSnapshot;
use crate::diagnostics::{DiagnosticSink, StatsReporter, TickReport};
use crate::enhance::ColorEnhancer;
use crate::error::Result;
use crate::extract::EdgeSampler;
use crate::flow::{AssemblyReport, FlowAssembler};
use crate::frame::{Frame, Rgb};
use crate::protocol::{encode_drgb, Transmitter, DEFAULT_TIMEOUT_SECS};
use crate::smooth::TemporalSmoother;

/// Target frame rate of the sync loop
pub const TARGET_FPS: u32 = 30;

/// Time budget of one tick
pub const TICK_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / TARGET_FPS as u64);

/// Pause after a failed tick
pub const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Default bound on waiting for the worker to finish
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Engine state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No worker running
    #[default]
    Idle = 0,
    /// Worker is producing frames
    Running = 1,
    /// Stop requested, worker not finished yet
    Stopping = 2,
}

impl TryFrom<u8> for EngineState {
    type Error = &'static str;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(EngineState::Idle),
            1 => Ok(EngineState::Running),
            2 => Ok(EngineState::Stopping),
            _ => Err("Invalid engine state value"),
        }
    }
}

/// Result of [`SyncEngine::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A run was already active; nothing changed
    AlreadyRunning,
    /// A stopped worker has not exited yet; nothing was started
    Stopping,
}

/// Per-run frame processing: assembly, smoothing and encoding.
///
/// Holds the previous LED buffer between ticks.
pub struct FramePipeline {
    snapshot: ConfigSnapshot,
    assembler: FlowAssembler,
    smoother: TemporalSmoother,
    previous: Option<Vec<Rgb>>,
    frame: u64,
}

impl FramePipeline {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        let levels = snapshot.levels();
        let enhancer = ColorEnhancer::from_levels(levels.gamma, levels.boost);
        let sampler = EdgeSampler::new(snapshot.edge_sample_fraction(), enhancer);
        let assembler =
            FlowAssembler::new(sampler, snapshot.led_start_offset(), snapshot.num_leds());

        Self {
            smoother: TemporalSmoother::from_level(levels.smoothing),
            assembler,
            snapshot,
            previous: None,
            frame: 0,
        }
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Last smoothed buffer, if any tick completed
    pub fn previous(&self) -> Option<&[Rgb]> {
        self.previous.as_deref()
    }

    /// Forget the previous buffer so the next frame is not blended
    pub fn reset(&mut self) {
        self.previous = None;
        self.frame = 0;
    }

    /// Assemble and smooth one frame, keeping the result for the next one
    pub fn process(&mut self, frame: &Frame) -> (&[Rgb], AssemblyReport) {
        let (raw, report) = self.assembler.assemble(frame, self.snapshot.flow());
        let smoothed = self.smoother.smooth(self.previous.as_deref(), raw);
        let leds = self.previous.insert(smoothed);
        (leds.as_slice(), report)
    }

    /// Run one capture, process and transmit cycle.
    ///
    /// Capture failures abandon the tick. Transmit failures are logged and
    /// reported as undelivered.
    pub fn tick<C, T>(&mut self, capture: &mut C, transmitter: &mut T) -> Result<TickReport>
    where
        C: CaptureSource + ?Sized,
        T: Transmitter + ?Sized,
    {
        let started = Instant::now();
        let frame = capture.grab(self.snapshot.region())?;

        let (leds, assembly) = self.process(&frame);
        let active_leds = leds.iter().filter(|c| !c.is_black()).count();
        let packet = encode_drgb(leds, DEFAULT_TIMEOUT_SECS);

        let delivered = match transmitter.transmit(&packet) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send frame: {}", e);
                false
            }
        };

        let report = TickReport {
            frame: self.frame,
            assembly,
            active_leds,
            packet_len: packet.len(),
            delivered,
            elapsed: started.elapsed(),
        };
        self.frame += 1;
        Ok(report)
    }
}

/// Flags shared between the engine and one worker
struct RunHandle {
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    worker: thread::JoinHandle<()>,
}

impl RunHandle {
    fn state(&self) -> EngineState {
        EngineState::try_from(self.state.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Clears the run flags however the worker exits
struct ExitGuard {
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.state.store(EngineState::Idle as u8, Ordering::SeqCst);
    }
}

/// Start/stop control surface for the sync loop
#[derive(Default)]
pub struct SyncEngine {
    run: Option<RunHandle>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run with the default diagnostics
    pub fn start<C, T>(
        &mut self,
        snapshot: ConfigSnapshot,
        capture: C,
        transmitter: T,
    ) -> Result<StartOutcome>
    where
        C: CaptureSource + 'static,
        T: Transmitter + 'static,
    {
        self.start_with_sink(
            snapshot,
            capture,
            transmitter,
            Box::new(StatsReporter::default()),
        )
    }

    /// Start a run reporting ticks to `sink`.
    ///
    /// The snapshot, capture source and transmitter move into the worker.
    /// Nothing is started while a previous worker is still shutting down,
    /// so at most one worker runs at a time.
    pub fn start_with_sink<C, T>(
        &mut self,
        snapshot: ConfigSnapshot,
        capture: C,
        transmitter: T,
        sink: Box<dyn DiagnosticSink>,
    ) -> Result<StartOutcome>
    where
        C: CaptureSource + 'static,
        T: Transmitter + 'static,
    {
        if self.is_running() {
            info!("Sync engine already running");
            return Ok(StartOutcome::AlreadyRunning);
        }
        if let Some(run) = self.run.take() {
            if !run.worker.is_finished() {
                info!("Previous sync worker is still stopping");
                self.run = Some(run);
                return Ok(StartOutcome::Stopping);
            }
            if run.worker.join().is_err() {
                warn!("Sync worker panicked");
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(AtomicU8::new(EngineState::Running as u8));
        let guard = ExitGuard {
            running: running.clone(),
            state: state.clone(),
        };
        let flag = running.clone();

        let worker = thread::Builder::new()
            .name("ambilight-sync".into())
            .spawn(move || {
                let _guard = guard;
                run_loop(snapshot, capture, transmitter, sink, &flag);
            });

        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                state.store(EngineState::Idle as u8, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        self.run = Some(RunHandle {
            running,
            state,
            worker,
        });
        Ok(StartOutcome::Started)
    }

    /// Request the worker to stop and wait for it up to `timeout`.
    ///
    /// Returns `false` if the worker was still busy when the wait ended; it
    /// is then left to finish on its own and the engine reports
    /// [`EngineState::Stopping`] until it does. Stopping an idle engine is
    /// a no-op that returns `true`.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let Some(run) = self.run.take() else {
            return true;
        };

        if run.running.swap(false, Ordering::SeqCst) {
            // Only move to Stopping if the worker has not already gone Idle
            let _ = run.state.compare_exchange(
                EngineState::Running as u8,
                EngineState::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            info!("Stopping sync engine");
        }

        let deadline = Instant::now() + timeout;
        while !run.worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if run.worker.is_finished() {
            if run.worker.join().is_err() {
                warn!("Sync worker panicked");
            }
            true
        } else {
            warn!("Sync worker did not stop within {:?}, detaching", timeout);
            // Keep the handle so `state()` reports Stopping until it exits
            self.run = Some(run);
            false
        }
    }

    pub fn state(&self) -> EngineState {
        self.run.as_ref().map(RunHandle::state).unwrap_or_default()
    }

    /// Whether a worker is active and has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::SeqCst))
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop(DEFAULT_STOP_TIMEOUT);
    }
}

fn run_loop<C, T>(
    snapshot: ConfigSnapshot,
    mut capture: C,
    mut transmitter: T,
    mut sink: Box<dyn DiagnosticSink>,
    running: &AtomicBool,
) where
    C: CaptureSource,
    T: Transmitter,
{
    info!(
        "Sync worker started: {} LEDs, {} segments, device {}, region {:?}",
        snapshot.num_leds(),
        snapshot.flow().len(),
        snapshot.device(),
        snapshot.region()
    );
    let mut pipeline = FramePipeline::new(snapshot);

    while running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        match pipeline.tick(&mut capture, &mut transmitter) {
            Ok(report) => {
                sink.tick(&report);
                let elapsed = tick_start.elapsed();
                if elapsed < TICK_INTERVAL {
                    thread::sleep(TICK_INTERVAL - elapsed);
                }
            }
            Err(e) => {
                warn!("Frame processing error: {}", e);
                sink.tick_failed(&e);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    pipeline.reset();
    info!("Sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::stub::StubCapture;
    use crate::config::{DeviceAddress, EffectLevels};
    use crate::flow::{Direction, Segment};
    use crate::frame::CaptureRegion;
    use crate::geometry::EdgeId;
    use std::sync::mpsc;

    struct ChannelTransmitter(mpsc::Sender<Vec<u8>>);

    impl Transmitter for ChannelTransmitter {
        fn transmit(&mut self, packet: &[u8]) -> Result<()> {
            self.0.send(packet.to_vec()).ok();
            Ok(())
        }
    }

    struct FailingTransmitter;

    impl Transmitter for FailingTransmitter {
        fn transmit(&mut self, _packet: &[u8]) -> Result<()> {
            Err(crate::error::SyncError::Transmit {
                addr: "test:1".into(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            })
        }
    }

    struct SlowTransmitter(mpsc::Sender<()>);

    impl Transmitter for SlowTransmitter {
        fn transmit(&mut self, _packet: &[u8]) -> Result<()> {
            self.0.send(()).ok();
            thread::sleep(Duration::from_millis(400));
            Ok(())
        }
    }

    fn snapshot(smoothing: u8) -> ConfigSnapshot {
        ConfigSnapshot::new(
            DeviceAddress::new("127.0.0.1", 21324),
            6,
            1,
            vec![Segment::new(EdgeId::Top, 4, Direction::Normal)],
            CaptureRegion::new(0, 0, 16, 16),
        )
        .unwrap()
        .with_levels(EffectLevels {
            gamma: 0,
            boost: 0,
            smoothing,
        })
        .unwrap()
    }

    #[test]
    fn test_engine_state_try_from() {
        assert_eq!(EngineState::try_from(0).unwrap(), EngineState::Idle);
        assert_eq!(EngineState::try_from(2).unwrap(), EngineState::Stopping);
        assert!(EngineState::try_from(9).is_err());
    }

    #[test]
    fn test_pipeline_tick_encodes_buffer() {
        let mut pipeline = FramePipeline::new(snapshot(0));
        let mut capture = StubCapture::with_frame(Frame::solid(16, 16, Rgb::new(40, 80, 120)));
        let (tx, rx) = mpsc::channel();
        let mut transmitter = ChannelTransmitter(tx);

        let report = pipeline.tick(&mut capture, &mut transmitter).unwrap();
        assert_eq!(report.frame, 0);
        assert_eq!(report.packet_len, 2 + 3 * 6);
        assert_eq!(report.active_leds, 4);
        assert!(report.delivered);

        let packet = rx.recv().unwrap();
        assert_eq!(&packet[..2], &[2, 2]);
        // LED 0 is skipped by the offset
        assert_eq!(&packet[2..5], &[0, 0, 0]);
        for led in packet[5..17].chunks(3) {
            assert!(led[0].abs_diff(120) <= 1);
            assert!(led[1].abs_diff(80) <= 1);
            assert!(led[2].abs_diff(40) <= 1);
        }
        assert_eq!(&packet[17..], &[0, 0, 0]);
    }

    #[test]
    fn test_pipeline_smooths_against_previous() {
        let mut pipeline = FramePipeline::new(snapshot(10));
        let bright = Frame::solid(16, 16, Rgb::new(200, 200, 200));
        let dark = Frame::solid(16, 16, Rgb::BLACK);

        let (first, _) = pipeline.process(&bright);
        let first_led = first[1];
        assert!(first_led.r >= 199);

        let (second, _) = pipeline.process(&dark);
        // alpha = 0.95 keeps most of the previous value
        assert!(second[1].r >= 188);

        pipeline.reset();
        assert!(pipeline.previous().is_none());
        let (third, _) = pipeline.process(&dark);
        assert!(third[1].is_black());
    }

    #[test]
    fn test_transmit_failure_does_not_abort_tick() {
        let mut pipeline = FramePipeline::new(snapshot(0));
        let mut capture = StubCapture::new();
        let report = pipeline.tick(&mut capture, &mut FailingTransmitter).unwrap();
        assert!(!report.delivered);
        assert!(pipeline.previous().is_some());
    }

    #[test]
    fn test_capture_failure_abandons_tick() {
        let mut pipeline = FramePipeline::new(snapshot(0));
        let mut capture = StubCapture::new().fail_next(1);
        let (tx, rx) = mpsc::channel();
        let mut transmitter = ChannelTransmitter(tx);

        assert!(pipeline.tick(&mut capture, &mut transmitter).is_err());
        assert!(rx.try_recv().is_err());
        assert!(pipeline.previous().is_none());

        let report = pipeline.tick(&mut capture, &mut transmitter).unwrap();
        assert_eq!(report.frame, 0);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut engine = SyncEngine::new();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.stop(Duration::from_millis(10)));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_start_stop_cycle() {
        let mut engine = SyncEngine::new();
        let (tx, rx) = mpsc::channel();

        let outcome = engine
            .start(snapshot(6), StubCapture::new(), ChannelTransmitter(tx))
            .unwrap();
        assert_eq!(outcome, StartOutcome::Started);
        assert_eq!(engine.state(), EngineState::Running);
        assert!(engine.is_running());

        let packet = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(packet.len(), 2 + 3 * 6);

        let (tx2, _rx2) = mpsc::channel();
        let again = engine
            .start(snapshot(6), StubCapture::new(), ChannelTransmitter(tx2))
            .unwrap();
        assert_eq!(again, StartOutcome::AlreadyRunning);

        assert!(engine.stop(Duration::from_secs(2)));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_stop_timeout_reports_stopping() {
        let mut engine = SyncEngine::new();
        let (tx, rx) = mpsc::channel();
        engine
            .start(snapshot(0), StubCapture::new(), SlowTransmitter(tx))
            .unwrap();

        // Worker is now inside a slow transmit
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!engine.stop(Duration::from_millis(10)));
        assert_eq!(engine.state(), EngineState::Stopping);
        assert!(!engine.is_running());

        assert!(engine.stop(Duration::from_secs(2)));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_start_refused_while_previous_worker_stopping() {
        let mut engine = SyncEngine::new();
        let (tx, rx) = mpsc::channel();
        engine
            .start(snapshot(0), StubCapture::new(), SlowTransmitter(tx))
            .unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!engine.stop(Duration::from_millis(10)));

        let (tx2, rx2) = mpsc::channel();
        let outcome = engine
            .start(snapshot(0), StubCapture::new(), ChannelTransmitter(tx2))
            .unwrap();
        assert_eq!(outcome, StartOutcome::Stopping);
        assert_eq!(engine.state(), EngineState::Stopping);
        // The refused run never transmitted
        assert!(rx2.try_recv().is_err());

        assert!(engine.stop(Duration::from_secs(2)));
        let (tx3, rx3) = mpsc::channel();
        let outcome = engine
            .start(snapshot(0), StubCapture::new(), ChannelTransmitter(tx3))
            .unwrap();
        assert_eq!(outcome, StartOutcome::Started);
        rx3.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(engine.stop(Duration::from_secs(2)));
    }
}
