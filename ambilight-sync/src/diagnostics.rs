// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-tick diagnostics
//!
//! The sync loop reports every tick to a [`DiagnosticSink`]. The default
//! sink, [`StatsReporter`], turns those reports into rate-limited log
//! lines so a long run at 30 FPS does not flood the log.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::flow::AssemblyReport;

/// Interval between frame rate log lines
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(3);

/// Ticks between detailed debug lines
pub const DEFAULT_DETAIL_EVERY: u64 = 90;

/// Outcome of one successful tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Zero-based tick number within the run
    pub frame: u64,
    pub assembly: AssemblyReport,
    /// LEDs that are not black after smoothing
    pub active_leds: usize,
    pub packet_len: usize,
    /// Whether the datagram left the host
    pub delivered: bool,
    /// Processing time, excluding the pacing sleep
    pub elapsed: Duration,
}

/// Receives tick reports from the sync loop
pub trait DiagnosticSink: Send {
    fn tick(&mut self, report: &TickReport);

    /// Called when a tick was abandoned
    fn tick_failed(&mut self, _error: &crate::error::SyncError) {}
}

/// Frame rate measured over one reporting interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub fps: f64,
    /// Ticks completed since the run started
    pub frames: u64,
}

/// Rate-limited logging sink
#[derive(Debug)]
pub struct StatsReporter {
    interval: Duration,
    detail_every: u64,
    window_start: Instant,
    window_frames: u64,
    frames: u64,
    failures: u64,
}

impl StatsReporter {
    pub fn new(interval: Duration, detail_every: u64) -> Self {
        Self::starting_at(interval, detail_every, Instant::now())
    }

    fn starting_at(interval: Duration, detail_every: u64, now: Instant) -> Self {
        Self {
            interval,
            detail_every: detail_every.max(1),
            window_start: now,
            window_frames: 0,
            frames: 0,
            failures: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Count one tick at `now`; returns a sample when an interval elapsed
    pub fn observe(&mut self, now: Instant) -> Option<FpsSample> {
        self.frames += 1;
        self.window_frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let sample = FpsSample {
            fps: self.window_frames as f64 / elapsed.as_secs_f64(),
            frames: self.frames,
        };
        self.window_start = now;
        self.window_frames = 0;
        Some(sample)
    }

    /// Whether tick number `frame` gets a detailed line
    pub fn wants_detail(&self, frame: u64) -> bool {
        frame % self.detail_every == 0
    }
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_INTERVAL, DEFAULT_DETAIL_EVERY)
    }
}

impl DiagnosticSink for StatsReporter {
    fn tick(&mut self, report: &TickReport) {
        if let Some(sample) = self.observe(Instant::now()) {
            info!("FPS: {:.1}, Frame: {}", sample.fps, sample.frames);
        }

        if self.wants_detail(report.frame) {
            debug!(
                "Frame {}: {} bytes, {} active, {} written, {} dropped, {} unrecognized, {:?}{}",
                report.frame,
                report.packet_len,
                report.active_leds,
                report.assembly.written,
                report.assembly.dropped,
                report.assembly.unrecognized,
                report.elapsed,
                if report.delivered { "" } else { ", not delivered" }
            );
        }
    }

    fn tick_failed(&mut self, _error: &crate::error::SyncError) {
        self.failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_reported_once_per_interval() {
        let start = Instant::now();
        let mut reporter = StatsReporter::starting_at(Duration::from_secs(3), 90, start);

        let mut samples = Vec::new();
        for i in 1..=180u64 {
            // 30 ticks per second for six seconds
            let now = start + Duration::from_millis(i * 1000 / 30);
            if let Some(sample) = reporter.observe(now) {
                samples.push(sample);
            }
        }

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].frames, 90);
        assert!((samples[0].fps - 30.0).abs() < 0.5);
        assert_eq!(reporter.frames(), 180);
    }

    #[test]
    fn test_detail_rate() {
        let reporter = StatsReporter::new(DEFAULT_REPORT_INTERVAL, 90);
        assert!(reporter.wants_detail(0));
        assert!(!reporter.wants_detail(45));
        assert!(reporter.wants_detail(180));

        let every_tick = StatsReporter::new(DEFAULT_REPORT_INTERVAL, 0);
        assert!(every_tick.wants_detail(7));
    }

    #[test]
    fn test_failures_are_counted() {
        let mut reporter = StatsReporter::default();
        reporter.tick_failed(&crate::error::SyncError::Capture("gone".into()));
        assert_eq!(reporter.failures(), 1);
        assert_eq!(reporter.frames(), 0);
    }
}
