// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration
//!
//! [`PersistedConfig`] mirrors the JSON file written by the strip
//! configurator. [`ConfigSnapshot`] is the validated, frozen form handed to
//! the engine for exactly one run.

use std::fmt;
use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::enhance::MAX_LEVEL;
use crate::error::{ConfigError, Result};
use crate::flow::{Direction, Segment, SegmentEdge, Traversal};
use crate::frame::CaptureRegion;
use crate::protocol::DEFAULT_PORT;

/// Smallest accepted edge sample fraction
pub const MIN_SAMPLE_FRACTION: f64 = 0.05;

/// Largest accepted edge sample fraction
pub const MAX_SAMPLE_FRACTION: f64 = 0.5;

/// Network address of the lighting device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Gamma, boost and smoothing levels, each in `0..=10`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectLevels {
    pub gamma: u8,
    pub boost: u8,
    pub smoothing: u8,
}

impl Default for EffectLevels {
    fn default() -> Self {
        Self {
            gamma: 5,
            boost: 2,
            smoothing: 6,
        }
    }
}

impl EffectLevels {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (name, value) in [
            ("gamma", self.gamma),
            ("boost", self.boost),
            ("smoothing", self.smoothing),
        ] {
            if value > MAX_LEVEL {
                return Err(ConfigError::LevelOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// Immutable settings for one engine run
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    device: DeviceAddress,
    num_leds: usize,
    led_start_offset: usize,
    traversal: Traversal,
    levels: EffectLevels,
    edge_sample_fraction: f64,
    flow: Vec<Segment>,
    region: CaptureRegion,
}

impl ConfigSnapshot {
    /// Snapshot with default effect levels and a 10% sample band
    pub fn new(
        device: DeviceAddress,
        num_leds: usize,
        led_start_offset: usize,
        flow: Vec<Segment>,
        region: CaptureRegion,
    ) -> std::result::Result<Self, ConfigError> {
        let snapshot = Self {
            device,
            num_leds,
            led_start_offset,
            traversal: Traversal::default(),
            levels: EffectLevels::default(),
            edge_sample_fraction: 0.1,
            flow,
            region,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn with_levels(mut self, levels: EffectLevels) -> std::result::Result<Self, ConfigError> {
        levels.validate()?;
        self.levels = levels;
        Ok(self)
    }

    pub fn with_sample_fraction(mut self, fraction: f64) -> std::result::Result<Self, ConfigError> {
        validate_fraction(fraction)?;
        self.edge_sample_fraction = fraction;
        Ok(self)
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Freeze a persisted configuration for a run over `region`
    pub fn from_persisted(
        config: &PersistedConfig,
        region: CaptureRegion,
    ) -> std::result::Result<Self, ConfigError> {
        let flow = config.flow();
        for segment in &flow {
            if let SegmentEdge::Unrecognized(name) = &segment.edge {
                warn!(
                    "Segment edge {:?} is not recognized, its {} LEDs stay dark",
                    name, segment.led_count
                );
            }
        }

        Self::new(
            DeviceAddress::new(config.wled_ip.clone(), config.wled_port),
            config.num_leds,
            config.led_start_offset,
            flow,
            region,
        )?
        .with_levels(EffectLevels {
            gamma: config.gamma_level,
            boost: config.boost_level,
            smoothing: config.smoothing_level,
        })?
        .with_sample_fraction(config.edge_avg_percent)
        .map(|s| s.with_traversal(config.traversal_direction))
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.device.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.device.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.num_leds == 0 {
            return Err(ConfigError::NoLeds);
        }
        self.region.validate()?;
        self.levels.validate()?;
        validate_fraction(self.edge_sample_fraction)?;
        if self.flow.is_empty() {
            return Err(ConfigError::NoSegments);
        }
        Ok(())
    }

    pub fn device(&self) -> &DeviceAddress {
        &self.device
    }

    pub fn num_leds(&self) -> usize {
        self.num_leds
    }

    pub fn led_start_offset(&self) -> usize {
        self.led_start_offset
    }

    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    pub fn levels(&self) -> EffectLevels {
        self.levels
    }

    pub fn edge_sample_fraction(&self) -> f64 {
        self.edge_sample_fraction
    }

    pub fn flow(&self) -> &[Segment] {
        &self.flow
    }

    pub fn region(&self) -> &CaptureRegion {
        &self.region
    }
}

fn validate_fraction(fraction: f64) -> std::result::Result<(), ConfigError> {
    if !(MIN_SAMPLE_FRACTION..=MAX_SAMPLE_FRACTION).contains(&fraction) {
        return Err(ConfigError::SampleFractionOutOfRange(fraction));
    }
    Ok(())
}

/// One entry of `led_segments`.
///
/// The configurator writes `[edge, count, description, direction]`; the
/// shorter `[edge, count, direction]` form is accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentRecord {
    Described(SegmentEdge, usize, String, Direction),
    Plain(SegmentEdge, usize, Direction),
}

impl SegmentRecord {
    pub fn to_segment(&self) -> Segment {
        match self {
            SegmentRecord::Described(edge, count, _, direction)
            | SegmentRecord::Plain(edge, count, direction) => {
                Segment::new(edge.clone(), *count, *direction)
            }
        }
    }

    /// Record for `segment`, described as walked in `traversal` order
    pub fn describe(segment: &Segment, traversal: Traversal) -> Self {
        match &segment.edge {
            SegmentEdge::Known(edge) => SegmentRecord::Described(
                segment.edge.clone(),
                segment.led_count,
                traversal.describe(*edge),
                segment.direction,
            ),
            SegmentEdge::Unrecognized(_) => {
                SegmentRecord::Plain(segment.edge.clone(), segment.led_count, segment.direction)
            }
        }
    }
}

fn default_gamma_level() -> u8 {
    EffectLevels::default().gamma
}

fn default_boost_level() -> u8 {
    EffectLevels::default().boost
}

fn default_smoothing_level() -> u8 {
    EffectLevels::default().smoothing
}

fn default_edge_avg_percent() -> f64 {
    0.1
}

/// Configuration file as written by the strip configurator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub wled_ip: String,
    #[serde(default = "default_port")]
    pub wled_port: u16,
    pub num_leds: usize,
    #[serde(default)]
    pub led_start_offset: usize,
    #[serde(default)]
    pub traversal_direction: Traversal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_position: Option<String>,
    #[serde(default)]
    pub led_segments: Vec<SegmentRecord>,
    #[serde(default = "default_gamma_level")]
    pub gamma_level: u8,
    #[serde(default = "default_boost_level")]
    pub boost_level: u8,
    #[serde(default = "default_smoothing_level")]
    pub smoothing_level: u8,
    #[serde(default = "default_edge_avg_percent")]
    pub edge_avg_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_region: Option<CaptureRegion>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl PersistedConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Segments in strip order
    pub fn flow(&self) -> Vec<Segment> {
        self.led_segments.iter().map(SegmentRecord::to_segment).collect()
    }
}
