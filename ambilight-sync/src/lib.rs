// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! ambilight-sync
//!
//! Drives an addressable LED strip mounted around a display from the
//! colors at the edges of the screen.
//!
//! # Overview
//!
//! Every tick the engine captures a screen region, samples each edge the
//! strip covers, enhances and smooths the resulting colors and sends them
//! to the strip controller as one DRGB datagram.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Capture Source                          │
//! │  - X11 GetImage of the configured region                    │
//! └─────────────────────────────────────────────────────────────┘
//!                            │  Frame
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Flow Assembler                          │
//! │  - Edge sampling with weighted bands                        │
//! │  - Gamma / boost enhancement                                │
//! │  - Segment placement after the start offset                 │
//! └─────────────────────────────────────────────────────────────┘
//!                            │  LED buffer
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Temporal Smoother                         │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DRGB over UDP                           │
//! │  [0x02, timeout, B, G, R, B, G, R, ...]                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ambilight_sync::{ConfigSnapshot, PersistedConfig, SyncEngine, UdpTransmitter};
//! use ambilight_sync::capture::DefaultCapture;
//!
//! let persisted = PersistedConfig::load("ambilight_config.json")?;
//! let capture = DefaultCapture::default();
//! let snapshot = ConfigSnapshot::from_persisted(&persisted, capture.screen_region()?)?;
//! let transmitter = UdpTransmitter::new(&snapshot.device().host, snapshot.device().port);
//!
//! let mut engine = SyncEngine::new();
//! engine.start(snapshot, capture, transmitter)?;
//! // ...
//! engine.stop(std::time::Duration::from_secs(1));
//! ```
//!
//! # Modules
//!
//! - [`geometry`]: Edge identifiers and their sampling geometry
//! - [`frame`]: Pixel buffers and capture regions
//! - [`extract`]: Weighted edge sampling
//! - [`enhance`]: Gamma curve and brightness gain
//! - [`flow`]: Strip layout and LED buffer assembly
//! - [`smooth`]: Temporal smoothing
//! - [`protocol`]: DRGB encoding and UDP delivery
//! - [`capture`]: Screen capture backends
//! - [`engine`]: The sync loop
//! - [`config`]: Persisted and frozen configuration
//! - [`diagnostics`]: Per-tick reporting

pub mod capture;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod enhance;
pub mod error;
pub mod extract;
pub mod flow;
pub mod frame;
pub mod geometry;
pub mod protocol;
pub mod smooth;

pub use config::{ConfigSnapshot, DeviceAddress, EffectLevels, PersistedConfig};
pub use engine::{EngineState, FramePipeline, StartOutcome, SyncEngine};
pub use error::{ConfigError, Result, SyncError};
pub use flow::{Direction, Segment, SegmentEdge, Traversal};
pub use frame::{CaptureRegion, Frame, Rgb};
pub use geometry::EdgeId;
pub use protocol::{encode_drgb, Transmitter, UdpTransmitter};
