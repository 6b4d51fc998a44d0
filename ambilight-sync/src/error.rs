// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the sync engine
//!
//! Failures inside a running loop are never fatal: capture and transmit
//! errors are logged by the worker and the loop moves on to the next tick.
//! Configuration errors are raised once, before a run starts.

/// Result type for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync engine error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Acquiring a frame of the capture region failed.
    ///
    /// Also raised for pixel layouts the backend cannot decode.
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Sending a frame to the lighting device failed.
    #[error("Transmit to {addr} failed: {source}")]
    Transmit {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be turned into a snapshot.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted configuration is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation failures raised while freezing a configuration snapshot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} level {value} is outside 0..=10")]
    LevelOutOfRange { name: &'static str, value: u8 },

    #[error("edge sample fraction {0} is outside 0.05..=0.5")]
    SampleFractionOutOfRange(f64),

    #[error("capture region must have a non-zero size, got {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },

    #[error("LED count must be greater than zero")]
    NoLeds,

    #[error("no LED segments configured")]
    NoSegments,

    #[error("device port must be non-zero")]
    InvalidPort,

    #[error("device host is empty")]
    EmptyHost,

    #[error("malformed capture region {0:?}, expected X,Y,WIDTH,HEIGHT")]
    MalformedRegion(String),

    #[error("unknown starting position {0:?}")]
    UnknownStartPosition(String),
}
