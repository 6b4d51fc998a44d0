// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Frame and color types shared by the capture and processing stages

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        *self == Rgb::BLACK
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Rgb::new(r, g, b)
    }
}

/// Pixel layout of a frame buffer
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameFormat {
    /// 32-bit BGRA format (Blue, Green, Red, Alpha)
    #[default]
    Bgra32 = 0,
    /// 32-bit RGBA format (Red, Green, Blue, Alpha)
    Rgba32 = 1,
    /// 24-bit packed RGB
    Rgb24 = 2,
}

impl TryFrom<u32> for FrameFormat {
    type Error = &'static str;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameFormat::Bgra32),
            1 => Ok(FrameFormat::Rgba32),
            2 => Ok(FrameFormat::Rgb24),
            _ => Err("Invalid frame format value"),
        }
    }
}

impl FrameFormat {
    /// Get bytes per pixel for this format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Bgra32 | FrameFormat::Rgba32 => 4,
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Byte offsets of the red, green and blue channels within a pixel
    fn channel_offsets(&self) -> [usize; 3] {
        match self {
            FrameFormat::Bgra32 => [2, 1, 0],
            FrameFormat::Rgba32 | FrameFormat::Rgb24 => [0, 1, 2],
        }
    }
}

/// Screen-space rectangle to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyRegion {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl FromStr for CaptureRegion {
    type Err = ConfigError;

    /// Parse `X,Y,WIDTH,HEIGHT`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedRegion(s.to_string());
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(malformed());
        };

        let region = CaptureRegion {
            x: x.parse().map_err(|_| malformed())?,
            y: y.parse().map_err(|_| malformed())?,
            width: w.parse().map_err(|_| malformed())?,
            height: h.parse().map_err(|_| malformed())?,
        };
        region.validate()?;
        Ok(region)
    }
}

/// One captured frame
#[derive(Debug, Clone)]
pub struct Frame {
    width: usize,
    height: usize,
    format: FrameFormat,
    /// Row stride in bytes
    stride: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a tightly packed pixel buffer.
    ///
    /// Returns `None` when the buffer is too small for the given
    /// dimensions.
    pub fn new(width: usize, height: usize, format: FrameFormat, data: Vec<u8>) -> Option<Self> {
        let stride = width * format.bytes_per_pixel();
        Self::with_stride(width, height, format, stride, data)
    }

    /// Wrap a pixel buffer whose rows may be padded.
    pub fn with_stride(
        width: usize,
        height: usize,
        format: FrameFormat,
        stride: usize,
        data: Vec<u8>,
    ) -> Option<Self> {
        if stride < width * format.bytes_per_pixel() || data.len() < stride * height {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            stride,
            data,
        })
    }

    /// Build an RGB frame by evaluating `f(x, y)` for every pixel
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Rgb) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                let c = f(x, y);
                data.extend_from_slice(&[c.r, c.g, c.b]);
            }
        }
        Self {
            width,
            height,
            format: FrameFormat::Rgb24,
            stride: width * 3,
            data,
        }
    }

    /// Frame of a single color
    pub fn solid(width: usize, height: usize, color: Rgb) -> Self {
        Self::from_fn(width, height, |_, _| color)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Red, green and blue channels of the pixel at `(x, y)`.
    ///
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn channels(&self, x: usize, y: usize) -> [u8; 3] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let base = y * self.stride + x * self.format.bytes_per_pixel();
        let [r, g, b] = self.format.channel_offsets();
        [self.data[base + r], self.data[base + g], self.data[base + b]]
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        let [r, g, b] = self.channels(x, y);
        Rgb::new(r, g, b)
    }
}
