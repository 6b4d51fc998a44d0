// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Frame capture backends
//!
//! Each grab acquires its display resources, copies the requested region
//! and releases them again before returning; nothing is held between
//! ticks.

use crate::error::Result;
use crate::frame::{CaptureRegion, Frame};

/// Frame capture trait
pub trait CaptureSource: Send {
    /// Capture one frame of `region`
    fn grab(&mut self, region: &CaptureRegion) -> Result<Frame>;
}

/// X11 frame capture implementation
#[cfg(all(target_os = "linux", feature = "x11"))]
pub mod x11 {
    use super::*;
    use crate::error::SyncError;
    use crate::frame::FrameFormat;
    use x11rb::connection::Connection;
    use x11rb::protocol::xproto::{ConnectionExt, ImageFormat, ImageOrder};
    use x11rb::rust_connection::RustConnection;

    fn capture_error(e: impl std::fmt::Display) -> SyncError {
        SyncError::Capture(e.to_string())
    }

    /// X11 capture backend using `GetImage` on the root window
    #[derive(Debug, Clone, Default)]
    pub struct X11Capture {
        /// Display name, `None` for `$DISPLAY`
        display: Option<String>,
    }

    impl X11Capture {
        pub fn new(display: Option<String>) -> Self {
            Self { display }
        }

        fn connect(&self) -> Result<(RustConnection, usize)> {
            x11rb::connect(self.display.as_deref()).map_err(capture_error)
        }

        /// Region covering the whole root window
        pub fn screen_region(&self) -> Result<CaptureRegion> {
            let (conn, screen_num) = self.connect()?;
            let screen = conn
                .setup()
                .roots
                .get(screen_num)
                .ok_or_else(|| SyncError::Capture("Screen not found".into()))?;
            Ok(CaptureRegion::new(
                0,
                0,
                u32::from(screen.width_in_pixels),
                u32::from(screen.height_in_pixels),
            ))
        }
    }

    impl CaptureSource for X11Capture {
        fn grab(&mut self, region: &CaptureRegion) -> Result<Frame> {
            let (conn, screen_num) = self.connect()?;
            let setup = conn.setup();
            let root = setup
                .roots
                .get(screen_num)
                .ok_or_else(|| SyncError::Capture("Screen not found".into()))?
                .root;

            let x = i16::try_from(region.x).map_err(capture_error)?;
            let y = i16::try_from(region.y).map_err(capture_error)?;
            let width = u16::try_from(region.width).map_err(capture_error)?;
            let height = u16::try_from(region.height).map_err(capture_error)?;

            let reply = conn
                .get_image(ImageFormat::Z_PIXMAP, root, x, y, width, height, !0)
                .map_err(capture_error)?
                .reply()
                .map_err(capture_error)?;

            let bits_per_pixel = setup
                .pixmap_formats
                .iter()
                .find(|f| f.depth == reply.depth)
                .map(|f| f.bits_per_pixel)
                .unwrap_or(0);
            if bits_per_pixel != 32 || setup.image_byte_order != ImageOrder::LSB_FIRST {
                return Err(SyncError::Capture(format!(
                    "unsupported image layout: depth {}, {} bpp, {:?}",
                    reply.depth, bits_per_pixel, setup.image_byte_order
                )));
            }

            let (w, h) = (usize::from(width), usize::from(height));
            let stride = reply.data.len() / h.max(1);
            log::trace!("Captured {}x{} at ({}, {}), stride {}", w, h, x, y, stride);

            Frame::with_stride(w, h, FrameFormat::Bgra32, stride, reply.data).ok_or_else(|| {
                SyncError::Capture(format!("short image reply for {w}x{h}"))
            })
        }
    }
}

/// Synthetic capture for tests and platforms without a backend
pub mod stub {
    use super::*;
    use crate::error::SyncError;
    use crate::frame::{FrameFormat, Rgb};

    /// Returns a fixed frame, or a moving test pattern when none is set
    #[derive(Debug, Default)]
    pub struct StubCapture {
        frame: Option<Frame>,
        frame_count: u64,
        /// Number of upcoming grabs that fail
        failures: u32,
    }

    impl StubCapture {
        pub fn new() -> Self {
            Self::default()
        }

        /// Always return `frame`, regardless of the requested region
        pub fn with_frame(frame: Frame) -> Self {
            Self {
                frame: Some(frame),
                ..Self::default()
            }
        }

        /// Make the next `count` grabs fail
        pub fn fail_next(mut self, count: u32) -> Self {
            self.failures = count;
            self
        }

        pub fn frame_count(&self) -> u64 {
            self.frame_count
        }

        fn pattern(&self, width: usize, height: usize) -> Frame {
            let phase = (self.frame_count % 256) as u8;
            let mut data = vec![0u8; width * height * 4];
            for (i, px) in data.chunks_exact_mut(4).enumerate() {
                let (x, y) = (i % width.max(1), i / width.max(1));
                px[0] = (x as u8).wrapping_add(phase); // B
                px[1] = (y as u8).wrapping_add(phase); // G
                px[2] = ((x + y) as u8).wrapping_add(phase); // R
                px[3] = 255; // A
            }
            Frame::new(width, height, FrameFormat::Bgra32, data)
                .unwrap_or_else(|| Frame::solid(width, height, Rgb::BLACK))
        }
    }

    impl CaptureSource for StubCapture {
        fn grab(&mut self, region: &CaptureRegion) -> Result<Frame> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(SyncError::Capture("stub capture failure".into()));
            }

            let frame = match &self.frame {
                Some(frame) => frame.clone(),
                None => self.pattern(region.width as usize, region.height as usize),
            };
            self.frame_count += 1;
            Ok(frame)
        }
    }
}

#[cfg(all(target_os = "linux", feature = "x11"))]
pub use x11::X11Capture as DefaultCapture;

#[cfg(not(all(target_os = "linux", feature = "x11")))]
pub use stub::StubCapture as DefaultCapture;
