// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Edge color extraction
//!
//! A segment's colors come from a band of pixels along one screen edge.
//! The band is split into `count` contiguous zones along the run direction;
//! each zone's color is the mean of its pixels, weighted across the band
//! depth so that lines nearer the physical edge count more.

use std::ops::Range;

use crate::enhance::ColorEnhancer;
use crate::frame::{Frame, Rgb};
use crate::geometry::{Axis, BandSide, EdgeId};

/// Exponent of the `exp(-k * distance)` falloff across the band
pub const FALLOFF_EXPONENT: f64 = 0.01;

/// Depth of the sampling band for an orthogonal dimension of `orthogonal`
/// pixels. Never zero and never deeper than the frame.
pub fn band_depth(fraction: f64, orthogonal: usize) -> usize {
    let band = (fraction * orthogonal as f64).round() as usize;
    band.clamp(1, orthogonal.max(1))
}

/// Normalized falloff weights, indexed by distance from the screen edge
#[derive(Debug, Clone, PartialEq)]
pub struct WeightKernel {
    weights: Vec<f64>,
}

impl WeightKernel {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        let raw: Vec<f64> = (0..depth)
            .map(|d| (-FALLOFF_EXPONENT * d as f64).exp())
            .collect();
        let total: f64 = raw.iter().sum();
        Self {
            weights: raw.into_iter().map(|w| w / total).collect(),
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Boundaries of `count` zones over `start..end`.
///
/// Returns `count + 1` indices, evenly spaced and truncated; zones differ
/// in width by at most one pixel.
pub fn zone_bounds(start: usize, end: usize, count: usize) -> Vec<usize> {
    (0..=count).map(|i| zone_bound(start, end, i, count)).collect()
}

/// Boundary `i` of `count` zones over `start..end`
fn zone_bound(start: usize, end: usize, i: usize, count: usize) -> usize {
    let len = end.saturating_sub(start) as u128;
    // i <= count, so the quotient never exceeds len
    start + (i as u128 * len / count.max(1) as u128) as usize
}

/// Samples edge colors from captured frames
#[derive(Debug, Clone)]
pub struct EdgeSampler {
    fraction: f64,
    enhancer: ColorEnhancer,
}

impl EdgeSampler {
    pub fn new(fraction: f64, enhancer: ColorEnhancer) -> Self {
        Self { fraction, enhancer }
    }

    pub fn enhancer(&self) -> &ColorEnhancer {
        &self.enhancer
    }

    /// Extract `count` enhanced colors for `edge`, ordered along the run
    /// direction (left to right, or top to bottom).
    pub fn extract(&self, frame: &Frame, edge: EdgeId, count: usize) -> Vec<Rgb> {
        self.extract_zones(frame, edge, count, 0..count)
    }

    /// Colors of the zones in `zones` only, out of `count` zones over the
    /// edge. The split is the same as for [`extract`](Self::extract), so
    /// only the requested part of a very long segment is evaluated.
    pub fn extract_zones(
        &self,
        frame: &Frame,
        edge: EdgeId,
        count: usize,
        zones: Range<usize>,
    ) -> Vec<Rgb> {
        let zones = zones.start.min(count)..zones.end.min(count);
        if zones.is_empty() {
            return Vec::new();
        }

        let geometry = edge.geometry();
        let (run_len, ortho_len) = match geometry.run {
            Axis::Horizontal => (frame.width(), frame.height()),
            Axis::Vertical => (frame.height(), frame.width()),
        };
        if run_len == 0 || ortho_len == 0 {
            return vec![Rgb::BLACK; zones.len()];
        }

        let kernel = WeightKernel::new(band_depth(self.fraction, ortho_len));
        let band_line = |distance: usize| match geometry.band_side {
            BandSide::Start => distance,
            BandSide::End => ortho_len - 1 - distance,
        };
        let pixel = |run: usize, line: usize| match geometry.run {
            Axis::Horizontal => frame.channels(run, line),
            Axis::Vertical => frame.channels(line, run),
        };

        let (start, end) = geometry.half.range(run_len);
        zones
            .map(|i| {
                let z0 = zone_bound(start, end, i, count);
                let z1 = zone_bound(start, end, i + 1, count);
                if z0 == z1 {
                    return Rgb::BLACK;
                }
                let width = (z1 - z0) as f64;

                let mut mean = [0.0f64; 3];
                for (distance, weight) in kernel.weights().iter().enumerate() {
                    let line = band_line(distance);
                    let mut sum = [0.0f64; 3];
                    for run in z0..z1 {
                        for (acc, channel) in sum.iter_mut().zip(pixel(run, line)) {
                            *acc += f64::from(channel);
                        }
                    }
                    for (m, s) in mean.iter_mut().zip(sum) {
                        *m += weight * s / width;
                    }
                }
                self.enhancer.enhance_mean(mean)
            })
            .collect()
    }
}
