// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Temporal smoothing between consecutive LED buffers

use crate::enhance::MAX_LEVEL;
use crate::frame::Rgb;

/// Upper bound on the weight given to the previous buffer
pub const MAX_ALPHA: f64 = 0.95;

/// Exponential moving average over LED buffers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalSmoother {
    alpha: f64,
}

impl TemporalSmoother {
    pub fn from_level(level: u8) -> Self {
        let alpha = f64::from(level.min(MAX_LEVEL)) / 10.0 * MAX_ALPHA;
        Self {
            alpha: alpha.clamp(0.0, MAX_ALPHA),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Blend `curr` toward `prev`.
    ///
    /// Without a previous buffer, or when the lengths disagree, `curr` is
    /// returned as is.
    pub fn smooth(&self, prev: Option<&[Rgb]>, curr: Vec<Rgb>) -> Vec<Rgb> {
        let Some(prev) = prev else {
            return curr;
        };
        if prev.len() != curr.len() || self.alpha == 0.0 {
            return curr;
        }

        let blend = |p: u8, c: u8| {
            let v = f64::from(p) * self.alpha + f64::from(c) * (1.0 - self.alpha);
            v as u8
        };
        prev.iter()
            .zip(curr)
            .map(|(p, c)| Rgb::new(blend(p.r, c.r), blend(p.g, c.g), blend(p.b, c.b)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(v: u8, n: usize) -> Vec<Rgb> {
        vec![Rgb::new(v, v, v); n]
    }

    #[test]
    fn test_alpha_from_level() {
        assert_eq!(TemporalSmoother::from_level(0).alpha(), 0.0);
        assert!((TemporalSmoother::from_level(6).alpha() - 0.57).abs() < 1e-12);
        assert!((TemporalSmoother::from_level(10).alpha() - 0.95).abs() < 1e-12);
        assert!((TemporalSmoother::from_level(200).alpha() - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_first_tick_passes_through() {
        let curr = vec![Rgb::new(1, 2, 3), Rgb::new(250, 0, 9)];
        let smoother = TemporalSmoother::from_level(10);
        assert_eq!(smoother.smooth(None, curr.clone()), curr);
    }

    #[test]
    fn test_level_zero_returns_current() {
        let prev = buffer(200, 4);
        let curr = buffer(10, 4);
        let out = TemporalSmoother::from_level(0).smooth(Some(&prev), curr.clone());
        assert_eq!(out, curr);
    }

    #[test]
    fn test_level_ten_favors_previous() {
        let prev = buffer(200, 3);
        let curr = buffer(0, 3);
        let out = TemporalSmoother::from_level(10).smooth(Some(&prev), curr);
        // 200 * 0.95 = 190
        assert!(out.iter().all(|c| c.r >= 189 && c.r <= 190));
    }

    #[test]
    fn test_blend_truncates() {
        let prev = vec![Rgb::new(100, 0, 255)];
        let curr = vec![Rgb::new(0, 101, 0)];
        // alpha = 0.475
        let out = TemporalSmoother::from_level(5).smooth(Some(&prev), curr);
        assert_eq!(out, vec![Rgb::new(47, 53, 121)]);
    }

    #[test]
    fn test_length_mismatch_returns_current() {
        let prev = buffer(100, 2);
        let curr = buffer(5, 3);
        let out = TemporalSmoother::from_level(8).smooth(Some(&prev), curr.clone());
        assert_eq!(out, curr);
    }
}
