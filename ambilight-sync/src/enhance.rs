// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Gamma and boost color enhancement
//!
//! Each channel is linearized with `gamma`, scaled by `boost` and clamped,
//! then mapped back through `1/gamma`. The result is truncated, not
//! rounded.

use crate::frame::Rgb;

/// Highest value accepted for any effect level
pub const MAX_LEVEL: u8 = 10;

/// Per-channel gamma/boost transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorEnhancer {
    gamma: f64,
    boost: f64,
}

impl ColorEnhancer {
    /// Derive the transform from gamma and boost levels in `0..=10`.
    ///
    /// Levels above 10 are clamped.
    pub fn from_levels(gamma_level: u8, boost_level: u8) -> Self {
        let g = f64::from(gamma_level.min(MAX_LEVEL)) / 10.0;
        let b = f64::from(boost_level.min(MAX_LEVEL)) / 10.0;
        Self {
            gamma: 1.0 + g * 3.0,
            boost: 1.0 + b * 2.0,
        }
    }

    /// Transform that leaves colors unchanged (up to truncation)
    pub fn identity() -> Self {
        Self::from_levels(0, 0)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn boost(&self) -> f64 {
        self.boost
    }

    /// Enhance one channel value in `0.0..=255.0`
    pub fn channel(&self, value: f64) -> u8 {
        let lin = (value / 255.0).clamp(0.0, 1.0).powf(self.gamma);
        let lin = (lin * self.boost).clamp(0.0, 1.0);
        let out = lin.powf(1.0 / self.gamma) * 255.0;
        // `as` saturates and truncates toward zero
        out as u8
    }

    /// Enhance a mean color with unrounded channels
    pub fn enhance_mean(&self, [r, g, b]: [f64; 3]) -> Rgb {
        Rgb::new(self.channel(r), self.channel(g), self.channel(b))
    }

    pub fn enhance(&self, color: Rgb) -> Rgb {
        self.enhance_mean([f64::from(color.r), f64::from(color.g), f64::from(color.b)])
    }
}

impl Default for ColorEnhancer {
    fn default() -> Self {
        Self::from_levels(5, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_map_to_parameters() {
        let e = ColorEnhancer::from_levels(5, 2);
        assert!((e.gamma() - 2.5).abs() < 1e-12);
        assert!((e.boost() - 1.4).abs() < 1e-12);

        let max = ColorEnhancer::from_levels(10, 10);
        assert!((max.gamma() - 4.0).abs() < 1e-12);
        assert!((max.boost() - 3.0).abs() < 1e-12);

        assert_eq!(ColorEnhancer::from_levels(42, 42), max);
    }

    #[test]
    fn test_identity_within_one() {
        let e = ColorEnhancer::identity();
        for v in 0..=255u8 {
            let out = e.channel(f64::from(v));
            assert!(v.abs_diff(out) <= 1, "{v} -> {out}");
        }
    }

    #[test]
    fn test_black_and_white_are_fixed_points() {
        for (g, b) in [(0, 0), (5, 2), (10, 10)] {
            let e = ColorEnhancer::from_levels(g, b);
            assert_eq!(e.channel(0.0), 0);
            assert!(e.channel(255.0) >= 254);
        }
    }

    #[test]
    fn test_mid_gray_default_levels() {
        // 128 * 1.4^(1/2.5) = 146.4...
        let e = ColorEnhancer::from_levels(5, 2);
        assert_eq!(e.enhance(Rgb::new(128, 128, 128)), Rgb::new(146, 146, 146));
    }

    #[test]
    fn test_boost_only_brightens_and_is_monotone() {
        let e = ColorEnhancer::from_levels(7, 6);
        let mut last = 0;
        for v in 0..=255u8 {
            let out = e.channel(f64::from(v));
            assert!(out >= last);
            assert!(u16::from(out) + 1 >= u16::from(v));
            last = out;
        }
    }

    #[test]
    fn test_boost_saturates() {
        let e = ColorEnhancer::from_levels(0, 10);
        // 200 * 3 is well past full scale
        assert!(e.channel(200.0) >= 254);
    }
}
