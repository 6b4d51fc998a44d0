// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! Screen edge geometry table
//!
//! Maps each of the twelve edge identifiers to the rule used to sample it:
//! which axis the LEDs run along, on which side of the orthogonal axis the
//! sampling band sits, and whether sampling is restricted to one half of
//! the run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Edge or half-edge region of the capture area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeId {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    LeftTop,
    LeftBottom,
    RightTop,
    RightBottom,
}

/// Axis the LEDs of a segment run along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Run along x; the band spans rows
    Horizontal,
    /// Run along y; the band spans columns
    Vertical,
}

/// Side of the orthogonal axis holding the physical screen edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSide {
    /// Row 0 or column 0
    Start,
    /// Last row or last column
    End,
}

/// Portion of the run dimension to sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Whole,
    /// `0..len / 2`
    First,
    /// `len / 2..len`
    Second,
}

impl Half {
    /// Restrict `0..len` to this half.
    pub fn range(self, len: usize) -> (usize, usize) {
        let mid = len / 2;
        match self {
            Half::Whole => (0, len),
            Half::First => (0, mid),
            Half::Second => (mid, len),
        }
    }
}

/// Sampling rule for one edge identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeGeometry {
    pub run: Axis,
    pub band_side: BandSide,
    pub half: Half,
}

const fn geometry(run: Axis, band_side: BandSide, half: Half) -> EdgeGeometry {
    EdgeGeometry {
        run,
        band_side,
        half,
    }
}

/// Indexed by `EdgeId as usize`.
const GEOMETRY_TABLE: [EdgeGeometry; 12] = [
    geometry(Axis::Horizontal, BandSide::Start, Half::Whole), // Top
    geometry(Axis::Horizontal, BandSide::End, Half::Whole),   // Bottom
    geometry(Axis::Vertical, BandSide::Start, Half::Whole),   // Left
    geometry(Axis::Vertical, BandSide::End, Half::Whole),     // Right
    geometry(Axis::Horizontal, BandSide::Start, Half::First), // TopLeft
    geometry(Axis::Horizontal, BandSide::Start, Half::Second), // TopRight
    geometry(Axis::Horizontal, BandSide::End, Half::First),   // BottomLeft
    geometry(Axis::Horizontal, BandSide::End, Half::Second),  // BottomRight
    geometry(Axis::Vertical, BandSide::Start, Half::First),   // LeftTop
    geometry(Axis::Vertical, BandSide::Start, Half::Second),  // LeftBottom
    geometry(Axis::Vertical, BandSide::End, Half::First),     // RightTop
    geometry(Axis::Vertical, BandSide::End, Half::Second),    // RightBottom
];

impl EdgeId {
    pub const ALL: [EdgeId; 12] = [
        EdgeId::Top,
        EdgeId::Bottom,
        EdgeId::Left,
        EdgeId::Right,
        EdgeId::TopLeft,
        EdgeId::TopRight,
        EdgeId::BottomLeft,
        EdgeId::BottomRight,
        EdgeId::LeftTop,
        EdgeId::LeftBottom,
        EdgeId::RightTop,
        EdgeId::RightBottom,
    ];

    /// Look up the sampling rule for this edge
    pub fn geometry(self) -> EdgeGeometry {
        GEOMETRY_TABLE[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeId::Top => "top",
            EdgeId::Bottom => "bottom",
            EdgeId::Left => "left",
            EdgeId::Right => "right",
            EdgeId::TopLeft => "top_left",
            EdgeId::TopRight => "top_right",
            EdgeId::BottomLeft => "bottom_left",
            EdgeId::BottomRight => "bottom_right",
            EdgeId::LeftTop => "left_top",
            EdgeId::LeftBottom => "left_bottom",
            EdgeId::RightTop => "right_top",
            EdgeId::RightBottom => "right_bottom",
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeId::ALL
            .into_iter()
            .find(|edge| edge.as_str() == s)
            .ok_or_else(|| format!("unrecognized edge identifier {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_edges() {
        assert_eq!(
            EdgeId::Top.geometry(),
            geometry(Axis::Horizontal, BandSide::Start, Half::Whole)
        );
        assert_eq!(EdgeId::Bottom.geometry().band_side, BandSide::End);
        assert_eq!(EdgeId::Left.geometry().run, Axis::Vertical);
        assert_eq!(EdgeId::Right.geometry().band_side, BandSide::End);
    }

    #[test]
    fn test_half_edges_share_parent_band() {
        for (half, parent) in [
            (EdgeId::TopLeft, EdgeId::Top),
            (EdgeId::TopRight, EdgeId::Top),
            (EdgeId::BottomLeft, EdgeId::Bottom),
            (EdgeId::BottomRight, EdgeId::Bottom),
            (EdgeId::LeftTop, EdgeId::Left),
            (EdgeId::LeftBottom, EdgeId::Left),
            (EdgeId::RightTop, EdgeId::Right),
            (EdgeId::RightBottom, EdgeId::Right),
        ] {
            assert_eq!(half.geometry().run, parent.geometry().run);
            assert_eq!(half.geometry().band_side, parent.geometry().band_side);
            assert_ne!(half.geometry().half, Half::Whole);
        }
    }

    #[test]
    fn test_half_range_uses_integer_midpoint() {
        assert_eq!(Half::Whole.range(7), (0, 7));
        assert_eq!(Half::First.range(7), (0, 3));
        assert_eq!(Half::Second.range(7), (3, 7));
    }

    #[test]
    fn test_edge_id_names_round_trip() {
        for edge in EdgeId::ALL {
            assert_eq!(edge.as_str().parse::<EdgeId>(), Ok(edge));
        }
        assert!("diagonal".parse::<EdgeId>().is_err());
    }

    #[test]
    fn test_edge_id_serde_names() {
        let json = serde_json::to_string(&EdgeId::RightBottom).unwrap();
        assert_eq!(json, "\"right_bottom\"");
    }
}
