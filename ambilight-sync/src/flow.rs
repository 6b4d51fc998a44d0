// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! LED flow: segments, assembly into the LED buffer, and flow generation
//!
//! A flow is the ordered list of segments that walks around the screen.
//! Assembly writes each segment's colors into the strip starting at the
//! configured offset. Colors that would land past the end of the strip are
//! dropped without error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extract::EdgeSampler;
use crate::frame::{Frame, Rgb};
use crate::geometry::EdgeId;

/// Order in which a segment's colors are written to the strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Normal,
    Reversed,
}

impl Direction {
    /// Put `colors` into strip order
    pub fn apply(self, colors: &mut [Rgb]) {
        if self == Direction::Reversed {
            colors.reverse();
        }
    }
}

/// Source region of a segment.
///
/// Persisted flows may name regions this engine does not know; those are
/// kept so the segment still occupies its LED range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SegmentEdge {
    Known(EdgeId),
    Unrecognized(String),
}

impl From<String> for SegmentEdge {
    fn from(name: String) -> Self {
        match name.parse() {
            Ok(edge) => SegmentEdge::Known(edge),
            Err(_) => SegmentEdge::Unrecognized(name),
        }
    }
}

impl From<SegmentEdge> for String {
    fn from(edge: SegmentEdge) -> Self {
        edge.to_string()
    }
}

impl From<EdgeId> for SegmentEdge {
    fn from(edge: EdgeId) -> Self {
        SegmentEdge::Known(edge)
    }
}

impl fmt::Display for SegmentEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentEdge::Known(edge) => f.pad(edge.as_str()),
            SegmentEdge::Unrecognized(name) => f.pad(name),
        }
    }
}

/// Contiguous run of LEDs fed by one screen region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub edge: SegmentEdge,
    pub led_count: usize,
    pub direction: Direction,
}

impl Segment {
    pub fn new(edge: impl Into<SegmentEdge>, led_count: usize, direction: Direction) -> Self {
        Self {
            edge: edge.into(),
            led_count,
            direction,
        }
    }
}

/// What happened while assembling one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// LEDs that received a color
    pub written: usize,
    /// Colors discarded because the strip ended
    pub dropped: usize,
    /// Segments whose region name was not recognized
    pub unrecognized: usize,
}

impl AssemblyReport {
    pub fn truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Builds the LED buffer for one frame
#[derive(Debug, Clone)]
pub struct FlowAssembler {
    sampler: EdgeSampler,
    offset: usize,
    total_leds: usize,
}

impl FlowAssembler {
    pub fn new(sampler: EdgeSampler, offset: usize, total_leds: usize) -> Self {
        Self {
            sampler,
            offset,
            total_leds,
        }
    }

    pub fn total_leds(&self) -> usize {
        self.total_leds
    }

    /// Assemble a `total_leds` long buffer from `frame`.
    ///
    /// Positions not covered by any segment stay black.
    pub fn assemble(&self, frame: &Frame, flow: &[Segment]) -> (Vec<Rgb>, AssemblyReport) {
        let mut leds = vec![Rgb::BLACK; self.total_leds];
        let mut report = AssemblyReport::default();
        let mut cursor = self.offset;

        for segment in flow {
            let room = self.total_leds.saturating_sub(cursor);
            let fits = segment.led_count.min(room);
            report.dropped = report.dropped.saturating_add(segment.led_count - fits);

            let edge = match &segment.edge {
                SegmentEdge::Known(edge) => *edge,
                SegmentEdge::Unrecognized(_) => {
                    report.unrecognized += 1;
                    cursor += fits;
                    continue;
                }
            };
            if fits == 0 {
                continue;
            }

            // Zones are split over the full count; only those that land on
            // the strip are sampled
            let zones = match segment.direction {
                Direction::Normal => 0..fits,
                Direction::Reversed => segment.led_count - fits..segment.led_count,
            };
            let mut colors = self
                .sampler
                .extract_zones(frame, edge, segment.led_count, zones);
            segment.direction.apply(&mut colors);

            leds[cursor..cursor + fits].copy_from_slice(&colors);
            cursor += fits;
            report.written += fits;
        }

        (leds, report)
    }
}

/// Rotational order used to generate a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Traversal {
    #[default]
    #[serde(rename = "clockwise")]
    Clockwise,
    #[serde(rename = "counter-clockwise", alias = "counter_clockwise")]
    CounterClockwise,
}

impl Traversal {
    fn ring(self) -> [EdgeId; 4] {
        match self {
            Traversal::Clockwise => [EdgeId::Top, EdgeId::Right, EdgeId::Bottom, EdgeId::Left],
            Traversal::CounterClockwise => {
                [EdgeId::Top, EdgeId::Left, EdgeId::Bottom, EdgeId::Right]
            }
        }
    }

    /// Endpoints of the path along `edge` when walking in this order
    pub fn travel(self, edge: EdgeId) -> (&'static str, &'static str) {
        let (from, to) = match edge {
            EdgeId::Top => ("left", "right"),
            EdgeId::TopLeft => ("left", "middle"),
            EdgeId::TopRight => ("middle", "right"),
            EdgeId::Right => ("top", "bottom"),
            EdgeId::RightTop => ("top", "middle"),
            EdgeId::RightBottom => ("middle", "bottom"),
            EdgeId::Bottom => ("right", "left"),
            EdgeId::BottomRight => ("right", "middle"),
            EdgeId::BottomLeft => ("middle", "left"),
            EdgeId::Left => ("bottom", "top"),
            EdgeId::LeftBottom => ("bottom", "middle"),
            EdgeId::LeftTop => ("middle", "top"),
        };
        match self {
            Traversal::Clockwise => (from, to),
            Traversal::CounterClockwise => (to, from),
        }
    }

    /// Human readable description of walking `edge`, e.g.
    /// `Top edge (left to right)`
    pub fn describe(self, edge: EdgeId) -> String {
        let side = match edge {
            EdgeId::Top | EdgeId::TopLeft | EdgeId::TopRight => "Top",
            EdgeId::Bottom | EdgeId::BottomLeft | EdgeId::BottomRight => "Bottom",
            EdgeId::Left | EdgeId::LeftTop | EdgeId::LeftBottom => "Left",
            EdgeId::Right | EdgeId::RightTop | EdgeId::RightBottom => "Right",
        };
        let (from, to) = self.travel(edge);
        format!("{side} edge ({from} to {to})")
    }
}

/// Corner of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

/// Point on the screen outline where the LED strip starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    Corner(Corner),
    /// Somewhere along a full edge; the edge is split at its midpoint
    Side(EdgeId),
}

impl FromStr for StartPosition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let position = match s {
            "top_left_corner" | "left_top_corner" => StartPosition::Corner(Corner::TopLeft),
            "top_right_corner" | "right_top_corner" => StartPosition::Corner(Corner::TopRight),
            "bottom_right_corner" | "right_bottom_corner" => {
                StartPosition::Corner(Corner::BottomRight)
            }
            "bottom_left_corner" | "left_bottom_corner" => {
                StartPosition::Corner(Corner::BottomLeft)
            }
            "top_middle" | "top_left_side" | "top_right_side" => StartPosition::Side(EdgeId::Top),
            "right_middle" | "right_top_side" | "right_bottom_side" => {
                StartPosition::Side(EdgeId::Right)
            }
            "bottom_middle" | "bottom_left_side" | "bottom_right_side" => {
                StartPosition::Side(EdgeId::Bottom)
            }
            "left_middle" | "left_top_side" | "left_bottom_side" => {
                StartPosition::Side(EdgeId::Left)
            }
            _ => return Err(ConfigError::UnknownStartPosition(s.to_string())),
        };
        Ok(position)
    }
}

impl StartPosition {
    /// Edges visited when walking the whole outline from this position
    pub fn edge_sequence(self, traversal: Traversal) -> Vec<EdgeId> {
        let ring = traversal.ring();
        match self {
            StartPosition::Corner(corner) => {
                let first = match (traversal, corner) {
                    (Traversal::Clockwise, Corner::TopLeft) => EdgeId::Top,
                    (Traversal::Clockwise, Corner::TopRight) => EdgeId::Right,
                    (Traversal::Clockwise, Corner::BottomRight) => EdgeId::Bottom,
                    (Traversal::Clockwise, Corner::BottomLeft) => EdgeId::Left,
                    (Traversal::CounterClockwise, Corner::TopLeft) => EdgeId::Left,
                    (Traversal::CounterClockwise, Corner::TopRight) => EdgeId::Top,
                    (Traversal::CounterClockwise, Corner::BottomRight) => EdgeId::Right,
                    (Traversal::CounterClockwise, Corner::BottomLeft) => EdgeId::Bottom,
                };
                rotate_from(ring, first).to_vec()
            }
            StartPosition::Side(edge) => {
                let (lead, tail) = split_halves(edge, traversal);
                let rest = rotate_from(ring, edge);
                let mut sequence = vec![lead];
                sequence.extend_from_slice(&rest[1..]);
                sequence.push(tail);
                sequence
            }
        }
    }

    /// Template flow with zero LED counts, ready for editing
    pub fn template(self, traversal: Traversal) -> Vec<Segment> {
        self.edge_sequence(traversal)
            .into_iter()
            .map(|edge| Segment::new(edge, 0, Direction::Normal))
            .collect()
    }
}

fn rotate_from(ring: [EdgeId; 4], first: EdgeId) -> [EdgeId; 4] {
    let start = ring.iter().position(|e| *e == first).unwrap_or(0);
    std::array::from_fn(|i| ring[(start + i) % 4])
}

/// Halves of a full edge as (walked after the start point, walked last)
fn split_halves(edge: EdgeId, traversal: Traversal) -> (EdgeId, EdgeId) {
    let (cw_lead, cw_tail) = match edge {
        EdgeId::Top => (EdgeId::TopRight, EdgeId::TopLeft),
        EdgeId::Right => (EdgeId::RightBottom, EdgeId::RightTop),
        EdgeId::Bottom => (EdgeId::BottomLeft, EdgeId::BottomRight),
        EdgeId::Left => (EdgeId::LeftTop, EdgeId::LeftBottom),
        half => (half, half),
    };
    match traversal {
        Traversal::Clockwise => (cw_lead, cw_tail),
        Traversal::CounterClockwise => (cw_tail, cw_lead),
    }
}

/// Placement of one segment on the strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpan {
    pub edge: SegmentEdge,
    /// Index of the first LED
    pub first: usize,
    pub led_count: usize,
    pub direction: Direction,
}

impl SegmentSpan {
    /// Index of the last LED, if the segment has any
    pub fn last(&self) -> Option<usize> {
        (self.led_count > 0).then(|| self.first + self.led_count - 1)
    }
}

/// Where every segment lands on a strip of `total_leds`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub spans: Vec<SegmentSpan>,
    /// Sum of all segment counts
    pub active: usize,
    /// LEDs left after the offset and all segments; negative on overflow
    pub remaining: i64,
}

/// Compute the nominal placement of `flow`, ignoring truncation
pub fn layout(flow: &[Segment], offset: usize, total_leds: usize) -> Layout {
    let mut cursor = offset;
    let spans = flow
        .iter()
        .map(|segment| {
            let span = SegmentSpan {
                edge: segment.edge.clone(),
                first: cursor,
                led_count: segment.led_count,
                direction: segment.direction,
            };
            cursor = cursor.saturating_add(segment.led_count);
            span
        })
        .collect();
    let active = flow
        .iter()
        .fold(0usize, |sum, s| sum.saturating_add(s.led_count));
    let signed = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
    Layout {
        spans,
        active,
        remaining: signed(total_leds)
            .saturating_sub(signed(offset))
            .saturating_sub(signed(active)),
    }
}
