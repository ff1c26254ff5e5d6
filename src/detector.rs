//! Segment/segment crossing tests in planar lon/lat.
//!
//! All predicates use strict sign tests on `f64` cross products; points that
//! are only nearly collinear are treated as non-collinear.

use crate::boundary::{Boundary, BoundarySegment};
use crate::model::{CrossingEvent, CrossingKind, MovementSegment, Point};
use crate::trajectory::Trajectory;

/// Longitude jump (degrees) at or above which a segment is treated as corrupt.
pub const MAX_LON_JUMP: f64 = 1.0;
/// Latitude jump (degrees) at or above which a segment is treated as corrupt.
pub const MAX_LAT_JUMP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Clockwise,
    Collinear,
    CounterClockwise,
}

impl Orientation {
    fn of(cross: f64) -> Orientation {
        if cross > 0.0 {
            Orientation::CounterClockwise
        } else if cross < 0.0 {
            Orientation::Clockwise
        } else {
            Orientation::Collinear
        }
    }
}

fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

/// Orientation of the triple (p, q, r).
pub fn orientation(p: Point, q: Point, r: Point) -> Orientation {
    Orientation::of(cross(q.x - p.x, q.y - p.y, r.x - q.x, r.y - q.y))
}

/// Classifies how the movement `start -> end` meets `boundary`, if at all.
///
/// The touching case takes precedence: when the later endpoint lies on the
/// boundary segment the result is `Touching` even if the orientations also
/// differ.
pub fn classify(start: Point, end: Point, boundary: &BoundarySegment) -> Option<CrossingKind> {
    let (p1, p2) = (boundary.start, boundary.end);

    let from_movement = (orientation(start, end, p1), orientation(start, end, p2));
    let from_boundary = (orientation(p1, p2, start), orientation(p1, p2, end));

    // vectors from the later endpoint to each boundary endpoint
    let (cx, cy) = (p1.x - end.x, p1.y - end.y);
    let (dx, dy) = (p2.x - end.x, p2.y - end.y);
    let between = cx * dx + cy * dy <= 0.0;

    if from_boundary.1 == Orientation::Collinear && between {
        Some(CrossingKind::Touching)
    } else if from_movement.0 != from_movement.1 && from_boundary.0 != from_boundary.1 {
        Some(CrossingKind::Proper)
    } else {
        None
    }
}

/// Jumps this large between two broadcasts are transmission or decoding errors.
pub fn is_excluded(start: Point, end: Point) -> bool {
    (end.x - start.x).abs() >= MAX_LON_JUMP || (end.y - start.y).abs() >= MAX_LAT_JUMP
}

/// Tests one movement segment against every segment of `boundary`, one event per segment crossed.
pub fn detect_segment(segment: MovementSegment<'_>, boundary: &Boundary) -> Vec<CrossingEvent> {
    let (start, end) = (segment.start(), segment.end());
    if is_excluded(start, end) {
        return Vec::new();
    }

    boundary
        .segments()
        .iter()
        .filter_map(|b| classify(start, end, b))
        .map(|kind| CrossingEvent {
            boundary: boundary.shared_name(),
            kind,
            from: segment.from.clone(),
            to: segment.to.clone(),
        })
        .collect()
}

pub fn detect(trajectory: &Trajectory, boundary: &Boundary) -> Vec<CrossingEvent> {
    trajectory
        .segments()
        .flat_map(|segment| detect_segment(segment, boundary))
        .collect()
}
