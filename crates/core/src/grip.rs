//! Drag handles ("grips") on an anchor

use crate::anchor::{Anchor, SegmentEnd};
use crate::geometry::Tolerance;
use kurbo::{Point, Vec2};

/// Role of a grip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GripKind {
    /// Single handle of a degenerate anchor; drives the start point
    Combined,
    /// Moves the anchor point along the segment
    AnchorPoint,
    Start,
    End,
}

/// A handle exposed for interactive editing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grip {
    pub kind: GripKind,
    pub position: Point,
}

impl Grip {
    fn new(kind: GripKind, position: Point) -> Self {
        Self { kind, position }
    }

    /// Apply this handle's own move callback
    pub fn apply(&self, anchor: &mut Anchor, offset: Vec2) -> bool {
        apply_kind(self.kind, anchor, offset)
    }
}

/// Enumerate the grips of an anchor
///
/// A degenerate segment gets one combined handle. Otherwise the anchor point
/// always has a handle, and each endpoint gets one unless it coincides with
/// the anchor point.
pub fn grips_for(anchor: &Anchor, tolerance: &Tolerance) -> Vec<Grip> {
    let geometry = anchor.geometry();
    if geometry.is_degenerate(tolerance) {
        return vec![Grip::new(GripKind::Combined, geometry.start())];
    }

    let anchor_point = anchor.anchor_point();
    let mut grips = vec![Grip::new(GripKind::AnchorPoint, anchor_point)];
    if !tolerance.points_equal(geometry.start(), anchor_point) {
        grips.push(Grip::new(GripKind::Start, geometry.start()));
    }
    if !tolerance.points_equal(geometry.end(), anchor_point) {
        grips.push(Grip::new(GripKind::End, geometry.end()));
    }
    grips
}

/// The handles moved together by a non-stretch drag
///
/// Only the endpoints take part; the anchor point rides along at its held
/// parametric position.
pub fn move_grips(anchor: &Anchor) -> [Grip; 2] {
    let geometry = anchor.geometry();
    [
        Grip::new(GripKind::Start, geometry.start()),
        Grip::new(GripKind::End, geometry.end()),
    ]
}

/// Drag a grip
///
/// With `stretch` only the dragged handle moves. Without it every handle in
/// [`move_grips`] runs its own callback with the same offset, which is a pure
/// translation.
pub fn drag_grip(anchor: &mut Anchor, kind: GripKind, offset: Vec2, stretch: bool) -> bool {
    if stretch {
        return apply_kind(kind, anchor, offset);
    }
    let mut moved = false;
    for grip in move_grips(anchor) {
        moved |= grip.apply(anchor, offset);
    }
    moved
}

fn apply_kind(kind: GripKind, anchor: &mut Anchor, offset: Vec2) -> bool {
    match kind {
        GripKind::Combined | GripKind::Start => anchor.move_endpoint(SegmentEnd::Start, offset),
        GripKind::End => anchor.move_endpoint(SegmentEnd::End, offset),
        GripKind::AnchorPoint => anchor.move_anchor_point(offset),
    }
}
