//! Dependent annotation model
//!
//! An annotation is a leader note collapsed onto its anchor's attach point,
//! with a shelf ("rack") offset perpendicular to the anchor line. Its layout
//! is a pure function of the owning anchor; only the consistency pass writes
//! it, except for the shelf which the user may drag directly.

use crate::anchor::Anchor;
use crate::geometry::Tolerance;
use crate::scene::ObjectId;
use kurbo::Point;

/// Target positions of an annotation derived from its anchor
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationLayout {
    pub first_point: Point,
    pub second_point: Point,
    pub rack_point: Point,
    pub angle: f64,
    pub label: String,
}

impl AnnotationLayout {
    /// Compute the layout an anchor requires of its annotation
    ///
    /// Both leader points sit on the anchor point; the rack is offset along
    /// the anchor line's perpendicular by the signed note distance.
    pub fn for_anchor(anchor: &Anchor) -> Self {
        let attach = anchor.anchor_point();
        let rack_point = attach + anchor.geometry().perpendicular() * anchor.note_distance();
        Self {
            first_point: attach,
            second_point: attach,
            rack_point,
            angle: anchor.note_angle(),
            label: anchor.name().to_string(),
        }
    }
}

/// Leader annotation attached to an anchor
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    first_point: Point,
    second_point: Point,
    rack_point: Point,
    /// Shelf angle in radians
    angle: f64,
    label: String,
    /// Anchor this annotation reports to (its reactor)
    owner: Option<ObjectId>,
}

impl Annotation {
    /// Create an annotation collapsed at `at`, owned by `owner`
    pub fn new(at: Point, owner: ObjectId) -> Self {
        Self {
            first_point: at,
            second_point: at,
            rack_point: at,
            angle: 0.0,
            label: String::new(),
            owner: Some(owner),
        }
    }

    pub fn first_point(&self) -> Point {
        self.first_point
    }

    pub fn second_point(&self) -> Point {
        self.second_point
    }

    pub fn rack_point(&self) -> Point {
        self.rack_point
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    /// Whether this annotation lists `anchor` as its owner
    pub fn is_owned_by(&self, anchor: ObjectId) -> bool {
        self.owner == Some(anchor)
    }

    pub(crate) fn set_owner(&mut self, owner: ObjectId) {
        self.owner = Some(owner);
    }

    /// Write a layout, skipping fields that already match
    ///
    /// Angles within `angle_epsilon` of the target (same direction) are left
    /// alone. Returns `true` if any field was written.
    pub(crate) fn apply_layout(
        &mut self,
        layout: &AnnotationLayout,
        tolerance: &Tolerance,
        angle_epsilon: f64,
    ) -> bool {
        let mut changed = false;
        if !tolerance.points_equal(self.first_point, layout.first_point) {
            self.first_point = layout.first_point;
            changed = true;
        }
        if !tolerance.points_equal(self.second_point, layout.second_point) {
            self.second_point = layout.second_point;
            changed = true;
        }
        if !tolerance.points_equal(self.rack_point, layout.rack_point) {
            self.rack_point = layout.rack_point;
            changed = true;
        }
        let delta = self.angle - layout.angle;
        if delta.sin().abs() > angle_epsilon || delta.cos() < 0.0 {
            self.angle = layout.angle;
            changed = true;
        }
        if self.label != layout.label {
            self.label.clone_from(&layout.label);
            changed = true;
        }
        changed
    }

    /// Direct user edit of the shelf
    pub(crate) fn set_shelf(&mut self, rack_point: Point, angle: f64) {
        self.rack_point = rack_point;
        self.angle = angle;
    }

    pub(crate) fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    pub(crate) fn move_points(&mut self, first: Point, second: Point, rack: Point) {
        self.first_point = first;
        self.second_point = second;
        self.rack_point = rack;
    }
}
