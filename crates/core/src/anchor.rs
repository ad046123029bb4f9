//! Anchor entity data model
//!
//! An anchor is a line segment carrying a point constrained to it. The
//! anchor point is where its dependent annotation attaches. Anchors refer to
//! their annotation by id only; they never own it.
//!
//! Methods here mutate the anchor's own state. Gating, redraw marking and
//! annotation side effects belong to [`Session`](crate::session::Session).

use crate::config::LinkConfig;
use crate::geometry::{snap_half_turn, Segment, Tolerance};
use crate::scene::ObjectId;
use kurbo::{Affine, Point, Vec2};

/// Annotation state of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    /// No annotation; `note_ref` is empty
    None,
    /// The anchor has (or will get at the next pass) an annotation
    Annotated,
    /// Not yet initialized
    Undefined,
}

impl NoteKind {
    /// Human-readable label used by the property surface
    pub fn label(&self) -> &'static str {
        match self {
            NoteKind::None => "None",
            NoteKind::Annotated => "Has annotation",
            NoteKind::Undefined => "Undefined",
        }
    }

    /// Parse a property label back into a kind
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "None" => Some(NoteKind::None),
            "Has annotation" => Some(NoteKind::Annotated),
            _ => None,
        }
    }

    /// Integer code stored in persisted records
    pub fn code(&self) -> i64 {
        match self {
            NoteKind::None => 0,
            NoteKind::Annotated => 1,
            NoteKind::Undefined => i64::from(i32::MAX),
        }
    }

    /// Decode a persisted integer code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(NoteKind::None),
            1 => Some(NoteKind::Annotated),
            _ => None,
        }
    }
}

/// Which end of the anchor segment a handle drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentEnd {
    Start,
    End,
}

/// Primary editable object driving a dependent annotation
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    geometry: Segment,
    anchor_point: Point,
    name: String,
    note_kind: NoteKind,
    note_angle: f64,
    note_distance: f64,
    note_ref: Option<ObjectId>,
}

impl Anchor {
    /// Create an anchor at the origin with default values applied
    pub fn new(config: &LinkConfig) -> Self {
        let mut anchor = Self::uninitialized(config.default_note_distance());
        anchor.set_default_values(config);
        anchor
    }

    /// Create an anchor on a segment, anchor point at its midpoint
    pub fn with_segment(start: Point, end: Point, config: &LinkConfig) -> Self {
        let mut anchor = Self::new(config);
        anchor.set_segment(start, end);
        anchor
    }

    /// Anchor with `NoteKind::Undefined`, before defaults are applied
    pub(crate) fn uninitialized(note_distance: f64) -> Self {
        Self {
            geometry: Segment::degenerate(Point::ORIGIN),
            anchor_point: Point::ORIGIN,
            name: String::new(),
            note_kind: NoteKind::Undefined,
            note_angle: 0.0,
            note_distance,
            note_ref: None,
        }
    }

    /// Apply construction defaults
    ///
    /// This is the only place `NoteKind::Undefined` is left.
    pub fn set_default_values(&mut self, config: &LinkConfig) {
        self.name = config.default_name.clone();
        if self.note_kind == NoteKind::Undefined {
            self.note_kind = NoteKind::Annotated;
        }
    }

    pub fn geometry(&self) -> &Segment {
        &self.geometry
    }

    pub fn anchor_point(&self) -> Point {
        self.anchor_point
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn note_kind(&self) -> NoteKind {
        self.note_kind
    }

    /// Shelf direction, always `0` or `PI`
    pub fn note_angle(&self) -> f64 {
        self.note_angle
    }

    /// Signed shelf offset; the sign selects the side of the anchor line
    pub fn note_distance(&self) -> f64 {
        self.note_distance
    }

    pub fn note_ref(&self) -> Option<ObjectId> {
        self.note_ref
    }

    /// Place the anchor on two points, anchor point at the midpoint
    pub fn set_segment(&mut self, start: Point, end: Point) {
        self.geometry = Segment::new(start, end);
        self.anchor_point = self.geometry.midpoint();
    }

    /// Replace the geometry, holding the anchor point's parametric position
    ///
    /// Returns `true` if anything changed.
    pub fn apply_geometry(&mut self, segment: Segment) -> bool {
        let t = self.geometry.param_of(self.anchor_point);
        let anchor_point = segment.eval(t);
        let changed = segment != self.geometry || anchor_point != self.anchor_point;
        self.geometry = segment;
        self.anchor_point = anchor_point;
        changed
    }

    /// Move one end of the segment by `offset`
    pub fn move_endpoint(&mut self, end: SegmentEnd, offset: Vec2) -> bool {
        let segment = match end {
            SegmentEnd::Start => Segment::new(self.geometry.start() + offset, self.geometry.end()),
            SegmentEnd::End => Segment::new(self.geometry.start(), self.geometry.end() + offset),
        };
        self.apply_geometry(segment)
    }

    /// Move the anchor point by `offset`, clamped onto the segment
    pub fn move_anchor_point(&mut self, offset: Vec2) -> bool {
        let target = self.geometry.closest_point(self.anchor_point + offset);
        let changed = target != self.anchor_point;
        self.anchor_point = target;
        changed
    }

    /// Apply an affine transform to the whole anchor
    ///
    /// The anchor point is re-projected afterwards so it stays on the
    /// transformed segment even under rounding.
    pub fn transform(&mut self, affine: Affine) {
        let t = self.geometry.param_of(self.anchor_point);
        self.geometry = self.geometry.transform(affine);
        self.anchor_point = self.geometry.eval(t);
    }

    /// Segment length rounded to whole units, halves away from zero
    pub fn length(&self) -> f64 {
        self.geometry.length().round()
    }

    /// Extend or retract the end point along the current direction
    ///
    /// Holds the anchor point's parametric position. Returns `false` when
    /// `length` is not positive.
    pub fn set_length(&mut self, length: f64) -> bool {
        if !length.is_finite() || length <= 0.0 {
            return false;
        }
        let start = self.geometry.start();
        let end = start + self.geometry.direction() * length;
        self.apply_geometry(Segment::new(start, end));
        true
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if name == self.name {
            return false;
        }
        self.name = name;
        true
    }

    /// Change the annotation state
    ///
    /// Switching to `None` clears the reference and returns the annotation id
    /// that must now be erased. Switching to `Annotated` never creates the
    /// annotation; the next consistency pass does.
    pub fn set_note_kind(&mut self, kind: NoteKind) -> Option<ObjectId> {
        self.note_kind = kind;
        if kind == NoteKind::None {
            self.note_ref.take()
        } else {
            None
        }
    }

    /// Copy user attributes (name and annotation state) from another anchor
    ///
    /// Returns an annotation id to erase, as [`set_note_kind`](Self::set_note_kind).
    pub fn copy_attributes_from(&mut self, other: &Anchor) -> Option<ObjectId> {
        self.name = other.name.clone();
        self.set_note_kind(other.note_kind)
    }

    pub(crate) fn bind_note(&mut self, id: ObjectId) {
        self.note_ref = Some(id);
    }

    pub(crate) fn clear_note_ref(&mut self) -> Option<ObjectId> {
        self.note_ref.take()
    }

    /// Store shelf parameters read back from a dragged annotation
    pub(crate) fn set_shelf(&mut self, angle: f64, distance: f64) {
        self.note_angle = snap_half_turn(angle);
        self.note_distance = distance;
    }

    /// Restore persisted state verbatim (record reader only)
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        geometry: Segment,
        anchor_point: Point,
        name: String,
        note_kind: NoteKind,
        note_angle: f64,
        note_distance: f64,
        note_ref: Option<ObjectId>,
    ) -> Self {
        let anchor_point = geometry.closest_point(anchor_point);
        let note_ref = if note_kind == NoteKind::None {
            None
        } else {
            note_ref
        };
        Self {
            geometry,
            anchor_point,
            name,
            note_kind,
            note_angle: snap_half_turn(note_angle),
            note_distance,
            note_ref,
        }
    }

    /// Whether the anchor point lies on the segment within tolerance
    pub fn anchor_on_geometry(&self, tolerance: &Tolerance) -> bool {
        self.geometry.distance_to(self.anchor_point) <= tolerance.equal_point
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
