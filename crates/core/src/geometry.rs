//! Segment geometry for anchor entities
//!
//! Thin layer over `kurbo` providing the few operations the linkage engine
//! needs: parametric positions on a segment, projections, perpendiculars and
//! tolerance-aware point comparison. All coordinates are scene-space `f64`.

use kurbo::{Affine, Line, Point, Vec2};

/// Tolerance used when comparing points
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    /// Two points closer than this are considered equal
    pub equal_point: f64,
}

impl Tolerance {
    /// Create a tolerance with the given point-equality distance
    pub fn new(equal_point: f64) -> Self {
        Self { equal_point }
    }

    /// Check whether two points coincide within tolerance
    pub fn points_equal(&self, a: Point, b: Point) -> bool {
        a.distance(b) <= self.equal_point
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { equal_point: 1e-6 }
    }
}

/// Straight segment between two scene points
///
/// Degenerate segments (start == end) are legal; they report a `+X`
/// direction so that perpendicular offsets stay well defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    line: Line,
}

impl Segment {
    /// Create a segment from start to end
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            line: Line::new(start, end),
        }
    }

    /// Create a zero-length segment at a single point
    pub fn degenerate(at: Point) -> Self {
        Self::new(at, at)
    }

    pub fn start(&self) -> Point {
        self.line.p0
    }

    pub fn end(&self) -> Point {
        self.line.p1
    }

    /// Vector from start to end
    pub fn vector(&self) -> Vec2 {
        self.line.p1 - self.line.p0
    }

    pub fn length(&self) -> f64 {
        self.vector().hypot()
    }

    /// Check whether start and end coincide within tolerance
    pub fn is_degenerate(&self, tolerance: &Tolerance) -> bool {
        tolerance.points_equal(self.line.p0, self.line.p1)
    }

    /// Unit direction from start to end (`+X` for a zero-length segment)
    pub fn direction(&self) -> Vec2 {
        let v = self.vector();
        let len = v.hypot();
        if len <= f64::EPSILON {
            Vec2::new(1.0, 0.0)
        } else {
            v / len
        }
    }

    /// Direction rotated by +90 degrees
    pub fn perpendicular(&self) -> Vec2 {
        let d = self.direction();
        Vec2::new(-d.y, d.x)
    }

    pub fn midpoint(&self) -> Point {
        self.line.p0.midpoint(self.line.p1)
    }

    /// Parametric position of the closest point on the segment
    ///
    /// Result is clamped to `[0, 1]`. A zero-length segment reports `0.5`.
    pub fn param_of(&self, point: Point) -> f64 {
        let v = self.vector();
        let len_sq = v.hypot2();
        if len_sq <= f64::EPSILON * f64::EPSILON {
            return 0.5;
        }
        ((point - self.line.p0).dot(v) / len_sq).clamp(0.0, 1.0)
    }

    /// Point at parametric position `t` (0 = start, 1 = end)
    pub fn eval(&self, t: f64) -> Point {
        self.line.p0.lerp(self.line.p1, t)
    }

    /// Closest point on the segment to `point`
    pub fn closest_point(&self, point: Point) -> Point {
        self.eval(self.param_of(point))
    }

    /// Distance from `point` to the segment
    pub fn distance_to(&self, point: Point) -> f64 {
        self.closest_point(point).distance(point)
    }

    /// Apply an affine transform to both endpoints
    pub fn transform(&self, affine: Affine) -> Self {
        Self::new(affine * self.line.p0, affine * self.line.p1)
    }
}

/// Project a point onto the infinite line through `segment`
pub fn line_projection(segment: &Segment, point: Point) -> Point {
    let d = segment.direction();
    let along = (point - segment.start()).dot(d);
    segment.start() + d * along
}

/// Check whether `v` points the same way as `reference`
///
/// Zero-length vectors are treated as co-directional.
pub fn is_codirectional(v: Vec2, reference: Vec2) -> bool {
    v.dot(reference) >= 0.0
}

/// Snap an angle to the nearer of `0` and `PI`
pub fn snap_half_turn(angle: f64) -> f64 {
    if angle.cos() >= 0.0 {
        0.0
    } else {
        std::f64::consts::PI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_param_of_and_eval() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!((seg.param_of(Point::new(5.0, 3.0)) - 0.5).abs() < 1e-12);
        assert_eq!(seg.eval(0.25), Point::new(2.5, 0.0));
    }

    #[test]
    fn test_param_of_clamps_outside_segment() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_eq!(seg.param_of(Point::new(-5.0, 0.0)), 0.0);
        assert_eq!(seg.param_of(Point::new(25.0, 1.0)), 1.0);
    }

    #[test]
    fn test_degenerate_segment() {
        let seg = Segment::degenerate(Point::new(3.0, 4.0));
        let tol = Tolerance::default();
        assert!(seg.is_degenerate(&tol));
        assert_eq!(seg.param_of(Point::new(100.0, 0.0)), 0.5);
        assert_eq!(seg.direction(), Vec2::new(1.0, 0.0));
        assert_eq!(seg.closest_point(Point::new(9.0, 9.0)), Point::new(3.0, 4.0));
    }

    #[test]
    fn test_perpendicular_is_left_turn() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let perp = seg.perpendicular();
        assert!((perp.x).abs() < 1e-12);
        assert!((perp.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_line_projection_extends_past_endpoints() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let p = line_projection(&seg, Point::new(30.0, -7.0));
        assert!((p.x - 30.0).abs() < 1e-12);
        assert!(p.y.abs() < 1e-12);
    }

    #[test]
    fn test_snap_half_turn() {
        assert_eq!(snap_half_turn(0.3), 0.0);
        assert_eq!(snap_half_turn(-1.2), 0.0);
        assert_eq!(snap_half_turn(2.0), PI);
        assert_eq!(snap_half_turn(PI + 0.01), PI);
        assert_eq!(snap_half_turn(2.0 * PI - 0.1), 0.0);
    }

    #[test]
    fn test_transform_segment() {
        let seg = Segment::new(Point::new(1.0, 1.0), Point::new(2.0, 1.0));
        let moved = seg.transform(Affine::translate((5.0, -1.0)));
        assert_eq!(moved.start(), Point::new(6.0, 0.0));
        assert_eq!(moved.end(), Point::new(7.0, 0.0));
    }
}
