//! Pure geometry used by the deduplicator and both counters.
//!
//! Boxes are axis-aligned `x1,y1,x2,y2` in pixel space, points are
//! `nalgebra::Point2<f32>`. Nothing in here holds state.

use nalgebra::{Point2, Vector2};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{CountError, Result};

/// Tolerance (in pixels) for treating a point as lying on a polygon edge.
const EDGE_TOLERANCE: f32 = 1e-3;

/// Axis-aligned bounding box in top-left / bottom-right form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BBox { x1, y1, x2, y2 }
    }

    /// Build a box from any numeric tracker output (integer or float pixels).
    /// Returns `None` if a coordinate does not fit in an `f32`.
    pub fn from_xyxy<T: ToPrimitive>(x1: T, y1: T, x2: T, y2: T) -> Option<Self> {
        Some(BBox {
            x1: x1.to_f32()?,
            y1: y1.to_f32()?,
            x2: x2.to_f32()?,
            y2: y2.to_f32()?,
        })
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Area in px², zero for degenerate boxes.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.x1 < self.x2 && self.y1 < self.y2)
    }

    pub fn centroid(&self) -> Point2<f32> {
        centroid(self)
    }

    /// Area of the overlap with `other`, zero when disjoint.
    fn intersection_area(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Intersection over union of two boxes, in `[0, 1]`.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    let a_area = a.area();
    let b_area = b.area();
    if a_area <= 0.0 || b_area <= 0.0 {
        return 0.0;
    }

    let inter_area = a.intersection_area(b);
    if inter_area <= 0.0 {
        return 0.0;
    }

    inter_area / (a_area + b_area - inter_area)
}

/// Fraction of `small`'s own area covered by `big`. Not symmetric.
pub fn inside_ratio(small: &BBox, big: &BBox) -> f32 {
    let small_area = small.area();
    if small_area <= 0.0 {
        return 0.0;
    }

    small.intersection_area(big) / small_area
}

pub fn centroid(bbox: &BBox) -> Point2<f32> {
    Point2::new((bbox.x1 + bbox.x2) / 2.0, (bbox.y1 + bbox.y2) / 2.0)
}

/// Point-in-polygon test with the boundary counted as inside.
pub fn contains(roi: &Roi, point: &Point2<f32>) -> bool {
    let pts = roi.points();
    let n = pts.len();

    for i in 0..n {
        if on_segment(&pts[i], &pts[(i + 1) % n], point) {
            return true;
        }
    }

    // Even-odd ray cast towards +x.
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&pts[i], &pts[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Half-plane of `point` relative to `line`: sign of `dir × (point - start)`.
///
/// Points exactly on the line return `false`. Crossing totals depend on
/// this convention, so it must stay `> 0`.
pub fn side(line: &CrossingLine, point: &Point2<f32>) -> bool {
    cross(&line.direction(), &(point - line.start)) > 0.0
}

fn cross(a: &Vector2<f32>, b: &Vector2<f32>) -> f32 {
    a.x * b.y - a.y * b.x
}

fn on_segment(a: &Point2<f32>, b: &Point2<f32>, p: &Point2<f32>) -> bool {
    let ab = b - a;
    let len = ab.norm();
    if len == 0.0 {
        return (p - a).norm() <= EDGE_TOLERANCE;
    }
    if (cross(&ab, &(p - a)) / len).abs() > EDGE_TOLERANCE {
        return false;
    }
    p.x >= a.x.min(b.x) - EDGE_TOLERANCE
        && p.x <= a.x.max(b.x) + EDGE_TOLERANCE
        && p.y >= a.y.min(b.y) - EDGE_TOLERANCE
        && p.y <= a.y.max(b.y) + EDGE_TOLERANCE
}

fn orientation(a: &Point2<f32>, b: &Point2<f32>, c: &Point2<f32>) -> i8 {
    let v = cross(&(b - a), &(c - a));
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

fn segments_touch(p1: &Point2<f32>, p2: &Point2<f32>, q1: &Point2<f32>, q2: &Point2<f32>) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(p1, p2, q1))
        || (o2 == 0 && on_segment(p1, p2, q2))
        || (o3 == 0 && on_segment(q1, q2, p1))
        || (o4 == 0 && on_segment(q1, q2, p2))
}

/// A validated simple polygon. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    points: Vec<Point2<f32>>,
}

impl Roi {
    /// Validate `points` as a simple polygon.
    ///
    /// A trailing vertex equal to the first one (explicitly closed ring) is
    /// dropped. Fails with `InvalidConfiguration` on fewer than three
    /// vertices, non-finite coordinates, repeated consecutive vertices, zero
    /// area or self-intersection.
    pub fn new(mut points: Vec<Point2<f32>>) -> Result<Self> {
        if points.len() > 3 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return Err(CountError::config(format!(
                "ROI needs at least 3 points, got {}",
                points.len()
            )));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(CountError::config("ROI has non-finite coordinates"));
        }

        let n = points.len();
        for i in 0..n {
            if points[i] == points[(i + 1) % n] {
                return Err(CountError::config(format!("ROI vertex {} is repeated", i)));
            }
        }

        let roi = Roi { points };
        if roi.signed_area() == 0.0 {
            return Err(CountError::config("ROI has zero area"));
        }

        for i in 0..n {
            for j in (i + 1)..n {
                // Adjacent edges share a vertex by construction.
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                let (a1, a2) = (&roi.points[i], &roi.points[(i + 1) % n]);
                let (b1, b2) = (&roi.points[j], &roi.points[(j + 1) % n]);
                if segments_touch(a1, a2, b1, b2) {
                    return Err(CountError::config(format!(
                        "ROI is not a simple polygon: edge {} intersects edge {}",
                        i, j
                    )));
                }
            }
        }

        Ok(roi)
    }

    pub fn from_pairs(pairs: &[[f32; 2]]) -> Result<Self> {
        Roi::new(pairs.iter().map(|p| Point2::new(p[0], p[1])).collect())
    }

    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Shoelace area; positive for counter-clockwise vertex order.
    pub fn signed_area(&self) -> f32 {
        let n = self.points.len();
        let twice: f32 = (0..n)
            .map(|i| {
                let (a, b) = (&self.points[i], &self.points[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice / 2.0
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    pub fn contains(&self, point: &Point2<f32>) -> bool {
        contains(self, point)
    }
}

/// Infinite line through two distinct points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingLine {
    pub start: Point2<f32>,
    pub end: Point2<f32>,
}

impl CrossingLine {
    pub fn new(start: Point2<f32>, end: Point2<f32>) -> Result<Self> {
        if ![start.x, start.y, end.x, end.y].iter().all(|v| v.is_finite()) {
            return Err(CountError::config("crossing line has non-finite coordinates"));
        }
        if start == end {
            return Err(CountError::config("crossing line endpoints coincide"));
        }
        Ok(CrossingLine { start, end })
    }

    pub fn from_pairs(pairs: &[[f32; 2]; 2]) -> Result<Self> {
        CrossingLine::new(
            Point2::new(pairs[0][0], pairs[0][1]),
            Point2::new(pairs[1][0], pairs[1][1]),
        )
    }

    pub fn direction(&self) -> Vector2<f32> {
        self.end - self.start
    }

    pub fn side(&self, point: &Point2<f32>) -> bool {
        side(self, point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Roi {
        Roi::from_pairs(&[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]).unwrap()
    }

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = BBox::new(10.0, 10.0, 50.0, 60.0);
        let b = BBox::new(100.0, 100.0, 120.0, 130.0);

        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &b), 0.0);
        // Touching edges share no area.
        let c = BBox::new(50.0, 10.0, 90.0, 60.0);
        assert_eq!(iou(&a, &c), 0.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);

        // inter 50, union 150
        assert_relative_eq!(iou(&a, &b), 1.0 / 3.0, epsilon = 1e-6);
        assert_eq!(iou(&a, &b), iou(&b, &a));
    }

    #[test]
    fn test_iou_degenerate_box_is_zero() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let flat = BBox::new(2.0, 2.0, 8.0, 2.0);
        let inverted = BBox::new(8.0, 8.0, 2.0, 2.0);

        assert_eq!(iou(&a, &flat), 0.0);
        assert_eq!(iou(&inverted, &a), 0.0);
    }

    #[test]
    fn test_inside_ratio() {
        let small = BBox::new(20.0, 20.0, 30.0, 30.0);
        let big = BBox::new(0.0, 0.0, 100.0, 100.0);

        assert_eq!(inside_ratio(&small, &big), 1.0);
        assert_relative_eq!(inside_ratio(&big, &small), 0.01, epsilon = 1e-6);

        let half = BBox::new(90.0, 0.0, 110.0, 10.0);
        assert_relative_eq!(inside_ratio(&half, &big), 0.5, epsilon = 1e-6);

        let empty = BBox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(inside_ratio(&empty, &big), 0.0);
    }

    #[test]
    fn test_from_integer_coordinates() {
        let b = BBox::from_xyxy(10i32, 20, 30, 60).unwrap();
        assert_eq!(b, BBox::new(10.0, 20.0, 30.0, 60.0));
        assert_eq!(b.area(), 800.0);
        assert_eq!(b.centroid(), Point2::new(20.0, 40.0));
    }

    #[test]
    fn test_degenerate_box_centroid() {
        let b = BBox::new(40.0, 40.0, 40.0, 40.0);
        assert!(b.is_degenerate());
        assert_eq!(b.area(), 0.0);
        assert_eq!(centroid(&b), Point2::new(40.0, 40.0));
    }

    #[test]
    fn test_contains_boundary_inclusive() {
        let roi = square();

        assert!(roi.contains(&Point2::new(50.0, 50.0)));
        assert!(roi.contains(&Point2::new(0.0, 50.0)));
        assert!(roi.contains(&Point2::new(100.0, 100.0)));
        assert!(roi.contains(&Point2::new(50.0, 0.0)));
        assert!(!roi.contains(&Point2::new(150.0, 50.0)));
        assert!(!roi.contains(&Point2::new(-0.5, 50.0)));
    }

    #[test]
    fn test_contains_concave_polygon() {
        // U shape, notch between x=30..70 above y=40
        let roi = Roi::from_pairs(&[
            [0.0, 0.0],
            [100.0, 0.0],
            [100.0, 100.0],
            [70.0, 100.0],
            [70.0, 40.0],
            [30.0, 40.0],
            [30.0, 100.0],
            [0.0, 100.0],
        ])
        .unwrap();

        assert!(roi.contains(&Point2::new(15.0, 80.0)));
        assert!(roi.contains(&Point2::new(85.0, 80.0)));
        assert!(!roi.contains(&Point2::new(50.0, 80.0)));
        assert!(roi.contains(&Point2::new(50.0, 20.0)));
    }

    #[test]
    fn test_roi_rejects_malformed() {
        assert!(matches!(
            Roi::from_pairs(&[[0.0, 0.0], [1.0, 1.0]]),
            Err(CountError::InvalidConfiguration(_))
        ));
        // collinear
        assert!(Roi::from_pairs(&[[0.0, 0.0], [5.0, 5.0], [10.0, 10.0]]).is_err());
        // bow tie
        assert!(Roi::from_pairs(&[[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0]]).is_err());
        // repeated vertex
        assert!(Roi::from_pairs(&[[0.0, 0.0], [10.0, 0.0], [10.0, 0.0], [0.0, 10.0]]).is_err());
        assert!(Roi::from_pairs(&[[0.0, 0.0], [f32::NAN, 0.0], [0.0, 10.0]]).is_err());
    }

    #[test]
    fn test_roi_drops_closing_vertex() {
        let roi = Roi::from_pairs(&[
            [0.0, 0.0],
            [100.0, 0.0],
            [100.0, 100.0],
            [0.0, 100.0],
            [0.0, 0.0],
        ])
        .unwrap();
        assert_eq!(roi.points().len(), 4);
        assert_relative_eq!(roi.area(), 10_000.0);
    }

    #[test]
    fn test_side_convention() {
        let line = CrossingLine::from_pairs(&[[0.0, 400.0], [1000.0, 400.0]]).unwrap();

        assert!(!line.side(&Point2::new(500.0, 390.0)));
        assert!(line.side(&Point2::new(500.0, 410.0)));
        // exactly on the line
        assert!(!side(&line, &Point2::new(500.0, 400.0)));
        // beyond the segment ends the line is still infinite
        assert!(line.side(&Point2::new(5000.0, 410.0)));
    }

    #[test]
    fn test_line_rejects_coincident_points() {
        assert!(CrossingLine::from_pairs(&[[3.0, 3.0], [3.0, 3.0]]).is_err());
    }

    #[test]
    fn test_bbox_serde_as_array() {
        let b: BBox = serde_json::from_str("[1, 2, 3.5, 4]").unwrap();
        assert_eq!(b, BBox::new(1.0, 2.0, 3.5, 4.0));
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1.0,2.0,3.5,4.0]");
    }
}
