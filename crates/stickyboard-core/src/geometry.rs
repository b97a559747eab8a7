//! Hit-testing used by the eraser tool.

use crate::model::{ShapeElement, ShapeKind};
use kurbo::Point;

/// Default eraser hit-test threshold in pixels.
pub const HIT_THRESHOLD: f64 = 10.0;

/// True if `point` lies within `threshold` of any vertex of the polyline.
///
/// This is a per-vertex test, not point-to-segment distance: a path captured
/// at coarse sampling can have gaps between vertices wider than the
/// threshold, which the eraser will fail to hit. Known limitation, kept
/// deliberately.
pub fn point_near_path(point: Point, points: &[Point], threshold: f64) -> bool {
    let threshold_sq = threshold * threshold;
    points.iter().any(|&vertex| {
        let dx = point.x - vertex.x;
        let dy = point.y - vertex.y;
        dx * dx + dy * dy <= threshold_sq
    })
}

/// True if `point` is within `threshold` of the shape.
///
/// Rectangles test against the bounding box inflated by `threshold` on each
/// side. Circles test proximity to the outline, not interior containment:
/// `|dist(point, center) - radius| <= threshold`.
pub fn point_near_shape(point: Point, shape: &ShapeElement, threshold: f64) -> bool {
    match shape.kind {
        ShapeKind::Rectangle => shape
            .bounding_box()
            .inflate(threshold, threshold)
            .contains(point),
        ShapeKind::Circle => {
            let dist = point.distance(shape.circle_center());
            (dist - shape.circle_radius()).abs() <= threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SerializableColor;
    use uuid::Uuid;

    fn shape(kind: ShapeKind, start: Point, end: Point) -> ShapeElement {
        ShapeElement {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            kind,
            start,
            end,
            color: SerializableColor::black(),
            stroke_width: 2.0,
        }
    }

    #[test]
    fn test_point_near_path_vertex() {
        let points = vec![Point::new(0.0, 0.0), Point::new(100.0, 100.0)];

        // Distance ~5.8 from the (100,100) vertex.
        assert!(point_near_path(Point::new(105.0, 103.0), &points, HIT_THRESHOLD));
        // Distance ~28.3, outside the threshold.
        assert!(!point_near_path(Point::new(120.0, 120.0), &points, HIT_THRESHOLD));
    }

    #[test]
    fn test_point_near_path_dead_zone_between_vertices() {
        // Two vertices 100px apart: the midpoint lies on the stroke but far
        // from either vertex, so the per-vertex test misses it.
        let points = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        assert!(!point_near_path(Point::new(50.0, 0.0), &points, HIT_THRESHOLD));
    }

    #[test]
    fn test_point_near_path_empty() {
        assert!(!point_near_path(Point::new(0.0, 0.0), &[], HIT_THRESHOLD));
    }

    #[test]
    fn test_rectangle_proximity() {
        let rect = shape(
            ShapeKind::Rectangle,
            Point::new(10.0, 10.0),
            Point::new(50.0, 40.0),
        );
        assert!(point_near_shape(Point::new(30.0, 25.0), &rect, HIT_THRESHOLD));
        assert!(point_near_shape(Point::new(55.0, 25.0), &rect, HIT_THRESHOLD));
        assert!(!point_near_shape(Point::new(75.0, 25.0), &rect, HIT_THRESHOLD));
    }

    #[test]
    fn test_circle_outline_proximity_not_containment() {
        // Center (30,25), radius 25.
        let circle = shape(
            ShapeKind::Circle,
            Point::new(10.0, 10.0),
            Point::new(50.0, 40.0),
        );
        // Center is 25px from the outline: not a hit.
        assert!(!point_near_shape(Point::new(30.0, 25.0), &circle, HIT_THRESHOLD));
        // On the outline.
        assert!(point_near_shape(Point::new(55.0, 25.0), &circle, HIT_THRESHOLD));
        // Just outside the outline, within threshold.
        assert!(point_near_shape(Point::new(62.0, 25.0), &circle, HIT_THRESHOLD));
        // Well outside.
        assert!(!point_near_shape(Point::new(70.0, 25.0), &circle, HIT_THRESHOLD));
    }
}
