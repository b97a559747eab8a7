//! Eraser selection state.

use crate::geometry::{point_near_path, point_near_shape};
use crate::model::{DrawingPath, PathId, ShapeElement, ShapeId};
use kurbo::Point;
use std::collections::BTreeSet;

/// The set of paths and shapes marked for deletion during one eraser drag.
///
/// Grow-only by construction: the public API can add hits but never remove
/// them, so moving the eraser away from an element does not un-select it.
/// Cleared only by starting a new drag or committing (which consumes it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EraserSelection {
    paths: BTreeSet<PathId>,
    shapes: BTreeSet<ShapeId>,
}

impl EraserSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the selection with a hit-test at `point`: state in, event in,
    /// state out. Every element within `threshold` is absorbed.
    pub fn observe<'a>(
        mut self,
        point: Point,
        paths: impl IntoIterator<Item = &'a DrawingPath>,
        shapes: impl IntoIterator<Item = &'a ShapeElement>,
        threshold: f64,
    ) -> Self {
        for path in paths {
            if point_near_path(point, &path.points, threshold) {
                self.paths.insert(path.id);
            }
        }
        for shape in shapes {
            if point_near_shape(point, shape, threshold) {
                self.shapes.insert(shape.id);
            }
        }
        self
    }

    pub fn contains_path(&self, id: PathId) -> bool {
        self.paths.contains(&id)
    }

    pub fn contains_shape(&self, id: ShapeId) -> bool {
        self.shapes.contains(&id)
    }

    pub fn path_ids(&self) -> impl Iterator<Item = PathId> + '_ {
        self.paths.iter().copied()
    }

    pub fn shape_ids(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.shapes.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len() + self.shapes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::HIT_THRESHOLD;
    use crate::model::{SerializableColor, ShapeKind, StrokeTool};
    use uuid::Uuid;

    fn path_through(points: Vec<Point>) -> DrawingPath {
        DrawingPath {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            points,
            color: SerializableColor::black(),
            stroke_width: 2.0,
            tool: StrokeTool::Pen,
        }
    }

    #[test]
    fn test_selection_grows_and_never_shrinks() {
        let p1 = path_through(vec![Point::new(100.0, 100.0), Point::new(110.0, 100.0)]);
        let p2 = path_through(vec![Point::new(500.0, 500.0)]);
        let shape = ShapeElement {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            kind: ShapeKind::Rectangle,
            start: Point::new(90.0, 90.0),
            end: Point::new(120.0, 120.0),
            color: SerializableColor::black(),
            stroke_width: 2.0,
        };

        let sel = EraserSelection::new().observe(
            Point::new(105.0, 103.0),
            [&p1, &p2],
            [&shape],
            HIT_THRESHOLD,
        );
        assert!(sel.contains_path(p1.id));
        assert!(sel.contains_shape(shape.id));
        assert!(!sel.contains_path(p2.id));

        // Moving far away adds nothing and removes nothing.
        let sel = sel.observe(Point::new(900.0, 900.0), [&p1, &p2], [&shape], HIT_THRESHOLD);
        assert!(sel.contains_path(p1.id));
        assert!(sel.contains_shape(shape.id));
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn test_observe_is_idempotent_per_element() {
        let p1 = path_through(vec![Point::new(0.0, 0.0)]);
        let no_shapes: Vec<&ShapeElement> = Vec::new();
        let sel = EraserSelection::new()
            .observe(Point::new(1.0, 1.0), [&p1], no_shapes.clone(), HIT_THRESHOLD)
            .observe(Point::new(2.0, 2.0), [&p1], no_shapes, HIT_THRESHOLD);
        assert_eq!(sel.len(), 1);
    }
}
