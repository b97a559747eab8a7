//! Local view of one board's elements.

use crate::model::{DrawingPath, Note, NoteId, PathId, ShapeElement, ShapeId};
use kurbo::Point;
use std::collections::HashMap;

/// Approximate sticky-note footprint used for pointer picking.
/// The visual card is styled elsewhere; picking only needs a hit area.
pub const NOTE_WIDTH: f64 = 200.0;
pub const NOTE_HEIGHT: f64 = 150.0;

/// The merged, display-ready state of a board on this client.
///
/// Element collections mirror the latest remote snapshots (with in-flight
/// drag positions already folded in by the reconciler). Paths and shapes
/// keep insertion order for rendering; notes are ordered by z-index.
#[derive(Debug, Clone, Default)]
pub struct BoardView {
    pub notes: HashMap<NoteId, Note>,
    pub paths: HashMap<PathId, DrawingPath>,
    pub shapes: HashMap<ShapeId, ShapeElement>,
    path_order: Vec<PathId>,
    shape_order: Vec<ShapeId>,
}

impl BoardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the path collection from a remote snapshot, preserving the
    /// snapshot's order as render order.
    pub fn set_paths(&mut self, paths: Vec<DrawingPath>) {
        self.path_order = paths.iter().map(|p| p.id).collect();
        self.paths = paths.into_iter().map(|p| (p.id, p)).collect();
    }

    /// Replace the shape collection from a remote snapshot.
    pub fn set_shapes(&mut self, shapes: Vec<ShapeElement>) {
        self.shape_order = shapes.iter().map(|s| s.id).collect();
        self.shapes = shapes.into_iter().map(|s| (s.id, s)).collect();
    }

    /// Paths in render order (below notes).
    pub fn paths_ordered(&self) -> impl Iterator<Item = &DrawingPath> {
        self.path_order.iter().filter_map(|id| self.paths.get(id))
    }

    /// Shapes in render order (below notes).
    pub fn shapes_ordered(&self) -> impl Iterator<Item = &ShapeElement> {
        self.shape_order.iter().filter_map(|id| self.shapes.get(id))
    }

    /// Notes ordered by z-index ascending (back to front).
    pub fn notes_ordered(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.values().collect();
        notes.sort_by_key(|n| n.z_index);
        notes
    }

    /// The highest z-index currently assigned on this board.
    pub fn max_z(&self) -> i64 {
        self.notes.values().map(|n| n.z_index).max().unwrap_or(0)
    }

    /// Assign the note a fresh topmost z-index (`max + 1`, never reused) and
    /// return it. This is the only operation that changes z-order.
    pub fn bring_to_front(&mut self, id: NoteId) -> Option<i64> {
        let new_z = self.max_z() + 1;
        let note = self.notes.get_mut(&id)?;
        note.z_index = new_z;
        Some(new_z)
    }

    /// Topmost note whose card contains the point, if any.
    pub fn note_at_point(&self, point: Point) -> Option<NoteId> {
        self.notes_ordered()
            .iter()
            .rev()
            .find(|note| {
                point.x >= note.position.x
                    && point.x <= note.position.x + NOTE_WIDTH
                    && point.y >= note.position.y
                    && point.y <= note.position.y + NOTE_HEIGHT
            })
            .map(|note| note.id)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.paths.is_empty() && self.shapes.is_empty()
    }
}
