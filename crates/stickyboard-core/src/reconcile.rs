//! Merge policy between local optimistic state and remote snapshots.
//!
//! While this client drags note N, a subscription may deliver a snapshot for
//! N carrying a stale pre-drag position; applying it naively makes the note
//! snap back under the user's pointer. The reconciler keeps in-flight local
//! positions in a side table keyed by note id and folds them over incoming
//! snapshots.
//!
//! Conflict model is last-writer-wins per field: concurrent edits to the
//! same field race and the store's write order decides silently. No version
//! counter, no conflict surfaced (see DESIGN.md).

use crate::board::BoardView;
use crate::model::{Note, NoteId, UserId};
use kurbo::Point;
use std::collections::HashMap;

/// Reconciles remote note updates against locally tracked drag positions.
#[derive(Debug, Clone)]
pub struct Reconciler {
    /// The local client's user id; updates attributed to it are suppressed.
    self_id: UserId,
    /// In-flight local positions, separate from authoritative snapshots.
    local_positions: HashMap<NoteId, Point>,
}

impl Reconciler {
    pub fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            local_positions: HashMap::new(),
        }
    }

    /// Start tracking a local drag of `id` from `position`.
    pub fn begin_drag(&mut self, id: NoteId, position: Point) {
        self.local_positions.insert(id, position);
    }

    /// Update the in-flight position while the drag continues.
    pub fn set_local_position(&mut self, id: NoteId, position: Point) {
        self.local_positions.insert(id, position);
    }

    /// Stop tracking `id` once the final position has been handed to the
    /// store; from then on snapshots are authoritative again.
    pub fn end_drag(&mut self, id: NoteId) {
        self.local_positions.remove(&id);
    }

    pub fn local_position(&self, id: NoteId) -> Option<Point> {
        self.local_positions.get(&id).copied()
    }

    pub fn is_dragging(&self, id: NoteId) -> bool {
        self.local_positions.contains_key(&id)
    }

    /// Apply a live position update from the ephemeral channel.
    ///
    /// Self-writes are suppressed: the local optimistic state is already
    /// authoritative for the dragger, and echoing its own updates back
    /// would fight the pointer. Updates from other clients are applied
    /// unless this client is itself dragging that note.
    pub fn apply_position_update(
        &mut self,
        view: &mut BoardView,
        id: NoteId,
        position: Point,
        author: UserId,
    ) {
        if author == self.self_id {
            return;
        }
        if self.is_dragging(id) {
            return;
        }
        if let Some(note) = view.notes.get_mut(&id) {
            note.position = position;
        }
    }

    /// Replace the note collection with a remote snapshot, merging
    /// field-by-field: content, color and z-order come from the snapshot;
    /// position is overridden by the locally tracked entry when one exists.
    pub fn apply_note_snapshot(&mut self, view: &mut BoardView, incoming: Vec<Note>) {
        let mut notes = HashMap::with_capacity(incoming.len());
        for mut note in incoming {
            if let Some(&local) = self.local_positions.get(&note.id) {
                note.position = local;
            }
            notes.insert(note.id, note);
        }
        // Drop local entries for notes that vanished remotely (deleted by
        // another client mid-drag).
        self.local_positions.retain(|id, _| notes.contains_key(id));
        view.notes = notes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SerializableColor;
    use uuid::Uuid;

    fn note(board: Uuid, x: f64, y: f64) -> Note {
        Note::new(board, Point::new(x, y))
    }

    #[test]
    fn test_snapshot_preserves_local_drag_position() {
        let board = Uuid::new_v4();
        let me = Uuid::new_v4();
        let mut view = BoardView::new();
        let mut rec = Reconciler::new(me);

        let n = note(board, 10.0, 10.0);
        let id = n.id;
        view.notes.insert(id, n.clone());

        rec.begin_drag(id, Point::new(10.0, 10.0));
        rec.set_local_position(id, Point::new(200.0, 300.0));

        // Stale snapshot arrives mid-drag with the pre-drag position but a
        // newer color and z.
        let mut stale = n;
        stale.color = SerializableColor::from_hex("#80deea");
        stale.z_index = 9;
        rec.apply_note_snapshot(&mut view, vec![stale]);

        let merged = &view.notes[&id];
        assert_eq!(merged.position, Point::new(200.0, 300.0));
        assert_eq!(merged.color, SerializableColor::from_hex("#80deea"));
        assert_eq!(merged.z_index, 9);
    }

    #[test]
    fn test_snapshot_position_wins_when_not_dragging() {
        let board = Uuid::new_v4();
        let mut view = BoardView::new();
        let mut rec = Reconciler::new(Uuid::new_v4());

        let n = note(board, 10.0, 10.0);
        let id = n.id;
        view.notes.insert(id, n.clone());

        let mut moved = n;
        moved.position = Point::new(77.0, 88.0);
        rec.apply_note_snapshot(&mut view, vec![moved]);

        assert_eq!(view.notes[&id].position, Point::new(77.0, 88.0));
    }

    #[test]
    fn test_self_write_suppressed_other_applied() {
        let board = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut view = BoardView::new();
        let mut rec = Reconciler::new(me);

        let n = note(board, 200.0, 300.0);
        let id = n.id;
        view.notes.insert(id, n);

        // An echo of our own write must not move the note.
        rec.apply_position_update(&mut view, id, Point::new(1.0, 1.0), me);
        assert_eq!(view.notes[&id].position, Point::new(200.0, 300.0));

        // A different client's update is applied.
        rec.apply_position_update(&mut view, id, Point::new(40.0, 50.0), other);
        assert_eq!(view.notes[&id].position, Point::new(40.0, 50.0));
    }

    #[test]
    fn test_remote_update_ignored_while_locally_dragging() {
        let board = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut view = BoardView::new();
        let mut rec = Reconciler::new(me);

        let n = note(board, 0.0, 0.0);
        let id = n.id;
        view.notes.insert(id, n);

        rec.begin_drag(id, Point::new(0.0, 0.0));
        rec.apply_position_update(&mut view, id, Point::new(500.0, 500.0), other);
        // Our drag owns the note for now.
        assert_eq!(view.notes[&id].position, Point::new(0.0, 0.0));

        rec.end_drag(id);
        rec.apply_position_update(&mut view, id, Point::new(500.0, 500.0), other);
        assert_eq!(view.notes[&id].position, Point::new(500.0, 500.0));
    }

    #[test]
    fn test_deleted_note_drops_local_entry() {
        let board = Uuid::new_v4();
        let mut view = BoardView::new();
        let mut rec = Reconciler::new(Uuid::new_v4());

        let n = note(board, 0.0, 0.0);
        let id = n.id;
        view.notes.insert(id, n);
        rec.begin_drag(id, Point::new(0.0, 0.0));

        // Another client deleted the note; the snapshot no longer carries it.
        rec.apply_note_snapshot(&mut view, vec![]);
        assert!(view.notes.is_empty());
        assert!(!rec.is_dragging(id));
    }
}
