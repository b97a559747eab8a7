//! Live board session: wires the interaction state machine to the document
//! store, the reconciler and the ephemeral channel.
//!
//! Pointer handlers mutate local state and publish ephemeral motion; nothing
//! touches the store until a gesture commits. Failed writes are logged and
//! the local view is left as-is; the next snapshot settles the difference.

use crate::board::BoardView;
use crate::boards;
use crate::ephemeral::{EphemeralEvent, EphemeralStore};
use crate::identity::UserIdentity;
use crate::model::{
    BoardId, CursorEntry, DrawingPath, Note, NoteId, PresenceEntry, SerializableColor,
    ShapeElement, UserId,
};
use crate::reconcile::Reconciler;
use crate::store::{CollectionKind, DocumentStore, StoreError, SubscriptionId};
use crate::throttle::MotionPublisher;
use crate::tools::{GestureCommit, InteractionController, InteractionState, PointerDown, ToolKind};
use kurbo::Point;
use serde_json::json;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// One user's live connection to one board.
pub struct BoardSession<S: DocumentStore, E: EphemeralStore> {
    store: S,
    ephemeral: E,
    board_id: BoardId,
    user: UserIdentity,
    view: BoardView,
    controller: InteractionController,
    reconciler: Reconciler,
    /// Throttles live note positions during a drag.
    motion: MotionPublisher,
    /// Throttles cursor broadcasts, independently of any gesture.
    cursor_gate: MotionPublisher,
    subscriptions: Vec<SubscriptionId>,
    selected_note: Option<NoteId>,
    cursors: HashMap<UserId, CursorEntry>,
    presence: Vec<PresenceEntry>,
    left: bool,
}

impl<S: DocumentStore, E: EphemeralStore> BoardSession<S, E> {
    /// Join a board: subscribe to its three element collections and announce
    /// presence on the ephemeral channel.
    pub fn join(
        mut store: S,
        mut ephemeral: E,
        board_id: BoardId,
        user: UserIdentity,
    ) -> Result<Self, StoreError> {
        let subscriptions = vec![
            store.subscribe(board_id, CollectionKind::Notes)?,
            store.subscribe(board_id, CollectionKind::Paths)?,
            store.subscribe(board_id, CollectionKind::Shapes)?,
        ];
        ephemeral.announce(user.id, &user.name);
        let reconciler = Reconciler::new(user.id);
        Ok(Self {
            store,
            ephemeral,
            board_id,
            user,
            view: BoardView::new(),
            controller: InteractionController::new(),
            reconciler,
            motion: MotionPublisher::new(),
            cursor_gate: MotionPublisher::new(),
            subscriptions,
            selected_note: None,
            cursors: HashMap::new(),
            presence: Vec::new(),
            left: false,
        })
    }

    pub fn view(&self) -> &BoardView {
        &self.view
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn current_tool(&self) -> ToolKind {
        self.controller.current_tool
    }

    pub fn selected_note(&self) -> Option<NoteId> {
        self.selected_note
    }

    pub fn set_drawing_color(&mut self, color: SerializableColor) {
        self.controller.drawing_color = color;
    }

    pub fn drawing_color(&self) -> SerializableColor {
        self.controller.drawing_color
    }

    /// The in-progress gesture, for rendering the transient overlay.
    pub fn interaction(&self) -> &InteractionState {
        self.controller.state()
    }

    /// Peer cursors, never including this client's own.
    pub fn cursors(&self) -> impl Iterator<Item = &CursorEntry> {
        self.cursors.values()
    }

    /// Participants other than this client.
    pub fn peers(&self) -> impl Iterator<Item = &PresenceEntry> {
        let me = self.user.id;
        self.presence.iter().filter(move |p| p.user_id != me)
    }

    /// Switch tools. Leaving the select tool drops the note selection, so a
    /// drawing tool can never act on a selected note.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool != ToolKind::Select {
            self.selected_note = None;
        }
        self.controller.set_tool(tool);
    }

    /// Begin a pointer gesture. Picking a note selects it and raises it to
    /// the front, with the new z-index persisted immediately.
    pub fn pointer_down(&mut self, point: Point) {
        match self.controller.pointer_down(point, &self.view) {
            PointerDown::NotePicked(id) => {
                self.selected_note = Some(id);
                if let Some(position) = self.view.notes.get(&id).map(|n| n.position) {
                    self.reconciler.begin_drag(id, position);
                }
                if let Some(z) = self.view.bring_to_front(id) {
                    let patch = json!({ "zIndex": z, "lastEditor": self.user.id.to_string() });
                    if let Err(e) = self.store.update(self.board_id, CollectionKind::Notes, id, patch)
                    {
                        log::warn!("z-index write failed for note {}: {}", id, e);
                    }
                }
            }
            PointerDown::None => {
                if self.controller.current_tool == ToolKind::Select {
                    self.selected_note = None;
                }
            }
        }
    }

    /// Continue the gesture and broadcast throttled cursor/motion updates.
    pub fn pointer_move(&mut self, point: Point, now: Instant) {
        if self.cursor_gate.offer(point, now) {
            self.ephemeral.set_cursor(point);
        }
        if let Some((id, position)) = self.controller.pointer_move(point, &self.view) {
            self.reconciler.set_local_position(id, position);
            if let Some(note) = self.view.notes.get_mut(&id) {
                note.position = position;
            }
            if self.motion.offer(position, now) {
                self.ephemeral.publish_note_position(id, position);
            }
        }
    }

    /// End the gesture and persist whatever it produced.
    pub fn pointer_up(&mut self, point: Point) {
        let Some(commit) = self.controller.pointer_up(point, &self.view) else {
            return;
        };
        match commit {
            GestureCommit::Stroke {
                tool,
                points,
                color,
                stroke_width,
            } => {
                let path = DrawingPath {
                    id: Uuid::new_v4(),
                    board_id: self.board_id,
                    points,
                    color,
                    stroke_width,
                    tool,
                };
                self.persist_create(CollectionKind::Paths, path.id, path.to_document());
            }
            GestureCommit::Shape {
                kind,
                start,
                end,
                color,
                stroke_width,
            } => {
                let shape = ShapeElement {
                    id: Uuid::new_v4(),
                    board_id: self.board_id,
                    kind,
                    start,
                    end,
                    color,
                    stroke_width,
                };
                self.persist_create(CollectionKind::Shapes, shape.id, shape.to_document());
            }
            GestureCommit::Erase(selection) => {
                if selection.is_empty() {
                    return;
                }
                let targets: Vec<(CollectionKind, Uuid)> = selection
                    .path_ids()
                    .map(|id| (CollectionKind::Paths, id))
                    .chain(selection.shape_ids().map(|id| (CollectionKind::Shapes, id)))
                    .collect();
                match self.store.batch_delete(self.board_id, &targets) {
                    Ok(()) => {
                        for id in selection.path_ids() {
                            self.view.paths.remove(&id);
                        }
                        for id in selection.shape_ids() {
                            self.view.shapes.remove(&id);
                        }
                        self.touch();
                    }
                    Err(e) => log::warn!("erase batch failed: {}", e),
                }
            }
            GestureCommit::NoteDrop { id, position } => {
                if let Some(note) = self.view.notes.get_mut(&id) {
                    note.position = position;
                }
                // The final position bypasses the throttle.
                self.ephemeral.publish_note_position(id, position);
                self.motion.reset();
                let patch = json!({
                    "position": { "x": position.x, "y": position.y },
                    "lastEditor": self.user.id.to_string(),
                });
                match self.store.update(self.board_id, CollectionKind::Notes, id, patch) {
                    Ok(()) => self.touch(),
                    Err(e) => log::warn!("note drop write failed for {}: {}", id, e),
                }
                self.reconciler.end_drag(id);
            }
        }
    }

    /// Create a sticky note at `position` with the default color.
    pub fn add_note(&mut self, position: Point) -> NoteId {
        let mut note = Note::new(self.board_id, position);
        note.z_index = self.view.max_z() + 1;
        note.last_editor = Some(self.user.id);
        let id = note.id;
        match self
            .store
            .create(self.board_id, CollectionKind::Notes, id, note.to_document())
        {
            Ok(()) => {
                self.view.notes.insert(id, note);
                self.touch();
            }
            Err(e) => log::warn!("note create failed: {}", e),
        }
        id
    }

    pub fn set_note_content(&mut self, id: NoteId, content: &str) {
        if let Some(note) = self.view.notes.get_mut(&id) {
            note.content = content.to_string();
            note.last_editor = Some(self.user.id);
        }
        let patch = json!({ "content": content, "lastEditor": self.user.id.to_string() });
        match self.store.update(self.board_id, CollectionKind::Notes, id, patch) {
            Ok(()) => self.touch(),
            Err(e) => log::warn!("note content write failed for {}: {}", id, e),
        }
    }

    pub fn set_note_color(&mut self, id: NoteId, color: SerializableColor) {
        if let Some(note) = self.view.notes.get_mut(&id) {
            note.color = color;
            note.last_editor = Some(self.user.id);
        }
        let patch = json!({ "color": color.to_hex(), "lastEditor": self.user.id.to_string() });
        match self.store.update(self.board_id, CollectionKind::Notes, id, patch) {
            Ok(()) => self.touch(),
            Err(e) => log::warn!("note color write failed for {}: {}", id, e),
        }
    }

    pub fn delete_note(&mut self, id: NoteId) {
        match self.store.delete(self.board_id, CollectionKind::Notes, id) {
            Ok(()) => {
                self.view.notes.remove(&id);
                if self.selected_note == Some(id) {
                    self.selected_note = None;
                }
                self.reconciler.end_drag(id);
                self.touch();
            }
            Err(e) => log::warn!("note delete failed for {}: {}", id, e),
        }
    }

    /// Drain store snapshots and ephemeral events into the local view.
    pub fn poll(&mut self) {
        for snapshot in self.store.poll() {
            match snapshot.kind {
                CollectionKind::Notes => {
                    let incoming: Vec<Note> = snapshot
                        .documents
                        .iter()
                        .map(|(id, doc)| Note::from_document(*id, self.board_id, doc))
                        .collect();
                    self.reconciler.apply_note_snapshot(&mut self.view, incoming);
                    if let Some(selected) = self.selected_note {
                        if !self.view.notes.contains_key(&selected) {
                            self.selected_note = None;
                        }
                    }
                }
                CollectionKind::Paths => {
                    let paths: Vec<DrawingPath> = snapshot
                        .documents
                        .iter()
                        .filter_map(|(id, doc)| DrawingPath::from_document(*id, self.board_id, doc))
                        .collect();
                    self.view.set_paths(paths);
                }
                CollectionKind::Shapes => {
                    let shapes: Vec<ShapeElement> = snapshot
                        .documents
                        .iter()
                        .filter_map(|(id, doc)| {
                            ShapeElement::from_document(*id, self.board_id, doc)
                        })
                        .collect();
                    self.view.set_shapes(shapes);
                }
            }
        }

        for event in self.ephemeral.poll() {
            match event {
                EphemeralEvent::Presence(roster) => self.presence = roster,
                EphemeralEvent::Cursor(entry) => {
                    if entry.user_id != self.user.id {
                        self.cursors.insert(entry.user_id, entry);
                    }
                }
                EphemeralEvent::NotePosition {
                    note,
                    position,
                    author,
                } => {
                    self.reconciler
                        .apply_position_update(&mut self.view, note, position, author);
                }
                EphemeralEvent::PeerLeft(user) => {
                    self.cursors.remove(&user);
                }
            }
        }
    }

    /// Leave the board cleanly: tear down subscriptions and withdraw
    /// presence. Dropping the session does the same.
    pub fn leave(&mut self) {
        if self.left {
            return;
        }
        self.left = true;
        for sub in std::mem::take(&mut self.subscriptions) {
            self.store.unsubscribe(sub);
        }
        self.ephemeral.remove_own();
    }

    fn persist_create(&mut self, kind: CollectionKind, id: Uuid, doc: serde_json::Value) {
        match self.store.create(self.board_id, kind, id, doc) {
            Ok(()) => self.touch(),
            Err(e) => log::warn!("element create failed for {}: {}", id, e),
        }
    }

    fn touch(&mut self) {
        if let Err(e) = boards::touch_board(&mut self.store, self.board_id) {
            log::debug!("board timestamp bump failed: {}", e);
        }
    }
}

impl<S: DocumentStore, E: EphemeralStore> Drop for BoardSession<S, E> {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeral::{MemoryEphemeral, MemoryEphemeralHub};
    use crate::store::{MemoryStore, MemoryStoreHub};
    use std::time::Duration;

    type TestSession = BoardSession<MemoryStore, MemoryEphemeral>;

    struct Rig {
        store_hub: MemoryStoreHub,
        ephemeral_hub: MemoryEphemeralHub,
        board: BoardId,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                store_hub: MemoryStoreHub::new(),
                ephemeral_hub: MemoryEphemeralHub::new(),
                board: Uuid::new_v4(),
            }
        }

        fn join(&self, name: &str) -> TestSession {
            let user = UserIdentity {
                id: Uuid::new_v4(),
                name: name.to_string(),
            };
            BoardSession::join(
                self.store_hub.client(),
                self.ephemeral_hub.client(),
                self.board,
                user,
            )
            .unwrap()
        }
    }

    fn later(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_note_created_by_one_client_reaches_the_other() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        let id = a.add_note(Point::new(50.0, 60.0));
        b.poll();

        let note = &b.view().notes[&id];
        assert_eq!(note.position, Point::new(50.0, 60.0));
        assert_eq!(note.color, SerializableColor::note_yellow());
        assert_eq!(note.z_index, 1);
    }

    #[test]
    fn test_picking_a_note_raises_and_persists_z() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        let low = a.add_note(Point::new(0.0, 0.0));
        let high = a.add_note(Point::new(300.0, 0.0));
        a.poll();

        // Pick the older, lower note.
        a.pointer_down(Point::new(10.0, 10.0));
        assert_eq!(a.selected_note(), Some(low));
        a.pointer_up(Point::new(10.0, 10.0));

        b.poll();
        assert!(b.view().notes[&low].z_index > b.view().notes[&high].z_index);
    }

    #[test]
    fn test_drag_suppresses_snapshot_snap_back() {
        let rig = Rig::new();
        let mut a = rig.join("ana");

        let id = a.add_note(Point::new(100.0, 100.0));
        a.poll();

        let t0 = Instant::now();
        a.pointer_down(Point::new(110.0, 110.0));
        a.pointer_move(Point::new(210.0, 310.0), t0);
        // Our own z-index write comes back as a snapshot mid-drag, carrying
        // the stale persisted position.
        a.poll();
        assert_eq!(a.view().notes[&id].position, Point::new(200.0, 300.0));

        a.pointer_up(Point::new(210.0, 310.0));
        a.poll();
        assert_eq!(a.view().notes[&id].position, Point::new(200.0, 300.0));
    }

    #[test]
    fn test_live_drag_reaches_peer_through_ephemeral_only() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        let id = a.add_note(Point::new(100.0, 100.0));
        b.poll();

        let t0 = Instant::now();
        a.pointer_down(Point::new(110.0, 110.0));
        a.pointer_move(Point::new(160.0, 160.0), later(t0, 60));
        b.poll();
        // The move is visible to the peer before any position write lands.
        assert_eq!(b.view().notes[&id].position, Point::new(150.0, 150.0));

        a.pointer_up(Point::new(210.0, 210.0));
        b.poll();
        assert_eq!(b.view().notes[&id].position, Point::new(200.0, 200.0));
    }

    #[test]
    fn test_rapid_moves_are_throttled_on_the_wire() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        let id = a.add_note(Point::new(0.0, 0.0));
        b.poll();

        let t0 = Instant::now();
        a.pointer_down(Point::new(10.0, 10.0));
        // A burst of moves inside one throttle window.
        for i in 1..=20 {
            a.pointer_move(Point::new(10.0 + i as f64, 10.0), later(t0, i));
        }

        let live_updates = b
            .ephemeral_events_for_test()
            .into_iter()
            .filter(|e| matches!(e, EphemeralEvent::NotePosition { .. }))
            .count();
        assert!(live_updates <= 2, "got {} live updates", live_updates);
        let _ = id;
    }

    #[test]
    fn test_pen_stroke_persists_with_tool_width() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        a.set_tool(ToolKind::Brush);
        let t0 = Instant::now();
        a.pointer_down(Point::new(0.0, 0.0));
        a.pointer_move(Point::new(10.0, 10.0), t0);
        a.pointer_up(Point::new(20.0, 20.0));

        b.poll();
        let path = b.view().paths_ordered().next().unwrap();
        assert_eq!(path.points.len(), 3);
        assert!((path.stroke_width - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_erase_commits_one_batch() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        // A draws two strokes and a rectangle.
        let t0 = Instant::now();
        a.set_tool(ToolKind::Pen);
        a.pointer_down(Point::new(100.0, 100.0));
        a.pointer_up(Point::new(110.0, 100.0));
        a.pointer_down(Point::new(500.0, 500.0));
        a.pointer_up(Point::new(510.0, 500.0));
        a.set_tool(ToolKind::Rectangle);
        a.pointer_down(Point::new(90.0, 90.0));
        a.pointer_up(Point::new(120.0, 120.0));
        a.poll();
        b.poll();
        assert_eq!(b.view().paths.len(), 2);
        assert_eq!(b.view().shapes.len(), 1);

        // B erases across the clustered elements, missing the far stroke.
        b.set_tool(ToolKind::Eraser);
        b.pointer_down(Point::new(105.0, 100.0));
        b.pointer_move(Point::new(107.0, 102.0), t0);
        b.pointer_up(Point::new(110.0, 105.0));

        a.poll();
        assert_eq!(a.view().paths.len(), 1);
        assert!(a.view().shapes.is_empty());
        assert_eq!(
            a.view().paths_ordered().next().unwrap().points[0],
            Point::new(500.0, 500.0)
        );
    }

    #[test]
    fn test_tool_switch_clears_selection() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        a.add_note(Point::new(0.0, 0.0));
        a.poll();
        a.pointer_down(Point::new(10.0, 10.0));
        a.pointer_up(Point::new(10.0, 10.0));
        assert!(a.selected_note().is_some());

        a.set_tool(ToolKind::Pen);
        assert!(a.selected_note().is_none());
    }

    #[test]
    fn test_note_edits_propagate() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        let id = a.add_note(Point::new(0.0, 0.0));
        a.set_note_content(id, "ship it");
        a.set_note_color(id, SerializableColor::from_hex("#80deea"));

        b.poll();
        let note = &b.view().notes[&id];
        assert_eq!(note.content, "ship it");
        assert_eq!(note.color, SerializableColor::from_hex("#80deea"));
    }

    #[test]
    fn test_remote_delete_clears_selection() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");

        let id = a.add_note(Point::new(0.0, 0.0));
        b.poll();
        b.pointer_down(Point::new(10.0, 10.0));
        b.pointer_up(Point::new(10.0, 10.0));
        assert_eq!(b.selected_note(), Some(id));

        a.delete_note(id);
        b.poll();
        assert!(b.view().notes.is_empty());
        assert!(b.selected_note().is_none());
    }

    #[test]
    fn test_leave_withdraws_presence_and_cursor() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let mut b = rig.join("ben");
        a.poll();
        b.poll();
        assert_eq!(a.peers().count(), 1);

        let t0 = Instant::now();
        b.pointer_move(Point::new(5.0, 5.0), t0);
        a.poll();
        assert_eq!(a.cursors().count(), 1);

        b.leave();
        a.poll();
        assert_eq!(a.peers().count(), 0);
        assert_eq!(a.cursors().count(), 0);
    }

    #[test]
    fn test_failed_write_keeps_local_state() {
        let rig = Rig::new();
        let mut a = rig.join("ana");
        let id = a.add_note(Point::new(100.0, 100.0));
        a.poll();

        rig.store_hub.set_fail_writes(true);
        let t0 = Instant::now();
        a.pointer_down(Point::new(110.0, 110.0));
        a.pointer_move(Point::new(210.0, 310.0), t0);
        a.pointer_up(Point::new(210.0, 310.0));

        // The drop write failed; the optimistic position stays put.
        assert_eq!(a.view().notes[&id].position, Point::new(200.0, 300.0));
    }

    impl BoardSession<MemoryStore, MemoryEphemeral> {
        /// Drain the raw ephemeral feed, bypassing session bookkeeping.
        fn ephemeral_events_for_test(&mut self) -> Vec<EphemeralEvent> {
            self.ephemeral.poll()
        }
    }
}
