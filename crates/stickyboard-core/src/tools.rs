//! Tool system and pointer-driven interaction state machine.

use crate::board::BoardView;
use crate::eraser::EraserSelection;
use crate::geometry::HIT_THRESHOLD;
use crate::model::{NoteId, SerializableColor, ShapeKind, StrokeTool};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Radius of the eraser preview disc. The eraser draws nothing itself; it
/// only hit-tests and deletes.
pub const ERASER_PREVIEW_RADIUS: f64 = 10.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Pen,
    Brush,
    Eraser,
    Rectangle,
    Circle,
}

impl ToolKind {
    /// Stroke width policy: pen = 2, brush = 4. Shapes use the pen width.
    pub fn stroke_width(self) -> f64 {
        self.stroke_tool().map(StrokeTool::width).unwrap_or(2.0)
    }

    /// The stroke provenance recorded on persisted paths.
    pub fn stroke_tool(self) -> Option<StrokeTool> {
        match self {
            ToolKind::Pen => Some(StrokeTool::Pen),
            ToolKind::Brush => Some(StrokeTool::Brush),
            ToolKind::Eraser => Some(StrokeTool::Eraser),
            _ => None,
        }
    }

    fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            ToolKind::Rectangle => Some(ShapeKind::Rectangle),
            ToolKind::Circle => Some(ShapeKind::Circle),
            _ => None,
        }
    }
}

/// State of the active pointer gesture.
#[derive(Debug, Clone, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// Dragging a note with the select tool. `position` is the optimistic
    /// local position, not yet persisted.
    DraggingNote {
        id: NoteId,
        grab_offset: Vec2,
        position: Point,
    },
    /// Accumulating a pen/brush stroke.
    DrawingStroke { tool: StrokeTool, points: Vec<Point> },
    /// Dragging out a rectangle or circle.
    DrawingShape {
        kind: ShapeKind,
        start: Point,
        current: Point,
    },
    /// Eraser drag: transient trail for the preview plus the grow-only
    /// selection of elements to delete on release.
    Erasing {
        points: Vec<Point>,
        selection: EraserSelection,
    },
}

/// Result of a pointer-down, for the session to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDown {
    None,
    /// A note was picked with the select tool; the session selects it and
    /// raises it to the front.
    NotePicked(NoteId),
}

/// A completed gesture, to be persisted by the session.
#[derive(Debug, Clone)]
pub enum GestureCommit {
    /// A finished pen/brush stroke (always >= 2 points).
    Stroke {
        tool: StrokeTool,
        points: Vec<Point>,
        color: SerializableColor,
        stroke_width: f64,
    },
    /// A finished rectangle/circle.
    Shape {
        kind: ShapeKind,
        start: Point,
        end: Point,
        color: SerializableColor,
        stroke_width: f64,
    },
    /// Everything the eraser passed over, deleted as one batch.
    Erase(EraserSelection),
    /// Final position of a dragged note.
    NoteDrop { id: NoteId, position: Point },
}

/// Tracks the current tool and drives the gesture state machine.
///
/// Pointer handlers only mutate local state; all persistence happens in the
/// session when a gesture commits.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    pub current_tool: ToolKind,
    pub drawing_color: SerializableColor,
    state: InteractionState,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, InteractionState::Idle)
    }

    /// Switch tools. Any in-progress gesture is discarded uncommitted.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
        self.cancel();
    }

    /// Discard the in-progress gesture without committing anything.
    pub fn cancel(&mut self) {
        self.state = InteractionState::Idle;
    }

    /// Begin a gesture at `point`.
    pub fn pointer_down(&mut self, point: Point, view: &BoardView) -> PointerDown {
        match self.current_tool {
            ToolKind::Select => {
                if let Some(id) = view.note_at_point(point) {
                    let note_pos = view.notes[&id].position;
                    self.state = InteractionState::DraggingNote {
                        id,
                        grab_offset: point - note_pos,
                        position: note_pos,
                    };
                    PointerDown::NotePicked(id)
                } else {
                    PointerDown::None
                }
            }
            ToolKind::Pen | ToolKind::Brush => {
                self.state = InteractionState::DrawingStroke {
                    tool: self
                        .current_tool
                        .stroke_tool()
                        .unwrap_or(StrokeTool::Pen),
                    points: vec![point],
                };
                PointerDown::None
            }
            ToolKind::Eraser => {
                // Hit-test immediately at the down point.
                let selection = EraserSelection::new().observe(
                    point,
                    view.paths.values(),
                    view.shapes.values(),
                    HIT_THRESHOLD,
                );
                self.state = InteractionState::Erasing {
                    points: vec![point],
                    selection,
                };
                PointerDown::None
            }
            ToolKind::Rectangle | ToolKind::Circle => {
                let kind = self.current_tool.shape_kind().unwrap_or(ShapeKind::Rectangle);
                self.state = InteractionState::DrawingShape {
                    kind,
                    start: point,
                    current: point,
                };
                PointerDown::None
            }
        }
    }

    /// Continue the gesture. Returns the updated local note position when a
    /// note drag moved, so the session can feed the reconciler and the
    /// ephemeral channel.
    pub fn pointer_move(&mut self, point: Point, view: &BoardView) -> Option<(NoteId, Point)> {
        match &mut self.state {
            InteractionState::Idle => None,
            InteractionState::DraggingNote {
                id,
                grab_offset,
                position,
            } => {
                *position = point - *grab_offset;
                Some((*id, *position))
            }
            InteractionState::DrawingStroke { points, .. } => {
                points.push(point);
                None
            }
            InteractionState::DrawingShape { current, .. } => {
                *current = point;
                None
            }
            InteractionState::Erasing { points, selection } => {
                points.push(point);
                let grown = std::mem::take(selection).observe(
                    point,
                    view.paths.values(),
                    view.shapes.values(),
                    HIT_THRESHOLD,
                );
                *selection = grown;
                None
            }
        }
    }

    /// End the gesture, yielding what (if anything) should be persisted.
    pub fn pointer_up(&mut self, point: Point, view: &BoardView) -> Option<GestureCommit> {
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Idle => None,
            InteractionState::DraggingNote {
                id,
                grab_offset,
                position: _,
            } => Some(GestureCommit::NoteDrop {
                id,
                position: point - grab_offset,
            }),
            InteractionState::DrawingStroke { tool, mut points } => {
                if points.last() != Some(&point) {
                    points.push(point);
                }
                // A single click with no drag leaves no artifact.
                if points.len() < 2 {
                    return None;
                }
                Some(GestureCommit::Stroke {
                    tool,
                    points,
                    color: self.drawing_color,
                    stroke_width: self.current_tool.stroke_width(),
                })
            }
            InteractionState::DrawingShape { kind, start, .. } => Some(GestureCommit::Shape {
                kind,
                start,
                end: point,
                color: self.drawing_color,
                stroke_width: self.current_tool.stroke_width(),
            }),
            InteractionState::Erasing { selection, .. } => {
                let selection = selection.observe(
                    point,
                    view.paths.values(),
                    view.shapes.values(),
                    HIT_THRESHOLD,
                );
                Some(GestureCommit::Erase(selection))
            }
        }
    }
}
