//! Display-list construction.
//!
//! [`SceneRecorder`] flattens a frame into an ordered list of [`DrawOp`]s.
//! Backends replay the list; tests assert on it directly. Ordering is part
//! of the contract: paths and shapes in snapshot order, then the transient
//! gesture, then the eraser preview, then notes back-to-front, then peer
//! cursors topmost.

use crate::renderer::{RenderContext, Renderer};
use kurbo::{Point, Rect};
use stickyboard_core::board::{NOTE_HEIGHT, NOTE_WIDTH};
use stickyboard_core::model::{DrawingPath, SerializableColor, ShapeElement, ShapeKind};
use stickyboard_core::tools::{InteractionState, ERASER_PREVIEW_RADIUS};

/// Width added to a stroke when the eraser has marked it for deletion.
const ERASER_HIGHLIGHT_BOOST: f64 = 2.0;

/// One drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Polyline {
        points: Vec<Point>,
        color: SerializableColor,
        width: f64,
    },
    RectOutline {
        rect: Rect,
        color: SerializableColor,
        width: f64,
    },
    CircleOutline {
        center: Point,
        radius: f64,
        color: SerializableColor,
        width: f64,
    },
    /// Filled disc, used for the eraser preview.
    Disc {
        center: Point,
        radius: f64,
        color: SerializableColor,
    },
    NoteCard {
        rect: Rect,
        fill: SerializableColor,
        content: String,
        selected: bool,
    },
    CursorMarker { position: Point, label: String },
}

/// Records a frame as a replayable display list.
#[derive(Debug, Default)]
pub struct SceneRecorder {
    ops: Vec<DrawOp>,
}

impl SceneRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    fn push_path(&mut self, path: &DrawingPath, marked: bool, highlight: SerializableColor) {
        let (color, width) = if marked {
            (highlight, path.stroke_width + ERASER_HIGHLIGHT_BOOST)
        } else {
            (path.color, path.stroke_width)
        };
        self.ops.push(DrawOp::Polyline {
            points: path.points.clone(),
            color,
            width,
        });
    }

    fn push_shape(&mut self, shape: &ShapeElement, marked: bool, highlight: SerializableColor) {
        let (color, width) = if marked {
            (highlight, shape.stroke_width + ERASER_HIGHLIGHT_BOOST)
        } else {
            (shape.color, shape.stroke_width)
        };
        match shape.kind {
            ShapeKind::Rectangle => self.ops.push(DrawOp::RectOutline {
                rect: shape.bounding_box(),
                color,
                width,
            }),
            ShapeKind::Circle => self.ops.push(DrawOp::CircleOutline {
                center: shape.circle_center(),
                radius: shape.circle_radius(),
                color,
                width,
            }),
        }
    }
}

impl Renderer for SceneRecorder {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.ops.clear();

        let hl = ctx.highlight_color.to_rgba8();
        let highlight = SerializableColor::new(hl.r, hl.g, hl.b, hl.a);
        let eraser = match ctx.interaction {
            InteractionState::Erasing { points, selection } => {
                Some((points.last().copied(), selection))
            }
            _ => None,
        };

        // Persisted strokes and shapes, below everything else.
        for path in ctx.view.paths_ordered() {
            let marked = eraser
                .as_ref()
                .is_some_and(|(_, sel)| sel.contains_path(path.id));
            self.push_path(path, marked, highlight);
        }
        for shape in ctx.view.shapes_ordered() {
            let marked = eraser
                .as_ref()
                .is_some_and(|(_, sel)| sel.contains_shape(shape.id));
            self.push_shape(shape, marked, highlight);
        }

        // Transient gesture overlay, in the color and width the commit
        // will persist so nothing pops on release.
        match ctx.interaction {
            InteractionState::DrawingStroke { tool, points } => {
                if points.len() >= 2 {
                    self.ops.push(DrawOp::Polyline {
                        points: points.clone(),
                        color: ctx.drawing_color,
                        width: tool.width(),
                    });
                }
            }
            InteractionState::DrawingShape {
                kind,
                start,
                current,
            } => match kind {
                ShapeKind::Rectangle => self.ops.push(DrawOp::RectOutline {
                    rect: Rect::from_points(*start, *current),
                    color: ctx.drawing_color,
                    width: 2.0,
                }),
                ShapeKind::Circle => self.ops.push(DrawOp::CircleOutline {
                    center: start.midpoint(*current),
                    radius: start.distance(*current) / 2.0,
                    color: ctx.drawing_color,
                    width: 2.0,
                }),
            },
            _ => {}
        }

        // Eraser preview disc: above elements, below notes.
        if let Some((Some(position), _)) = eraser {
            self.ops.push(DrawOp::Disc {
                center: position,
                radius: ERASER_PREVIEW_RADIUS,
                color: highlight,
            });
        }

        // Notes, back to front.
        for note in ctx.view.notes_ordered() {
            self.ops.push(DrawOp::NoteCard {
                rect: Rect::new(
                    note.position.x,
                    note.position.y,
                    note.position.x + NOTE_WIDTH,
                    note.position.y + NOTE_HEIGHT,
                ),
                fill: note.color,
                content: note.content.clone(),
                selected: ctx.selected_note == Some(note.id),
            });
        }

        // Peer cursors, topmost.
        for cursor in ctx.cursors {
            self.ops.push(DrawOp::CursorMarker {
                position: cursor.position,
                label: cursor.name.clone(),
            });
        }
    }
}
