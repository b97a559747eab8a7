//! Renderer trait abstraction.

use kurbo::Size;
use peniko::Color;
use stickyboard_core::model::{CursorEntry, NoteId, SerializableColor};
use stickyboard_core::tools::InteractionState;
use stickyboard_core::BoardView;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

pub type RenderResult<T> = Result<T, RendererError>;

/// Convert a stored color into the paint color used by backends.
pub fn paint_color(color: SerializableColor) -> Color {
    Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// The board state to render.
    pub view: &'a BoardView,
    /// The in-progress gesture, drawn as a transient overlay.
    pub interaction: &'a InteractionState,
    /// Peer cursors, drawn topmost.
    pub cursors: &'a [CursorEntry],
    /// The locally selected note, highlighted.
    pub selected_note: Option<NoteId>,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Background color.
    pub background_color: Color,
    /// Highlight color for eraser-marked elements and selection borders.
    pub highlight_color: Color,
    /// The active drawing color, used for the in-progress stroke/shape
    /// overlay so the preview matches what the commit will persist.
    pub drawing_color: SerializableColor,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        view: &'a BoardView,
        interaction: &'a InteractionState,
        viewport_size: Size,
    ) -> Self {
        Self {
            view,
            interaction,
            cursors: &[],
            selected_note: None,
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::from_rgba8(250, 250, 250, 255),
            highlight_color: Color::from_rgba8(239, 83, 80, 255),
            drawing_color: SerializableColor::black(),
        }
    }

    pub fn with_cursors(mut self, cursors: &'a [CursorEntry]) -> Self {
        self.cursors = cursors;
        self
    }

    pub fn with_selected_note(mut self, note: Option<NoteId>) -> Self {
        self.selected_note = note;
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_drawing_color(mut self, color: SerializableColor) -> Self {
        self.drawing_color = color;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer: Send + Sync {
    /// Build the scene/command buffer for a frame.
    ///
    /// Called once per frame; must produce the same output for the same
    /// context, since callers redraw on every poll.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}
