//! StickyBoard Rendering
//!
//! Backend-agnostic scene building for the whiteboard: the session's board
//! view and gesture state go in, an ordered display list comes out.

pub mod renderer;
pub mod scene;

pub use renderer::{RenderContext, Renderer, RendererError};
pub use scene::{DrawOp, SceneRecorder};
