//! StickyBoard Core Library
//!
//! Data model, interaction state machine and synchronization engine for the
//! StickyBoard collaborative sticky-note whiteboard.

pub mod board;
pub mod boards;
pub mod ephemeral;
pub mod eraser;
pub mod geometry;
pub mod identity;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod sync;
pub mod throttle;
pub mod tools;

pub use board::BoardView;
pub use ephemeral::{EphemeralEvent, EphemeralStore, MemoryEphemeral, MemoryEphemeralHub};
pub use eraser::EraserSelection;
pub use geometry::{point_near_path, point_near_shape, HIT_THRESHOLD};
pub use identity::{AccessDecision, IdentityProvider, Role, UserIdentity};
pub use model::{Board, CursorEntry, DrawingPath, Note, PresenceEntry, ShapeElement, ShapeKind, StrokeTool};
pub use reconcile::Reconciler;
pub use session::BoardSession;
pub use store::{CollectionKind, DocumentStore, MemoryStore, MemoryStoreHub, StoreError};
pub use sync::{ConnectionState, RelayClient, RelayEphemeral, SyncEvent};
pub use throttle::MotionPublisher;
pub use tools::{GestureCommit, InteractionController, InteractionState, ToolKind};
