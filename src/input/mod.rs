//! Input handling: per-frame window snapshots and their translation into
//! map actions.

pub mod events;
pub mod handler;

pub use events::{FrameInput, KeyCode, MOUSE_LEFT, MOUSE_RIGHT};
pub use handler::{Action, InputMapper};
