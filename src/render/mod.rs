//! Rendering: the GPU backend seam and the visible-tile walker.

pub mod backend;
pub mod walker;

pub use backend::{Rect, RenderBackend, TextureHandle};
pub use walker::{find_parent_fallback, render_map};
