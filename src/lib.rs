//! # Tileview
//!
//! A slippy-map tile viewer engine: Web-Mercator projection math, a
//! viewport model, a three-tier tile cache (GPU textures, RAM-resident
//! encoded bytes, on-disk files) and an async fetch pipeline with retry
//! back-off, cancellation and velocity-based prefetch.
//!
//! The embedding application owns the window and the GPU; it hands the
//! engine a [`render::RenderBackend`] implementation and a per-frame
//! [`input::FrameInput`] snapshot, then drives the frame loop:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tileview::prelude::*;
//! # fn frame_input() -> FrameInput { unimplemented!() }
//! # fn my_backend() -> Arc<dyn RenderBackend> { unimplemented!() }
//! let mut map = MapState::new(
//!     MapOptions::new(LatLng::new(37.7749, -122.4194), 12),
//!     Point::new(1280.0, 720.0),
//!     Arc::new(CartoDarkSource::new()),
//!     my_backend(),
//! );
//!
//! loop {
//!     map.handle_input(&frame_input());
//!     map.update();
//!     map.render();
//! }
//! ```

pub mod animation;
pub mod core;
pub mod input;
pub mod prelude;
pub mod render;
pub mod runtime;
pub mod tiles;

// Re-export public API
pub use crate::core::{
    bounds::MapBounds,
    config::{
        DiskCacheConfig, InputConfig, MapOptions, PrefetchConfig, RetryConfig, UnloadConfig,
        ZoomAnimationConfig,
    },
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::MapState,
    viewport::Viewport,
};

pub use crate::animation::{EasingFunction, ZoomAnchor, ZoomAnimator};
pub use crate::input::{FrameInput, InputMapper, KeyCode};
pub use crate::render::{Rect, RenderBackend, TextureHandle};
pub use crate::tiles::{
    CacheStats, CartoDarkSource, DiskCacheIndex, TemplateSource, TileCache, TileSource, TileState,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Cancelled")]
    Cancelled,
}
