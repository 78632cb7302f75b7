//! Prelude module for common tileview types and traits
//!
//! Re-exports the most commonly used types for easy importing with
//! `use tileview::prelude::*;`

pub use crate::core::{
    bounds::MapBounds,
    config::{
        DiskCacheConfig, InputConfig, MapOptions, PrefetchConfig, RetryConfig, UnloadConfig,
        ZoomAnimationConfig,
    },
    geo::{LatLng, LatLngBounds, Point, TileCoord, MAX_LATITUDE, MAX_ZOOM},
    map::MapState,
    viewport::Viewport,
};

pub use crate::animation::{EasingFunction, ZoomAnchor, ZoomAnimator};

pub use crate::input::{Action, FrameInput, InputMapper, KeyCode};

pub use crate::render::{Rect, RenderBackend, TextureHandle};

pub use crate::tiles::{
    now_ms, tile_path, CacheStats, CartoDarkSource, DiskCacheIndex, DiskEntry, FetchEngine,
    FetchResult, RetryState, TemplateSource, TileCache, TileSource, TileState,
};

pub use crate::{MapError, Result};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
