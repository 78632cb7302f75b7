//! Configuration for the tile engine: retry, unload, disk, animation,
//! prefetch and input tunables, plus the top-level [`MapOptions`].

use crate::animation::EasingFunction;
use crate::core::bounds::MapBounds;
use crate::core::geo::LatLng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Retry scheduling for failed tile fetches. Delays are measured in frames
/// of the monotonic frame counter, not wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts before a tile is marked exhausted.
    pub max_retries: u32,
    /// Base back-off delay in frames; doubles per recorded failure.
    pub base_delay_frames: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_frames: 60,
        }
    }
}

/// Governs which tiles stay resident and how many encoded images may sit
/// in RAM after their texture has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnloadConfig {
    /// Extra rings of tiles kept loaded around the visible rectangle.
    pub buffer_tiles: u32,
    /// Cap on `Cached` entries outside the keep set.
    pub max_cached_images: usize,
}

impl Default for UnloadConfig {
    fn default() -> Self {
        Self {
            buffer_tiles: 3,
            max_cached_images: 1500,
        }
    }
}

/// On-disk tile cache location and byte budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCacheConfig {
    pub cache_dir: PathBuf,
    pub max_size_bytes: u64,
}

impl DiskCacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_size_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Smooth zoom animation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomAnimationConfig {
    /// Fraction of the remaining zoom distance covered per frame.
    pub lerp_factor: f64,
    /// Distance below which the displayed zoom snaps to the target.
    pub snap_threshold: f64,
    pub easing: EasingFunction,
    /// Frames after a zoom change during which no new fetches are spawned.
    pub zoom_debounce_frames: u64,
}

impl Default for ZoomAnimationConfig {
    fn default() -> Self {
        Self {
            lerp_factor: 0.15,
            snap_threshold: 0.01,
            easing: EasingFunction::Linear,
            zoom_debounce_frames: 6,
        }
    }
}

/// Velocity-based prefetch tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// How far ahead the viewport is predicted, in milliseconds.
    pub look_ahead_ms: f64,
    /// Pan speed (px/frame) below which no prefetch happens.
    pub min_velocity: f64,
    pub max_prefetch_tiles: usize,
    /// Nominal frame duration used to convert `look_ahead_ms` to frames.
    pub frame_ms: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            look_ahead_ms: 500.0,
            min_velocity: 5.0,
            max_prefetch_tiles: 8,
            frame_ms: 1000.0 / 60.0,
        }
    }
}

/// Pointer and keyboard behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Exponential smoothing factor for the pan velocity estimate.
    pub velocity_smoothing: f64,
    /// Per-frame geometric decay of the velocity after button release.
    pub velocity_decay: f64,
    /// Arrow-key pan step in pixels.
    pub keyboard_pan_speed: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            velocity_smoothing: 0.8,
            velocity_decay: 0.9,
            keyboard_pan_speed: 100.0,
        }
    }
}

/// Everything needed to construct a [`crate::core::map::MapState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOptions {
    pub initial_center: LatLng,
    pub initial_zoom: u8,
    /// Pixels per tile edge (256, or 512 for @2x providers).
    pub tile_size: u32,
    pub bounds: MapBounds,
    pub retry: RetryConfig,
    pub unload: UnloadConfig,
    /// `None` disables the disk tier entirely.
    pub disk: Option<DiskCacheConfig>,
    pub animation: ZoomAnimationConfig,
    pub prefetch: PrefetchConfig,
    pub input: InputConfig,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            initial_center: LatLng::new(0.0, 0.0),
            initial_zoom: 2,
            tile_size: 512,
            bounds: MapBounds::default(),
            retry: RetryConfig::default(),
            unload: UnloadConfig::default(),
            disk: None,
            animation: ZoomAnimationConfig::default(),
            prefetch: PrefetchConfig::default(),
            input: InputConfig::default(),
        }
    }
}

impl MapOptions {
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            initial_center: center,
            initial_zoom: zoom,
            ..Default::default()
        }
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_bounds(mut self, bounds: MapBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_disk_cache(mut self, disk: DiskCacheConfig) -> Self {
        self.disk = Some(disk);
        self
    }
}
