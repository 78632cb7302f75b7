//! Walks the visible tiles and emits textured-quad draw calls.
//!
//! Two passes per frame, both positioned with the fractional display zoom:
//! first every loaded parent of a visible tile as a backdrop, then the
//! visible tiles themselves, substituting an ancestor sub-region for tiles
//! that have no texture yet.

use crate::core::geo::TileCoord;
use crate::core::viewport::Viewport;
use crate::prelude::HashSet;
use crate::render::backend::{Rect, RenderBackend};
use crate::tiles::cache::TileCache;
use crate::tiles::state::TileState;

/// How far up the renderer walks for a stand-in ancestor.
const FALLBACK_LEVELS: u8 = 3;

/// Renders one frame of the tile pyramid.
pub fn render_map(
    cache: &TileCache,
    viewport: &Viewport,
    display_zoom: f64,
    backend: &dyn RenderBackend,
) {
    let canvas = (viewport.size.x as f32, viewport.size.y as f32);
    let visible = viewport.visible_tiles_with_buffer(0);

    // Pass 1: loaded parents underneath, full-size at their own scale.
    let mut parents: HashSet<TileCoord> = HashSet::default();
    for tile in &visible {
        if let Some(parent) = tile.parent() {
            parents.insert(parent);
        }
    }
    for parent in parents {
        if let Some(TileState::Loaded { texture, .. }) = cache.get(&parent) {
            let dst = tile_dst_rect(parent, viewport, display_zoom);
            backend.draw_textured_quad(*texture, Rect::full(), dst, canvas, 1.0);
        }
    }

    // Pass 2: visible tiles, with ancestor sub-regions filling the holes.
    for tile in &visible {
        let dst = tile_dst_rect(*tile, viewport, display_zoom);
        match cache.get(tile) {
            Some(TileState::Loaded { texture, .. }) => {
                backend.draw_textured_quad(*texture, Rect::full(), dst, canvas, 1.0);
            }
            _ => {
                if let Some((ancestor, distance)) = find_parent_fallback(cache, *tile, FALLBACK_LEVELS)
                {
                    if let Some(TileState::Loaded { texture, .. }) = cache.get(&ancestor) {
                        let src = fallback_src_rect(*tile, ancestor, distance);
                        backend.draw_textured_quad(*texture, src, dst, canvas, 1.0);
                    }
                }
            }
        }
    }
}

/// Screen-pixel rectangle of a tile at the fractional display zoom,
/// wrap-aware on the x axis.
pub fn tile_dst_rect(coord: TileCoord, viewport: &Viewport, display_zoom: f64) -> Rect {
    let scale = viewport.tile_size as f64 * 2_f64.powf(display_zoom - coord.z as f64);
    let center = viewport.center_tile_frac(coord.z);
    let n = (1u64 << coord.z) as f64;

    let mut dx = coord.x as f64 - center.x;
    dx -= n * (dx / n).round();
    let dy = coord.y as f64 - center.y;

    Rect::new(
        (dx * scale + viewport.size.x / 2.0) as f32,
        (dy * scale + viewport.size.y / 2.0) as f32,
        scale as f32,
        scale as f32,
    )
}

/// Nearest loaded ancestor within `max_levels`, with its distance.
pub fn find_parent_fallback(
    cache: &TileCache,
    coord: TileCoord,
    max_levels: u8,
) -> Option<(TileCoord, u8)> {
    let mut current = coord;
    for distance in 1..=max_levels {
        let parent = current.parent()?;
        if cache.get(&parent).is_some_and(|s| s.is_loaded()) {
            return Some((parent, distance));
        }
        current = parent;
    }
    None
}

/// UV sub-region of an ancestor's texture covering `coord`.
pub fn fallback_src_rect(coord: TileCoord, ancestor: TileCoord, distance: u8) -> Rect {
    let span = 1u32 << distance;
    let size = 1.0 / span as f32;
    Rect::new(
        (coord.x - ancestor.x * span) as f32 / span as f32,
        (coord.y - ancestor.y * span) as f32 / span as f32,
        size,
        size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RetryConfig, UnloadConfig};
    use crate::core::geo::{LatLng, Point};
    use crate::render::backend::TextureHandle;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct DrawCall {
        texture: TextureHandle,
        src: Rect,
        dst: Rect,
    }

    #[derive(Default)]
    struct RecordingBackend {
        next_id: AtomicU64,
        calls: Mutex<Vec<DrawCall>>,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<DrawCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RenderBackend for RecordingBackend {
        fn decode_texture(&self, _bytes: &[u8]) -> crate::Result<TextureHandle> {
            Ok(TextureHandle(self.next_id.fetch_add(1, Ordering::SeqCst)))
        }

        fn destroy_texture(&self, _texture: TextureHandle) {}

        fn draw_textured_quad(
            &self,
            texture: TextureHandle,
            src: Rect,
            dst: Rect,
            _canvas: (f32, f32),
            _alpha: f32,
        ) {
            self.calls.lock().unwrap().push(DrawCall { texture, src, dst });
        }
    }

    fn viewport() -> Viewport {
        Viewport::new(
            LatLng::new(37.7749, -122.4194),
            12,
            Point::new(1280.0, 720.0),
            512,
        )
    }

    fn cache() -> TileCache {
        TileCache::new(RetryConfig::default(), UnloadConfig::default())
    }

    fn loaded(id: u64) -> TileState {
        TileState::Loaded {
            texture: TextureHandle(id),
            bytes: std::sync::Arc::new(vec![1]),
        }
    }

    #[test]
    fn test_loaded_tile_draws_full_texture() {
        let viewport = viewport();
        let mut cache = cache();
        let center = TileCoord::from_lat_lng(&viewport.center, 12);
        cache.insert(center, loaded(5));

        let backend = RecordingBackend::default();
        render_map(&cache, &viewport, 12.0, &backend);

        let calls = backend.calls();
        let draw = calls
            .iter()
            .find(|c| c.texture == TextureHandle(5))
            .expect("center tile drawn");
        assert_eq!(draw.src, Rect::full());
        // At integer zoom the tile renders at its native size.
        assert!((draw.dst.w - 512.0).abs() < 0.01);
    }

    #[test]
    fn test_missing_tile_uses_ancestor_subregion() {
        let viewport = viewport();
        let mut cache = cache();
        let center = TileCoord::from_lat_lng(&viewport.center, 12);
        let grandparent = center.ancestor(2).unwrap();
        cache.insert(grandparent, loaded(9));

        let backend = RecordingBackend::default();
        render_map(&cache, &viewport, 12.0, &backend);

        let fallback = backend
            .calls()
            .into_iter()
            .find(|c| c.texture == TextureHandle(9) && c.src != Rect::full())
            .expect("fallback draw for the center tile");
        assert!((fallback.src.w - 0.25).abs() < 1e-6);
        assert!((fallback.src.h - 0.25).abs() < 1e-6);
        assert!(fallback.src.x >= 0.0 && fallback.src.x <= 0.75);
    }

    #[test]
    fn test_loaded_parent_is_drawn_as_backdrop() {
        let viewport = viewport();
        let mut cache = cache();
        let parent = TileCoord::from_lat_lng(&viewport.center, 12).parent().unwrap();
        cache.insert(parent, loaded(3));

        let backend = RecordingBackend::default();
        render_map(&cache, &viewport, 12.0, &backend);

        let backdrop = backend
            .calls()
            .into_iter()
            .filter(|c| c.texture == TextureHandle(3) && c.src == Rect::full())
            .collect::<Vec<_>>();
        assert!(!backdrop.is_empty());
        // The parent renders at twice the child scale.
        assert!((backdrop[0].dst.w - 1024.0).abs() < 0.01);
    }

    #[test]
    fn test_fallback_src_rect_offsets() {
        let coord = TileCoord::new(5, 6, 3);
        let ancestor = coord.ancestor(2).unwrap();
        let rect = fallback_src_rect(coord, ancestor, 2);
        assert_eq!(rect, Rect::new(0.25, 0.5, 0.25, 0.25));
    }

    #[test]
    fn test_find_parent_fallback_respects_limit() {
        let mut cache = cache();
        let coord = TileCoord::new(1024, 512, 12);
        cache.insert(coord.ancestor(4).unwrap(), loaded(1));

        // Nearest loaded ancestor is 4 levels up: beyond the walk limit.
        assert_eq!(find_parent_fallback(&cache, coord, 3), None);

        cache.insert(coord.ancestor(2).unwrap(), loaded(2));
        assert_eq!(
            find_parent_fallback(&cache, coord, 3),
            Some((coord.ancestor(2).unwrap(), 2))
        );
    }

    #[test]
    fn test_dst_rect_centers_center_tile() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 2, Point::new(800.0, 600.0), 256);
        // At (0,0) z2 the view center sits on the corner of tile (2,2).
        let rect = tile_dst_rect(TileCoord::new(2, 2, 2), &viewport, 2.0);
        assert!((rect.x - 400.0).abs() < 0.01);
        assert!((rect.y - 300.0).abs() < 0.01);
        assert!((rect.w - 256.0).abs() < 0.01);
    }

    #[test]
    fn test_dst_rect_wraps_shortest_way() {
        let viewport = Viewport::new(LatLng::new(0.0, 179.0), 3, Point::new(800.0, 600.0), 256);
        // Tile column 0 is just east across the antimeridian; it must land
        // near the right edge, not seven worlds away to the left.
        let rect = tile_dst_rect(TileCoord::new(0, 3, 3), &viewport, 3.0);
        assert!(rect.x > 0.0 && rect.x < 800.0);
    }
}
