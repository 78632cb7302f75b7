use crate::core::geo::{LatLng, Point, TileCoord, MAX_ZOOM};
use crate::prelude::HashSet;
use serde::{Deserialize, Serialize};

/// Manages the current view of the map: center, integer zoom, screen size
/// and tile size. All pixel/tile/geo conversions go through here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The integer zoom level tiles are fetched at
    pub zoom: u8,
    /// The size of the viewport in pixels
    pub size: Point,
    /// Pixels per tile edge
    pub tile_size: u32,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: u8, size: Point, tile_size: u32) -> Self {
        Self {
            center: center.normalized(),
            zoom: zoom.min(MAX_ZOOM),
            size,
            tile_size,
        }
    }

    /// The view center in fractional tile space at zoom `z`.
    pub fn center_tile_frac(&self, z: u8) -> Point {
        self.center.to_tile_frac(z as f64)
    }

    /// Enumerates every integer tile intersecting the screen rectangle
    /// expanded by `buffer` tiles on each edge. The x axis wraps modulo
    /// `2^z`; the y axis clamps at the poles. Order is not significant.
    pub fn visible_tiles_with_buffer(&self, buffer: u32) -> Vec<TileCoord> {
        let z = self.zoom;
        let n = 1i64 << z;
        let center = self.center_tile_frac(z);
        let tile_size = self.tile_size as f64;

        let half_w = self.size.x / 2.0 / tile_size;
        let half_h = self.size.y / 2.0 / tile_size;

        let min_tx = (center.x - half_w).floor() as i64 - buffer as i64;
        let max_tx = (center.x + half_w).ceil() as i64 + buffer as i64;
        let min_ty = ((center.y - half_h).floor() as i64 - buffer as i64).max(0);
        let max_ty = ((center.y + half_h).ceil() as i64 + buffer as i64).min(n - 1);

        // At low zoom the buffered range can exceed the world width; cap it
        // so each column appears once.
        let (min_tx, max_tx) = if max_tx - min_tx + 1 >= n {
            (0, n - 1)
        } else {
            (min_tx, max_tx)
        };

        let mut tiles = Vec::new();
        for ty in min_ty..=max_ty {
            for tx in min_tx..=max_tx {
                let x = tx.rem_euclid(n) as u32;
                tiles.push(TileCoord::new(x, ty as u32, z));
            }
        }
        tiles
    }

    /// The visible-with-buffer tiles together with their parents,
    /// grandparents and children, where those zoom levels exist.
    pub fn visible_tile_set_with_fallbacks(&self, buffer: u32) -> HashSet<TileCoord> {
        let base = self.visible_tiles_with_buffer(buffer);
        let mut set: HashSet<TileCoord> = base.iter().copied().collect();

        for tile in &base {
            if let Some(parent) = tile.parent() {
                set.insert(parent);
                if let Some(grandparent) = parent.parent() {
                    set.insert(grandparent);
                }
            }
            for child in tile.children() {
                set.insert(child);
            }
        }
        set
    }

    /// Translates a pixel delta into a `(d_lng, d_lat)` degree delta at the
    /// current zoom. The cosine factor is applied to both axes so drag and
    /// its inverse stay self-consistent.
    pub fn pixels_to_degrees(&self, dx: f64, dy: f64) -> (f64, f64) {
        let n = 2_f64.powi(self.zoom as i32);
        let world_px = n * self.tile_size as f64;
        let lat_rad = self.center.lat.to_radians();

        let d_lng = dx * 360.0 / world_px;
        let d_lat = dy * 360.0 * lat_rad.cos() / world_px;
        (d_lng, d_lat)
    }

    /// Projects a geographical coordinate to screen pixels at the given
    /// (possibly fractional) display zoom.
    pub fn lat_lng_to_screen(&self, lat_lng: &LatLng, zoom: f64) -> Point {
        let tile_size = self.tile_size as f64;
        let point = lat_lng.to_tile_frac(zoom);
        let center = self.center.to_tile_frac(zoom);
        Point::new(
            (point.x - center.x) * tile_size + self.size.x / 2.0,
            (point.y - center.y) * tile_size + self.size.y / 2.0,
        )
    }

    /// Inverse of [`Viewport::lat_lng_to_screen`].
    pub fn screen_to_lat_lng(&self, screen: &Point, zoom: f64) -> LatLng {
        let tile_size = self.tile_size as f64;
        let center = self.center.to_tile_frac(zoom);
        let frac = Point::new(
            center.x + (screen.x - self.size.x / 2.0) / tile_size,
            center.y + (screen.y - self.size.y / 2.0) / tile_size,
        );
        LatLng::from_tile_frac(frac, zoom)
    }

    /// Computes the center that keeps `anchor_geo` rendered at
    /// `anchor_screen` for the given display zoom.
    pub fn center_for_anchor(&self, anchor_geo: &LatLng, anchor_screen: &Point, zoom: f64) -> LatLng {
        let tile_size = self.tile_size as f64;
        let anchor_frac = anchor_geo.to_tile_frac(zoom);
        let dtx = (anchor_screen.x - self.size.x / 2.0) / tile_size;
        let dty = (anchor_screen.y - self.size.y / 2.0) / tile_size;
        LatLng::from_tile_frac(Point::new(anchor_frac.x - dtx, anchor_frac.y - dty), zoom)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 2, Point::new(800.0, 600.0), 256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf_viewport() -> Viewport {
        Viewport::new(
            LatLng::new(37.7749, -122.4194),
            12,
            Point::new(1280.0, 720.0),
            512,
        )
    }

    #[test]
    fn test_visible_tiles_cover_center() {
        let viewport = sf_viewport();
        let tiles = viewport.visible_tiles_with_buffer(0);
        let center = TileCoord::from_lat_lng(&viewport.center, 12);
        assert!(tiles.contains(&center));
        for tile in &tiles {
            assert!(tile.is_valid());
        }
    }

    #[test]
    fn test_buffer_grows_tile_set() {
        let viewport = sf_viewport();
        let bare = viewport.visible_tiles_with_buffer(0).len();
        let buffered = viewport.visible_tiles_with_buffer(3).len();
        assert!(buffered > bare);
    }

    #[test]
    fn test_x_wraps_at_date_line() {
        let viewport = Viewport::new(
            LatLng::new(0.0, 179.9),
            5,
            Point::new(1024.0, 512.0),
            256,
        );
        let tiles = viewport.visible_tiles_with_buffer(1);
        // Columns on both sides of the antimeridian appear.
        assert!(tiles.iter().any(|t| t.x == 31));
        assert!(tiles.iter().any(|t| t.x == 0));
        assert!(tiles.iter().all(|t| t.is_valid()));
    }

    #[test]
    fn test_y_clamps_at_pole() {
        let viewport = Viewport::new(LatLng::new(84.5, 0.0), 4, Point::new(800.0, 800.0), 256);
        let tiles = viewport.visible_tiles_with_buffer(3);
        assert!(tiles.iter().all(|t| t.is_valid()));
        // Buffering past the top of the world must not produce negative rows.
        assert!(tiles.iter().any(|t| t.y == 0));
    }

    #[test]
    fn test_low_zoom_has_no_duplicate_columns() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 1, Point::new(2048.0, 512.0), 256);
        let tiles = viewport.visible_tiles_with_buffer(3);
        let unique: HashSet<TileCoord> = tiles.iter().copied().collect();
        assert_eq!(unique.len(), tiles.len());
    }

    #[test]
    fn test_fallback_set_contains_relatives() {
        let viewport = sf_viewport();
        let base = viewport.visible_tiles_with_buffer(0);
        let set = viewport.visible_tile_set_with_fallbacks(0);
        for tile in &base {
            assert!(set.contains(&tile.parent().unwrap()));
            assert!(set.contains(&tile.parent().unwrap().parent().unwrap()));
            for child in tile.children() {
                assert!(set.contains(&child));
            }
        }
    }

    #[test]
    fn test_screen_geo_round_trip() {
        let viewport = sf_viewport();
        let screen = Point::new(200.0, 650.0);
        let geo = viewport.screen_to_lat_lng(&screen, 12.0);
        let back = viewport.lat_lng_to_screen(&geo, 12.0);
        assert!((back.x - screen.x).abs() < 1e-6);
        assert!((back.y - screen.y).abs() < 1e-6);
    }

    #[test]
    fn test_center_for_anchor_keeps_anchor_fixed() {
        let viewport = sf_viewport();
        let anchor_screen = Point::new(900.0, 100.0);
        let anchor_geo = viewport.screen_to_lat_lng(&anchor_screen, 12.0);

        for zoom in [12.0, 12.3, 12.7, 13.0] {
            let mut moved = viewport.clone();
            moved.center = viewport.center_for_anchor(&anchor_geo, &anchor_screen, zoom);
            let projected = moved.lat_lng_to_screen(&anchor_geo, zoom);
            assert!((projected.x - anchor_screen.x).abs() < 1.0);
            assert!((projected.y - anchor_screen.y).abs() < 1.0);
        }
    }

    #[test]
    fn test_pixels_to_degrees_scales_with_zoom() {
        let mut viewport = sf_viewport();
        let (lng_12, _) = viewport.pixels_to_degrees(100.0, 0.0);
        viewport.zoom = 13;
        let (lng_13, _) = viewport.pixels_to_degrees(100.0, 0.0);
        assert!((lng_12 / lng_13 - 2.0).abs() < 1e-9);
    }
}
