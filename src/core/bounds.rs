use crate::core::geo::{LatLng, LatLngBounds, MAX_ZOOM};
use serde::{Deserialize, Serialize};

/// Navigable region of the map: an optional geographic rectangle plus a
/// zoom range. Every center/zoom mutation is clamped through this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    /// Rectangle the view center must stay inside, if any.
    pub rect: Option<LatLngBounds>,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl MapBounds {
    pub fn new(rect: Option<LatLngBounds>, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            rect,
            min_zoom: min_zoom.min(MAX_ZOOM),
            max_zoom: max_zoom.min(MAX_ZOOM),
        }
    }

    /// The whole world, all zoom levels.
    pub fn unbounded() -> Self {
        Self::new(None, 0, MAX_ZOOM)
    }

    /// Clamps a candidate center: latitude into the Mercator range,
    /// longitude wrapped, then both into the configured rectangle.
    pub fn clamp_center(&self, center: LatLng) -> LatLng {
        let normalized = center.normalized();
        match &self.rect {
            Some(rect) => rect.clamp(&normalized),
            None => normalized,
        }
    }

    /// Clamps a signed zoom candidate into the configured range.
    pub fn clamp_zoom(&self, zoom: i16) -> u8 {
        zoom.clamp(self.min_zoom as i16, self.max_zoom as i16) as u8
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}
