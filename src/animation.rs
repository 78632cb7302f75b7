//! Smooth zoom animation toward an integer target zoom, preserving the
//! anchor point's screen position at every fractional step.

use crate::core::bounds::MapBounds;
use crate::core::config::ZoomAnimationConfig;
use crate::core::geo::{LatLng, Point};
use crate::core::viewport::Viewport;
use serde::{Deserialize, Serialize};

/// Simple ease-out cubic function for smooth zoom steps
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let t = t - 1.0;
    t * t * t + 1.0
}

/// Linear interpolation helper
pub fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

/// Easing applied to the per-frame zoom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EasingFunction {
    Linear,
    EaseOutCubic,
}

impl EasingFunction {
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            EasingFunction::Linear => t.clamp(0.0, 1.0),
            EasingFunction::EaseOutCubic => ease_out_cubic(t),
        }
    }
}

/// The screen-pixel/geo-point pair captured when a zoom animation begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomAnchor {
    pub screen: Point,
    pub geo: LatLng,
}

/// Advances a fractional displayed zoom toward the integer target each
/// frame. While animating, the anchor's geographic point keeps projecting
/// to the anchor's screen position.
#[derive(Debug, Clone)]
pub struct ZoomAnimator {
    target_zoom: u8,
    display_zoom: f64,
    anchor: Option<ZoomAnchor>,
    animating: bool,
    config: ZoomAnimationConfig,
}

impl ZoomAnimator {
    pub fn new(initial_zoom: u8, config: ZoomAnimationConfig) -> Self {
        Self {
            target_zoom: initial_zoom,
            display_zoom: initial_zoom as f64,
            anchor: None,
            animating: false,
            config,
        }
    }

    pub fn target_zoom(&self) -> u8 {
        self.target_zoom
    }

    pub fn display_zoom(&self) -> f64 {
        self.display_zoom
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn config(&self) -> &ZoomAnimationConfig {
        &self.config
    }

    /// Starts (or retargets) an animation toward `target`. The anchor is
    /// captured only when no animation is running, so consecutive scroll
    /// steps keep steering around the original cursor point.
    pub fn begin(&mut self, target: u8, anchor: Option<ZoomAnchor>) {
        self.target_zoom = target;
        if !self.animating {
            self.anchor = anchor;
        }
        self.animating = (self.display_zoom - target as f64).abs() > f64::EPSILON;
        if !self.animating {
            self.anchor = None;
        }
    }

    /// Jumps straight to `zoom` with no animation (keyboard digits, Home).
    pub fn jump_to(&mut self, zoom: u8) {
        self.target_zoom = zoom;
        self.display_zoom = zoom as f64;
        self.anchor = None;
        self.animating = false;
    }

    /// Advances one frame. Updates the viewport's center (anchor fixity)
    /// and its integer fetch zoom. Returns true while still animating.
    pub fn step(&mut self, viewport: &mut Viewport, bounds: &MapBounds) -> bool {
        if !self.animating {
            return false;
        }

        let target = self.target_zoom as f64;
        if (target - self.display_zoom).abs() < self.config.snap_threshold {
            self.display_zoom = target;
            self.animating = false;
        } else {
            let t = self.config.easing.apply(self.config.lerp_factor);
            self.display_zoom = lerp(self.display_zoom, target, t);
        }

        if let Some(anchor) = self.anchor {
            let center = viewport.center_for_anchor(&anchor.geo, &anchor.screen, self.display_zoom);
            viewport.center = bounds.clamp_center(center);
        }
        viewport.zoom = bounds.clamp_zoom(self.display_zoom.floor() as i16);

        if !self.animating {
            self.anchor = None;
        }
        self.animating
    }
}
