//! The seam between the tile engine and the GPU: decoding encoded bytes
//! into textures and drawing textured quads.

use crate::Result;

/// Opaque identifier for a GPU texture owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// An axis-aligned rectangle. Interpreted in [0, 1] UV space for source
/// regions and in pixels for destinations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// The whole texture in UV space.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// GPU collaborator contract. Decode may be called from worker threads;
/// draw calls only happen on the render thread.
pub trait RenderBackend: Send + Sync {
    /// Turns encoded image bytes into a GPU-ready handle. Fails on corrupt
    /// input.
    fn decode_texture(&self, bytes: &[u8]) -> Result<TextureHandle>;

    /// Releases GPU memory. Idempotent.
    fn destroy_texture(&self, texture: TextureHandle);

    /// Draws the `src` UV sub-region of `texture` into the `dst` pixel
    /// rectangle of a `canvas`-sized target.
    fn draw_textured_quad(
        &self,
        texture: TextureHandle,
        src: Rect,
        dst: Rect,
        canvas: (f32, f32),
        alpha: f32,
    );
}
