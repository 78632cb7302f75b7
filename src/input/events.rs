use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Left mouse button bit in [`FrameInput::mouse_buttons`].
pub const MOUSE_LEFT: u8 = 1 << 0;
/// Right mouse button bit.
pub const MOUSE_RIGHT: u8 = 1 << 1;

/// Keyboard key codes the map reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    /// `=` / `+`
    Plus,
    /// `-`
    Minus,
    /// `0`–`9`
    Digit(u8),
    Home,
    Other(u16),
}

/// Non-blocking snapshot of the window's input state for one frame. The
/// embedder accumulates scroll between frames and clears it after handing
/// the snapshot over; at most one key code is reported per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub mouse_pos: Point,
    pub mouse_buttons: u8,
    pub scroll_delta: Point,
    pub key: Option<KeyCode>,
    pub screen_size: Point,
}

impl FrameInput {
    /// A frame with no interaction, for a given window size.
    pub fn idle(screen_size: Point) -> Self {
        Self {
            mouse_pos: Point::new(0.0, 0.0),
            mouse_buttons: 0,
            scroll_delta: Point::new(0.0, 0.0),
            key: None,
            screen_size,
        }
    }

    pub fn left_button_down(&self) -> bool {
        self.mouse_buttons & MOUSE_LEFT != 0
    }
}
