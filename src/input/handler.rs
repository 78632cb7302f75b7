//! Translates per-frame input snapshots into map actions.
//!
//! The mapper owns the drag anchor and the smoothed pan velocity; it never
//! mutates the viewport itself. Actions are applied by the map state,
//! which clamps every mutation to the configured bounds.

use crate::core::config::InputConfig;
use crate::core::geo::{LatLng, Point};
use crate::core::viewport::Viewport;
use crate::input::events::{FrameInput, KeyCode};

/// A mutation the input mapper wants applied to the map.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Position the center during a drag (already anchored to drag start).
    SetCenter { center: LatLng },
    /// Scroll step: animate toward `target_zoom + delta`, anchored at the
    /// cursor.
    ZoomAtCursor { delta: i8, cursor: Point },
    /// Keyboard pan: degrees of center movement expressed as a pixel step.
    /// Positive `dx` moves the center east, positive `dy` north.
    PanBy { dx: f64, dy: f64 },
    /// Keyboard zoom step around the view center, no anchor animation.
    ZoomCentered { delta: i8 },
    /// Jump straight to a zoom level.
    SetZoom { zoom: u8 },
    /// Home: restore the initial view.
    ResetView,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    start_screen: Point,
    start_center: LatLng,
    last_mouse: Point,
}

/// Stateful pointer/keyboard mapper with velocity tracking.
#[derive(Debug)]
pub struct InputMapper {
    config: InputConfig,
    drag: Option<DragState>,
    velocity: Point,
}

impl InputMapper {
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            drag: None,
            velocity: Point::new(0.0, 0.0),
        }
    }

    /// Smoothed pan velocity in pixels per frame.
    pub fn velocity(&self) -> Point {
        self.velocity
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Consumes one frame of input and returns the resulting actions.
    pub fn handle_frame(&mut self, input: &FrameInput, viewport: &Viewport) -> Vec<Action> {
        let mut actions = Vec::new();

        if input.left_button_down() {
            match &mut self.drag {
                None => {
                    self.drag = Some(DragState {
                        start_screen: input.mouse_pos,
                        start_center: viewport.center,
                        last_mouse: input.mouse_pos,
                    });
                }
                Some(drag) => {
                    let frame_delta = input.mouse_pos.subtract(&drag.last_mouse);
                    drag.last_mouse = input.mouse_pos;

                    let alpha = self.config.velocity_smoothing;
                    self.velocity = Point::new(
                        self.velocity.x * alpha + frame_delta.x * (1.0 - alpha),
                        self.velocity.y * alpha + frame_delta.y * (1.0 - alpha),
                    );

                    let total = input.mouse_pos.subtract(&drag.start_screen);
                    let (d_lng, d_lat) = viewport.pixels_to_degrees(total.x, total.y);
                    // Dragging right moves the map content right, so the
                    // center moves west; dragging down reveals north.
                    actions.push(Action::SetCenter {
                        center: LatLng::new(
                            drag.start_center.lat + d_lat,
                            drag.start_center.lng - d_lng,
                        ),
                    });
                }
            }
        } else {
            self.drag = None;
            self.velocity = self.velocity.multiply(self.config.velocity_decay);
        }

        let wheel = input.scroll_delta.y;
        if wheel != 0.0 {
            actions.push(Action::ZoomAtCursor {
                delta: if wheel > 0.0 { 1 } else { -1 },
                cursor: input.mouse_pos,
            });
        }

        if let Some(key) = input.key {
            let step = self.config.keyboard_pan_speed;
            match key {
                KeyCode::ArrowUp => actions.push(Action::PanBy { dx: 0.0, dy: step }),
                KeyCode::ArrowDown => actions.push(Action::PanBy { dx: 0.0, dy: -step }),
                KeyCode::ArrowLeft => actions.push(Action::PanBy { dx: -step, dy: 0.0 }),
                KeyCode::ArrowRight => actions.push(Action::PanBy { dx: step, dy: 0.0 }),
                KeyCode::Plus => actions.push(Action::ZoomCentered { delta: 1 }),
                KeyCode::Minus => actions.push(Action::ZoomCentered { delta: -1 }),
                KeyCode::Digit(0) => actions.push(Action::SetZoom { zoom: 10 }),
                KeyCode::Digit(n @ 1..=9) => actions.push(Action::SetZoom { zoom: n }),
                KeyCode::Home => actions.push(Action::ResetView),
                KeyCode::Digit(_) | KeyCode::Other(_) => {}
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::events::MOUSE_LEFT;

    fn viewport() -> Viewport {
        Viewport::new(
            LatLng::new(37.7749, -122.4194),
            12,
            Point::new(1280.0, 720.0),
            512,
        )
    }

    fn mapper() -> InputMapper {
        InputMapper::new(InputConfig::default())
    }

    fn frame(mouse: Point, buttons: u8) -> FrameInput {
        FrameInput {
            mouse_pos: mouse,
            mouse_buttons: buttons,
            scroll_delta: Point::new(0.0, 0.0),
            key: None,
            screen_size: Point::new(1280.0, 720.0),
        }
    }

    #[test]
    fn test_drag_moves_center_opposite_to_pointer() {
        let viewport = viewport();
        let mut mapper = mapper();

        // First held frame only captures the anchor.
        let actions = mapper.handle_frame(&frame(Point::new(600.0, 400.0), MOUSE_LEFT), &viewport);
        assert!(actions.is_empty());
        assert!(mapper.is_dragging());

        // Dragging east: center must move west, latitude unchanged.
        let actions = mapper.handle_frame(&frame(Point::new(700.0, 400.0), MOUSE_LEFT), &viewport);
        match &actions[0] {
            Action::SetCenter { center } => {
                assert!(center.lng < viewport.center.lng);
                assert!((center.lat - viewport.center.lat).abs() < 1e-9);
            }
            other => panic!("expected SetCenter, got {:?}", other),
        }
    }

    #[test]
    fn test_drag_is_anchored_to_start_not_cumulative() {
        let viewport = viewport();
        let mut mapper = mapper();
        mapper.handle_frame(&frame(Point::new(600.0, 400.0), MOUSE_LEFT), &viewport);

        let first = mapper.handle_frame(&frame(Point::new(650.0, 400.0), MOUSE_LEFT), &viewport);
        // Returning the pointer to the anchor restores the original center.
        let back = mapper.handle_frame(&frame(Point::new(600.0, 400.0), MOUSE_LEFT), &viewport);
        let Action::SetCenter { center } = &back[0] else {
            panic!("expected SetCenter");
        };
        assert!((center.lng - viewport.center.lng).abs() < 1e-9);
        assert!(matches!(first[0], Action::SetCenter { .. }));
    }

    #[test]
    fn test_velocity_smooths_and_decays() {
        let viewport = viewport();
        let mut mapper = mapper();
        mapper.handle_frame(&frame(Point::new(100.0, 100.0), MOUSE_LEFT), &viewport);

        let mut x = 100.0;
        for _ in 0..20 {
            x += 10.0;
            mapper.handle_frame(&frame(Point::new(x, 100.0), MOUSE_LEFT), &viewport);
        }
        let moving = mapper.velocity().x;
        assert!(moving > 5.0, "velocity should approach the pan speed");

        // Release: geometric decay per frame.
        mapper.handle_frame(&frame(Point::new(x, 100.0), 0), &viewport);
        let decayed = mapper.velocity().x;
        assert!((decayed - moving * 0.9).abs() < 1e-9);
        assert!(!mapper.is_dragging());
    }

    #[test]
    fn test_scroll_maps_to_unit_zoom_steps() {
        let viewport = viewport();
        let mut mapper = mapper();
        let mut input = frame(Point::new(640.0, 360.0), 0);
        input.scroll_delta = Point::new(0.0, 3.5);

        let actions = mapper.handle_frame(&input, &viewport);
        assert_eq!(
            actions,
            vec![Action::ZoomAtCursor {
                delta: 1,
                cursor: Point::new(640.0, 360.0)
            }]
        );

        input.scroll_delta = Point::new(0.0, -0.25);
        let actions = mapper.handle_frame(&input, &viewport);
        assert!(matches!(actions[0], Action::ZoomAtCursor { delta: -1, .. }));
    }

    #[test]
    fn test_keyboard_bindings() {
        let viewport = viewport();
        let mut mapper = mapper();
        let mut input = frame(Point::new(0.0, 0.0), 0);

        input.key = Some(KeyCode::Digit(7));
        assert_eq!(
            mapper.handle_frame(&input, &viewport),
            vec![Action::SetZoom { zoom: 7 }]
        );

        input.key = Some(KeyCode::Digit(0));
        assert_eq!(
            mapper.handle_frame(&input, &viewport),
            vec![Action::SetZoom { zoom: 10 }]
        );

        input.key = Some(KeyCode::Home);
        assert_eq!(mapper.handle_frame(&input, &viewport), vec![Action::ResetView]);

        input.key = Some(KeyCode::ArrowRight);
        assert_eq!(
            mapper.handle_frame(&input, &viewport),
            vec![Action::PanBy { dx: 100.0, dy: 0.0 }]
        );

        input.key = Some(KeyCode::Minus);
        assert_eq!(
            mapper.handle_frame(&input, &viewport),
            vec![Action::ZoomCentered { delta: -1 }]
        );
    }
}
