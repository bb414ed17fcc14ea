//! Keyboard and mouse state collected from window events.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            winit::event::MouseButton::Back => MouseButton::Back,
            winit::event::MouseButton::Forward => MouseButton::Forward,
            winit::event::MouseButton::Other(id) => MouseButton::Other(id),
        }
    }
}

/// Input seen since the last event pump, plus what is held down.
///
/// The "just" sets and the deltas cover one pump; [`begin_pump`]
/// clears them before the next batch of events.
///
/// [`begin_pump`]: InputState::begin_pump
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,

    pressed_buttons: HashSet<MouseButton>,
    just_pressed_buttons: HashSet<MouseButton>,
    just_released_buttons: HashSet<MouseButton>,

    mouse_position: Option<(f32, f32)>,
    mouse_delta: (f32, f32),
    /// Accumulated over the pump
    scroll_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the per-pump state.
    pub fn begin_pump(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.just_pressed_buttons.clear();
        self.just_released_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
        self.scroll_delta = (0.0, 0.0);
    }

    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            if self.pressed_keys.insert(key) {
                self.just_pressed_keys.insert(key);
            }
        } else if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    pub fn handle_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            if self.pressed_buttons.insert(button) {
                self.just_pressed_buttons.insert(button);
            }
        } else if self.pressed_buttons.remove(&button) {
            self.just_released_buttons.insert(button);
        }
    }

    /// Records a cursor position. The first position yields no delta.
    pub fn handle_cursor(&mut self, x: f32, y: f32) {
        if let Some((old_x, old_y)) = self.mouse_position {
            self.mouse_delta.0 += x - old_x;
            self.mouse_delta.1 += y - old_y;
        }
        self.mouse_position = Some((x, y));
    }

    pub fn handle_scroll(&mut self, delta_x: f32, delta_y: f32) {
        self.scroll_delta.0 += delta_x;
        self.scroll_delta.1 += delta_y;
    }

    /// Releases everything held, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        for key in self.pressed_keys.drain() {
            self.just_released_keys.insert(key);
        }
        for button in self.pressed_buttons.drain() {
            self.just_released_buttons.insert(button);
        }
    }

    #[inline]
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    #[inline]
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    #[inline]
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    #[inline]
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    #[inline]
    pub fn is_mouse_just_pressed(&self, button: MouseButton) -> bool {
        self.just_pressed_buttons.contains(&button)
    }

    #[inline]
    pub fn is_mouse_just_released(&self, button: MouseButton) -> bool {
        self.just_released_buttons.contains(&button)
    }

    /// Last cursor position, `None` before the cursor entered the window.
    #[inline]
    pub fn mouse_position(&self) -> Option<(f32, f32)> {
        self.mouse_position
    }

    #[inline]
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    #[inline]
    pub fn scroll_delta(&self) -> (f32, f32) {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_is_just_pressed_once() {
        let mut input = InputState::new();
        input.handle_key(KeyCode::Escape, true);
        input.handle_key(KeyCode::Escape, true);
        assert!(input.is_key_just_pressed(KeyCode::Escape));

        input.begin_pump();
        assert!(input.is_key_pressed(KeyCode::Escape));
        assert!(!input.is_key_just_pressed(KeyCode::Escape));

        input.handle_key(KeyCode::Escape, false);
        assert!(input.is_key_just_released(KeyCode::Escape));
        assert!(!input.is_key_pressed(KeyCode::Escape));
    }

    #[test]
    fn test_cursor_delta_accumulates_within_pump() {
        let mut input = InputState::new();
        input.handle_cursor(10.0, 10.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));

        input.handle_cursor(12.0, 9.0);
        input.handle_cursor(15.0, 9.0);
        assert_eq!(input.mouse_delta(), (5.0, -1.0));
        assert_eq!(input.mouse_position(), Some((15.0, 9.0)));

        input.begin_pump();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_scroll_accumulates() {
        let mut input = InputState::new();
        input.handle_scroll(0.0, 1.0);
        input.handle_scroll(0.5, 1.0);
        assert_eq!(input.scroll_delta(), (0.5, 2.0));
    }

    #[test]
    fn test_release_all_on_focus_loss() {
        let mut input = InputState::new();
        input.handle_key(KeyCode::KeyW, true);
        input.handle_button(MouseButton::Left, true);
        input.begin_pump();

        input.release_all();
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_released(KeyCode::KeyW));
        assert!(input.is_mouse_just_released(MouseButton::Left));
    }

    #[test]
    fn test_mouse_button_conversion() {
        assert_eq!(MouseButton::from(winit::event::MouseButton::Back), MouseButton::Back);
        assert_eq!(
            MouseButton::from(winit::event::MouseButton::Other(7)),
            MouseButton::Other(7)
        );
    }
}
