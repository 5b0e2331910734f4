use std::collections::HashSet;

use super::frame::InputFrame;
use super::types::{
    InputEvent,
    Key,
    KeyState,
    Modifiers,
    MouseButton,
    MouseButtonState,
    PointerButtonEvent,
    PointerMoveEvent,
};

/// Current input state for the window.
///
/// Holds "is down" information and current pointer position. Per-frame
/// transitions and deltas are recorded into an `InputFrame`.
#[derive(Debug, Default)]
pub struct InputState {
    /// Current modifier state.
    pub modifiers: Modifiers,

    /// Whether the window is focused.
    pub focused: bool,

    /// Pointer position in logical pixels. `None` while the pointer is
    /// outside the window or the cursor is captured.
    pub pointer_pos: Option<(f32, f32)>,

    /// Set of currently held keys.
    pub keys_down: HashSet<Key>,

    /// Set of currently held mouse buttons.
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    /// Applies a platform-agnostic input event to the current state and
    /// writes deltas to `frame`.
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match &ev {
            InputEvent::ModifiersChanged(m) => {
                self.modifiers = *m;
            }

            InputEvent::Focused(f) => {
                self.focused = *f;
                if !*f {
                    // On focus loss, clear "down" sets so keys do not stay
                    // stuck when focus changes mid-press.
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                self.pointer_pos = Some((*x, *y));
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
            }

            InputEvent::LookDelta { dx, dy } => {
                frame.look_delta.0 += *dx;
                frame.look_delta.1 += *dy;
            }

            InputEvent::Scroll { lines, modifiers } => {
                self.modifiers = *modifiers;
                frame.scroll_lines += *lines;
            }

            InputEvent::Key {
                key,
                state,
                modifiers,
                ..
            } => {
                self.modifiers = *modifiers;

                match state {
                    KeyState::Pressed => {
                        if self.keys_down.insert(*key) {
                            frame.keys_pressed.insert(*key);
                        }
                    }
                    KeyState::Released => {
                        if self.keys_down.remove(key) {
                            frame.keys_released.insert(*key);
                        }
                    }
                }
            }

            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state,
                x,
                y,
                modifiers,
            }) => {
                self.pointer_pos = Some((*x, *y));
                self.modifiers = *modifiers;

                match state {
                    MouseButtonState::Pressed => {
                        if self.buttons_down.insert(*button) {
                            frame.buttons_pressed.insert(*button);
                        }
                    }
                    MouseButtonState::Released => {
                        if self.buttons_down.remove(button) {
                            frame.buttons_released.insert(*button);
                        }
                    }
                }
            }
        }

        frame.push_event(ev);
    }

    /// Helper queries
    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, btn: MouseButton) -> bool {
        self.buttons_down.contains(&btn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: Key) -> InputEvent {
        InputEvent::Key {
            key,
            state: KeyState::Pressed,
            modifiers: Modifiers::default(),
            code: 0,
            repeat: false,
        }
    }

    fn release(key: Key) -> InputEvent {
        InputEvent::Key {
            key,
            state: KeyState::Released,
            modifiers: Modifiers::default(),
            code: 0,
            repeat: false,
        }
    }

    // ── key bookkeeping ───────────────────────────────────────────────────

    #[test]
    fn press_marks_key_down_and_records_transition() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, press(Key::W));

        assert!(state.key_down(Key::W));
        assert!(frame.keys_pressed.contains(&Key::W));
    }

    #[test]
    fn repeat_press_does_not_record_second_transition() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, press(Key::W));
        frame.clear();
        state.apply_event(&mut frame, press(Key::W));

        assert!(state.key_down(Key::W));
        assert!(frame.keys_pressed.is_empty());
    }

    #[test]
    fn release_clears_key_down() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, press(Key::A));
        state.apply_event(&mut frame, release(Key::A));

        assert!(!state.key_down(Key::A));
        assert!(frame.keys_released.contains(&Key::A));
    }

    #[test]
    fn focus_loss_clears_held_keys() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, press(Key::D));
        state.apply_event(&mut frame, InputEvent::Focused(false));

        assert!(!state.key_down(Key::D));
    }

    // ── per-frame deltas ──────────────────────────────────────────────────

    #[test]
    fn look_deltas_accumulate_within_a_frame() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, InputEvent::LookDelta { dx: 3.0, dy: -1.0 });
        state.apply_event(&mut frame, InputEvent::LookDelta { dx: 2.0, dy: 4.0 });

        assert_eq!(frame.look_delta, (5.0, 3.0));
    }

    #[test]
    fn scroll_lines_accumulate_and_clear() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        let m = Modifiers::default();
        state.apply_event(&mut frame, InputEvent::Scroll { lines: 1.0, modifiers: m });
        state.apply_event(&mut frame, InputEvent::Scroll { lines: 0.5, modifiers: m });
        assert_eq!(frame.scroll_lines, 1.5);

        frame.clear();
        assert_eq!(frame.scroll_lines, 0.0);
        assert_eq!(frame.look_delta, (0.0, 0.0));
    }
}
