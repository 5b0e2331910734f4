//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! Runtime code is responsible for translating platform events into
//! `InputEvent`s. Camera-style consumers read held keys from [`InputState`]
//! and per-frame look/scroll deltas from [`InputFrame`]; there is no hidden
//! global cursor bookkeeping.

mod frame;
mod state;
mod types;

pub use frame::InputFrame;
pub use state::InputState;
pub use types::{
    InputEvent,
    Key,
    KeyState,
    Modifiers,
    MouseButton,
    MouseButtonState,
    PointerButtonEvent,
    PointerMoveEvent,
};
