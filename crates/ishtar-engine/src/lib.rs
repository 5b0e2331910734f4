//! Ishtar engine crate.
//!
//! This crate owns the platform + GPU runtime pieces shared by the rendering
//! exercises: window/event loop, device + surface + depth management,
//! platform-agnostic input, frame timing, and logger bootstrap.

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod render;
