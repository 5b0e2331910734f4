//! Renderer-facing context types.
//!
//! Convention: scenes draw in a single forward pass with a color attachment
//! (the surface) and a depth attachment owned by the device layer.

mod ctx;

pub use ctx::RenderCtx;
