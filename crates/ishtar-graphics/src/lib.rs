//! Graphics building blocks for the ishtar rendering exercises.
//!
//! Three independent leaf components, each owning one external resource:
//!
//! - [`ShaderProgram`] — compiles a vertex+fragment WGSL pair into a render
//!   pipeline and exposes typed, name-addressed uniform setters.
//! - [`Texture2D`] — decodes an image file into a mipmapped GPU texture with
//!   a fixed sampling policy.
//! - [`FpsCamera`] — pure CPU state machine converting accumulated
//!   orientation input into view transforms.
//!
//! Demo programs compose these; the components do not depend on each other.

pub mod camera;
pub mod error;
pub mod mesh;
pub mod shader;
pub mod texture;

mod uniform;

pub use camera::{CameraMovement, FpsCamera};
pub use error::{ShaderError, ShaderStage, TextureError};
pub use mesh::{Mesh, Vertex};
pub use shader::{ProgramDesc, ShaderProgram};
pub use texture::Texture2D;
