use std::fmt;
use std::path::PathBuf;

/// Shader stage tag carried by compile-time diagnostics.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// A failure while building a [`crate::ShaderProgram`].
///
/// Stage-local failures (source read, parse, validation) are tagged with the
/// stage they occurred in; `Link` covers cross-stage failures raised at
/// pipeline creation (interface or uniform-block mismatches).
#[derive(Debug)]
pub enum ShaderError {
    /// A shader source file could not be read.
    SourceRead {
        stage: ShaderStage,
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stage failed to parse or validate. `log` carries the rendered
    /// compiler diagnostic.
    Compile { stage: ShaderStage, log: String },

    /// The two stages do not form a valid program.
    Link { log: String },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::SourceRead { stage, path, source } => {
                write!(f, "cannot read {stage} shader {}: {source}", path.display())
            }
            ShaderError::Compile { stage, log } => {
                write!(f, "{stage} shader failed to compile:\n{log}")
            }
            ShaderError::Link { log } => write!(f, "shader program failed to link:\n{log}"),
        }
    }
}

impl std::error::Error for ShaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaderError::SourceRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A failure while building a [`crate::Texture2D`].
#[derive(Debug)]
pub enum TextureError {
    /// The image file could not be read or decoded.
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    /// The decoded image has a channel count the storage mapping does not
    /// cover (anything outside {1, 3, 4}).
    UnsupportedChannels { path: PathBuf, channels: u8 },
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::Decode { path, source } => {
                write!(f, "failed to decode texture {}: {source}", path.display())
            }
            TextureError::UnsupportedChannels { path, channels } => {
                write!(
                    f,
                    "texture {} has {channels} channels; supported counts are 1, 3 and 4",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}
