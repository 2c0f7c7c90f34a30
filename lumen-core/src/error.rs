/// Error types for mesh loading, shader building and variable binding
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::binding::BindingKind;
use crate::context::ShaderStage;

/// Which per-corner attribute a face index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Position,
    Uv,
    Normal,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Attribute::Position => "position",
            Attribute::Uv => "uv",
            Attribute::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// Failures while loading a mesh. No partial mesh is ever produced.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A record that does not follow the geometry line grammar.
    #[error("line {line}: {reason}: `{text}`")]
    Format {
        line: usize,
        text: String,
        reason: String,
    },

    /// A face index outside the list it refers to. `index` is 1-based, as written.
    #[error("line {line}: {attribute} index {index} is out of range (have {available})")]
    Range {
        line: usize,
        attribute: Attribute,
        index: i64,
        available: usize,
    },

    /// Per-corner arrays that are not in lockstep.
    #[error("inconsistent mesh layout: {0}")]
    Layout(String),

    #[error("failed to read mesh: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while building a shader program.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("shader program failed to link:\n{log}")]
    Link { log: String },

    #[error("failed to read shader source {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for everything that can fail while assembling a scene.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// The program has no active variable with this name.
    #[error("shader variable `{name}` not found")]
    Lookup { name: String },

    #[error("light slot {slot} is out of range for a light array of capacity {capacity}")]
    LightSlot { slot: usize, capacity: usize },

    #[error("light slot {slot} is already used by another light on this object")]
    DuplicateLightSlot { slot: usize },

    #[error("cannot store a {found} value in a {expected} binding")]
    KindMismatch {
        expected: BindingKind,
        found: BindingKind,
    },

    /// A feature was requested that needs a role the shader or mesh does not provide.
    #[error("missing {role}")]
    MissingRole { role: &'static str },

    #[error("pixel buffer holds {actual} bytes, a {width}x{height} RGBA image needs {expected}")]
    ImageSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// The backend failed to allocate a GPU object.
    #[error("graphics resource error: {0}")]
    Resource(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
