/// Lumen Core Library - real-time rendering resource pipeline
///
/// Mesh parsing into flat vertex arrays, transform composition, shader
/// programs with cached variable bindings, a free-look camera, lights and
/// ordered scene drawing. Every GPU call goes through an explicit
/// [`GraphicsContext`]; `lumen-glow` provides the OpenGL implementation and
/// [`HeadlessContext`] a recording one.

pub mod binding;
pub mod camera;
pub mod context;
pub mod error;
pub mod geometry;
pub mod headless;
pub mod light;
pub mod logging;
pub mod mesh;
pub mod obj;
pub mod object;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod transform;

// Re-export commonly used types
pub use binding::{AttributeBinding, BindingKind, Scalar, UniformBinding, UniformValue};
pub use camera::{perspective_matrix, Camera, CameraConfig, InputSnapshot, MouseInput, MovementKeys};
pub use context::{GraphicsContext, Primitive, RenderState, ShaderStage};
pub use error::{Attribute, MeshError, RenderError, Result, ShaderError};
pub use geometry::{MeshAsset, Triangle};
pub use headless::HeadlessContext;
pub use light::Light;
pub use logging::{init_logging, LoggingConfig};
pub use mesh::GpuMesh;
pub use object::{DrawableObject, QueuePolicy};
pub use scene::{ObjectId, Scene};
pub use shader::{LightArray, ShaderProgram, ShaderVariables};
pub use texture::{Texture, TextureImage};
pub use transform::{Placement, Rotation, Space, Transform, TransformAction};
