/// The graphics-context seam every GPU-touching call goes through.
///
/// Instead of relying on an ambient "current context", the context is a value
/// passed explicitly to constructors, uploads and draw calls. All calls must
/// happen on the thread that owns the underlying API context.
use std::fmt;

use crate::texture::TextureImage;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);
    };
}

handle!(
    /// A compiled, not yet linked, shader stage.
    ShaderHandle
);
handle!(
    /// A linked program. Never reused by a context after deletion.
    ProgramHandle
);
handle!(BufferHandle);
handle!(VertexArrayHandle);
handle!(TextureHandle);
handle!(UniformLocation);
handle!(AttributeLocation);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// How a run of corners is assembled into primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Primitive {
    #[default]
    Triangles,
    Lines,
}

impl Primitive {
    /// Number of corners making up one primitive
    pub fn corners(self) -> usize {
        match self {
            Primitive::Triangles => 3,
            Primitive::Lines => 2,
        }
    }
}

/// Fixed-function state applied once when a scene is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub clear_color: [f32; 4],
    pub depth_test: bool,
    pub cull_back_faces: bool,
    /// Source-alpha / one-minus-source-alpha blending
    pub alpha_blending: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: true,
            cull_back_faces: true,
            alpha_blending: true,
        }
    }
}

/// Operations the core needs from a graphics API.
///
/// Creation calls return `Err` with the backend's diagnostic text: the
/// compiler log for `compile_shader`, the linker log for `link_program`.
pub trait GraphicsContext {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;
    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, String>;
    fn delete_shader(&mut self, shader: ShaderHandle);
    fn delete_program(&mut self, program: ProgramHandle);
    fn use_program(&mut self, program: ProgramHandle);

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn attribute_location(&mut self, program: ProgramHandle, name: &str)
        -> Option<AttributeLocation>;

    fn uniform_1f(&mut self, location: UniformLocation, value: f32);
    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    fn uniform_3f(&mut self, location: UniformLocation, value: [f32; 3]);
    /// Uploads a matrix given in row-major order.
    fn uniform_matrix4(&mut self, location: UniformLocation, row_major: &[f32; 16]);
    /// Makes `unit` the active texture unit and binds `texture` to it.
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferHandle, String>;
    fn delete_buffer(&mut self, buffer: BufferHandle);
    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, String>;
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);
    /// Points `location` of the bound vertex array at a tightly packed float buffer.
    fn attribute_pointer(&mut self, location: AttributeLocation, buffer: BufferHandle, components: u32);

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, String>;
    fn delete_texture(&mut self, texture: TextureHandle);

    fn apply_state(&mut self, state: &RenderState);
    /// Clears the color and depth buffers.
    fn clear(&mut self);
    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize);
}
