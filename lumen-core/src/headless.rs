/// A recording graphics context with no GPU behind it.
///
/// Every call is appended to a log that tests (or off-screen validation
/// tools) can inspect. Programs expose the variable names declared through
/// [`HeadlessContext::declare`]; compilation fails for a source containing an
/// `#error` directive and linking fails for a stage without a `main` function.
use std::collections::{HashMap, HashSet};

use crate::context::{
    AttributeLocation, BufferHandle, GraphicsContext, Primitive, ProgramHandle, RenderState,
    ShaderHandle, ShaderStage, TextureHandle, UniformLocation, VertexArrayHandle,
};
use crate::texture::TextureImage;

/// One recorded context call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CompileShader { stage: ShaderStage, shader: ShaderHandle },
    LinkProgram { program: ProgramHandle },
    DeleteShader(ShaderHandle),
    DeleteProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    UniformLookup { program: ProgramHandle, name: String },
    AttributeLookup { program: ProgramHandle, name: String },
    Uniform1f { location: UniformLocation, value: f32 },
    Uniform1i { location: UniformLocation, value: i32 },
    Uniform3f { location: UniformLocation, value: [f32; 3] },
    UniformMatrix4 { location: UniformLocation, row_major: [f32; 16] },
    BindTexture { unit: u32, texture: TextureHandle },
    CreateBuffer { buffer: BufferHandle, len: usize },
    DeleteBuffer(BufferHandle),
    CreateVertexArray(VertexArrayHandle),
    BindVertexArray(Option<VertexArrayHandle>),
    DeleteVertexArray(VertexArrayHandle),
    AttributePointer { location: AttributeLocation, buffer: BufferHandle, components: u32 },
    CreateTexture { texture: TextureHandle, width: u32, height: u32 },
    DeleteTexture(TextureHandle),
    ApplyState(RenderState),
    Clear,
    DrawArrays { primitive: Primitive, first: usize, count: usize },
}

#[derive(Debug)]
struct CompiledShader {
    stage: ShaderStage,
    has_main: bool,
}

#[derive(Debug, Default)]
pub struct HeadlessContext {
    calls: Vec<Call>,
    declared: Vec<String>,
    next_id: u32,
    shaders: HashMap<ShaderHandle, CompiledShader>,
    programs: HashMap<ProgramHandle, Vec<String>>,
    uniforms: Vec<(ProgramHandle, String)>,
    attributes: Vec<(ProgramHandle, String)>,
    live: HashSet<(&'static str, u32)>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares variable names that every program linked afterwards exposes.
    pub fn declare<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared.extend(names.into_iter().map(Into::into));
        self
    }

    /// Compiles and links a minimal program exposing the declared names
    pub fn link_stub_program(&mut self) -> Result<ProgramHandle, String> {
        let vertex = self.compile_shader(ShaderStage::Vertex, "void main() {}")?;
        let fragment = self.compile_shader(ShaderStage::Fragment, "void main() {}")?;
        self.link_program(&[vertex, fragment])
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    /// Name and program a uniform location was resolved for
    pub fn uniform_name(&self, location: UniformLocation) -> Option<(ProgramHandle, &str)> {
        self.uniforms
            .get(location.0 as usize)
            .map(|(program, name)| (*program, name.as_str()))
    }

    /// Number of uniform lookups performed for `name` across all programs
    pub fn lookup_count(&self, name: &str) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::UniformLookup { name: n, .. } if n == name))
            .count()
    }

    /// Every matrix uploaded to a uniform called `name`, oldest first
    pub fn matrix_uploads(&self, name: &str) -> Vec<[f32; 16]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::UniformMatrix4 { location, row_major } => self
                    .uniform_name(*location)
                    .filter(|(_, n)| *n == name)
                    .map(|_| *row_major),
                _ => None,
            })
            .collect()
    }

    /// Every vector uploaded to a uniform called `name`, oldest first
    pub fn vec3_uploads(&self, name: &str) -> Vec<[f32; 3]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Uniform3f { location, value } => self
                    .uniform_name(*location)
                    .filter(|(_, n)| *n == name)
                    .map(|_| *value),
                _ => None,
            })
            .collect()
    }

    pub fn draw_calls(&self) -> Vec<(Primitive, usize, usize)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::DrawArrays {
                    primitive,
                    first,
                    count,
                } => Some((*primitive, *first, *count)),
                _ => None,
            })
            .collect()
    }

    /// GPU objects created and not yet deleted
    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    fn allocate(&mut self, kind: &'static str) -> u32 {
        self.next_id += 1;
        self.live.insert((kind, self.next_id));
        self.next_id
    }

    fn free(&mut self, kind: &'static str, id: u32) {
        if !self.live.remove(&(kind, id)) {
            log::warn!("headless: deleting unknown {kind} {id}");
        }
    }
}

impl GraphicsContext for HeadlessContext {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        if let Some(line) = source.lines().position(|l| l.trim_start().starts_with("#error")) {
            return Err(format!("0:{}(1): error: #error directive", line + 1));
        }
        let shader = ShaderHandle(self.allocate("shader"));
        self.shaders.insert(
            shader,
            CompiledShader {
                stage,
                has_main: source.contains("main"),
            },
        );
        self.calls.push(Call::CompileShader { stage, shader });
        Ok(shader)
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, String> {
        for shader in shaders {
            match self.shaders.get(shader) {
                Some(compiled) if !compiled.has_main => {
                    return Err(format!("error: {} shader lacks `main'", compiled.stage));
                }
                Some(_) => {}
                None => return Err(format!("error: unknown shader object {}", shader.0)),
            }
        }
        let program = ProgramHandle(self.allocate("program"));
        self.programs.insert(program, self.declared.clone());
        self.calls.push(Call::LinkProgram { program });
        Ok(program)
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
        self.free("shader", shader.0);
        self.calls.push(Call::DeleteShader(shader));
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.free("program", program.0);
        self.calls.push(Call::DeleteProgram(program));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(Call::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.calls.push(Call::UniformLookup {
            program,
            name: name.to_string(),
        });
        let known = self.programs.get(&program)?.iter().any(|n| n == name);
        if !known {
            return None;
        }
        let index = match self
            .uniforms
            .iter()
            .position(|(p, n)| *p == program && n == name)
        {
            Some(index) => index,
            None => {
                self.uniforms.push((program, name.to_string()));
                self.uniforms.len() - 1
            }
        };
        Some(UniformLocation(index as u32))
    }

    fn attribute_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> Option<AttributeLocation> {
        self.calls.push(Call::AttributeLookup {
            program,
            name: name.to_string(),
        });
        let known = self.programs.get(&program)?.iter().any(|n| n == name);
        if !known {
            return None;
        }
        let index = match self
            .attributes
            .iter()
            .position(|(p, n)| *p == program && n == name)
        {
            Some(index) => index,
            None => {
                self.attributes.push((program, name.to_string()));
                self.attributes.len() - 1
            }
        };
        Some(AttributeLocation(index as u32))
    }

    fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
        self.calls.push(Call::Uniform1f { location, value });
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.calls.push(Call::Uniform1i { location, value });
    }

    fn uniform_3f(&mut self, location: UniformLocation, value: [f32; 3]) {
        self.calls.push(Call::Uniform3f { location, value });
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, row_major: &[f32; 16]) {
        self.calls.push(Call::UniformMatrix4 {
            location,
            row_major: *row_major,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.calls.push(Call::BindTexture { unit, texture });
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferHandle, String> {
        let buffer = BufferHandle(self.allocate("buffer"));
        self.calls.push(Call::CreateBuffer {
            buffer,
            len: data.len(),
        });
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.free("buffer", buffer.0);
        self.calls.push(Call::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, String> {
        let vertex_array = VertexArrayHandle(self.allocate("vertex array"));
        self.calls.push(Call::CreateVertexArray(vertex_array));
        Ok(vertex_array)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.calls.push(Call::BindVertexArray(vertex_array));
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.free("vertex array", vertex_array.0);
        self.calls.push(Call::DeleteVertexArray(vertex_array));
    }

    fn attribute_pointer(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
    ) {
        self.calls.push(Call::AttributePointer {
            location,
            buffer,
            components,
        });
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, String> {
        let texture = TextureHandle(self.allocate("texture"));
        self.calls.push(Call::CreateTexture {
            texture,
            width: image.width(),
            height: image.height(),
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.free("texture", texture.0);
        self.calls.push(Call::DeleteTexture(texture));
    }

    fn apply_state(&mut self, state: &RenderState) {
        self.calls.push(Call::ApplyState(*state));
    }

    fn clear(&mut self) {
        self.calls.push(Call::Clear);
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize) {
        self.calls.push(Call::DrawArrays {
            primitive,
            first,
            count,
        });
    }
}
