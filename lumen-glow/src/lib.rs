/// Lumen Glow - OpenGL 3.3 / WebGL2 backend
///
/// Implements [`GraphicsContext`] on top of any `glow` context. Native
/// objects live in per-kind tables and are handed out as the core's small
/// integer handles; ids are never reused, so a stale handle can only miss.
///
/// Like the underlying GL context, a [`GlowContext`] must only be used from
/// the thread that made the context current.
use std::collections::HashMap;

use glow::HasContext;
use lumen_core::context::{
    AttributeLocation, BufferHandle, GraphicsContext, Primitive, ProgramHandle, RenderState,
    ShaderHandle, ShaderStage, TextureHandle, UniformLocation, VertexArrayHandle,
};
use lumen_core::texture::TextureImage;

/// Storage mapping integer ids to native objects. Removed entries are freed
/// and their ids are never handed out again.
#[derive(Debug)]
pub struct HandleTable<T> {
    entries: HashMap<u32, T>,
    next_id: u32,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T> HandleTable<T> {
    pub fn insert(&mut self, value: T) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, value);
        id
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        self.entries.remove(&id)
    }

    /// Objects inserted and not yet removed
    pub fn live(&self) -> usize {
        self.entries.len()
    }
}

/// Uniform locations grouped by the program they were resolved against
#[derive(Debug)]
pub struct UniformTable<T> {
    locations: HandleTable<T>,
    owners: HashMap<u32, Vec<u32>>,
}

impl<T> Default for UniformTable<T> {
    fn default() -> Self {
        Self {
            locations: HandleTable::default(),
            owners: HashMap::new(),
        }
    }
}

impl<T> UniformTable<T> {
    pub fn insert(&mut self, program: u32, location: T) -> u32 {
        let id = self.locations.insert(location);
        self.owners.entry(program).or_default().push(id);
        id
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.locations.get(id)
    }

    /// Drops every location resolved against `program`.
    pub fn forget_program(&mut self, program: u32) {
        for id in self.owners.remove(&program).unwrap_or_default() {
            self.locations.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.locations.live()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn stage_enum(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn primitive_enum(primitive: Primitive) -> u32 {
    match primitive {
        Primitive::Triangles => glow::TRIANGLES,
        Primitive::Lines => glow::LINES,
    }
}

fn gl_int(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

pub struct GlowContext<C: HasContext> {
    gl: C,
    clear_color: [f32; 4],
    shaders: HandleTable<C::Shader>,
    programs: HandleTable<C::Program>,
    buffers: HandleTable<C::Buffer>,
    vertex_arrays: HandleTable<C::VertexArray>,
    textures: HandleTable<C::Texture>,
    uniforms: UniformTable<C::UniformLocation>,
}

impl<C: HasContext> GlowContext<C> {
    pub fn new(gl: C) -> Self {
        Self {
            gl,
            clear_color: RenderState::default().clear_color,
            shaders: HandleTable::default(),
            programs: HandleTable::default(),
            buffers: HandleTable::default(),
            vertex_arrays: HandleTable::default(),
            textures: HandleTable::default(),
            uniforms: UniformTable::default(),
        }
    }

    pub fn gl(&self) -> &C {
        &self.gl
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe {
            self.gl
                .viewport(0, 0, gl_int(width as usize), gl_int(height as usize));
        }
    }

    /// GPU objects still owned through this context
    pub fn live_objects(&self) -> usize {
        self.shaders.live()
            + self.programs.live()
            + self.buffers.live()
            + self.vertex_arrays.live()
            + self.textures.live()
    }

    fn set_capability(&self, capability: u32, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(capability);
            } else {
                self.gl.disable(capability);
            }
        }
    }
}

impl<C: HasContext> GraphicsContext for GlowContext<C> {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        unsafe {
            let shader = self.gl.create_shader(stage_enum(stage))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(log);
            }
            Ok(ShaderHandle(self.shaders.insert(shader)))
        }
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, String> {
        let natives = shaders
            .iter()
            .map(|s| {
                self.shaders
                    .get(s.0)
                    .copied()
                    .ok_or_else(|| format!("unknown shader handle {}", s.0))
            })
            .collect::<Result<Vec<_>, _>>()?;

        unsafe {
            let program = self.gl.create_program()?;
            for shader in &natives {
                self.gl.attach_shader(program, *shader);
            }
            self.gl.link_program(program);
            for shader in &natives {
                self.gl.detach_shader(program, *shader);
            }
            if !self.gl.get_program_link_status(program) {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(log);
            }
            Ok(ProgramHandle(self.programs.insert(program)))
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        match self.shaders.remove(shader.0) {
            Some(native) => unsafe { self.gl.delete_shader(native) },
            None => log::warn!("glow: delete of unknown shader {}", shader.0),
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.uniforms.forget_program(program.0);
        match self.programs.remove(program.0) {
            Some(native) => unsafe { self.gl.delete_program(native) },
            None => log::warn!("glow: delete of unknown program {}", program.0),
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let native = self.programs.get(program.0).copied();
        if native.is_none() {
            log::warn!("glow: use of unknown program {}", program.0);
        }
        unsafe { self.gl.use_program(native) }
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let native = *self.programs.get(program.0)?;
        let location = unsafe { self.gl.get_uniform_location(native, name) }?;
        Some(UniformLocation(self.uniforms.insert(program.0, location)))
    }

    fn attribute_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> Option<AttributeLocation> {
        let native = *self.programs.get(program.0)?;
        unsafe { self.gl.get_attrib_location(native, name) }.map(AttributeLocation)
    }

    fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(self.uniforms.get(location.0), value) }
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(self.uniforms.get(location.0), value) }
    }

    fn uniform_3f(&mut self, location: UniformLocation, value: [f32; 3]) {
        let [x, y, z] = value;
        unsafe { self.gl.uniform_3_f32(self.uniforms.get(location.0), x, y, z) }
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, row_major: &[f32; 16]) {
        // GL reads column-major; transposing on upload keeps the row-major layout
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(self.uniforms.get(location.0), true, row_major)
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl
                .bind_texture(glow::TEXTURE_2D, self.textures.get(texture.0).copied());
        }
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferHandle, String> {
        unsafe {
            let buffer = self.gl.create_buffer()?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(data),
                glow::STATIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(BufferHandle(self.buffers.insert(buffer)))
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(buffer.0) {
            Some(native) => unsafe { self.gl.delete_buffer(native) },
            None => log::warn!("glow: delete of unknown buffer {}", buffer.0),
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, String> {
        let vertex_array = unsafe { self.gl.create_vertex_array() }?;
        Ok(VertexArrayHandle(self.vertex_arrays.insert(vertex_array)))
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        let native = vertex_array.and_then(|v| self.vertex_arrays.get(v.0).copied());
        unsafe { self.gl.bind_vertex_array(native) }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        match self.vertex_arrays.remove(vertex_array.0) {
            Some(native) => unsafe { self.gl.delete_vertex_array(native) },
            None => log::warn!("glow: delete of unknown vertex array {}", vertex_array.0),
        }
    }

    fn attribute_pointer(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
    ) {
        let Some(native) = self.buffers.get(buffer.0).copied() else {
            log::warn!("glow: attribute pointer to unknown buffer {}", buffer.0);
            return;
        };
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(native));
            self.gl.enable_vertex_attrib_array(location.0);
            self.gl
                .vertex_attrib_pointer_f32(location.0, components as i32, glow::FLOAT, false, 0, 0);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, String> {
        unsafe {
            let texture = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                gl_int(image.width() as usize),
                gl_int(image.height() as usize),
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(image.pixels())),
            );
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(TextureHandle(self.textures.insert(texture)))
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        match self.textures.remove(texture.0) {
            Some(native) => unsafe { self.gl.delete_texture(native) },
            None => log::warn!("glow: delete of unknown texture {}", texture.0),
        }
    }

    fn apply_state(&mut self, state: &RenderState) {
        self.clear_color = state.clear_color;
        self.set_capability(glow::DEPTH_TEST, state.depth_test);
        self.set_capability(glow::CULL_FACE, state.cull_back_faces);
        self.set_capability(glow::BLEND, state.alpha_blending);
        unsafe {
            self.gl.cull_face(glow::BACK);
            self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }
        log::debug!("applied render state {state:?}");
    }

    fn clear(&mut self) {
        let [r, g, b, a] = self.clear_color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize) {
        unsafe {
            self.gl
                .draw_arrays(primitive_enum(primitive), gl_int(first), gl_int(count))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_table_never_reuses_ids() {
        let mut table = HandleTable::default();
        let a = table.insert("vertex");
        let b = table.insert("fragment");
        assert_eq!(table.remove(a), Some("vertex"));
        assert_eq!(table.remove(a), None);
        let c = table.insert("program");
        assert_ne!(c, a);
        assert_eq!(table.get(b), Some(&"fragment"));
        assert_eq!(table.get(a), None);
        assert_eq!(table.live(), 2);
    }

    #[test]
    fn test_deleted_program_drops_its_uniforms() {
        let mut uniforms = UniformTable::default();
        let model = uniforms.insert(0, "model_mat");
        let view = uniforms.insert(0, "view_mat");
        let other = uniforms.insert(1, "model_mat");
        assert_eq!(uniforms.len(), 3);

        uniforms.forget_program(0);
        assert_eq!(uniforms.len(), 1);
        assert_eq!(uniforms.get(model), None);
        assert_eq!(uniforms.get(view), None);
        assert_eq!(uniforms.get(other), Some(&"model_mat"));

        uniforms.forget_program(0);
        let again = uniforms.insert(2, "model_mat");
        assert!(again > other);
    }

    #[test]
    fn test_enum_mapping() {
        assert_eq!(stage_enum(ShaderStage::Vertex), glow::VERTEX_SHADER);
        assert_eq!(stage_enum(ShaderStage::Fragment), glow::FRAGMENT_SHADER);
        assert_eq!(primitive_enum(Primitive::Triangles), glow::TRIANGLES);
        assert_eq!(primitive_enum(Primitive::Lines), glow::LINES);
        assert_eq!(gl_int(usize::MAX), i32::MAX);
    }
}
