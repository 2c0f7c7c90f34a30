/// Shader variable bindings: uniforms and vertex attributes
///
/// Both kinds resolve a variable's location the first time they are used
/// with a program and remember it for that program only, so per-frame uploads
/// never repeat the lookup. A name the program does not expose is an error.
use std::cell::RefCell;
use std::fmt;

use nalgebra::{Matrix4, Vector2, Vector3};

use crate::context::{
    AttributeLocation, BufferHandle, GraphicsContext, ProgramHandle, TextureHandle,
    UniformLocation,
};
use crate::error::{RenderError, Result};
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Scalar,
    Vec3,
    Mat4,
    Sampler2D,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingKind::Scalar => "scalar",
            BindingKind::Vec3 => "vec3",
            BindingKind::Mat4 => "mat4",
            BindingKind::Sampler2D => "sampler2D",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Float(f32),
    Int(i32),
}

/// The value held by a uniform binding; the variant decides the upload call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Scalar(Scalar),
    Vec3(Vector3<f32>),
    Mat4(Matrix4<f32>),
    Sampler2D { texture: TextureHandle, unit: u32 },
}

impl UniformValue {
    pub fn kind(&self) -> BindingKind {
        match self {
            UniformValue::Scalar(_) => BindingKind::Scalar,
            UniformValue::Vec3(_) => BindingKind::Vec3,
            UniformValue::Mat4(_) => BindingKind::Mat4,
            UniformValue::Sampler2D { .. } => BindingKind::Sampler2D,
        }
    }
}

/// Locations keyed by the program and variable name they were resolved for
#[derive(Debug)]
struct LocationCache<L> {
    entries: RefCell<Vec<(ProgramHandle, String, L)>>,
}

impl<L: Copy> LocationCache<L> {
    fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    fn get(&self, program: ProgramHandle, name: &str) -> Option<L> {
        self.entries
            .borrow()
            .iter()
            .find(|(p, n, _)| *p == program && n == name)
            .map(|(_, _, location)| *location)
    }

    fn insert(&self, program: ProgramHandle, name: &str, location: L) {
        self.entries
            .borrow_mut()
            .push((program, name.to_string(), location));
    }

    fn forget(&self, program: ProgramHandle) {
        self.entries.borrow_mut().retain(|(p, _, _)| *p != program);
    }

    fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// A typed uniform value plus its cached locations
#[derive(Debug)]
pub struct UniformBinding {
    value: UniformValue,
    cache: LocationCache<UniformLocation>,
}

impl UniformBinding {
    pub fn new(value: UniformValue) -> Self {
        Self {
            value,
            cache: LocationCache::new(),
        }
    }

    pub fn float(value: f32) -> Self {
        Self::new(UniformValue::Scalar(Scalar::Float(value)))
    }

    pub fn int(value: i32) -> Self {
        Self::new(UniformValue::Scalar(Scalar::Int(value)))
    }

    pub fn vec3(value: Vector3<f32>) -> Self {
        Self::new(UniformValue::Vec3(value))
    }

    pub fn mat4(value: Matrix4<f32>) -> Self {
        Self::new(UniformValue::Mat4(value))
    }

    pub fn sampler2d(texture: TextureHandle, unit: u32) -> Self {
        Self::new(UniformValue::Sampler2D { texture, unit })
    }

    pub fn kind(&self) -> BindingKind {
        self.value.kind()
    }

    pub fn value(&self) -> &UniformValue {
        &self.value
    }

    /// Replaces the held value; the kind of a binding never changes.
    pub fn set(&mut self, value: UniformValue) -> Result<()> {
        if value.kind() != self.kind() {
            return Err(RenderError::KindMismatch {
                expected: self.kind(),
                found: value.kind(),
            });
        }
        self.value = value;
        Ok(())
    }

    /// Location of `name` in `program`, looked up once per program and name.
    pub fn find_variable(
        &self,
        ctx: &mut dyn GraphicsContext,
        program: ProgramHandle,
        name: &str,
    ) -> Result<UniformLocation> {
        if let Some(location) = self.cache.get(program, name) {
            return Ok(location);
        }
        let location = ctx
            .uniform_location(program, name)
            .ok_or_else(|| RenderError::Lookup {
                name: name.to_string(),
            })?;
        log::debug!("uniform `{name}` of {program:?} resolved to {location:?}");
        self.cache.insert(program, name, location);
        Ok(location)
    }

    /// Uploads the held value to `location`.
    pub fn load(&self, ctx: &mut dyn GraphicsContext, location: UniformLocation) {
        match self.value {
            UniformValue::Scalar(Scalar::Float(value)) => ctx.uniform_1f(location, value),
            UniformValue::Scalar(Scalar::Int(value)) => ctx.uniform_1i(location, value),
            UniformValue::Vec3(value) => ctx.uniform_3f(location, value.into()),
            UniformValue::Mat4(value) => {
                ctx.uniform_matrix4(location, &Transform::to_row_major(&value))
            }
            UniformValue::Sampler2D { texture, unit } => {
                ctx.bind_texture(unit, texture);
                ctx.uniform_1i(location, unit as i32);
            }
        }
    }

    pub fn bind_and_load(
        &self,
        ctx: &mut dyn GraphicsContext,
        program: ProgramHandle,
        name: &str,
    ) -> Result<()> {
        let location = self.find_variable(ctx, program, name)?;
        self.load(ctx, location);
        Ok(())
    }

    /// Drops the locations cached for a deleted program.
    pub fn forget(&self, program: ProgramHandle) {
        self.cache.forget(program);
    }

    /// Forgets every cached location.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

/// A per-vertex float array uploaded once into a vertex buffer
#[derive(Debug)]
pub struct AttributeBinding {
    buffer: BufferHandle,
    components: u32,
    len: usize,
    cache: LocationCache<AttributeLocation>,
}

impl AttributeBinding {
    pub fn vec3(ctx: &mut dyn GraphicsContext, data: &[Vector3<f32>]) -> Result<Self> {
        let flat: Vec<f32> = data.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
        Self::upload(ctx, &flat, 3)
    }

    pub fn vec2(ctx: &mut dyn GraphicsContext, data: &[Vector2<f32>]) -> Result<Self> {
        let flat: Vec<f32> = data.iter().flat_map(|v| [v.x, v.y]).collect();
        Self::upload(ctx, &flat, 2)
    }

    fn upload(ctx: &mut dyn GraphicsContext, flat: &[f32], components: u32) -> Result<Self> {
        let buffer = ctx
            .create_vertex_buffer(flat)
            .map_err(RenderError::Resource)?;
        Ok(Self {
            buffer,
            components,
            len: flat.len() / components as usize,
            cache: LocationCache::new(),
        })
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    /// Number of vertices held
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn find_variable(
        &self,
        ctx: &mut dyn GraphicsContext,
        program: ProgramHandle,
        name: &str,
    ) -> Result<AttributeLocation> {
        if let Some(location) = self.cache.get(program, name) {
            return Ok(location);
        }
        let location = ctx
            .attribute_location(program, name)
            .ok_or_else(|| RenderError::Lookup {
                name: name.to_string(),
            })?;
        log::debug!("attribute `{name}` of {program:?} resolved to {location:?}");
        self.cache.insert(program, name, location);
        Ok(location)
    }

    /// Points the currently bound vertex array's `name` slot at this buffer.
    pub fn bind(
        &self,
        ctx: &mut dyn GraphicsContext,
        program: ProgramHandle,
        name: &str,
    ) -> Result<()> {
        let location = self.find_variable(ctx, program, name)?;
        ctx.attribute_pointer(location, self.buffer, self.components);
        Ok(())
    }

    pub fn forget(&self, program: ProgramHandle) {
        self.cache.forget(program);
    }

    pub fn release(self, ctx: &mut dyn GraphicsContext) {
        ctx.delete_buffer(self.buffer);
    }
}
