/// Point lights written into a shader's light array
use nalgebra::Vector3;

use crate::binding::UniformBinding;
use crate::context::{GraphicsContext, ProgramHandle};
use crate::error::{RenderError, Result};
use crate::shader::ShaderProgram;

/// A light occupying one slot of the shader's light array
#[derive(Debug)]
pub struct Light {
    slot: usize,
    position: UniformBinding,
    color: UniformBinding,
}

impl Light {
    pub fn new(position: Vector3<f32>, color: Vector3<f32>, slot: usize) -> Self {
        Self {
            slot,
            position: UniformBinding::vec3(position),
            color: UniformBinding::vec3(color),
        }
    }

    pub fn white(position: Vector3<f32>, slot: usize) -> Self {
        Self::new(position, Vector3::new(1.0, 1.0, 1.0), slot)
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Checks that this light's slot exists in `shader`, returning the
    /// position and color variable names of that slot.
    pub fn check_slot<'a>(&self, shader: &'a ShaderProgram) -> Result<(&'a str, &'a str)> {
        let lights = shader
            .variables()
            .lights
            .as_ref()
            .ok_or(RenderError::MissingRole {
                role: "light array in shader",
            })?;
        lights
            .position_variable(self.slot)
            .zip(lights.color_variable(self.slot))
            .ok_or(RenderError::LightSlot {
                slot: self.slot,
                capacity: lights.capacity(),
            })
    }

    /// Uploads position and color into this light's slot.
    pub fn update(&self, ctx: &mut dyn GraphicsContext, shader: &ShaderProgram) -> Result<()> {
        let (position, color) = self.check_slot(shader)?;
        let program = shader.handle();
        self.position.bind_and_load(ctx, program, position)?;
        self.color.bind_and_load(ctx, program, color)
    }

    /// Drops the locations cached for a deleted program.
    pub fn forget(&self, program: ProgramHandle) {
        self.position.forget(program);
        self.color.forget(program);
    }
}
