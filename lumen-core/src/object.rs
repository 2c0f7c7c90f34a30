/// Drawable objects: a shared mesh and shader plus an owned transform
use std::rc::Rc;

use nalgebra::{Matrix4, Vector3};

use crate::binding::{UniformBinding, UniformValue};
use crate::camera::Camera;
use crate::context::{GraphicsContext, VertexArrayHandle};
use crate::error::{RenderError, Result};
use crate::light::Light;
use crate::mesh::GpuMesh;
use crate::shader::ShaderProgram;
use crate::texture::Texture;
use crate::transform::{Placement, Rotation, Space, TransformAction};

/// Texture unit textured objects sample from
pub const TEXTURE_UNIT: u32 = 1;

/// What happens to queued transform actions after a draw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Actions stay queued and are applied again on every draw, so a single
    /// queued rotation keeps spinning the object.
    #[default]
    Replay,
    /// Actions are applied once and then dropped.
    Consume,
}

#[derive(Debug)]
struct TextureBinding {
    texture: Rc<Texture>,
    sampler: UniformBinding,
}

#[derive(Debug)]
pub struct DrawableObject {
    mesh: Rc<GpuMesh>,
    shader: Rc<ShaderProgram>,
    vertex_array: VertexArrayHandle,
    transform: Matrix4<f32>,
    model: UniformBinding,
    texture: Option<TextureBinding>,
    lights: Vec<Rc<Light>>,
    actions: Vec<TransformAction>,
    policy: QueuePolicy,
}

impl DrawableObject {
    /// Builds the object's vertex array over the mesh buffers.
    ///
    /// The position attribute and the model matrix uniform must exist in the
    /// shader. Normals, uvs and colors are bound when the mesh carries them
    /// and the shader names a variable for them.
    pub fn new(
        ctx: &mut dyn GraphicsContext,
        mesh: Rc<GpuMesh>,
        shader: Rc<ShaderProgram>,
        placement: Placement,
    ) -> Result<Self> {
        let vertex_array = ctx.create_vertex_array().map_err(RenderError::Resource)?;
        let transform = placement.initial_matrix();
        let model = UniformBinding::mat4(transform);

        ctx.bind_vertex_array(Some(vertex_array));
        let prepared = bind_vertex_inputs(ctx, &mesh, &shader, &model);
        ctx.bind_vertex_array(None);
        if let Err(err) = prepared {
            ctx.delete_vertex_array(vertex_array);
            return Err(err);
        }

        Ok(Self {
            mesh,
            shader,
            vertex_array,
            transform,
            model,
            texture: None,
            lights: Vec::new(),
            actions: Vec::new(),
            policy: QueuePolicy::default(),
        })
    }

    /// Samples `texture` while drawing. Needs a sampler variable and uv data.
    pub fn with_texture(mut self, ctx: &mut dyn GraphicsContext, texture: Rc<Texture>) -> Result<Self> {
        let variables = self.shader.variables();
        let sampler_name = variables.sampler.as_deref().ok_or(RenderError::MissingRole {
            role: "sampler variable in shader",
        })?;
        if variables.uv.is_none() {
            return Err(RenderError::MissingRole {
                role: "uv variable in shader",
            });
        }
        if !self.mesh.has_uvs() {
            return Err(RenderError::MissingRole {
                role: "uv data in mesh",
            });
        }

        let sampler = UniformBinding::sampler2d(texture.handle(), TEXTURE_UNIT);
        sampler.find_variable(ctx, self.shader.handle(), sampler_name)?;
        self.texture = Some(TextureBinding { texture, sampler });
        Ok(self)
    }

    /// Attaches a light. Its slot must fit the shader's light array and not
    /// collide with a light already attached.
    pub fn add_light(&mut self, light: Rc<Light>) -> Result<()> {
        light.check_slot(&self.shader)?;
        if self.lights.iter().any(|l| l.slot() == light.slot()) {
            return Err(RenderError::DuplicateLightSlot { slot: light.slot() });
        }
        self.lights.push(light);
        Ok(())
    }

    pub fn lights(&self) -> &[Rc<Light>] {
        &self.lights
    }

    /// Queues a rotation in the object's own basis.
    pub fn rotate(&mut self, rotation: Rotation) {
        self.rotate_in(rotation, Space::Local);
    }

    pub fn rotate_in(&mut self, rotation: Rotation, space: Space) {
        self.queue(TransformAction::Rotate { rotation, space });
    }

    /// Queues a translation in the object's own basis.
    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.translate_in(offset, Space::Local);
    }

    pub fn translate_in(&mut self, offset: Vector3<f32>, space: Space) {
        self.queue(TransformAction::Translate { offset, space });
    }

    pub fn scale(&mut self, factors: Vector3<f32>) {
        self.queue(TransformAction::Scale { factors });
    }

    pub fn queue(&mut self, action: TransformAction) {
        if let TransformAction::Rotate { rotation, .. } = &action {
            if rotation.is_degenerate() {
                log::warn!("queued rotation about a zero-length axis has no effect");
            }
        }
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[TransformAction] {
        &self.actions
    }

    pub fn clear_actions(&mut self) {
        self.actions.clear();
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn set_queue_policy(&mut self, policy: QueuePolicy) {
        self.policy = policy;
    }

    pub fn model_matrix(&self) -> &Matrix4<f32> {
        &self.transform
    }

    pub fn shader(&self) -> &Rc<ShaderProgram> {
        &self.shader
    }

    pub fn mesh(&self) -> &Rc<GpuMesh> {
        &self.mesh
    }

    /// Draws the object: program, camera, lights, texture, queued actions,
    /// model matrix, then the draw call for the whole vertex range.
    pub fn draw(&mut self, ctx: &mut dyn GraphicsContext, camera: &mut Camera) -> Result<()> {
        let shader = &self.shader;
        let program = shader.handle();
        shader.use_program(ctx);
        camera.upload(ctx, shader)?;
        for light in &self.lights {
            light.update(ctx, shader)?;
        }
        if let (Some(binding), Some(name)) = (&self.texture, &shader.variables().sampler) {
            binding.sampler.bind_and_load(ctx, program, name)?;
        }

        for action in &self.actions {
            self.transform = action.apply(&self.transform);
        }
        if self.policy == QueuePolicy::Consume {
            self.actions.clear();
        }
        self.model.set(UniformValue::Mat4(self.transform))?;
        self.model.bind_and_load(ctx, program, &shader.variables().model)?;

        ctx.bind_vertex_array(Some(self.vertex_array));
        ctx.draw_arrays(self.mesh.primitive(), 0, self.mesh.vertex_count());
        Ok(())
    }

    /// Frees the vertex array, plus the mesh, shader and texture when this
    /// object held the last reference to them. When the shader goes, the
    /// surviving mesh and lights forget its variable locations.
    pub fn release(self, ctx: &mut dyn GraphicsContext) {
        ctx.delete_vertex_array(self.vertex_array);
        if let Some(binding) = self.texture {
            if let Ok(texture) = Rc::try_unwrap(binding.texture) {
                texture.release(ctx);
            }
        }

        let program = self.shader.handle();
        let shader_released = match Rc::try_unwrap(self.shader) {
            Ok(shader) => {
                shader.release(ctx);
                true
            }
            Err(_) => false,
        };
        match Rc::try_unwrap(self.mesh) {
            Ok(mesh) => mesh.release(ctx),
            Err(mesh) if shader_released => mesh.forget(program),
            Err(_) => {}
        }
        if shader_released {
            for light in &self.lights {
                light.forget(program);
            }
        }
    }
}

fn bind_vertex_inputs(
    ctx: &mut dyn GraphicsContext,
    mesh: &GpuMesh,
    shader: &ShaderProgram,
    model: &UniformBinding,
) -> Result<()> {
    let program = shader.handle();
    let variables = shader.variables();
    mesh.positions.bind(ctx, program, &variables.position)?;

    let optional = [
        (&mesh.normals, &variables.normal),
        (&mesh.uvs, &variables.uv),
        (&mesh.colors, &variables.color),
    ];
    for (binding, name) in optional {
        if let (Some(binding), Some(name)) = (binding, name) {
            binding.bind(ctx, program, name)?;
        }
    }

    model.find_variable(ctx, program, &variables.model)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraConfig;
    use crate::geometry::MeshAsset;
    use crate::headless::{Call, HeadlessContext};
    use crate::shader::{LightArray, ShaderVariables};
    use crate::texture::TextureImage;

    struct Fixture {
        ctx: HeadlessContext,
        mesh: Rc<GpuMesh>,
        shader: Rc<ShaderProgram>,
        camera: Camera,
    }

    fn fixture() -> Fixture {
        let mut ctx = HeadlessContext::new();
        ctx.declare([
            "position",
            "vertex_color",
            "vertex_uv",
            "model_mat",
            "view_mat",
            "proj_mat",
            "tex",
            "light_data[0].position",
            "light_data[0].color",
        ]);
        let variables = ShaderVariables::new("position", "model_mat", "view_mat", "proj_mat")
            .with_color("vertex_color")
            .with_uv("vertex_uv")
            .with_sampler("tex")
            .with_lights(LightArray::new("light_data", 2));
        let shader = ShaderProgram::new(&mut ctx, "void main() {}", "void main() {}", variables).unwrap();
        let mesh = GpuMesh::upload(&mut ctx, &MeshAsset::cube(1.0)).unwrap();
        Fixture {
            ctx,
            mesh: Rc::new(mesh),
            shader: Rc::new(shader),
            camera: Camera::new(640, 480, CameraConfig::default()),
        }
    }

    #[test]
    fn test_replayed_rotation_accumulates() {
        let Fixture {
            mut ctx,
            mesh,
            shader,
            mut camera,
        } = fixture();
        let placement = Placement::at(Vector3::new(0.0, 0.0, -5.0));
        let mut object = DrawableObject::new(&mut ctx, mesh, shader, placement).unwrap();
        object.rotate(Rotation::new(30.0, Vector3::y()));

        for _ in 0..3 {
            object.draw(&mut ctx, &mut camera).unwrap();
        }

        let expected = placement.initial_matrix() * Rotation::new(90.0, Vector3::y()).matrix();
        assert!((object.model_matrix() - expected).norm() < 1e-5);
        assert_eq!(object.actions().len(), 1);
        assert_eq!(ctx.matrix_uploads("model_mat").len(), 3);
        assert_eq!(ctx.lookup_count("model_mat"), 1);
    }

    #[test]
    fn test_consumed_actions_apply_once() {
        let Fixture {
            mut ctx,
            mesh,
            shader,
            mut camera,
        } = fixture();
        let mut object = DrawableObject::new(&mut ctx, mesh, shader, Placement::default()).unwrap();
        object.set_queue_policy(QueuePolicy::Consume);
        object.translate(Vector3::new(1.0, 0.0, 0.0));
        object.scale(Vector3::new(2.0, 2.0, 2.0));

        object.draw(&mut ctx, &mut camera).unwrap();
        object.draw(&mut ctx, &mut camera).unwrap();

        let expected = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0)) * Matrix4::new_scaling(2.0);
        assert!((object.model_matrix() - expected).norm() < 1e-6);
        assert!(object.actions().is_empty());
    }

    #[test]
    fn test_draw_order_of_calls() {
        let Fixture {
            mut ctx,
            mesh,
            shader,
            mut camera,
        } = fixture();
        let mut object = DrawableObject::new(&mut ctx, mesh, Rc::clone(&shader), Placement::default()).unwrap();
        object
            .add_light(Rc::new(Light::white(Vector3::new(0.0, 5.0, 0.0), 0)))
            .unwrap();
        ctx.take_calls();

        object.draw(&mut ctx, &mut camera).unwrap();
        assert_eq!(ctx.vec3_uploads("light_data[0].position"), vec![[0.0, 5.0, 0.0]]);
        assert_eq!(ctx.vec3_uploads("light_data[0].color"), vec![[1.0, 1.0, 1.0]]);

        let calls = ctx.take_calls();
        assert_eq!(calls.first(), Some(&Call::UseProgram(shader.handle())));
        assert!(matches!(
            calls.last(),
            Some(Call::DrawArrays { count: 36, first: 0, .. })
        ));
        assert!(ctx.calls().is_empty());
    }

    #[test]
    fn test_light_slots_are_validated_on_attach() {
        let Fixture {
            mut ctx,
            mesh,
            shader,
            ..
        } = fixture();
        let mut object = DrawableObject::new(&mut ctx, mesh, shader, Placement::default()).unwrap();
        object.add_light(Rc::new(Light::white(Vector3::zeros(), 1))).unwrap();

        let duplicate = object.add_light(Rc::new(Light::white(Vector3::x(), 1)));
        assert!(matches!(duplicate, Err(RenderError::DuplicateLightSlot { slot: 1 })));
        let overflow = object.add_light(Rc::new(Light::white(Vector3::x(), 2)));
        assert!(matches!(overflow, Err(RenderError::LightSlot { slot: 2, capacity: 2 })));
        assert_eq!(object.lights().len(), 1);
    }

    #[test]
    fn test_texture_binds_unit_one() {
        let Fixture {
            mut ctx,
            mesh,
            shader,
            mut camera,
        } = fixture();
        let texture = Texture::new(&mut ctx, &TextureImage::solid(2, 2, [255; 4])).unwrap();
        let handle = texture.handle();
        let mut object = DrawableObject::new(&mut ctx, mesh, shader, Placement::default())
            .unwrap()
            .with_texture(&mut ctx, Rc::new(texture))
            .unwrap();

        object.draw(&mut ctx, &mut camera).unwrap();
        assert!(ctx.calls().contains(&Call::BindTexture {
            unit: TEXTURE_UNIT,
            texture: handle
        }));
    }

    #[test]
    fn test_missing_model_uniform_cleans_up() {
        let mut ctx = HeadlessContext::new();
        ctx.declare(["position"]);
        let variables = ShaderVariables::new("position", "model_mat", "view_mat", "proj_mat");
        let shader = ShaderProgram::new(&mut ctx, "void main() {}", "void main() {}", variables).unwrap();
        let mesh = GpuMesh::upload(&mut ctx, &MeshAsset::axes(1.0)).unwrap();
        let live = ctx.live_resources();

        let err = DrawableObject::new(&mut ctx, Rc::new(mesh), Rc::new(shader), Placement::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::Lookup { ref name } if name == "model_mat"));
        assert_eq!(ctx.live_resources(), live);
    }

    #[test]
    fn test_release_frees_last_references() {
        let Fixture {
            mut ctx,
            mesh,
            shader,
            ..
        } = fixture();
        let first = DrawableObject::new(&mut ctx, Rc::clone(&mesh), Rc::clone(&shader), Placement::default()).unwrap();
        let second = DrawableObject::new(&mut ctx, mesh, shader, Placement::default()).unwrap();

        first.release(&mut ctx);
        // program + four cube buffers + the second vertex array
        assert_eq!(ctx.live_resources(), 6);
        second.release(&mut ctx);
        assert_eq!(ctx.live_resources(), 0);
    }
}
