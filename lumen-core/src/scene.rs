/// An ordered list of drawable objects rendered once per frame
use crate::camera::{Camera, InputSnapshot};
use crate::context::{GraphicsContext, RenderState};
use crate::error::Result;
use crate::object::DrawableObject;

/// Identifies an object for the lifetime of its scene. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

#[derive(Debug)]
pub struct Scene {
    state: RenderState,
    objects: Vec<(ObjectId, DrawableObject)>,
    next_id: u64,
}

impl Scene {
    /// Creates an empty scene and applies its fixed-function state.
    pub fn new(ctx: &mut dyn GraphicsContext, state: RenderState) -> Self {
        ctx.apply_state(&state);
        Self {
            state,
            objects: Vec::new(),
            next_id: 0,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Appends an object; registration order is draw order.
    pub fn add(&mut self, object: DrawableObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push((id, object));
        id
    }

    /// Removes and releases an object. Returns false for an unknown id.
    pub fn remove(&mut self, ctx: &mut dyn GraphicsContext, id: ObjectId) -> bool {
        let Some(index) = self.objects.iter().position(|(i, _)| *i == id) else {
            return false;
        };
        let (_, object) = self.objects.remove(index);
        object.release(ctx);
        true
    }

    pub fn get(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.objects.iter().find(|(i, _)| *i == id).map(|(_, o)| o)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut DrawableObject> {
        self.objects
            .iter_mut()
            .find(|(i, _)| *i == id)
            .map(|(_, o)| o)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Clears the frame, then draws every object in registration order.
    pub fn draw_all(&mut self, ctx: &mut dyn GraphicsContext, camera: &mut Camera) -> Result<()> {
        ctx.clear();
        for (_, object) in &mut self.objects {
            object.draw(ctx, camera)?;
        }
        Ok(())
    }

    /// One frame: camera input, then [`Scene::draw_all`].
    pub fn render_frame(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        camera: &mut Camera,
        input: &InputSnapshot,
    ) -> Result<()> {
        camera.update(input);
        self.draw_all(ctx, camera)
    }

    pub fn release(self, ctx: &mut dyn GraphicsContext) {
        log::debug!("releasing scene with {} objects", self.objects.len());
        for (_, object) in self.objects {
            object.release(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use nalgebra::Vector3;

    use super::*;
    use crate::camera::CameraConfig;
    use crate::context::Primitive;
    use crate::geometry::MeshAsset;
    use crate::headless::{Call, HeadlessContext};
    use crate::mesh::GpuMesh;
    use crate::shader::{ShaderProgram, ShaderVariables};
    use crate::transform::Placement;

    fn scene_with_two_objects(ctx: &mut HeadlessContext) -> (Scene, ObjectId, ObjectId) {
        ctx.declare(["position", "model", "view", "projection"]);
        let variables = ShaderVariables::new("position", "model", "view", "projection");
        let shader = Rc::new(ShaderProgram::new(ctx, "void main() {}", "void main() {}", variables).unwrap());
        let cube = Rc::new(GpuMesh::upload(ctx, &MeshAsset::cube(1.0)).unwrap());
        let axes = Rc::new(GpuMesh::upload(ctx, &MeshAsset::axes(10.0)).unwrap());

        let mut scene = Scene::new(ctx, RenderState::default());
        let placement = Placement::at(Vector3::new(0.0, 0.0, -3.0));
        let first = scene.add(DrawableObject::new(ctx, cube, Rc::clone(&shader), placement).unwrap());
        let second = scene.add(DrawableObject::new(ctx, axes, shader, Placement::default()).unwrap());
        (scene, first, second)
    }

    #[test]
    fn test_draw_all_clears_then_draws_in_order() {
        let mut ctx = HeadlessContext::new();
        let (mut scene, _, _) = scene_with_two_objects(&mut ctx);
        assert!(ctx.calls().contains(&Call::ApplyState(RenderState::default())));
        ctx.take_calls();

        let mut camera = Camera::new(800, 600, CameraConfig::default());
        scene.draw_all(&mut ctx, &mut camera).unwrap();

        assert_eq!(ctx.calls().first(), Some(&Call::Clear));
        assert_eq!(
            ctx.draw_calls(),
            vec![(Primitive::Triangles, 0, 36), (Primitive::Lines, 0, 6)]
        );
    }

    #[test]
    fn test_remove_releases_the_object() {
        let mut ctx = HeadlessContext::new();
        let (mut scene, first, second) = scene_with_two_objects(&mut ctx);
        assert!(scene.remove(&mut ctx, first));
        assert!(!scene.remove(&mut ctx, first));
        assert!(scene.get(first).is_none());
        assert!(scene.get(second).is_some());
        assert_eq!(scene.len(), 1);

        scene.release(&mut ctx);
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut ctx = HeadlessContext::new();
        let (mut scene, first, second) = scene_with_two_objects(&mut ctx);
        scene.remove(&mut ctx, second);
        let shader = Rc::clone(scene.get(first).unwrap().shader());
        let mesh = Rc::new(GpuMesh::upload(&mut ctx, &MeshAsset::axes(1.0)).unwrap());
        let third = scene.add(DrawableObject::new(&mut ctx, mesh, shader, Placement::default()).unwrap());
        assert_ne!(third, second);
    }
}
