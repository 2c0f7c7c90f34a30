/// Mesh data living in vertex buffers
use crate::binding::AttributeBinding;
use crate::context::{GraphicsContext, Primitive, ProgramHandle};
use crate::error::Result;
use crate::geometry::MeshAsset;

/// One vertex buffer per populated attribute array of a [`MeshAsset`].
///
/// Uploaded once, then shared (behind an `Rc`) by every object drawing it.
/// Each object keeps its own vertex array pointing at these buffers.
#[derive(Debug)]
pub struct GpuMesh {
    primitive: Primitive,
    vertex_count: usize,
    pub(crate) positions: AttributeBinding,
    pub(crate) normals: Option<AttributeBinding>,
    pub(crate) uvs: Option<AttributeBinding>,
    pub(crate) colors: Option<AttributeBinding>,
}

impl GpuMesh {
    pub fn upload(ctx: &mut dyn GraphicsContext, mesh: &MeshAsset) -> Result<Self> {
        let positions = AttributeBinding::vec3(ctx, mesh.positions())?;
        let normals = mesh
            .normals()
            .map(|data| AttributeBinding::vec3(ctx, data))
            .transpose()?;
        let uvs = mesh
            .uvs()
            .map(|data| AttributeBinding::vec2(ctx, data))
            .transpose()?;
        let colors = mesh
            .colors()
            .map(|data| AttributeBinding::vec3(ctx, data))
            .transpose()?;

        log::debug!(
            "uploaded mesh: {} corners, normals={} uvs={} colors={}",
            mesh.vertex_count(),
            normals.is_some(),
            uvs.is_some(),
            colors.is_some()
        );
        Ok(Self {
            primitive: mesh.primitive(),
            vertex_count: mesh.vertex_count(),
            positions,
            normals,
            uvs,
            colors,
        })
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Drops the attribute locations cached for a deleted program.
    pub fn forget(&self, program: ProgramHandle) {
        self.positions.forget(program);
        for binding in [&self.normals, &self.uvs, &self.colors].into_iter().flatten() {
            binding.forget(program);
        }
    }

    pub fn release(self, ctx: &mut dyn GraphicsContext) {
        self.positions.release(ctx);
        for binding in [self.normals, self.uvs, self.colors].into_iter().flatten() {
            binding.release(ctx);
        }
    }
}
