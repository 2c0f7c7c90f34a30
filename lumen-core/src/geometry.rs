/// Flat, non-indexed geometry ready for direct upload
use nalgebra::{Vector2, Vector3};

use crate::context::Primitive;
use crate::error::MeshError;

/// A triangle face defined by three corner positions
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub corners: [Vector3<f32>; 3],
}

impl Triangle {
    pub fn new(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Self {
        Self { corners: [a, b, c] }
    }

    /// Calculate the face normal from the triangle's corners
    pub fn normal(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.corners;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        edge1.cross(&edge2).try_normalize(1e-12).unwrap_or_else(Vector3::zeros)
    }
}

/// Per-corner geometry arrays kept in lockstep: entry `i` of every populated
/// array belongs to the same corner. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAsset {
    primitive: Primitive,
    positions: Vec<Vector3<f32>>,
    normals: Option<Vec<Vector3<f32>>>,
    uvs: Option<Vec<Vector2<f32>>>,
    colors: Option<Vec<Vector3<f32>>>,
}

impl MeshAsset {
    /// Starts a mesh from corner positions; the count must be a whole number of primitives.
    pub fn new(primitive: Primitive, positions: Vec<Vector3<f32>>) -> Result<Self, MeshError> {
        if positions.len() % primitive.corners() != 0 {
            return Err(MeshError::Layout(format!(
                "{} corners do not form whole {:?}",
                positions.len(),
                primitive
            )));
        }
        Ok(Self {
            primitive,
            positions,
            normals: None,
            uvs: None,
            colors: None,
        })
    }

    pub fn with_normals(mut self, normals: Vec<Vector3<f32>>) -> Result<Self, MeshError> {
        self.check_lockstep("normal", normals.len())?;
        self.normals = Some(normals);
        Ok(self)
    }

    pub fn with_uvs(mut self, uvs: Vec<Vector2<f32>>) -> Result<Self, MeshError> {
        self.check_lockstep("uv", uvs.len())?;
        self.uvs = Some(uvs);
        Ok(self)
    }

    pub fn with_colors(mut self, colors: Vec<Vector3<f32>>) -> Result<Self, MeshError> {
        self.check_lockstep("color", colors.len())?;
        self.colors = Some(colors);
        Ok(self)
    }

    /// Fills in per-face normals for a triangle mesh that has none
    pub fn with_flat_normals(mut self) -> Self {
        if self.normals.is_some() || self.primitive != Primitive::Triangles {
            return self;
        }
        let normals = self
            .triangles()
            .flat_map(|triangle| [triangle.normal(); 3])
            .collect();
        self.normals = Some(normals);
        self
    }

    fn check_lockstep(&self, what: &str, len: usize) -> Result<(), MeshError> {
        if len != self.positions.len() {
            return Err(MeshError::Layout(format!(
                "{len} {what} entries for {} positions",
                self.positions.len()
            )));
        }
        Ok(())
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn positions(&self) -> &[Vector3<f32>] {
        &self.positions
    }

    pub fn normals(&self) -> Option<&[Vector3<f32>]> {
        self.normals.as_deref()
    }

    pub fn uvs(&self) -> Option<&[Vector2<f32>]> {
        self.uvs.as_deref()
    }

    pub fn colors(&self) -> Option<&[Vector3<f32>]> {
        self.colors.as_deref()
    }

    /// Number of corners, i.e. the vertex range of one draw call
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match self.primitive {
            Primitive::Triangles => self.positions.len() / 3,
            Primitive::Lines => 0,
        }
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        let corners: &[Vector3<f32>] = match self.primitive {
            Primitive::Triangles => self.positions.as_slice(),
            Primitive::Lines => &[],
        };
        corners
            .chunks_exact(3)
            .map(|c| Triangle::new(c[0], c[1], c[2]))
    }

    /// An axis-aligned cube centred on the origin, with per-face normals,
    /// uvs and colors.
    pub fn cube(size: f32) -> Self {
        let half = size / 2.0;
        // (normal, u axis, v axis, color) with u × v = normal so faces wind counter-clockwise
        let faces = [
            (Vector3::z(), Vector3::x(), Vector3::y(), Vector3::new(0.9, 0.2, 0.2)),
            (-Vector3::z(), -Vector3::x(), Vector3::y(), Vector3::new(0.2, 0.9, 0.2)),
            (Vector3::x(), -Vector3::z(), Vector3::y(), Vector3::new(0.2, 0.2, 0.9)),
            (-Vector3::x(), Vector3::z(), Vector3::y(), Vector3::new(0.9, 0.9, 0.2)),
            (Vector3::y(), Vector3::x(), -Vector3::z(), Vector3::new(0.9, 0.2, 0.9)),
            (-Vector3::y(), Vector3::x(), Vector3::z(), Vector3::new(0.2, 0.9, 0.9)),
        ];
        let quad: [(f32, f32); 6] = [
            (-1.0, -1.0),
            (1.0, -1.0),
            (1.0, 1.0),
            (-1.0, -1.0),
            (1.0, 1.0),
            (-1.0, 1.0),
        ];

        let mut positions = Vec::with_capacity(36);
        let mut normals = Vec::with_capacity(36);
        let mut uvs = Vec::with_capacity(36);
        let mut colors = Vec::with_capacity(36);
        for (normal, u, v, color) in faces {
            for (s, t) in quad {
                positions.push((normal + u * s + v * t) * half);
                normals.push(normal);
                uvs.push(Vector2::new((s + 1.0) / 2.0, (t + 1.0) / 2.0));
                colors.push(color);
            }
        }

        Self {
            primitive: Primitive::Triangles,
            positions,
            normals: Some(normals),
            uvs: Some(uvs),
            colors: Some(colors),
        }
    }

    /// Three line segments along X (red), Y (green) and Z (blue)
    pub fn axes(extent: f32) -> Self {
        let red = Vector3::new(1.0, 0.0, 0.0);
        let green = Vector3::new(0.0, 1.0, 0.0);
        let blue = Vector3::new(0.0, 0.0, 1.0);
        Self {
            primitive: Primitive::Lines,
            positions: vec![
                Vector3::new(-extent, 0.0, 0.0),
                Vector3::new(extent, 0.0, 0.0),
                Vector3::new(0.0, -extent, 0.0),
                Vector3::new(0.0, extent, 0.0),
                Vector3::new(0.0, 0.0, extent),
                Vector3::new(0.0, 0.0, -extent),
            ],
            normals: None,
            uvs: None,
            colors: Some(vec![red, red, green, green, blue, blue]),
        }
    }
}
