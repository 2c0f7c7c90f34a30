/// 4x4 transformation matrices and composition rules
///
/// Matrices follow mathematical (row, column) indexing: a point is a column
/// vector and `m * p` transforms it. "Local" operations post-multiply (they
/// act in the object's own basis), "world" operations pre-multiply.
use nalgebra::{Matrix4, Rotation3, Unit, Vector3};

/// Axis lengths below this are treated as degenerate
const AXIS_EPSILON: f32 = 1e-6;

/// Which basis an operation is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Post-multiply: `m · op`
    Local,
    /// Pre-multiply: `op · m`
    World,
}

/// A rotation of `angle` degrees about `axis`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub angle: f32,
    pub axis: Vector3<f32>,
}

impl Rotation {
    pub fn new(angle: f32, axis: Vector3<f32>) -> Self {
        Self { angle, axis }
    }

    /// No rotation (zero degrees about +Y)
    pub fn identity() -> Self {
        Self::new(0.0, Vector3::y())
    }

    /// True when the axis is too short to define a direction
    pub fn is_degenerate(&self) -> bool {
        self.axis.norm() < AXIS_EPSILON
    }

    /// Rotation matrix for this angle and axis; identity for a degenerate axis
    pub fn matrix(&self) -> Matrix4<f32> {
        match Unit::try_new(self.axis, AXIS_EPSILON) {
            Some(axis) => Rotation3::from_axis_angle(&axis, self.angle.to_radians()).to_homogeneous(),
            None => Matrix4::identity(),
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Initial placement of an object: rotation, then translation, then scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub rotation: Rotation,
    pub translation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Placement {
    pub fn at(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// Local rotation, then world translation, then local scale: `T · R · S`.
    pub fn initial_matrix(&self) -> Matrix4<f32> {
        let m = Transform::rotate_around_axis(&Matrix4::identity(), &self.rotation, Space::Local);
        let m = Transform::translate(&m, &self.translation, Space::World);
        Transform::scale(&m, &self.scale)
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            rotation: Rotation::identity(),
            translation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// A deferred transform operation, interpreted at draw time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformAction {
    Rotate { rotation: Rotation, space: Space },
    Translate { offset: Vector3<f32>, space: Space },
    Scale { factors: Vector3<f32> },
}

impl TransformAction {
    pub fn apply(&self, matrix: &Matrix4<f32>) -> Matrix4<f32> {
        match self {
            TransformAction::Rotate { rotation, space } => {
                Transform::rotate_around_axis(matrix, rotation, *space)
            }
            TransformAction::Translate { offset, space } => {
                Transform::translate(matrix, offset, *space)
            }
            TransformAction::Scale { factors } => Transform::scale(matrix, factors),
        }
    }
}

/// Pure matrix builders and composition operations
pub struct Transform;

impl Transform {
    /// Create a translation matrix
    pub fn translation_matrix(offset: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_translation(offset)
    }

    /// Create a scale matrix
    pub fn scale_matrix(factors: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(factors)
    }

    pub fn rotate_around_axis(m: &Matrix4<f32>, rotation: &Rotation, space: Space) -> Matrix4<f32> {
        compose(m, &rotation.matrix(), space)
    }

    pub fn translate(m: &Matrix4<f32>, offset: &Vector3<f32>, space: Space) -> Matrix4<f32> {
        compose(m, &Self::translation_matrix(offset), space)
    }

    /// Scaling is always local; there is no world variant.
    pub fn scale(m: &Matrix4<f32>, factors: &Vector3<f32>) -> Matrix4<f32> {
        m * Self::scale_matrix(factors)
    }

    /// Angle in degrees between the matrix's third column and world up
    pub fn forward_up_angle(m: &Matrix4<f32>) -> f32 {
        let forward = Vector3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]);
        forward.angle(&Vector3::y()).to_degrees()
    }

    /// Flattens a matrix row by row, the layout the upload calls expect
    pub fn to_row_major(m: &Matrix4<f32>) -> [f32; 16] {
        let mut out = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = m[(row, col)];
            }
        }
        out
    }
}

fn compose(m: &Matrix4<f32>, op: &Matrix4<f32>, space: Space) -> Matrix4<f32> {
    match space {
        Space::Local => m * op,
        Space::World => op * m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Matrix4<f32>, b: &Matrix4<f32>) -> bool {
        (a - b).norm() < 1e-5
    }

    #[test]
    fn test_rotation_round_trip_is_identity() {
        let y = Rotation::new(90.0, Vector3::y());
        let back = Rotation::new(-90.0, Vector3::y());
        let m = Transform::rotate_around_axis(&Matrix4::identity(), &y, Space::Local);
        let m = Transform::rotate_around_axis(&m, &back, Space::Local);
        assert!(close(&m, &Matrix4::identity()));
    }

    #[test]
    fn test_rotation_about_y_turns_x_into_minus_z() {
        let m = Rotation::new(90.0, Vector3::y()).matrix();
        let x = m.transform_vector(&Vector3::x());
        assert!((x - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_local_and_world_translation_differ() {
        let rotated = Rotation::new(90.0, Vector3::y()).matrix();
        let offset = Vector3::new(1.0, 0.0, 0.0);

        let local = Transform::translate(&rotated, &offset, Space::Local);
        let world = Transform::translate(&rotated, &offset, Space::World);

        // World translation lands on the world X axis, local follows the rotated basis.
        let origin = |m: &Matrix4<f32>| Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        assert!((origin(&world) - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-6);
        assert!((origin(&local) - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_initial_placement_is_translate_rotate_scale() {
        let placement = Placement::at(Vector3::new(1.0, 2.0, 3.0))
            .with_rotation(Rotation::new(30.0, Vector3::new(1.0, 1.0, 0.0)))
            .with_scale(Vector3::new(2.0, 2.0, 2.0));

        let expected = Transform::translation_matrix(&placement.translation)
            * placement.rotation.matrix()
            * Transform::scale_matrix(&placement.scale);
        assert!(close(&placement.initial_matrix(), &expected));
    }

    #[test]
    fn test_degenerate_axis_leaves_matrix_unchanged() {
        let m = Transform::translation_matrix(&Vector3::new(4.0, 0.0, 0.0));
        let r = Rotation::new(45.0, Vector3::zeros());
        assert!(close(&Transform::rotate_around_axis(&m, &r, Space::World), &m));
    }

    #[test]
    fn test_row_major_layout() {
        let m = Transform::translation_matrix(&Vector3::new(5.0, 6.0, 7.0));
        let flat = Transform::to_row_major(&m);
        assert_eq!(flat[3], 5.0);
        assert_eq!(flat[7], 6.0);
        assert_eq!(flat[11], 7.0);
        assert_eq!(flat[15], 1.0);
    }

    #[test]
    fn test_identity_faces_sideways_from_up() {
        let angle = Transform::forward_up_angle(&Matrix4::identity());
        assert!((angle - 90.0).abs() < 1e-4);
    }
}
