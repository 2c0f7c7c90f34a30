/// Free-look camera and perspective projection
use nalgebra::{Matrix4, Vector2, Vector3};

use crate::binding::{UniformBinding, UniformValue};
use crate::context::{GraphicsContext, ProgramHandle};
use crate::error::Result;
use crate::shader::ShaderProgram;
use crate::transform::{Rotation, Space, Transform};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Degrees of rotation per unit of mouse motion
    pub sensitivity: f32,
    /// Distance moved per frame while a movement key is held
    pub move_step: f32,
    /// Open interval the forward/up angle must stay inside, in degrees
    pub pitch_window: (f32, f32),
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 0.01,
            far: 10000.0,
            sensitivity: 0.2,
            move_step: 0.2,
            pitch_window: (30.0, 170.0),
        }
    }
}

/// Mouse state for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseInput {
    /// Motion since the previous frame
    Delta(f32, f32),
    /// Absolute cursor position; motion is measured against the last one seen
    Position(f32, f32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

/// Raw input sampled by the frame driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    pub mouse: MouseInput,
    pub keys: MovementKeys,
}

impl InputSnapshot {
    pub fn mouse_delta(dx: f32, dy: f32) -> Self {
        Self {
            mouse: MouseInput::Delta(dx, dy),
            keys: MovementKeys::default(),
        }
    }

    pub fn with_keys(mut self, keys: MovementKeys) -> Self {
        self.keys = keys;
        self
    }
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self::mouse_delta(0.0, 0.0)
    }
}

/// Symmetric-frustum perspective projection.
#[rustfmt::skip]
pub fn perspective_matrix(aspect: f32, fov: f32, near: f32, far: f32) -> Matrix4<f32> {
    let d = 1.0 / (fov.to_radians() / 2.0).tan();
    let b = (near + far) / (near - far);
    let c = far * near / (near - far);
    Matrix4::new(
        d / aspect, 0.0, 0.0, 0.0,
        0.0, d, 0.0, 0.0,
        0.0, 0.0, b, c,
        0.0, 0.0, -1.0, 0.0,
    )
}

/// A camera whose transform is uploaded as the view matrix.
///
/// `update` runs once per frame with the sampled input; `upload` then pushes
/// view and projection into whichever program is about to draw.
#[derive(Debug)]
pub struct Camera {
    config: CameraConfig,
    transform: Matrix4<f32>,
    last_input_position: Option<Vector2<f32>>,
    projection: Matrix4<f32>,
    projection_binding: UniformBinding,
    view: UniformBinding,
}

impl Camera {
    pub fn new(width: u32, height: u32, config: CameraConfig) -> Self {
        let projection = perspective_matrix(aspect(width, height), config.fov, config.near, config.far);
        Self {
            config,
            transform: Matrix4::identity(),
            last_input_position: None,
            projection,
            projection_binding: UniformBinding::mat4(projection),
            view: UniformBinding::mat4(Matrix4::identity()),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn transform(&self) -> &Matrix4<f32> {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    /// Rebuilds the projection for a new viewport size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let c = &self.config;
        self.projection = perspective_matrix(aspect(width, height), c.fov, c.near, c.far);
        self.projection_binding.set(UniformValue::Mat4(self.projection))
    }

    /// Applies one frame of mouse look and keyboard movement.
    pub fn update(&mut self, input: &InputSnapshot) {
        let (dx, dy) = match input.mouse {
            MouseInput::Delta(dx, dy) => (dx, dy),
            MouseInput::Position(x, y) => {
                let position = Vector2::new(x, y);
                let delta = self
                    .last_input_position
                    .map(|last| position - last)
                    .unwrap_or_else(Vector2::zeros);
                self.last_input_position = Some(position);
                (delta.x, delta.y)
            }
        };
        self.rotate(dx * self.config.sensitivity, dy * self.config.sensitivity);

        let step = self.config.move_step;
        let keys = input.keys;
        let mut offset = Vector3::zeros();
        if keys.backward {
            offset.z += step;
        }
        if keys.forward {
            offset.z -= step;
        }
        if keys.right {
            offset.x += step;
        }
        if keys.left {
            offset.x -= step;
        }
        if offset != Vector3::zeros() {
            self.transform = Transform::translate(&self.transform, &offset, Space::Local);
        }
    }

    /// Yaw about world Y, then pitch about local X if the pitch keeps the
    /// forward vector inside the window.
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        if yaw != 0.0 {
            let rotation = Rotation::new(yaw, Vector3::y());
            self.transform = Transform::rotate_around_axis(&self.transform, &rotation, Space::World);
        }
        if pitch == 0.0 {
            return;
        }

        let rotation = Rotation::new(pitch, Vector3::x());
        let candidate = Transform::rotate_around_axis(&self.transform, &rotation, Space::Local);
        let before = self.outside_window(Transform::forward_up_angle(&self.transform));
        let after = self.outside_window(Transform::forward_up_angle(&candidate));
        if after == 0.0 || after < before {
            self.transform = candidate;
        }
    }

    /// How far `angle` lies outside the pitch window, 0 when inside
    fn outside_window(&self, angle: f32) -> f32 {
        let (low, high) = self.config.pitch_window;
        if angle <= low {
            low - angle + f32::EPSILON
        } else if angle >= high {
            angle - high + f32::EPSILON
        } else {
            0.0
        }
    }

    /// Uploads projection and view to the shader's matrix roles.
    pub fn upload(&mut self, ctx: &mut dyn GraphicsContext, shader: &ShaderProgram) -> Result<()> {
        self.view.set(UniformValue::Mat4(self.transform))?;
        let program = shader.handle();
        let variables = shader.variables();
        self.projection_binding
            .bind_and_load(ctx, program, &variables.projection)?;
        self.view.bind_and_load(ctx, program, &variables.view)
    }

    /// Drops the locations cached for a deleted program.
    pub fn forget(&self, program: ProgramHandle) {
        self.projection_binding.forget(program);
        self.view.forget(program);
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessContext;
    use crate::shader::ShaderVariables;

    #[test]
    fn test_perspective_coefficients() {
        let m = perspective_matrix(1.0, 90.0, 1.0, 100.0);
        assert!((m[(0, 0)] - 1.0).abs() < 1e-6);
        assert!((m[(1, 1)] - 1.0).abs() < 1e-6);
        assert_eq!(m[(2, 2)], (1.0 + 100.0) / (1.0 - 100.0));
        assert_eq!(m[(2, 3)], 100.0 * 1.0 / (1.0 - 100.0));
        assert_eq!(m[(3, 2)], -1.0);
        assert_eq!(m[(3, 3)], 0.0);
    }

    #[test]
    fn test_aspect_divides_horizontal_scale() {
        let m = perspective_matrix(2.0, 90.0, 1.0, 100.0);
        assert!((m[(0, 0)] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_never_leaves_window() {
        let mut camera = Camera::new(800, 600, CameraConfig::default());
        for dy in [45.0, -45.0, 7.0, -13.0] {
            for frame in 0..100 {
                camera.update(&InputSnapshot::mouse_delta(frame as f32 * 0.5, dy));
                let angle = Transform::forward_up_angle(camera.transform());
                assert!(angle > 30.0 && angle < 170.0, "angle {angle} escaped");
            }
        }
    }

    #[test]
    fn test_pitch_recovers_from_outside_window() {
        let mut camera = Camera::new(800, 600, CameraConfig::default());
        let straight_down = Rotation::new(85.0, Vector3::x()).matrix();
        camera.set_transform(straight_down);
        let start = Transform::forward_up_angle(camera.transform());
        assert!(start > 170.0);

        camera.rotate(0.0, 5.0);
        assert!((Transform::forward_up_angle(camera.transform()) - start).abs() < 1e-4);
        camera.rotate(0.0, -5.0);
        assert!(Transform::forward_up_angle(camera.transform()) < start);
    }

    #[test]
    fn test_position_input_yaws_by_delta() {
        let mut camera = Camera::new(800, 600, CameraConfig::default());
        camera.update(&InputSnapshot {
            mouse: MouseInput::Position(10.0, 0.0),
            keys: MovementKeys::default(),
        });
        assert_eq!(camera.transform(), &Matrix4::identity());

        camera.update(&InputSnapshot {
            mouse: MouseInput::Position(20.0, 0.0),
            keys: MovementKeys::default(),
        });
        let expected = Rotation::new(2.0, Vector3::y()).matrix();
        assert!((camera.transform() - expected).norm() < 1e-6);
    }

    #[test]
    fn test_keys_move_along_local_axes() {
        let mut camera = Camera::new(800, 600, CameraConfig::default());
        let keys = MovementKeys {
            forward: true,
            right: true,
            ..MovementKeys::default()
        };
        camera.update(&InputSnapshot::default().with_keys(keys));
        let m = camera.transform();
        let origin = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        assert!((origin - Vector3::new(0.2, 0.0, -0.2)).norm() < 1e-6);
    }

    #[test]
    fn test_upload_resolves_once_per_program() {
        let mut ctx = HeadlessContext::new();
        ctx.declare(["model", "view", "proj"]);
        let first = ShaderProgram::new(
            &mut ctx,
            "void main() {}",
            "void main() {}",
            ShaderVariables::new("pos", "model", "view", "proj"),
        )
        .unwrap();
        let second = ShaderProgram::new(
            &mut ctx,
            "void main() {}",
            "void main() {}",
            ShaderVariables::new("pos", "model", "view", "proj"),
        )
        .unwrap();

        let mut camera = Camera::new(640, 480, CameraConfig::default());
        for _ in 0..4 {
            camera.upload(&mut ctx, &first).unwrap();
            camera.upload(&mut ctx, &second).unwrap();
        }
        assert_eq!(ctx.lookup_count("view"), 2);
        assert_eq!(ctx.lookup_count("proj"), 2);
        assert_eq!(ctx.matrix_uploads("proj").len(), 8);
    }

    #[test]
    fn test_resize_changes_aspect() {
        let mut camera = Camera::new(100, 100, CameraConfig::default());
        let square = camera.projection()[(0, 0)];
        camera.resize(200, 100).unwrap();
        assert!((camera.projection()[(0, 0)] - square / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_resized_projection_is_uploaded() {
        let mut ctx = HeadlessContext::new();
        ctx.declare(["view", "proj"]);
        let shader = ShaderProgram::new(
            &mut ctx,
            "void main() {}",
            "void main() {}",
            ShaderVariables::new("pos", "model", "view", "proj"),
        )
        .unwrap();
        let mut camera = Camera::new(100, 100, CameraConfig::default());
        camera.resize(400, 100).unwrap();
        camera.upload(&mut ctx, &shader).unwrap();

        let uploaded = ctx.matrix_uploads("proj")[0];
        assert_eq!(uploaded, Transform::to_row_major(camera.projection()));
    }

    #[test]
    fn test_forget_resolves_again() {
        let mut ctx = HeadlessContext::new();
        ctx.declare(["view", "proj"]);
        let shader = ShaderProgram::new(
            &mut ctx,
            "void main() {}",
            "void main() {}",
            ShaderVariables::new("pos", "model", "view", "proj"),
        )
        .unwrap();
        let mut camera = Camera::new(100, 100, CameraConfig::default());
        camera.upload(&mut ctx, &shader).unwrap();
        camera.forget(shader.handle());
        camera.upload(&mut ctx, &shader).unwrap();
        assert_eq!(ctx.lookup_count("view"), 2);
    }
}
