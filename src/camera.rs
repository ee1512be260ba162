//! Camera, projection and the input-driven camera controller.
//!
//! The camera is stored as position plus yaw/pitch; its look-at target is
//! derived from those. [`CameraController`] accumulates keyboard and mouse
//! input between frames and applies it once per frame in
//! [`CameraController::update`].

use std::f32::consts::FRAC_PI_2;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};
use instant::Duration;
use winit::{
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionMode {
    Perspective,
    Orthographic,
}

/// How [`CameraController::update`] reacts to input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMode {
    /// Input is ignored; the camera only moves when code moves it.
    Custom,
    /// Mouse look plus WASD movement on the horizontal plane.
    FirstPerson,
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
            up: Vector3::unit_y(),
        }
    }

    /// Camera at `position` looking at `target`.
    pub fn look_at(position: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Self {
        let direction = target - position;
        let (yaw, pitch) = if direction.magnitude2() > f32::EPSILON {
            let direction = direction.normalize();
            (
                Rad(direction.z.atan2(direction.x)),
                Rad(direction.y.clamp(-1.0, 1.0).asin().clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2)),
            )
        } else {
            (Rad(0.0), Rad(0.0))
        };
        Self {
            position,
            yaw,
            pitch,
            up,
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize()
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), self.up)
    }
}

#[derive(Clone, Debug)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub mode: ProjectionMode,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
            mode: ProjectionMode::Perspective,
        }
    }

    pub fn with_mode(mut self, mode: ProjectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        match self.mode {
            ProjectionMode::Perspective => {
                OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
            }
            ProjectionMode::Orthographic => {
                // fovy is read as the vertical extent in world units
                let top = self.fovy.0 / 2.0;
                let right = top * self.aspect;
                OPENGL_TO_WGPU_MATRIX
                    * cgmath::ortho(-right, right, -top, top, self.znear, self.zfar)
            }
        }
    }
}

#[derive(Debug)]
pub struct CameraController {
    amount_left: f32,
    amount_right: f32,
    amount_forward: f32,
    amount_backward: f32,
    amount_up: f32,
    amount_down: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    scroll: f32,
    speed: f32,
    sensitivity: f32,
    pub mode: CameraMode,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            amount_left: 0.0,
            amount_right: 0.0,
            amount_forward: 0.0,
            amount_backward: 0.0,
            amount_up: 0.0,
            amount_down: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            scroll: 0.0,
            speed,
            sensitivity,
            mode: CameraMode::FirstPerson,
        }
    }

    pub fn with_mode(mut self, mode: CameraMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns `true` when the key is one the controller reacts to.
    pub fn handle_key(&mut self, key: KeyCode, state: ElementState) -> bool {
        let amount = if state == ElementState::Pressed { 1.0 } else { 0.0 };
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => {
                self.amount_forward = amount;
                true
            }
            KeyCode::KeyS | KeyCode::ArrowDown => {
                self.amount_backward = amount;
                true
            }
            KeyCode::KeyA | KeyCode::ArrowLeft => {
                self.amount_left = amount;
                true
            }
            KeyCode::KeyD | KeyCode::ArrowRight => {
                self.amount_right = amount;
                true
            }
            KeyCode::Space => {
                self.amount_up = amount;
                true
            }
            KeyCode::ShiftLeft => {
                self.amount_down = amount;
                true
            }
            _ => false,
        }
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        ..
                    },
                ..
            } => self.handle_key(*key, *state),
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll = match delta {
                    MouseScrollDelta::LineDelta(_, scroll) => -scroll * 0.5,
                    MouseScrollDelta::PixelDelta(position) => -position.y as f32 * 0.01,
                };
                true
            }
            _ => false,
        }
    }

    pub fn handle_mouse(&mut self, mouse_dx: f64, mouse_dy: f64) {
        self.rotate_horizontal += mouse_dx as f32;
        self.rotate_vertical += mouse_dy as f32;
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        if self.mode == CameraMode::Custom {
            self.rotate_horizontal = 0.0;
            self.rotate_vertical = 0.0;
            self.scroll = 0.0;
            return;
        }
        let dt = dt.as_secs_f32();

        // Movement stays on the horizontal plane regardless of pitch
        let (yaw_sin, yaw_cos) = camera.yaw.0.sin_cos();
        let forward = Vector3::new(yaw_cos, 0.0, yaw_sin).normalize();
        let right = Vector3::new(-yaw_sin, 0.0, yaw_cos).normalize();
        camera.position += forward * (self.amount_forward - self.amount_backward) * self.speed * dt;
        camera.position += right * (self.amount_right - self.amount_left) * self.speed * dt;
        camera.position.y += (self.amount_up - self.amount_down) * self.speed * dt;

        // Scrolling moves along the view direction
        camera.position -= camera.forward() * self.scroll * self.speed * 0.1;
        self.scroll = 0.0;

        camera.yaw += Rad(self.rotate_horizontal) * self.sensitivity * dt;
        camera.pitch += Rad(-self.rotate_vertical) * self.sensitivity * dt;

        // Mouse motion arrives as deltas; a frame without motion must not keep turning
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        if camera.pitch < -Rad(SAFE_FRAC_PI_2) {
            camera.pitch = -Rad(SAFE_FRAC_PI_2);
        } else if camera.pitch > Rad(SAFE_FRAC_PI_2) {
            camera.pitch = Rad(SAFE_FRAC_PI_2);
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view: Matrix4::identity().into(),
            proj: Matrix4::identity().into(),
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        let view = camera.calc_matrix();
        let proj = projection.calc_matrix();
        self.view_position = camera.position.to_homogeneous().into();
        self.view = view.into();
        self.proj = proj.into();
        self.view_proj = (proj * view).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state plus the GPU objects that feed it to shaders (group 0).
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    /// Apply pending input and upload the new matrices.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection, dt: Duration) {
        self.controller.update(&mut self.camera, dt);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, EuclideanSpace, Transform};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn look_at_points_towards_target() {
        let camera = Camera::look_at(
            Point3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        let expected = -Vector3::new(1.0, 1.0, 1.0).normalize();
        let forward = camera.forward();
        assert!(approx(forward.x, expected.x));
        assert!(approx(forward.y, expected.y));
        assert!(approx(forward.z, expected.z));
    }

    #[test]
    fn look_at_same_point_is_level() {
        let camera = Camera::look_at(Point3::origin(), Point3::origin(), Vector3::unit_y());
        assert_eq!(camera.pitch, Rad(0.0));
        assert_eq!(camera.yaw, Rad(0.0));
    }

    #[test]
    fn view_matrix_maps_target_onto_negative_z() {
        let camera = Camera::look_at(
            Point3::new(1.0, 1.0, 1.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        let in_view = camera.calc_matrix().transform_point(Point3::origin());
        assert!(approx(in_view.x, 0.0));
        assert!(approx(in_view.y, 0.0));
        assert!(approx(in_view.z, -(3.0f32).sqrt()));
    }

    #[test]
    fn forward_key_moves_horizontally() {
        let mut camera = Camera::new((0.0, 2.0, 0.0), Deg(0.0), Deg(-45.0));
        let mut controller = CameraController::new(2.0, 0.4);
        controller.handle_key(KeyCode::KeyW, ElementState::Pressed);
        controller.update(&mut camera, Duration::from_secs(1));
        assert!(approx(camera.position.x, 2.0));
        assert!(approx(camera.position.y, 2.0));
        assert!(approx(camera.position.z, 0.0));

        controller.handle_key(KeyCode::KeyW, ElementState::Released);
        controller.update(&mut camera, Duration::from_secs(1));
        assert!(approx(camera.position.x, 2.0));
    }

    #[test]
    fn mouse_motion_is_consumed_once_and_pitch_is_clamped() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(1.0, 1.0);
        controller.handle_mouse(0.0, -10_000.0);
        controller.update(&mut camera, Duration::from_secs(1));
        assert!(camera.pitch <= Rad(SAFE_FRAC_PI_2));
        let pitch = camera.pitch;

        controller.update(&mut camera, Duration::from_secs(1));
        assert_eq!(camera.pitch, pitch);
    }

    #[test]
    fn custom_mode_ignores_input() {
        let mut camera = Camera::new((1.0, 1.0, 1.0), Deg(10.0), Deg(5.0));
        let mut controller = CameraController::new(5.0, 1.0).with_mode(CameraMode::Custom);
        controller.handle_key(KeyCode::KeyD, ElementState::Pressed);
        controller.handle_mouse(50.0, 50.0);
        controller.update(&mut camera, Duration::from_millis(16));
        assert_eq!(camera.position, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(camera.yaw, Rad::from(Deg(10.0)));
    }

    #[test]
    fn unrelated_keys_are_not_consumed() {
        let mut controller = CameraController::new(1.0, 1.0);
        assert!(!controller.handle_key(KeyCode::KeyQ, ElementState::Pressed));
        assert!(controller.handle_key(KeyCode::Space, ElementState::Pressed));
    }

    #[test]
    fn projection_tracks_aspect() {
        let mut projection = Projection::new(800, 450, Deg(45.0), 0.1, 100.0);
        assert!(approx(projection.aspect(), 800.0 / 450.0));
        projection.resize(100, 0);
        assert!(approx(projection.aspect(), 100.0));
    }

    #[test]
    fn perspective_keeps_depth_in_zero_to_one() {
        let projection = Projection::new(800, 450, Deg(45.0), 0.1, 100.0);
        let near = projection
            .calc_matrix()
            .transform_point(Point3::new(0.0, 0.0, -0.1));
        let far = projection
            .calc_matrix()
            .transform_point(Point3::new(0.0, 0.0, -100.0));
        assert!(approx(near.z, 0.0));
        assert!(approx(far.z, 1.0));
    }
}
