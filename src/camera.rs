//! Camera maths: view and projection matrices, per-eye composition and
//! keyboard-driven movement.
//!
//! Right-handed, Y up, looking down -Z. All matrices are glam's column-major
//! `Mat4`, which is also what the shaders consume.

use glam::{Mat4, Quat, Vec3};

use crate::input::{Key, Keyboard};
use crate::runtime::{EyePose, Fov};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Camera {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.up())
    }

    /// The camera one tracked eye sees through.
    ///
    /// The eye pose is relative to the tracking origin, which this camera
    /// carries around the room: the eye offset is rotated into the camera's
    /// frame and the head orientation is applied before the camera's own yaw.
    pub fn for_eye(&self, eye: &EyePose) -> Camera {
        Camera {
            position: self.position + self.rotation * eye.position,
            rotation: self.rotation * eye.orientation,
        }
    }
}

/// Right-handed projection for an asymmetric field of view, depth mapped to `[0, 1]`.
pub fn projection(fov: &Fov, near: f32, far: f32) -> Mat4 {
    let left = near * fov.angle_left.tan();
    let right = near * fov.angle_right.tan();
    let bottom = near * fov.angle_down.tan();
    let top = near * fov.angle_up.tan();
    Mat4::frustum_rh(left, right, bottom, top, near, far)
}

/// Walk-and-turn controls: W/S or Up/Down move along the view direction,
/// A/D strafe, Left/Right turn. One fixed step per frame while a key is held.
#[derive(Copy, Clone, Debug)]
pub struct WalkControls {
    yaw: f32,
    move_speed: f32,
    turn_speed: f32,
}

impl WalkControls {
    pub fn new(move_speed: f32, turn_speed: f32) -> Self {
        Self {
            yaw: 0.0,
            move_speed,
            turn_speed,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Face `camera` along an accumulated `yaw`, e.g. one carried over from an
    /// earlier session.
    pub fn set_yaw(&mut self, camera: &mut Camera, yaw: f32) {
        self.yaw = yaw;
        camera.rotation = Quat::from_rotation_y(yaw);
    }

    pub fn apply(&mut self, camera: &mut Camera, keys: &Keyboard) {
        // Movement uses this frame's starting orientation.
        let forward = camera.rotation * Vec3::new(0.0, 0.0, -self.move_speed);
        let right = camera.rotation * Vec3::new(self.move_speed, 0.0, 0.0);

        if keys.is_down(Key::W) || keys.is_down(Key::Up) {
            camera.position += forward;
        }
        if keys.is_down(Key::S) || keys.is_down(Key::Down) {
            camera.position -= forward;
        }
        if keys.is_down(Key::D) {
            camera.position += right;
        }
        if keys.is_down(Key::A) {
            camera.position -= right;
        }

        if keys.is_down(Key::Left) {
            self.yaw += self.turn_speed;
            camera.rotation = Quat::from_rotation_y(self.yaw);
        }
        if keys.is_down(Key::Right) {
            self.yaw -= self.turn_speed;
            camera.rotation = Quat::from_rotation_y(self.yaw);
        }
    }
}
