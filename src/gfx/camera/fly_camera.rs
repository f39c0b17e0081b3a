//! First-person camera driven by move and rotate commands.
//!
//! Orientation is kept as yaw/pitch accumulators in degrees. The forward
//! direction is rebuilt from the reference vector `(0, 0, 1)` as
//! `Ry(yaw) * Rx(pitch) * (0, 0, 1)`, so pitch is applied first.
//! `up` is fixed and never re-derived; there is no roll.
//!
//! Pitch is clamped to ±89° so `up` and `direction` never become parallel
//! and `right` stays well defined. Close to the clamp the horizontal
//! component of `direction` gets small and strafing still uses the
//! fixed `up`, which is the expected fly-camera feel rather than a bug.

use std::f32::consts::PI;

use cgmath::{
    Deg, EuclideanSpace, InnerSpace, Matrix3, Matrix4, Point3, Rad, Vector3,
};

use super::camera_utils::{Camera, CAMERA_Z_FAR, OPENGL_TO_WGPU_MATRIX, Z_NEAR};

const PITCH_LIMIT: f32 = 89.0;
const MIN_FOV: f32 = 0.1;
const MAX_FOV: f32 = PI - 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyCamera {
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub up: Vector3<f32>,
    pub right: Vector3<f32>,
    /// Degrees
    pub yaw: f32,
    /// Degrees
    pub pitch: f32,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
}

impl FlyCamera {
    /// Camera at `position` looking down +Z with +Y up
    pub fn new(position: Vector3<f32>, fov: f32, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            direction: Vector3::unit_z(),
            up: Vector3::unit_y(),
            right: Vector3::unit_x(),
            yaw: 0.0,
            pitch: 0.0,
            fov: fov.clamp(MIN_FOV, MAX_FOV),
            aspect,
        };
        camera.update_vectors();
        camera
    }

    pub fn move_forward(&mut self, delta: f32) {
        self.position += self.direction * delta;
    }

    pub fn move_side(&mut self, delta: f32) {
        self.position += self.right * delta;
    }

    /// Accumulates pitch and yaw in degrees and rebuilds the basis.
    pub fn rotate(&mut self, delta_pitch: f32, delta_yaw: f32) {
        self.pitch = (self.pitch + delta_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw = (self.yaw + delta_yaw) % 360.0;
        self.update_vectors();
    }

    pub fn adjust_fov(&mut self, delta: f32) {
        self.fov = (self.fov + delta).clamp(MIN_FOV, MAX_FOV);
    }

    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    fn update_vectors(&mut self) {
        let rotation = Matrix3::from_angle_y(Deg(self.yaw)) * Matrix3::from_angle_x(Deg(self.pitch));
        self.direction = (rotation * Vector3::unit_z()).normalize();
        self.right = self.up.cross(self.direction).normalize();
    }
}

impl Camera for FlyCamera {
    fn view_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from_vec(self.position);
        Matrix4::look_at_rh(eye, eye + self.direction, self.up)
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX
            * cgmath::perspective(Rad(self.fov), self.aspect, Z_NEAR, CAMERA_Z_FAR)
    }

    fn position(&self) -> Vector3<f32> {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn camera() -> FlyCamera {
        FlyCamera::new(Vector3::new(0.0, 3.0, -20.0), 1.2, 16.0 / 9.0)
    }

    fn assert_vec_eq(a: Vector3<f32>, b: Vector3<f32>) {
        assert_approx_eq!(a.x, b.x, 1e-5);
        assert_approx_eq!(a.y, b.y, 1e-5);
        assert_approx_eq!(a.z, b.z, 1e-5);
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let mut cam = camera();
        cam.rotate(12.0, -40.0);
        let (direction, right) = (cam.direction, cam.right);

        cam.rotate(0.0, 0.0);

        assert_vec_eq(cam.direction, direction);
        assert_vec_eq(cam.right, right);
    }

    #[test]
    fn test_right_stays_orthonormal() {
        let mut cam = camera();
        let steps = [
            (3.0, 0.0),
            (0.0, 3.0),
            (45.0, 90.0),
            (80.0, -33.0),
            (-200.0, 17.0),
            (3.0, 721.0),
            (89.0, 1.0),
        ];

        for (pitch, yaw) in steps {
            cam.rotate(pitch, yaw);
            assert_approx_eq!(cam.right.magnitude(), 1.0, 1e-5);
            assert_approx_eq!(cam.direction.magnitude(), 1.0, 1e-5);
            assert_approx_eq!(cam.right.dot(cam.up), 0.0, 1e-5);
            assert_approx_eq!(cam.right.dot(cam.direction), 0.0, 1e-5);
        }
    }

    #[test]
    fn test_pitch_applied_before_yaw() {
        let mut cam = camera();
        cam.rotate(30.0, 90.0);

        // Rx(30) tips (0,0,1) to (0,-sin30,cos30), Ry(90) then swings z onto x
        let s = 30f32.to_radians().sin();
        let c = 30f32.to_radians().cos();
        assert_vec_eq(cam.direction, Vector3::new(c, -s, 0.0));
    }

    #[test]
    fn test_move_along_basis() {
        let mut cam = camera();
        cam.move_forward(2.0);
        assert_vec_eq(cam.position, Vector3::new(0.0, 3.0, -18.0));

        cam.move_side(1.5);
        assert_vec_eq(cam.position, Vector3::new(1.5, 3.0, -18.0));
    }

    #[test]
    fn test_view_matrix_moves_eye_to_origin() {
        let cam = camera();
        let eye = cam.view_matrix() * cam.position.extend(1.0);
        assert_approx_eq!(eye.x, 0.0, 1e-5);
        assert_approx_eq!(eye.y, 0.0, 1e-5);
        assert_approx_eq!(eye.z, 0.0, 1e-5);

        // Forward maps onto -Z in view space
        let ahead = cam.view_matrix() * (cam.position + cam.direction).extend(1.0);
        assert_approx_eq!(ahead.z, -1.0, 1e-5);
    }

    #[test]
    fn test_pitch_clamped_at_limit() {
        let mut cam = camera();
        cam.rotate(60.0, 0.0);
        cam.rotate(60.0, 0.0);
        assert_approx_eq!(cam.pitch, PITCH_LIMIT);
        assert!(cam.direction.dot(cam.up).abs() < 1.0);

        cam.rotate(-300.0, 0.0);
        assert_approx_eq!(cam.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn test_projection_depth_increases_inside_zero_one() {
        let cam = FlyCamera::new(Vector3::new(0.0, 0.0, 0.0), 1.2, 1.0);
        let view_projection = cam.view_projection_matrix();

        let mut previous = 0.0;
        for distance in [1.0, 10.0, 50.0, 500.0, 999.0] {
            let clip = view_projection * Vector3::new(0.0, 0.0, distance).extend(1.0);
            assert_approx_eq!(clip.w, distance, 1e-3);
            let ndc_z = clip.z / clip.w;
            assert!(ndc_z > previous && ndc_z < 1.0, "{} at {}", ndc_z, distance);
            previous = ndc_z;
        }
        assert!(previous > 0.99);
    }

    #[test]
    fn test_fov_clamped() {
        let mut cam = camera();
        cam.adjust_fov(10.0);
        assert_approx_eq!(cam.fov, MAX_FOV);
        cam.adjust_fov(-10.0);
        assert_approx_eq!(cam.fov, MIN_FOV);
    }
}
