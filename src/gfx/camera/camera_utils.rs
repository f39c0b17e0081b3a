use cgmath::{Matrix4, Vector3};

/// Maps OpenGL clip depth `[-1, 1]` onto wgpu's `[0, 1]`.
///
/// `Matrix4::new` takes columns, so the `0.5` offset sits in the last
/// column: `z' = 0.5 * z + 0.5 * w`, `w' = w`.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Near plane shared by the camera and the debug frustum
pub const Z_NEAR: f32 = 0.1;
/// Far plane of the camera projection
pub const CAMERA_Z_FAR: f32 = 1000.0;
/// Far plane of the debug frustum
pub const FRUSTUM_Z_FAR: f32 = 100.0;

pub trait Camera {
    fn view_matrix(&self) -> Matrix4<f32>;
    fn projection_matrix(&self) -> Matrix4<f32>;
    fn position(&self) -> Vector3<f32>;

    fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Column-major matrix in the layout WGSL `mat4x4<f32>` expects
pub fn matrix_to_array(matrix: Matrix4<f32>) -> [[f32; 4]; 4] {
    matrix.into()
}

/// Homogeneous point for 16-byte aligned uniform fields
pub fn point_to_array(v: Vector3<f32>) -> [f32; 4] {
    [v.x, v.y, v.z, 1.0]
}
