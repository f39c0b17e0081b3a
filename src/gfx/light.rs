//! Point light with precomputed Phong intensities.

use cgmath::{EuclideanSpace, Matrix4, Point3, Vector3};

use super::camera::OPENGL_TO_WGPU_MATRIX;

/// World point every shadow projection looks at, wherever the light is.
pub const SHADOW_FOCUS: Point3<f32> = Point3::new(0.0, 0.0, -1.0);

/// Half extent and depth range of the orthographic shadow projection
const SHADOW_HALF_EXTENT: f32 = 10.0;
const SHADOW_NEAR: f32 = 0.1;
const SHADOW_FAR: f32 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vector3<f32>,
    pub color: Vector3<f32>,
    /// `ia * color`, fixed at construction
    pub ambient: Vector3<f32>,
    /// `id * color`, fixed at construction
    pub diffuse: Vector3<f32>,
    /// `is * color`, fixed at construction
    pub specular: Vector3<f32>,
}

impl Light {
    pub fn new(position: Vector3<f32>, color: Vector3<f32>, ia: f32, id: f32, is: f32) -> Self {
        Self {
            position,
            color,
            ambient: color * ia,
            diffuse: color * id,
            specular: color * is,
        }
    }

    /// Light view looking at [`SHADOW_FOCUS`] times the fixed orthographic
    /// shadow projection.
    pub fn light_space_matrix(&self) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(
            Point3::from_vec(self.position),
            SHADOW_FOCUS,
            Vector3::unit_y(),
        );
        let projection = cgmath::ortho(
            -SHADOW_HALF_EXTENT,
            SHADOW_HALF_EXTENT,
            -SHADOW_HALF_EXTENT,
            SHADOW_HALF_EXTENT,
            SHADOW_NEAR,
            SHADOW_FAR,
        );
        OPENGL_TO_WGPU_MATRIX * projection * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_intensities_scale_color() {
        let light = Light::new(
            Vector3::new(-30.0, 24.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
            0.1,
            0.8,
            0.5,
        );

        for i in 0..3 {
            assert_approx_eq!(light.ambient[i], 0.2, 1e-6);
            assert_approx_eq!(light.diffuse[i], 1.6, 1e-6);
            assert_approx_eq!(light.specular[i], 1.0, 1e-6);
        }
    }

    #[test]
    fn test_intensities_not_rederived() {
        let mut light = Light::new(Vector3::new(0.0, 1.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 0.5, 0.5, 0.5);
        light.color = Vector3::new(4.0, 4.0, 4.0);
        assert_eq!(light.ambient, Vector3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_shadow_focus_projects_to_center() {
        let light = Light::new(Vector3::new(-30.0, 24.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 0.1, 0.8, 0.5);
        let clip = light.light_space_matrix() * SHADOW_FOCUS.to_homogeneous();

        assert_approx_eq!(clip.x / clip.w, 0.0, 1e-5);
        assert_approx_eq!(clip.y / clip.w, 0.0, 1e-5);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_light_projection_stays_affine() {
        let light = Light::new(Vector3::new(-30.0, 24.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 0.1, 0.8, 0.5);
        let matrix = light.light_space_matrix();

        for p in [Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, -3.0, 8.0)] {
            let clip = matrix * p.to_homogeneous();
            assert_approx_eq!(clip.w, 1.0, 1e-5);
        }
    }

    #[test]
    fn test_light_matrix_follows_position() {
        let a = Light::new(Vector3::new(-30.0, 24.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 0.1, 0.8, 0.5);
        let mut b = a;
        b.position = Vector3::new(0.0, 24.0, 30.0);
        assert_ne!(a.light_space_matrix(), b.light_space_matrix());
    }
}
