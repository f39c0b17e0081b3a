//! Externally owned cameras and lights.
//!
//! The scene graph refers to these by id only, so the registry must outlive
//! any graph built against it.

use crate::{
    error::SceneError,
    gfx::{camera::FlyCamera, light::Light},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(usize);

#[derive(Debug, Default)]
pub struct SceneRegistry {
    cameras: Vec<FlyCamera>,
    lights: Vec<Light>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_camera(&mut self, camera: FlyCamera) -> CameraId {
        self.cameras.push(camera);
        CameraId(self.cameras.len() - 1)
    }

    pub fn add_light(&mut self, light: Light) -> LightId {
        self.lights.push(light);
        LightId(self.lights.len() - 1)
    }

    pub fn camera(&self, id: CameraId) -> Result<&FlyCamera, SceneError> {
        self.cameras.get(id.0).ok_or(SceneError::UnknownCamera(id.0))
    }

    pub fn camera_mut(&mut self, id: CameraId) -> Result<&mut FlyCamera, SceneError> {
        self.cameras
            .get_mut(id.0)
            .ok_or(SceneError::UnknownCamera(id.0))
    }

    pub fn light(&self, id: LightId) -> Result<&Light, SceneError> {
        self.lights.get(id.0).ok_or(SceneError::UnknownLight(id.0))
    }

    pub fn light_mut(&mut self, id: LightId) -> Result<&mut Light, SceneError> {
        self.lights.get_mut(id.0).ok_or(SceneError::UnknownLight(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn test_lookup_by_id() {
        let mut registry = SceneRegistry::new();
        let camera = registry.add_camera(FlyCamera::new(Vector3::new(0.0, 3.0, -20.0), 1.2, 1.0));
        let light = registry.add_light(Light::new(
            Vector3::new(-30.0, 24.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
            0.1,
            0.8,
            0.5,
        ));

        assert_eq!(registry.camera(camera).unwrap().position.z, -20.0);
        registry.light_mut(light).unwrap().position.x = 5.0;
        assert_eq!(registry.light(light).unwrap().position.x, 5.0);

        let empty = SceneRegistry::new();
        assert_eq!(empty.camera(camera).err(), Some(SceneError::UnknownCamera(0)));
        assert_eq!(empty.light(light).err(), Some(SceneError::UnknownLight(0)));
    }
}
