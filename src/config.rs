//! Application configuration
//!
//! Defaults reproduce the demo scene; `from_env` applies `SHADOWBOX_*`
//! overrides on top of them.

use std::{env, path::PathBuf};

use log::warn;

/// Everything the demo needs to build its window, scene and renderer
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub asset_dir: PathBuf,
    pub central_mesh: String,
    pub orbit_mesh: String,
    pub floor_mesh: String,
    /// Diffuse texture of the meshes, checker pattern when `None`
    pub diffuse_texture: Option<String>,
    /// Tangent-space normal map, flat normals when `None`
    pub normal_map: Option<String>,
    pub floor_texture: Option<String>,
    pub floor_normal_map: Option<String>,
    /// Horizontal cross atlas, procedural gradient when `None`
    pub skybox: Option<String>,
    /// Six face images in +X, -X, +Y, -Y, +Z, -Z order, used before `skybox`
    pub skybox_faces: Vec<String>,
    pub msaa_samples: u32,
    pub legacy_quads: bool,
    pub vsync: bool,
    pub move_delta: f32,
    /// Degrees per key press
    pub rotate_delta: f32,
    /// Radians per key press
    pub fov_delta: f32,
    pub camera_fov: f32,
    pub frustum_fov: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            asset_dir: PathBuf::from("assets"),
            central_mesh: "cube.obj".to_string(),
            orbit_mesh: "cube.obj".to_string(),
            floor_mesh: "floor.obj".to_string(),
            diffuse_texture: None,
            normal_map: None,
            floor_texture: None,
            floor_normal_map: None,
            skybox: None,
            skybox_faces: Vec::new(),
            msaa_samples: 4,
            legacy_quads: false,
            vsync: true,
            move_delta: 0.2,
            rotate_delta: 3.0,
            fov_delta: 0.1,
            camera_fov: 1.2,
            frustum_fov: 1.2,
        }
    }
}

impl AppConfig {
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn with_msaa_samples(mut self, samples: u32) -> Self {
        self.msaa_samples = samples;
        self
    }

    pub fn with_legacy_quads(mut self, enabled: bool) -> Self {
        self.legacy_quads = enabled;
        self
    }

    pub fn with_vsync(mut self, enabled: bool) -> Self {
        self.vsync = enabled;
        self
    }

    pub fn with_skybox(mut self, file: impl Into<String>) -> Self {
        self.skybox = Some(file.into());
        self
    }

    pub fn with_textures(mut self, diffuse: impl Into<String>, normal: impl Into<String>) -> Self {
        self.diffuse_texture = Some(diffuse.into());
        self.normal_map = Some(normal.into());
        self
    }

    /// Defaults overridden by `SHADOWBOX_ASSETS`, `SHADOWBOX_MSAA`,
    /// `SHADOWBOX_LEGACY_QUADS` and `SHADOWBOX_VSYNC`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Applies overrides from any key lookup. Unparsable values are logged
    /// and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("SHADOWBOX_ASSETS") {
            config.asset_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("SHADOWBOX_MSAA") {
            match value.parse::<u32>() {
                Ok(samples) if samples > 0 => config.msaa_samples = samples,
                _ => warn!("Ignoring SHADOWBOX_MSAA={:?}", value),
            }
        }
        if let Some(value) = lookup("SHADOWBOX_LEGACY_QUADS") {
            match parse_flag(&value) {
                Some(flag) => config.legacy_quads = flag,
                None => warn!("Ignoring SHADOWBOX_LEGACY_QUADS={:?}", value),
            }
        }
        if let Some(value) = lookup("SHADOWBOX_VSYNC") {
            match parse_flag(&value) {
                Some(flag) => config.vsync = flag,
                None => warn!("Ignoring SHADOWBOX_VSYNC={:?}", value),
            }
        }

        config
    }

    pub fn asset(&self, file: &str) -> PathBuf {
        self.asset_dir.join(file)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.msaa_samples, 4);
        assert!(!config.legacy_quads);
        assert_eq!(config.move_delta, 0.2);
        assert_eq!(config.rotate_delta, 3.0);
        assert_eq!(config.asset("cube.obj"), PathBuf::from("assets/cube.obj"));
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SHADOWBOX_ASSETS", "/tmp/demo"),
            ("SHADOWBOX_MSAA", "1"),
            ("SHADOWBOX_LEGACY_QUADS", "yes"),
            ("SHADOWBOX_VSYNC", "off"),
        ]));

        assert_eq!(config.asset_dir, PathBuf::from("/tmp/demo"));
        assert_eq!(config.msaa_samples, 1);
        assert!(config.legacy_quads);
        assert!(!config.vsync);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SHADOWBOX_MSAA", "four"),
            ("SHADOWBOX_LEGACY_QUADS", "maybe"),
        ]));

        assert_eq!(config.msaa_samples, 4);
        assert!(!config.legacy_quads);
    }

    #[test]
    fn test_builders() {
        let config = AppConfig::default()
            .with_window_size(800, 600)
            .with_msaa_samples(2)
            .with_skybox("sky.png");

        assert_eq!((config.window_width, config.window_height), (800, 600));
        assert_eq!(config.msaa_samples, 2);
        assert_eq!(config.skybox.as_deref(), Some("sky.png"));
    }
}
