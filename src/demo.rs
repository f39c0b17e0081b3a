//! Demo scene assembly and per-frame animation.
//!
//! A bobbing central mesh carries four mirrored children that spin about
//! it, above a floor. The light orbits the scene.

use std::f32::consts::{PI, TAU};

use anyhow::Context;
use cgmath::{Matrix4, Rad, Vector3};
use image::RgbaImage;
use log::{debug, info};

use crate::{
    config::AppConfig,
    error::RenderResult,
    gfx::{
        camera::{Camera, CameraAction, FlyCamera},
        geometry::{MeshData, MeshLoader},
        light::Light,
        rendering::{
            context::{TextureHandle, TextureUsage},
            skybox::Skybox,
            RenderContext,
        },
        resources::image_source::{self, FLAT_NORMAL},
        scene::{Mesh, NodeId, SceneGraph, SceneRegistry},
    },
};

const CENTRE_SCALE: f32 = 0.75;
const ORBIT_SCALE: f32 = 0.5;
const ORBIT_RADIUS: f32 = 10.0;
const ORBITER_COUNT: usize = 4;
const BOB_HEIGHT: f32 = 3.0;
const LIGHT_ORBIT_RADIUS: f32 = 30.0;
const LIGHT_HEIGHT: f32 = 24.0;
/// Radians per millisecond
const ANGULAR_SPEED: f32 = 0.001;
const PROCEDURAL_SKY_SIZE: u32 = 256;

/// Geometry of the three demo meshes
#[derive(Debug, Clone)]
pub struct DemoMeshes {
    pub centre: MeshData,
    pub orbiter: MeshData,
    pub floor: MeshData,
}

impl DemoMeshes {
    /// Loads the configured OBJ files. A missing mesh aborts scene
    /// construction.
    pub fn load(config: &AppConfig) -> anyhow::Result<Self> {
        let loader = MeshLoader::new(config.legacy_quads);
        let load = |file: &str| {
            let path = config.asset(file);
            loader
                .load(&path)
                .with_context(|| format!("Failed to load mesh '{}'", path.display()))
        };

        Ok(Self {
            centre: load(&config.central_mesh)?,
            orbiter: load(&config.orbit_mesh)?,
            floor: load(&config.floor_mesh)?,
        })
    }
}

/// Textures shared by the demo meshes
#[derive(Debug, Clone, Copy)]
struct Materials {
    diffuse: TextureHandle,
    normal: TextureHandle,
    floor: TextureHandle,
    floor_normal: TextureHandle,
}

impl Materials {
    fn create(ctx: &mut RenderContext, config: &AppConfig) -> anyhow::Result<Self> {
        let image = |file: &Option<String>, fallback: fn() -> RgbaImage| match file {
            Some(file) => image_source::load_rgba(config.asset(file))
                .with_context(|| format!("Failed to load texture '{}'", file)),
            None => Ok(fallback()),
        };

        Ok(Self {
            diffuse: ctx.create_texture(
                "Mesh Diffuse",
                image(&config.diffuse_texture, || {
                    image_source::checker(256, 8, [200, 200, 205, 255], [90, 95, 110, 255])
                })?,
                TextureUsage::Color,
            ),
            normal: ctx.create_texture(
                "Mesh Normal",
                image(&config.normal_map, || image_source::solid(4, FLAT_NORMAL))?,
                TextureUsage::Data,
            ),
            floor: ctx.create_texture(
                "Floor Diffuse",
                image(&config.floor_texture, || {
                    image_source::checker(512, 16, [170, 60, 30, 255], [60, 20, 10, 255])
                })?,
                TextureUsage::Color,
            ),
            floor_normal: ctx.create_texture(
                "Floor Normal",
                image(&config.floor_normal_map, || image_source::solid(4, FLAT_NORMAL))?,
                TextureUsage::Data,
            ),
        })
    }
}

/// Builds the configured skybox: six face images, a cross atlas, or the
/// procedural gradient.
pub fn load_skybox(ctx: &mut RenderContext, config: &AppConfig) -> anyhow::Result<Skybox> {
    if !config.skybox_faces.is_empty() {
        let faces = config
            .skybox_faces
            .iter()
            .map(|file| image_source::load_rgba(config.asset(file)))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Skybox::new(ctx, image_source::cube_faces(faces)?)?);
    }

    match &config.skybox {
        Some(file) => {
            let atlas = image_source::load_rgba(config.asset(file))?;
            let faces = image_source::slice_cross_atlas(&atlas)
                .with_context(|| format!("Skybox atlas '{}'", file))?;
            Ok(Skybox::new(ctx, faces)?)
        }
        None => Ok(Skybox::procedural(ctx, PROCEDURAL_SKY_SIZE)?),
    }
}

/// Local transform of the central mesh at animation angle `a`
pub fn centre_transform(a: f32) -> Matrix4<f32> {
    Matrix4::from_translation(Vector3::new(0.0, a.sin() * BOB_HEIGHT, 0.0))
        * Matrix4::from_scale(CENTRE_SCALE)
}

/// Local transform of orbiter `index`: scaled, moved out on its spoke, then
/// turned about Y by `a`.
pub fn orbiter_transform(index: usize, a: f32) -> Matrix4<f32> {
    let spoke = index as f32 * (PI / 2.0);
    let offset = Vector3::new(spoke.cos() * ORBIT_RADIUS, 0.0, spoke.sin() * ORBIT_RADIUS);

    Matrix4::from_angle_y(Rad(a))
        * Matrix4::from_translation(offset)
        * Matrix4::from_scale(ORBIT_SCALE)
}

pub fn light_position(a: f32) -> Vector3<f32> {
    Vector3::new(
        a.cos() * LIGHT_ORBIT_RADIUS - LIGHT_ORBIT_RADIUS,
        LIGHT_HEIGHT,
        a.sin() * LIGHT_ORBIT_RADIUS,
    )
}

/// Advances the animation angle by `frame_ms`, wrapped to `[0, 2π)`.
pub fn advance_angle(a: f32, frame_ms: f32) -> f32 {
    (a + ANGULAR_SPEED * frame_ms).rem_euclid(TAU)
}

/// The demo's scene graph, camera and light, plus the animation state
pub struct DemoScene {
    pub graph: SceneGraph,
    pub registry: SceneRegistry,
    centre: NodeId,
    orbiters: Vec<NodeId>,
    angle: f32,
}

impl DemoScene {
    /// Loads meshes and textures from the asset directory and builds the
    /// scene.
    pub fn load(ctx: &mut RenderContext, config: &AppConfig, aspect: f32) -> anyhow::Result<Self> {
        let meshes = DemoMeshes::load(config)?;
        let materials = Materials::create(ctx, config)?;
        Ok(Self::build(config, aspect, meshes, materials)?)
    }

    /// Builds the scene from already loaded geometry with procedural
    /// textures.
    pub fn with_meshes(
        ctx: &mut RenderContext,
        config: &AppConfig,
        aspect: f32,
        meshes: DemoMeshes,
    ) -> anyhow::Result<Self> {
        let materials = Materials::create(ctx, &AppConfig {
            diffuse_texture: None,
            normal_map: None,
            floor_texture: None,
            floor_normal_map: None,
            ..config.clone()
        })?;
        Ok(Self::build(config, aspect, meshes, materials)?)
    }

    fn build(
        config: &AppConfig,
        aspect: f32,
        meshes: DemoMeshes,
        materials: Materials,
    ) -> RenderResult<Self> {
        let mut registry = SceneRegistry::new();
        let camera = registry.add_camera(FlyCamera::new(
            Vector3::new(0.0, 3.0, -20.0),
            config.camera_fov,
            aspect,
        ));
        let light = registry.add_light(Light::new(
            Vector3::new(-30.0, LIGHT_HEIGHT, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
            0.1,
            0.8,
            0.5,
        ));

        let mut graph = SceneGraph::new(camera, light, config.frustum_fov);

        let centre = Mesh::new(
            "Centre",
            meshes.centre,
            materials.diffuse,
            false,
            Some(materials.normal),
        )?
        .with_transform(centre_transform(0.0));
        let centre = graph.add_node(centre);
        graph.attach_to_root(centre)?;

        let mut orbiters = Vec::with_capacity(ORBITER_COUNT);
        for i in 0..ORBITER_COUNT {
            let mesh = Mesh::new(
                format!("Orbiter {}", i),
                meshes.orbiter.clone(),
                materials.diffuse,
                true,
                None,
            )?
            .with_transform(orbiter_transform(i, 0.0));
            orbiters.push(graph.add_child(centre, mesh)?);
        }

        let floor = Mesh::new(
            "Floor",
            meshes.floor,
            materials.floor,
            false,
            Some(materials.floor_normal),
        )?;
        let floor = graph.add_node(floor);
        graph.attach_to_root(floor)?;

        info!("Demo scene built with {} nodes", graph.len());

        Ok(Self {
            graph,
            registry,
            centre,
            orbiters,
            angle: 0.0,
        })
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn centre(&self) -> NodeId {
        self.centre
    }

    pub fn orbiters(&self) -> &[NodeId] {
        &self.orbiters
    }

    /// Poses the scene for the current angle, then advances the angle by the
    /// duration of the previous frame.
    pub fn update(&mut self, frame_ms: f32) -> RenderResult<()> {
        let a = self.angle;

        self.registry.light_mut(self.graph.light())?.position = light_position(a);
        self.graph.set_transform(self.centre, centre_transform(a))?;
        for (i, &node) in self.orbiters.iter().enumerate() {
            self.graph.set_transform(node, orbiter_transform(i, a))?;
        }

        self.angle = advance_angle(a, frame_ms);
        Ok(())
    }

    /// Applies a key action. Returns `false` when the demo should quit.
    pub fn apply(&mut self, action: CameraAction) -> RenderResult<bool> {
        let camera = self.registry.camera_mut(self.graph.camera())?;
        match action {
            CameraAction::MoveForward(delta) => camera.move_forward(delta),
            CameraAction::MoveSide(delta) => camera.move_side(delta),
            CameraAction::Rotate { pitch, yaw } => camera.rotate(pitch, yaw),
            CameraAction::AdjustFov(delta) => camera.adjust_fov(delta),
            CameraAction::AdjustFrustumFov(delta) => {
                let (view, aspect) = (camera.view_matrix(), camera.aspect);
                self.graph.adjust_frustum_fov(delta);
                if let Some(corners) = self.graph.frustum_corners(view, aspect) {
                    debug!("Debug frustum near plane: {:?}", &corners[..4]);
                }
            }
            CameraAction::Quit => return Ok(false),
        }
        Ok(true)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.registry
            .camera_mut(self.graph.camera())?
            .set_aspect_ratio(width, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::Capabilities;
    use assert_approx_eq::assert_approx_eq;
    use cgmath::{Point3, Transform};

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n";

    fn scene() -> (RenderContext, DemoScene) {
        let mut ctx = RenderContext::new(Capabilities::default());
        let data = MeshLoader::new(false).load_from_str(TRIANGLE).unwrap();
        let meshes = DemoMeshes {
            centre: data.clone(),
            orbiter: data.clone(),
            floor: data,
        };
        let scene = DemoScene::with_meshes(&mut ctx, &AppConfig::default(), 16.0 / 9.0, meshes)
            .unwrap();
        (ctx, scene)
    }

    #[test]
    fn test_scene_layout() {
        let (_, scene) = scene();

        // centre, four orbiters, floor
        assert_eq!(scene.graph.len(), 6);
        assert_eq!(scene.orbiters().len(), 4);
        let centre = scene.graph.node(scene.centre()).unwrap();
        assert_eq!(centre.children(), scene.orbiters());
        assert!(centre.mesh().unwrap().normal_map.is_some());
        for &id in scene.orbiters() {
            assert!(scene.graph.node(id).unwrap().mesh().unwrap().mirror);
        }

        let camera = scene.registry.camera(scene.graph.camera()).unwrap();
        assert_eq!(camera.position(), Vector3::new(0.0, 3.0, -20.0));
        let light = scene.registry.light(scene.graph.light()).unwrap();
        assert_approx_eq!(light.ambient.x, 0.2);
    }

    #[test]
    fn test_angle_wraps() {
        assert_approx_eq!(advance_angle(0.0, 16.0), 0.016);
        let wrapped = advance_angle(TAU - 0.001, 2.0);
        assert!((0.0..TAU).contains(&wrapped));
        assert_approx_eq!(wrapped, 0.001, 1e-5);
    }

    #[test]
    fn test_orbiter_spins_about_parent_y() {
        // Orbiter 0 sits on +X; a quarter turn about Y moves it to -Z
        let p = orbiter_transform(0, PI / 2.0).transform_point(Point3::new(0.0, 0.0, 0.0));
        assert_approx_eq!(p.x, 0.0, 1e-5);
        assert_approx_eq!(p.z, -10.0, 1e-5);

        let q = orbiter_transform(1, 0.0).transform_point(Point3::new(2.0, 0.0, 0.0));
        assert_approx_eq!(q.x, 1.0, 1e-5);
        assert_approx_eq!(q.z, 10.0, 1e-5);
    }

    #[test]
    fn test_update_moves_light_and_centre() {
        let (_, mut scene) = scene();
        scene.update(500.0).unwrap();
        scene.update(0.0).unwrap();

        let a: f32 = 0.5;
        let light = scene.registry.light(scene.graph.light()).unwrap();
        assert_approx_eq!(light.position.x, a.cos() * 30.0 - 30.0, 1e-4);
        assert_approx_eq!(light.position.z, a.sin() * 30.0, 1e-4);

        let world = scene.graph.world_transform(scene.centre()).unwrap();
        assert_approx_eq!(world.w.y, a.sin() * 3.0, 1e-4);
    }

    #[test]
    fn test_actions() {
        let (_, mut scene) = scene();
        let before = scene.graph.frustum_fov();

        assert!(scene.apply(CameraAction::MoveForward(1.0)).unwrap());
        assert!(scene.apply(CameraAction::AdjustFrustumFov(0.1)).unwrap());
        assert!(!scene.apply(CameraAction::Quit).unwrap());

        let camera = scene.registry.camera(scene.graph.camera()).unwrap();
        assert_approx_eq!(camera.position().z, -19.0);
        assert_approx_eq!(scene.graph.frustum_fov(), before + 0.1);
    }
}
