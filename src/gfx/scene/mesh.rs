//! Renderable mesh: geometry, material bindings and a local transform.

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::{
    error::{RenderError, RenderResult},
    gfx::{
        camera::camera_utils::{matrix_to_array, point_to_array},
        geometry::{Aabb, MeshData},
        light::Light,
        rendering::context::{
            BindingTable, CubeMapHandle, DrawCall, DrawUniforms, GeometryData, GeometryHandle,
            MeshUniforms, Primitive, ProgramHandle, RenderContext, TextureHandle,
        },
    },
};

/// Per-pass inputs shared by every mesh drawn in that pass
#[derive(Debug, Clone, Copy)]
pub struct PassParams<'a> {
    pub program: ProgramHandle,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub light: &'a Light,
    pub camera_position: Vector3<f32>,
    /// Depth texture from the shadow pass, `None` while rendering it
    pub shadow_map: Option<TextureHandle>,
    pub skybox: Option<CubeMapHandle>,
}

#[derive(Debug)]
pub struct Mesh {
    label: String,
    data: MeshData,
    /// Local transform relative to the parent node
    pub transform: Matrix4<f32>,
    /// Shared diffuse texture
    pub texture: TextureHandle,
    /// Shared tangent-space normal map
    pub normal_map: Option<TextureHandle>,
    /// Flip texture coordinates horizontally
    pub mirror: bool,
    aabb: Option<Aabb>,
    geometry: Option<GeometryHandle>,
}

impl Mesh {
    /// Wraps loaded geometry, rejecting out-of-range indices.
    pub fn new(
        label: impl Into<String>,
        data: MeshData,
        texture: TextureHandle,
        mirror: bool,
        normal_map: Option<TextureHandle>,
    ) -> RenderResult<Self> {
        data.validate()?;
        let aabb = Aabb::from_points(data.positions());

        Ok(Self {
            label: label.into(),
            data,
            transform: Matrix4::identity(),
            texture,
            normal_map,
            mirror,
            aabb,
            geometry: None,
        })
    }

    pub fn with_transform(mut self, transform: Matrix4<f32>) -> Self {
        self.transform = transform;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    /// Bounds of the untransformed vertex positions, `None` for an empty mesh
    pub fn aabb(&self) -> Option<Aabb> {
        self.aabb
    }

    /// GPU storage, once the mesh has been rendered
    pub fn geometry(&self) -> Option<GeometryHandle> {
        self.geometry
    }

    fn ensure_geometry(&mut self, ctx: &mut RenderContext) -> GeometryHandle {
        if let Some(handle) = self.geometry {
            return handle;
        }

        let handle = ctx.upload_geometry(
            &self.label,
            GeometryData::Mesh {
                vertices: self.data.vertices.clone(),
                triangle_indices: self.data.triangles.iter().flat_map(|t| t.0).collect(),
                quad_indices: self.data.quads.iter().flat_map(|q| q.0).collect(),
            },
        );
        self.geometry = Some(handle);
        handle
    }

    /// Records the draws for this mesh with `world` as its model matrix.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        params: &PassParams<'_>,
        world: Matrix4<f32>,
    ) -> RenderResult<()> {
        if !self.data.quads.is_empty() && !ctx.legacy_quads_enabled() {
            return Err(RenderError::UnsupportedPrimitive("quads"));
        }

        let geometry = self.ensure_geometry(ctx);
        let light = params.light;

        let uniforms = MeshUniforms {
            model: matrix_to_array(world),
            view: matrix_to_array(params.view),
            projection: matrix_to_array(params.projection),
            light_matrix: matrix_to_array(light.light_space_matrix()),
            light_position: point_to_array(light.position),
            light_ambient: light.ambient.extend(0.0).into(),
            light_diffuse: light.diffuse.extend(0.0).into(),
            light_specular: light.specular.extend(0.0).into(),
            camera_position: point_to_array(params.camera_position),
            flags: [
                if self.mirror { 1.0 } else { 0.0 },
                if self.normal_map.is_some() { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
        };

        let bindings = BindingTable {
            diffuse: Some(self.texture),
            shadow_map: params.shadow_map,
            environment: params.skybox,
            normal_map: self.normal_map,
        };

        let triangles = self.data.triangles.len() as u32;
        if triangles > 0 {
            ctx.draw(DrawCall {
                program: params.program,
                geometry: Some(geometry),
                primitive: Primitive::Triangles { count: triangles },
                bindings,
                uniforms: DrawUniforms::Mesh(uniforms),
            })?;
        }

        let quads = self.data.quads.len() as u32;
        if quads > 0 {
            ctx.draw(DrawCall {
                program: params.program,
                geometry: Some(geometry),
                primitive: Primitive::Quads { count: quads },
                bindings,
                uniforms: DrawUniforms::Mesh(uniforms),
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        rendering::context::{
            AttachmentDesc, AttachmentFormat, Capabilities, ClearFlags, FramePhase, ProgramDesc,
            ProgramKind, TargetDesc, TextureUsage,
        },
        scene::vertex::{ObjVertex, Quad, Triangle},
    };
    use image::RgbaImage;

    fn vertex(position: [f32; 3]) -> ObjVertex {
        ObjVertex {
            position,
            ..Default::default()
        }
    }

    fn triangle_data() -> MeshData {
        MeshData {
            vertices: vec![
                vertex([0.0, 0.0, 0.0]),
                vertex([2.0, 0.0, 0.0]),
                vertex([0.0, 3.0, 0.0]),
            ],
            triangles: vec![Triangle([0, 1, 2])],
            quads: Vec::new(),
        }
    }

    fn quad_data() -> MeshData {
        MeshData {
            vertices: (0..4).map(|i| vertex([i as f32, 0.0, 0.0])).collect(),
            triangles: Vec::new(),
            quads: vec![Quad([0, 1, 2, 3])],
        }
    }

    fn light() -> Light {
        Light::new(
            Vector3::new(-30.0, 24.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
            0.1,
            0.8,
            0.5,
        )
    }

    /// Context recording into a bound shadow target, plus a texture and a
    /// depth program
    fn fixture(legacy_quads: bool) -> (RenderContext, TextureHandle, ProgramHandle) {
        let mut ctx = RenderContext::new(Capabilities {
            max_samples: 4,
            legacy_quads,
        });
        let texture = ctx.create_texture("diffuse", RgbaImage::new(1, 1), TextureUsage::Color);
        let program = ctx.create_program(ProgramDesc {
            label: "depth",
            kind: ProgramKind::Depth,
            source: "",
        });
        let shadow = ctx
            .create_target(TargetDesc {
                label: "shadow".into(),
                color: None,
                depth: Some(AttachmentDesc::new(8, 8, AttachmentFormat::Depth32Float, 1)),
                resolve: None,
            })
            .unwrap();

        ctx.begin_frame().unwrap();
        ctx.enter_phase(FramePhase::ShadowPass).unwrap();
        ctx.bind_target(shadow.handle, ClearFlags::depth_only())
            .unwrap();
        (ctx, texture, program)
    }

    fn params(program: ProgramHandle, light: &Light) -> PassParams<'_> {
        PassParams {
            program,
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            light,
            camera_position: Vector3::new(0.0, 3.0, -20.0),
            shadow_map: None,
            skybox: None,
        }
    }

    #[test]
    fn test_aabb_cached_from_positions() {
        let (_, texture, _) = fixture(false);
        let mesh = Mesh::new("tri", triangle_data(), texture, false, None).unwrap();
        let aabb = mesh.aabb().unwrap();

        assert_eq!(aabb.min, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vector3::new(2.0, 3.0, 0.0));
    }

    #[test]
    fn test_rejects_out_of_range_indices() {
        let (_, texture, _) = fixture(false);
        let mut data = triangle_data();
        data.triangles.push(Triangle([0, 2, 3]));

        let result = Mesh::new("bad", data, texture, false, None);
        assert!(matches!(
            result,
            Err(RenderError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            })
        ));
    }

    #[test]
    fn test_geometry_uploaded_once() {
        let (mut ctx, texture, program) = fixture(false);
        let light = light();
        ctx.take_pending();
        let mut mesh = Mesh::new("tri", triangle_data(), texture, true, None).unwrap();

        let p = params(program, &light);
        mesh.render(&mut ctx, &p, Matrix4::identity()).unwrap();
        mesh.render(&mut ctx, &p, Matrix4::identity()).unwrap();

        assert_eq!(ctx.take_pending().len(), 1);
        assert!(mesh.geometry().is_some());
    }

    #[test]
    fn test_uniforms_carry_world_and_flags() {
        let (mut ctx, texture, program) = fixture(false);
        let light = light();
        let mut mesh = Mesh::new("tri", triangle_data(), texture, true, None).unwrap();
        let world = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));

        mesh.render(&mut ctx, &params(program, &light), world).unwrap();
        ctx.unbind_target(false).unwrap();
        ctx.enter_phase(FramePhase::MainPass).unwrap();
        ctx.enter_phase(FramePhase::Composite).unwrap();
        let frame = ctx.end_frame().unwrap();

        let (_, draw) = frame.draws().next().unwrap();
        match draw.call.uniforms {
            DrawUniforms::Mesh(u) => {
                assert_eq!(u.model[3], [1.0, 2.0, 3.0, 1.0]);
                assert_eq!(u.flags[0], 1.0);
                assert_eq!(u.flags[1], 0.0);
                assert_eq!(u.light_matrix, matrix_to_array(light.light_space_matrix()));
            }
            other => panic!("unexpected uniforms {:?}", other),
        }
        assert_eq!(draw.call.primitive, Primitive::Triangles { count: 1 });
        assert_eq!(draw.call.bindings.diffuse, Some(texture));
        assert_eq!(draw.call.bindings.shadow_map, None);
    }

    #[test]
    fn test_quads_need_legacy_mode() {
        let (mut ctx, texture, program) = fixture(false);
        let light = light();
        let mut mesh = Mesh::new("quad", quad_data(), texture, false, None).unwrap();

        assert!(matches!(
            mesh.render(&mut ctx, &params(program, &light), Matrix4::identity()),
            Err(RenderError::UnsupportedPrimitive(_))
        ));
    }

    #[test]
    fn test_quads_drawn_in_legacy_mode() {
        let (mut ctx, texture, program) = fixture(true);
        let light = light();
        let mut mesh = Mesh::new("quad", quad_data(), texture, false, None).unwrap();

        mesh.render(&mut ctx, &params(program, &light), Matrix4::identity())
            .unwrap();
    }
}
