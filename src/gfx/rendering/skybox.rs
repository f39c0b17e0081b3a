//! Environment cube drawn behind the scene.

use cgmath::{Matrix3, Matrix4};
use image::RgbaImage;
use log::info;

use crate::{
    error::RenderResult,
    gfx::{
        camera::camera_utils::matrix_to_array,
        geometry::skybox_cube::SKYBOX_VERTICES,
        rendering::context::{
            BindingTable, CubeMapHandle, CullFace, DepthFunc, DrawCall, DrawUniforms, GeometryData,
            GeometryHandle, Primitive, ProgramHandle, RenderContext, SkyboxUniforms,
        },
        resources::image_source,
    },
};

#[derive(Debug, Clone, Copy)]
pub struct Skybox {
    cube_map: CubeMapHandle,
    geometry: GeometryHandle,
}

impl Skybox {
    /// Six faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn new(ctx: &mut RenderContext, faces: [RgbaImage; 6]) -> RenderResult<Self> {
        let cube_map = ctx.create_cube_map("Skybox", faces)?;
        let geometry = ctx.upload_geometry(
            "Skybox Cube",
            GeometryData::Positions(SKYBOX_VERTICES.to_vec()),
        );
        Ok(Self { cube_map, geometry })
    }

    /// Gradient sky used when no skybox image is configured
    pub fn procedural(ctx: &mut RenderContext, size: u32) -> RenderResult<Self> {
        info!("Using procedural {}px skybox", size);
        let faces = image_source::gradient_sky(
            size,
            [40, 90, 170, 255],
            [190, 205, 220, 255],
            [60, 55, 50, 255],
        );
        Self::new(ctx, faces)
    }

    pub fn cube_map(&self) -> CubeMapHandle {
        self.cube_map
    }

    /// Draws the cube with the camera's rotation only. Depth testing is
    /// relaxed to less-or-equal for the far-plane depth, then set back to
    /// `Less`. The cube is seen from inside, so culling is off for the draw.
    pub fn render(
        &self,
        ctx: &mut RenderContext,
        program: ProgramHandle,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    ) -> RenderResult<()> {
        let rotation = Matrix4::from(Matrix3::new(
            view.x.x, view.x.y, view.x.z, view.y.x, view.y.y, view.y.z, view.z.x, view.z.y,
            view.z.z,
        ));

        let previous = ctx.raster_state();
        ctx.set_depth_func(DepthFunc::LessEqual);
        ctx.set_cull_face(CullFace::None);
        let result = ctx.draw(DrawCall {
            program,
            geometry: Some(self.geometry),
            primitive: Primitive::Positions {
                count: SKYBOX_VERTICES.len() as u32,
            },
            bindings: BindingTable {
                environment: Some(self.cube_map),
                ..Default::default()
            },
            uniforms: DrawUniforms::Skybox(SkyboxUniforms {
                view: matrix_to_array(rotation),
                projection: matrix_to_array(projection),
            }),
        });
        ctx.set_depth_func(DepthFunc::Less);
        ctx.set_cull_face(previous.cull);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::{
        context::{Capabilities, FramePhase, ProgramDesc, ProgramKind},
        render_target::RenderTarget,
    };
    use cgmath::{Deg, Vector3};

    #[test]
    fn test_skybox_strips_translation_and_restores_depth() {
        let mut ctx = RenderContext::new(Capabilities::default());
        let target = RenderTarget::new(&mut ctx, 16, 16, 4, [0.0; 4]).unwrap();
        let skybox = Skybox::procedural(&mut ctx, 4).unwrap();
        let program = ctx.create_program(ProgramDesc {
            label: "skybox",
            kind: ProgramKind::Skybox,
            source: "",
        });

        let view = Matrix4::from_translation(Vector3::new(5.0, -3.0, 9.0))
            * Matrix4::from_angle_y(Deg(30.0));

        ctx.begin_frame().unwrap();
        ctx.enter_phase(FramePhase::ShadowPass).unwrap();
        ctx.enter_phase(FramePhase::MainPass).unwrap();
        target.bind(&mut ctx).unwrap();
        ctx.enter_phase(FramePhase::SkyboxPass).unwrap();
        skybox
            .render(&mut ctx, program, view, Matrix4::from_scale(1.0))
            .unwrap();
        assert_eq!(ctx.raster_state().depth_func, DepthFunc::Less);
        target.unbind(&mut ctx).unwrap();
        ctx.enter_phase(FramePhase::Composite).unwrap();
        let frame = ctx.end_frame().unwrap();

        let (_, draw) = frame.draws().next().unwrap();
        assert_eq!(draw.raster.depth_func, DepthFunc::LessEqual);
        assert_eq!(draw.phase, FramePhase::SkyboxPass);
        assert_eq!(draw.call.primitive, Primitive::Positions { count: 36 });
        match draw.call.uniforms {
            DrawUniforms::Skybox(u) => {
                assert_eq!(u.view[3], [0.0, 0.0, 0.0, 1.0]);
                assert_eq!(u.view[0], matrix_to_array(view)[0]);
            }
            other => panic!("unexpected uniforms {:?}", other),
        }
    }
}
