//! Full-screen composite of the resolved scene texture.

use crate::{
    error::RenderResult,
    gfx::rendering::context::{
        BindingTable, CullFace, DepthFunc, DrawCall, DrawUniforms, Primitive, ProgramHandle,
        RenderContext, TextureHandle,
    },
};

/// Draws one oversized triangle covering the screen; vertices are
/// generated in the vertex shader.
#[derive(Debug, Clone, Copy)]
pub struct ScreenQuad {
    program: ProgramHandle,
}

impl ScreenQuad {
    pub fn new(program: ProgramHandle) -> Self {
        Self { program }
    }

    pub fn render(&self, ctx: &mut RenderContext, source: TextureHandle) -> RenderResult<()> {
        let previous = ctx.raster_state();
        ctx.set_cull_face(CullFace::None);
        ctx.set_depth_func(DepthFunc::Always);

        let result = ctx.draw(DrawCall {
            program: self.program,
            geometry: None,
            primitive: Primitive::FullscreenTriangle,
            bindings: BindingTable {
                diffuse: Some(source),
                ..Default::default()
            },
            uniforms: DrawUniforms::None,
        });

        ctx.set_cull_face(previous.cull);
        ctx.set_depth_func(previous.depth_func);
        result
    }
}
