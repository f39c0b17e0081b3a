//! Depth-only target rendered from the light.

use crate::{
    error::{RenderError, RenderResult},
    gfx::rendering::context::{
        AttachmentDesc, AttachmentFormat, ClearFlags, CullFace, FramebufferStatus, RenderContext,
        TargetDesc, TargetInfo, TextureHandle, Viewport,
    },
};

#[derive(Debug, Clone, Copy)]
pub struct ShadowMap {
    target: TargetInfo,
    depth: TextureHandle,
    width: u32,
    height: u32,
}

impl ShadowMap {
    /// Depth target of `width` x `height`, normally the screen size.
    pub fn new(ctx: &mut RenderContext, width: u32, height: u32) -> RenderResult<Self> {
        let target = ctx.create_target(TargetDesc {
            label: "Shadow Map".into(),
            color: None,
            depth: Some(AttachmentDesc::new(
                width,
                height,
                AttachmentFormat::Depth32Float,
                1,
            )),
            resolve: None,
        })?;

        let depth = target.depth.ok_or_else(|| RenderError::IncompleteFramebuffer {
            label: "Shadow Map".into(),
            status: FramebufferStatus::MissingAttachment,
        })?;

        Ok(Self {
            target,
            depth,
            width,
            height,
        })
    }

    /// Depth texture sampled by the main pass
    pub fn texture(&self) -> TextureHandle {
        self.depth
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    /// Viewport to the shadow resolution, depth cleared, front faces culled.
    pub fn bind(&self, ctx: &mut RenderContext) -> RenderResult<()> {
        ctx.set_viewport(Some(Viewport::full(self.width, self.height)));
        ctx.bind_target(self.target.handle, ClearFlags::depth_only())?;
        ctx.set_cull_face(CullFace::Front);
        Ok(())
    }

    /// Restores back-face culling and releases the target.
    pub fn unbind(&self, ctx: &mut RenderContext) -> RenderResult<()> {
        ctx.set_cull_face(CullFace::Back);
        ctx.set_viewport(None);
        ctx.unbind_target(false)
    }
}
