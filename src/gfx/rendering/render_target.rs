//! Multisampled off-screen colour and depth with a single-sampled resolve.

use crate::{
    error::{RenderError, RenderResult},
    gfx::rendering::context::{
        AttachmentDesc, AttachmentFormat, ClearFlags, FramebufferStatus, RenderContext, TargetDesc,
        TargetInfo, TextureHandle,
    },
};

#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    target: TargetInfo,
    output: TextureHandle,
    samples: u32,
    clear_color: [f64; 4],
}

impl RenderTarget {
    /// With `samples == 1` the colour attachment is sampled directly and no
    /// resolve texture is created.
    pub fn new(
        ctx: &mut RenderContext,
        width: u32,
        height: u32,
        samples: u32,
        clear_color: [f64; 4],
    ) -> RenderResult<Self> {
        let resolve = (samples > 1)
            .then(|| AttachmentDesc::new(width, height, AttachmentFormat::Rgba8, 1));

        let target = ctx.create_target(TargetDesc {
            label: "Scene Target".into(),
            color: Some(AttachmentDesc::new(
                width,
                height,
                AttachmentFormat::Rgba8,
                samples,
            )),
            depth: Some(AttachmentDesc::new(
                width,
                height,
                AttachmentFormat::Depth32Float,
                samples,
            )),
            resolve,
        })?;

        let output = target
            .resolve
            .or(target.color)
            .ok_or_else(|| RenderError::IncompleteFramebuffer {
                label: "Scene Target".into(),
                status: FramebufferStatus::MissingAttachment,
            })?;

        Ok(Self {
            target,
            output,
            samples,
            clear_color,
        })
    }

    /// The only externally visible artifact: the resolved colour texture
    pub fn texture(&self) -> TextureHandle {
        self.output
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Directs draws into the multisampled buffers and clears them.
    pub fn bind(&self, ctx: &mut RenderContext) -> RenderResult<()> {
        ctx.bind_target(
            self.target.handle,
            ClearFlags::color_and_depth(self.clear_color),
        )
    }

    /// Resolves into [`Self::texture`] and releases the target.
    pub fn unbind(&self, ctx: &mut RenderContext) -> RenderResult<()> {
        ctx.unbind_target(self.target.resolve.is_some())
    }
}
