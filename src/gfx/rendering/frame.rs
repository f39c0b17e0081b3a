//! # Frame Sequencing
//!
//! Records one frame in strict phase order:
//!
//! 1. **Shadow pass** - the whole graph from the light into the depth map
//! 2. **Main pass** - the whole graph from the camera into the multisampled
//!    target, sampling the shadow depth texture
//! 3. **Skybox pass** - the environment cube into the same target
//! 4. **Composite** - resolve, then a full-screen post-process to the screen
//!
//! All targets are created and validated in [`FrameRenderer::new`]; an
//! incomplete framebuffer is a construction error, never a per-frame one.

use crate::{
    error::RenderResult,
    gfx::{
        camera::Camera,
        rendering::{
            context::{
                ClearFlags, FramePhase, ProgramDesc, ProgramHandle, ProgramKind, RecordedFrame,
                RenderContext,
            },
            post_process::ScreenQuad,
            render_target::RenderTarget,
            shadow_map::ShadowMap,
            skybox::Skybox,
        },
        scene::{graph::SceneGraph, registry::SceneRegistry},
    },
};

pub const LIT_SHADER: &str = include_str!("lit.wgsl");
pub const SHADOW_SHADER: &str = include_str!("shadow.wgsl");
pub const SKYBOX_SHADER: &str = include_str!("skybox.wgsl");
pub const POST_SHADER: &str = include_str!("post.wgsl");

const CLEAR_COLOR: [f64; 4] = [0.1, 0.1, 0.12, 1.0];

/// Program handles for every pass
#[derive(Debug, Clone, Copy)]
pub struct Programs {
    pub lit: ProgramHandle,
    pub depth: ProgramHandle,
    pub skybox: ProgramHandle,
    pub post: ProgramHandle,
}

impl Programs {
    pub fn create(ctx: &mut RenderContext) -> Self {
        Self {
            lit: ctx.create_program(ProgramDesc {
                label: "lit",
                kind: ProgramKind::Lit,
                source: LIT_SHADER,
            }),
            depth: ctx.create_program(ProgramDesc {
                label: "shadow",
                kind: ProgramKind::Depth,
                source: SHADOW_SHADER,
            }),
            skybox: ctx.create_program(ProgramDesc {
                label: "skybox",
                kind: ProgramKind::Skybox,
                source: SKYBOX_SHADER,
            }),
            post: ctx.create_program(ProgramDesc {
                label: "post",
                kind: ProgramKind::PostProcess,
                source: POST_SHADER,
            }),
        }
    }
}

#[derive(Debug)]
pub struct FrameRenderer {
    programs: Programs,
    shadow_map: ShadowMap,
    target: RenderTarget,
    skybox: Skybox,
    screen: ScreenQuad,
}

impl FrameRenderer {
    /// Creates the programs and the shadow and scene targets at
    /// `width` x `height`.
    pub fn new(
        ctx: &mut RenderContext,
        width: u32,
        height: u32,
        samples: u32,
        skybox: Skybox,
    ) -> RenderResult<Self> {
        let programs = Programs::create(ctx);
        let shadow_map = ShadowMap::new(ctx, width, height)?;
        let target = RenderTarget::new(ctx, width, height, samples, CLEAR_COLOR)?;

        Ok(Self {
            programs,
            shadow_map,
            target,
            skybox,
            screen: ScreenQuad::new(programs.post),
        })
    }

    pub fn programs(&self) -> &Programs {
        &self.programs
    }

    pub fn shadow_map(&self) -> &ShadowMap {
        &self.shadow_map
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn skybox(&self) -> &Skybox {
        &self.skybox
    }

    /// Records a complete frame for `graph`, viewed from its camera.
    pub fn render(
        &self,
        ctx: &mut RenderContext,
        graph: &mut SceneGraph,
        registry: &SceneRegistry,
    ) -> RenderResult<RecordedFrame> {
        let camera = registry.camera(graph.camera())?;
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();

        ctx.begin_frame()?;

        ctx.enter_phase(FramePhase::ShadowPass)?;
        self.shadow_map.bind(ctx)?;
        graph.render(
            ctx,
            registry,
            self.programs.depth,
            view,
            projection,
            None,
            None,
        )?;
        self.shadow_map.unbind(ctx)?;

        ctx.enter_phase(FramePhase::MainPass)?;
        self.target.bind(ctx)?;
        graph.render(
            ctx,
            registry,
            self.programs.lit,
            view,
            projection,
            Some(self.shadow_map.texture()),
            Some(self.skybox.cube_map()),
        )?;

        ctx.enter_phase(FramePhase::SkyboxPass)?;
        self.skybox
            .render(ctx, self.programs.skybox, view, projection)?;
        self.target.unbind(ctx)?;

        ctx.enter_phase(FramePhase::Composite)?;
        ctx.bind_screen(ClearFlags {
            color: Some(CLEAR_COLOR),
            depth: None,
        })?;
        self.screen.render(ctx, self.target.texture())?;
        ctx.unbind_target(false)?;

        ctx.end_frame()
    }
}
