//! # Render Context
//!
//! Explicit replacement for implicit GPU state. Every draw carries its own
//! program, geometry, binding table and uniform block, and the context
//! records them into passes instead of mutating a global device state.
//!
//! The context also owns the frame phase state machine
//! (`Idle -> ShadowPass -> MainPass -> SkyboxPass -> Composite -> Idle`) and
//! hands out typed handles for resources. Creation requests are queued and
//! realised once by the backend before the first frame that uses them.
//!
//! Nothing in here touches wgpu, so whole frames can be recorded and
//! inspected in tests without a GPU.

use std::fmt;

use image::RgbaImage;
use log::{debug, error};

use crate::{
    error::{RenderError, RenderResult},
    gfx::scene::vertex::ObjVertex,
};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const KIND: &'static str = $kind;

            /// Position of the resource in the backend's storage
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// A 2D texture, either uploaded or a render target attachment
    TextureHandle,
    "texture"
);
handle!(
    /// A six-face cube map
    CubeMapHandle,
    "cube map"
);
handle!(
    /// Vertex and index storage for a mesh or position list
    GeometryHandle,
    "geometry"
);
handle!(
    /// An off-screen render target
    TargetHandle,
    "target"
);
handle!(
    /// A compiled shader program
    ProgramHandle,
    "program"
);

// ============================================================================
// Resource descriptions
// ============================================================================

/// How a 2D texture's texels are interpreted when sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// sRGB colour data
    Color,
    /// Linear data such as normal maps
    Data,
}

/// CPU geometry handed to the backend for upload
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryData {
    Mesh {
        vertices: Vec<ObjVertex>,
        triangle_indices: Vec<u32>,
        quad_indices: Vec<u32>,
    },
    Positions(Vec<[f32; 3]>),
}

/// Which shader family a program belongs to. Fixes the vertex layout and
/// the binding table the backend builds for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Lit, shadowed, optionally normal-mapped meshes
    Lit,
    /// Depth-only meshes for the shadow pass
    Depth,
    /// Environment cube around the camera
    Skybox,
    /// Full-screen composite of a resolved colour texture
    PostProcess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDesc {
    pub label: &'static str,
    pub kind: ProgramKind,
    pub source: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentFormat {
    Rgba8,
    Depth32Float,
}

impl AttachmentFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub width: u32,
    pub height: u32,
    pub format: AttachmentFormat,
    pub samples: u32,
}

impl AttachmentDesc {
    pub fn new(width: u32, height: u32, format: AttachmentFormat, samples: u32) -> Self {
        Self {
            width,
            height,
            format,
            samples,
        }
    }
}

/// Attachments of an off-screen render target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDesc {
    pub label: String,
    pub color: Option<AttachmentDesc>,
    pub depth: Option<AttachmentDesc>,
    /// Single-sampled texture the multisampled colour is resolved into
    pub resolve: Option<AttachmentDesc>,
}

/// Outcome of the completeness check run when a target is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    MissingAttachment,
    IncompleteAttachment,
    MismatchedDimensions,
    MismatchedFormats,
    Unsupported,
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Complete => "complete",
            Self::MissingAttachment => "target has no colour or depth attachment",
            Self::IncompleteAttachment => {
                "an attachment has zero size or a format unfit for its slot"
            }
            Self::MismatchedDimensions => "attachments do not share the same dimensions",
            Self::MismatchedFormats => "resolve format differs from the colour format",
            Self::Unsupported => "sample configuration is not supported by the device",
        };
        f.write_str(message)
    }
}

impl TargetDesc {
    /// Checks the attachment combination against the device capabilities.
    pub fn status(&self, caps: &Capabilities) -> FramebufferStatus {
        if self.color.is_none() && self.depth.is_none() {
            return FramebufferStatus::MissingAttachment;
        }

        let attachments: Vec<&AttachmentDesc> = [&self.color, &self.depth, &self.resolve]
            .into_iter()
            .flatten()
            .collect();

        if attachments.iter().any(|a| a.width == 0 || a.height == 0) {
            return FramebufferStatus::IncompleteAttachment;
        }
        let misplaced = self.color.is_some_and(|c| c.format.is_depth())
            || self.depth.is_some_and(|d| !d.format.is_depth())
            || self.resolve.is_some_and(|r| r.format.is_depth());
        if misplaced {
            return FramebufferStatus::IncompleteAttachment;
        }

        let (width, height) = (attachments[0].width, attachments[0].height);
        if attachments
            .iter()
            .any(|a| a.width != width || a.height != height)
        {
            return FramebufferStatus::MismatchedDimensions;
        }

        if let (Some(color), Some(resolve)) = (self.color, self.resolve) {
            if color.format != resolve.format {
                return FramebufferStatus::MismatchedFormats;
            }
        }

        let bad_count = |s: u32| s == 0 || !s.is_power_of_two() || s > caps.max_samples;
        if attachments.iter().any(|a| bad_count(a.samples)) {
            return FramebufferStatus::Unsupported;
        }
        if let (Some(color), Some(depth)) = (self.color, self.depth) {
            if color.samples != depth.samples {
                return FramebufferStatus::Unsupported;
            }
        }
        match (self.color, self.resolve) {
            (None, Some(_)) => return FramebufferStatus::Unsupported,
            (Some(color), Some(resolve)) if resolve.samples != 1 || color.samples == 1 => {
                return FramebufferStatus::Unsupported
            }
            _ => {}
        }

        FramebufferStatus::Complete
    }

    /// Sample count draws into this target are rasterised with
    pub fn samples(&self) -> u32 {
        self.color.or(self.depth).map_or(1, |a| a.samples)
    }

    /// `(width, height)` shared by every attachment
    pub fn size(&self) -> (u32, u32) {
        self.color
            .or(self.depth)
            .map_or((0, 0), |a| (a.width, a.height))
    }
}

/// Handles for a created target and the textures behind its attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub handle: TargetHandle,
    pub color: Option<TextureHandle>,
    pub depth: Option<TextureHandle>,
    pub resolve: Option<TextureHandle>,
}

impl TargetInfo {
    /// Textures written while this target is bound
    pub fn attachments(&self) -> impl Iterator<Item = TextureHandle> {
        [self.color, self.depth, self.resolve].into_iter().flatten()
    }
}

/// Device limits the context validates against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub max_samples: u32,
    /// Quad primitives may be drawn (emulated by the backend)
    pub legacy_quads: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_samples: 4,
            legacy_quads: false,
        }
    }
}

/// Creation work queued for the backend
#[derive(Debug, Clone)]
pub enum ResourceRequest {
    Texture {
        handle: TextureHandle,
        label: String,
        image: RgbaImage,
        usage: TextureUsage,
    },
    CubeMap {
        handle: CubeMapHandle,
        label: String,
        faces: Box<[RgbaImage; 6]>,
    },
    Geometry {
        handle: GeometryHandle,
        label: String,
        data: GeometryData,
    },
    Program {
        handle: ProgramHandle,
        desc: ProgramDesc,
    },
    Target {
        info: TargetInfo,
        desc: TargetDesc,
    },
}

// ============================================================================
// Frame state
// ============================================================================

/// Phases of one frame, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    ShadowPass,
    MainPass,
    SkyboxPass,
    Composite,
}

impl FramePhase {
    /// The skybox phase may be skipped, nothing else may.
    pub fn can_advance_to(self, next: FramePhase) -> bool {
        use FramePhase::*;
        matches!(
            (self, next),
            (Idle, ShadowPass)
                | (ShadowPass, MainPass)
                | (MainPass, SkyboxPass)
                | (MainPass, Composite)
                | (SkyboxPass, Composite)
                | (Composite, Idle)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Less,
    LessEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Fixed-function state captured with every draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    /// `None` covers the whole attachment
    pub viewport: Option<Viewport>,
    pub cull: CullFace,
    pub depth_func: DepthFunc,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            viewport: None,
            cull: CullFace::Back,
            depth_func: DepthFunc::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearFlags {
    pub color: Option<[f64; 4]>,
    pub depth: Option<f32>,
}

impl ClearFlags {
    pub fn color_and_depth(color: [f64; 4]) -> Self {
        Self {
            color: Some(color),
            depth: Some(1.0),
        }
    }

    pub fn depth_only() -> Self {
        Self {
            color: None,
            depth: Some(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    Offscreen(TargetHandle),
    Screen,
}

// ============================================================================
// Draw calls
// ============================================================================

/// Texture units a draw samples from.
///
/// Unit 0 diffuse (or the composite source), unit 1 shadow depth,
/// unit 2 environment cube, unit 3 normal map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindingTable {
    pub diffuse: Option<TextureHandle>,
    pub shadow_map: Option<TextureHandle>,
    pub environment: Option<CubeMapHandle>,
    pub normal_map: Option<TextureHandle>,
}

impl BindingTable {
    /// Every 2D texture sampled through this table
    pub fn sampled_textures(&self) -> impl Iterator<Item = TextureHandle> {
        [self.diffuse, self.shadow_map, self.normal_map]
            .into_iter()
            .flatten()
    }
}

/// Per-draw uniform block for the lit and depth programs
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_matrix: [[f32; 4]; 4],
    pub light_position: [f32; 4],
    pub light_ambient: [f32; 4],
    pub light_diffuse: [f32; 4],
    pub light_specular: [f32; 4],
    pub camera_position: [f32; 4],
    /// x: mirror, y: sample normal map
    pub flags: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyboxUniforms {
    /// View matrix with its translation removed
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawUniforms {
    None,
    Mesh(MeshUniforms),
    Skybox(SkyboxUniforms),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Indexed triangle list, `count` triangles
    Triangles { count: u32 },
    /// Indexed legacy quads, `count` quads
    Quads { count: u32 },
    /// Non-indexed triangle list over a position buffer
    Positions { count: u32 },
    /// Three generated vertices, no geometry
    FullscreenTriangle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub geometry: Option<GeometryHandle>,
    pub primitive: Primitive,
    pub bindings: BindingTable,
    pub uniforms: DrawUniforms,
}

/// A draw with the state it was recorded under
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub call: DrawCall,
    pub raster: RasterState,
    pub phase: FramePhase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub target: PassTarget,
    pub clear: ClearFlags,
    /// Phase the target was bound in
    pub phase: FramePhase,
    pub draws: Vec<DrawCommand>,
    /// Resolve the multisampled colour when the pass ends
    pub resolve: bool,
}

/// Everything recorded between `begin_frame` and `end_frame`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedFrame {
    pub passes: Vec<RecordedPass>,
}

impl RecordedFrame {
    pub fn draw_count(&self) -> usize {
        self.passes.iter().map(|p| p.draws.len()).sum()
    }

    /// All draws in submission order with the pass they belong to
    pub fn draws(&self) -> impl Iterator<Item = (&RecordedPass, &DrawCommand)> {
        self.passes
            .iter()
            .flat_map(|pass| pass.draws.iter().map(move |draw| (pass, draw)))
    }
}

// ============================================================================
// Context
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeometryKind {
    Mesh { triangles: u32, quads: u32 },
    Positions { count: u32 },
}

/// Records resource creation and frame commands
pub struct RenderContext {
    caps: Capabilities,
    texture_count: u32,
    cube_map_count: u32,
    geometries: Vec<GeometryKind>,
    programs: Vec<ProgramKind>,
    targets: Vec<TargetInfo>,
    pending: Vec<ResourceRequest>,

    phase: FramePhase,
    recording: bool,
    bound: Option<PassTarget>,
    raster: RasterState,
    frame: RecordedFrame,
}

impl RenderContext {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            texture_count: 0,
            cube_map_count: 0,
            geometries: Vec::new(),
            programs: Vec::new(),
            targets: Vec::new(),
            pending: Vec::new(),
            phase: FramePhase::Idle,
            recording: false,
            bound: None,
            raster: RasterState::default(),
            frame: RecordedFrame::default(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn legacy_quads_enabled(&self) -> bool {
        self.caps.legacy_quads
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn raster_state(&self) -> RasterState {
        self.raster
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    fn next_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.texture_count);
        self.texture_count += 1;
        handle
    }

    pub fn create_texture(
        &mut self,
        label: &str,
        image: RgbaImage,
        usage: TextureUsage,
    ) -> TextureHandle {
        let handle = self.next_texture();
        debug!(
            "Queued texture '{}' {}x{} as {:?}",
            label,
            image.width(),
            image.height(),
            handle
        );
        self.pending.push(ResourceRequest::Texture {
            handle,
            label: label.to_string(),
            image,
            usage,
        });
        handle
    }

    pub fn create_cube_map(
        &mut self,
        label: &str,
        faces: [RgbaImage; 6],
    ) -> RenderResult<CubeMapHandle> {
        let (width, height) = faces[0].dimensions();
        if width == 0 || width != height || faces.iter().any(|f| f.dimensions() != (width, height))
        {
            return Err(RenderError::InvalidCubeMap);
        }

        let handle = CubeMapHandle(self.cube_map_count);
        self.cube_map_count += 1;
        debug!("Queued cube map '{}' ({}px faces) as {:?}", label, width, handle);
        self.pending.push(ResourceRequest::CubeMap {
            handle,
            label: label.to_string(),
            faces: Box::new(faces),
        });
        Ok(handle)
    }

    pub fn upload_geometry(&mut self, label: &str, data: GeometryData) -> GeometryHandle {
        let kind = match &data {
            GeometryData::Mesh {
                triangle_indices,
                quad_indices,
                ..
            } => GeometryKind::Mesh {
                triangles: (triangle_indices.len() / 3) as u32,
                quads: (quad_indices.len() / 4) as u32,
            },
            GeometryData::Positions(positions) => GeometryKind::Positions {
                count: positions.len() as u32,
            },
        };

        let handle = GeometryHandle(self.geometries.len() as u32);
        self.geometries.push(kind);
        debug!("Queued geometry '{}' as {:?}", label, handle);
        self.pending.push(ResourceRequest::Geometry {
            handle,
            label: label.to_string(),
            data,
        });
        handle
    }

    pub fn create_program(&mut self, desc: ProgramDesc) -> ProgramHandle {
        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(desc.kind);
        debug!("Queued program '{}' as {:?}", desc.label, handle);
        self.pending.push(ResourceRequest::Program { handle, desc });
        handle
    }

    /// Validates the attachment set and allocates the target.
    ///
    /// Incomplete targets are reported once here and never reach a frame.
    pub fn create_target(&mut self, desc: TargetDesc) -> RenderResult<TargetInfo> {
        let status = desc.status(&self.caps);
        if status != FramebufferStatus::Complete {
            error!("Framebuffer '{}' is incomplete: {}", desc.label, status);
            return Err(RenderError::IncompleteFramebuffer {
                label: desc.label,
                status,
            });
        }

        let handle = TargetHandle(self.targets.len() as u32);
        let info = TargetInfo {
            handle,
            color: desc.color.map(|_| self.next_texture()),
            depth: desc.depth.map(|_| self.next_texture()),
            resolve: desc.resolve.map(|_| self.next_texture()),
        };
        self.targets.push(info);
        debug!(
            "Queued target '{}' {:?} ({} samples)",
            desc.label,
            desc.size(),
            desc.samples()
        );
        self.pending.push(ResourceRequest::Target { info, desc });
        Ok(info)
    }

    pub fn target(&self, handle: TargetHandle) -> RenderResult<&TargetInfo> {
        self.targets
            .get(handle.index())
            .ok_or(RenderError::UnknownHandle {
                kind: TargetHandle::KIND,
                id: handle.0,
            })
    }

    /// Drains creation requests queued since the last call
    pub fn take_pending(&mut self) -> Vec<ResourceRequest> {
        std::mem::take(&mut self.pending)
    }

    // ------------------------------------------------------------------
    // Frame state machine
    // ------------------------------------------------------------------

    pub fn begin_frame(&mut self) -> RenderResult<()> {
        if self.recording || self.phase != FramePhase::Idle {
            return Err(RenderError::PhaseOrder {
                from: self.phase,
                to: FramePhase::Idle,
            });
        }
        self.recording = true;
        self.raster = RasterState::default();
        self.frame = RecordedFrame::default();
        Ok(())
    }

    pub fn enter_phase(&mut self, next: FramePhase) -> RenderResult<()> {
        if !self.recording {
            return Err(RenderError::NotRecording);
        }
        if !self.phase.can_advance_to(next) {
            return Err(RenderError::PhaseOrder {
                from: self.phase,
                to: next,
            });
        }
        // Only the skybox shares its target with the previous phase
        if next != FramePhase::SkyboxPass && self.bound.is_some() {
            return Err(RenderError::TargetAlreadyBound);
        }
        self.phase = next;
        Ok(())
    }

    /// Closes the frame and returns what was recorded.
    pub fn end_frame(&mut self) -> RenderResult<RecordedFrame> {
        if !self.recording {
            return Err(RenderError::NotRecording);
        }
        if self.phase != FramePhase::Composite {
            return Err(RenderError::PhaseOrder {
                from: self.phase,
                to: FramePhase::Idle,
            });
        }
        if self.bound.is_some() {
            return Err(RenderError::TargetAlreadyBound);
        }
        self.phase = FramePhase::Idle;
        self.recording = false;
        Ok(std::mem::take(&mut self.frame))
    }

    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.raster.viewport = viewport;
    }

    pub fn set_cull_face(&mut self, cull: CullFace) {
        self.raster.cull = cull;
    }

    pub fn set_depth_func(&mut self, depth_func: DepthFunc) {
        self.raster.depth_func = depth_func;
    }

    fn open_pass(&mut self, target: PassTarget, clear: ClearFlags) -> RenderResult<()> {
        if !self.recording || self.phase == FramePhase::Idle {
            return Err(RenderError::NotRecording);
        }
        if self.bound.is_some() {
            return Err(RenderError::TargetAlreadyBound);
        }
        self.bound = Some(target);
        self.frame.passes.push(RecordedPass {
            target,
            clear,
            phase: self.phase,
            draws: Vec::new(),
            resolve: false,
        });
        Ok(())
    }

    /// Directs following draws into `handle`, clearing it first.
    pub fn bind_target(&mut self, handle: TargetHandle, clear: ClearFlags) -> RenderResult<()> {
        self.target(handle)?;
        self.open_pass(PassTarget::Offscreen(handle), clear)
    }

    /// Directs following draws to the visible surface.
    pub fn bind_screen(&mut self, clear: ClearFlags) -> RenderResult<()> {
        self.open_pass(PassTarget::Screen, clear)
    }

    /// Ends the current pass; `resolve` blits multisampled colour into the
    /// target's resolve texture.
    pub fn unbind_target(&mut self, resolve: bool) -> RenderResult<()> {
        let bound = self.bound.ok_or(RenderError::NoTargetBound)?;
        if resolve {
            let resolvable = match bound {
                PassTarget::Offscreen(handle) => self.target(handle)?.resolve.is_some(),
                PassTarget::Screen => false,
            };
            if !resolvable {
                return Err(RenderError::InvalidDraw(
                    "resolve requested on a target without a resolve attachment".into(),
                ));
            }
        }

        if let Some(pass) = self.frame.passes.last_mut() {
            pass.resolve = resolve;
        }
        self.bound = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Draws
    // ------------------------------------------------------------------

    /// Validates and records a draw into the bound target.
    pub fn draw(&mut self, call: DrawCall) -> RenderResult<()> {
        if !self.recording {
            return Err(RenderError::NotRecording);
        }
        let bound = self.bound.ok_or(RenderError::NoTargetBound)?;

        let program = self
            .programs
            .get(call.program.index())
            .copied()
            .ok_or(RenderError::UnknownHandle {
                kind: ProgramHandle::KIND,
                id: call.program.0,
            })?;

        for texture in call.bindings.sampled_textures() {
            if texture.0 >= self.texture_count {
                return Err(RenderError::UnknownHandle {
                    kind: TextureHandle::KIND,
                    id: texture.0,
                });
            }
        }
        if let Some(cube) = call.bindings.environment {
            if cube.0 >= self.cube_map_count {
                return Err(RenderError::UnknownHandle {
                    kind: CubeMapHandle::KIND,
                    id: cube.0,
                });
            }
        }

        if let PassTarget::Offscreen(handle) = bound {
            let info = *self.target(handle)?;
            if let Some(texture) = call
                .bindings
                .sampled_textures()
                .find(|t| info.attachments().any(|a| a == *t))
            {
                return Err(RenderError::FeedbackLoop { texture });
            }
        }

        self.check_primitive(&call)?;
        Self::check_program_inputs(program, &call)?;

        self.frame
            .passes
            .last_mut()
            .ok_or(RenderError::NoTargetBound)?
            .draws
            .push(DrawCommand {
                call,
                raster: self.raster,
                phase: self.phase,
            });
        Ok(())
    }

    fn check_primitive(&self, call: &DrawCall) -> RenderResult<()> {
        let kind = match call.geometry {
            Some(geometry) => Some(self.geometries.get(geometry.index()).copied().ok_or(
                RenderError::UnknownHandle {
                    kind: GeometryHandle::KIND,
                    id: geometry.0,
                },
            )?),
            None => None,
        };

        match (call.primitive, kind) {
            (Primitive::Quads { .. }, _) if !self.caps.legacy_quads => {
                Err(RenderError::UnsupportedPrimitive("quads"))
            }
            (Primitive::Triangles { count }, Some(GeometryKind::Mesh { triangles, .. }))
                if count <= triangles =>
            {
                Ok(())
            }
            (Primitive::Quads { count }, Some(GeometryKind::Mesh { quads, .. }))
                if count <= quads =>
            {
                Ok(())
            }
            (Primitive::Positions { count }, Some(GeometryKind::Positions { count: available }))
                if count <= available =>
            {
                Ok(())
            }
            (Primitive::FullscreenTriangle, None) => Ok(()),
            (primitive, kind) => Err(RenderError::InvalidDraw(format!(
                "{:?} cannot be drawn from {:?}",
                primitive, kind
            ))),
        }
    }

    fn check_program_inputs(program: ProgramKind, call: &DrawCall) -> RenderResult<()> {
        let b = &call.bindings;
        let ok = match (program, &call.uniforms) {
            (ProgramKind::Lit, DrawUniforms::Mesh(u)) => {
                b.diffuse.is_some()
                    && b.shadow_map.is_some()
                    && b.environment.is_some()
                    && (u.flags[1] == 0.0 || b.normal_map.is_some())
            }
            (ProgramKind::Depth, DrawUniforms::Mesh(_)) => true,
            (ProgramKind::Skybox, DrawUniforms::Skybox(_)) => b.environment.is_some(),
            (ProgramKind::PostProcess, DrawUniforms::None) => b.diffuse.is_some(),
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(RenderError::InvalidDraw(format!(
                "{:?} program is missing inputs: {:?} / {:?}",
                program, call.bindings, call.uniforms
            )))
        }
    }
}
