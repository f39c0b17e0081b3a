//! Error types for scene assembly, asset loading and frame recording.

use std::path::PathBuf;
use thiserror::Error;

use crate::gfx::rendering::context::{FramePhase, FramebufferStatus, TextureHandle};
use crate::gfx::scene::graph::NodeId;

/// Errors raised while recording or executing a frame.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The frame state machine was asked to skip or repeat a phase.
    #[error("frame phase {from:?} cannot advance to {to:?}")]
    PhaseOrder { from: FramePhase, to: FramePhase },

    /// A render target failed its completeness check at construction.
    #[error("framebuffer '{label}' is incomplete: {status}")]
    IncompleteFramebuffer {
        label: String,
        status: FramebufferStatus,
    },

    /// Legacy quads were submitted while compatibility mode is disabled.
    #[error("unsupported primitive: {0}")]
    UnsupportedPrimitive(&'static str),

    /// A texture is sampled while it is an attachment of the bound target.
    #[error("texture {texture:?} is sampled while attached to the active render target")]
    FeedbackLoop { texture: TextureHandle },

    /// Passes and draws are only recorded between `begin_frame` and `end_frame`.
    #[error("no frame is being recorded")]
    NotRecording,

    /// A draw or unbind happened with no target bound.
    #[error("no render target is bound")]
    NoTargetBound,

    /// A second target was bound before the first was released.
    #[error("a render target is already bound")]
    TargetAlreadyBound,

    /// A handle does not refer to any created resource.
    #[error("unknown {kind} handle #{id}")]
    UnknownHandle { kind: &'static str, id: u32 },

    /// A mesh index references a vertex that does not exist.
    #[error("mesh index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    /// The draw call does not fit the program it is issued with.
    #[error("invalid draw: {0}")]
    InvalidDraw(String),

    /// Cube map faces must be square and share one size.
    #[error("cube map faces must be square and equally sized")]
    InvalidCubeMap,

    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The device rejected a resource or pipeline.
    #[error("GPU rejected {what}: {message}")]
    Gpu { what: String, message: String },

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Errors raised while building the scene graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("node {0:?} is already attached to a parent")]
    AlreadyAttached(NodeId),

    #[error("the root node cannot be attached as a child")]
    RootAsChild,

    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("camera #{0} is not registered")]
    UnknownCamera(usize),

    #[error("light #{0} is not registered")]
    UnknownLight(usize),
}

/// Errors raised by the OBJ mesh loader.
#[derive(Error, Debug)]
pub enum MeshLoadError {
    #[error("failed to open mesh file '{}'", path.display())]
    Open { path: PathBuf },

    #[error("failed to parse OBJ data: {0}")]
    Parse(#[from] tobj::LoadError),

    #[error(transparent)]
    InvalidMesh(#[from] RenderError),
}

/// Errors raised while decoding texture and skybox images.
#[derive(Error, Debug)]
pub enum ImageSourceError {
    #[error("failed to decode image '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("cross atlas of {width}x{height} cannot be split into 4x3 square faces")]
    CrossLayout { width: u32, height: u32 },

    #[error("a cube map needs 6 faces, got {0}")]
    FaceCount(usize),
}

/// Result alias for frame recording operations.
pub type RenderResult<T> = Result<T, RenderError>;
