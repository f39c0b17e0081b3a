// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Frames are recorded against a [`RenderContext`] by the pass helpers in
//! this module and replayed on the GPU by the [`GpuBackend`].

pub mod context;
pub mod frame;
pub mod pipeline_manager;
pub mod post_process;
pub mod render_engine;
pub mod render_target;
pub mod shadow_map;
pub mod skybox;

// Re-export main types
pub use context::{Capabilities, FramePhase, RecordedFrame, RenderContext};
pub use frame::{FrameRenderer, Programs};
pub use pipeline_manager::{PipelineConfig, PipelineKey, PipelineManager};
pub use render_engine::GpuBackend;
