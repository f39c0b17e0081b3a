//! # Graphics Module
//!
//! All graphics functionality of the demo: cameras, the light, mesh
//! geometry, the scene graph and the frame renderer.
//!
//! ## Architecture Overview
//!
//! - **Camera System** ([`camera`]) - Fly camera driven by keyboard actions
//! - **Geometry** ([`geometry`]) - OBJ loading with tangent generation
//! - **Scene Management** ([`scene`]) - Node arena with inherited transforms
//! - **Rendering Pipeline** ([`rendering`]) - Frame recording and the wgpu backend
//! - **Resource Management** ([`resources`]) - Images, textures and cube maps
//!
//! ## Usage
//!
//! Frames are recorded against a [`RenderContext`] and replayed by the
//! [`GpuBackend`]:
//!
//! ```no_run
//! use shadowbox::gfx::rendering::{Capabilities, RenderContext};
//!
//! let mut ctx = RenderContext::new(Capabilities::default());
//! // let renderer = FrameRenderer::new(&mut ctx, 1280, 720, 4, skybox)?;
//! // let frame = renderer.render(&mut ctx, &mut graph, &registry)?;
//! // backend.realize(ctx.take_pending())?;
//! // backend.execute(&frame)?;
//! ```

pub mod camera;
pub mod geometry;
pub mod light;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::FlyCamera;
pub use light::Light;
pub use rendering::{GpuBackend, RenderContext};
