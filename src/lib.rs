//! Shadowbox
//!
//! A small wgpu demo: a scene graph of normal-mapped OBJ meshes lit by a
//! moving point light, with shadow mapping, a skybox and an MSAA scene
//! target composited to the window.

pub mod app;
pub mod config;
pub mod demo;
pub mod error;
pub mod gfx;
pub mod wgpu_utils;

pub use app::ShadowboxApp;
pub use config::AppConfig;

/// Opens the demo window and runs it until it is closed.
pub fn run(config: AppConfig) -> anyhow::Result<()> {
    ShadowboxApp::new(config)?.run()
}
