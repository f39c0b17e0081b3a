// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Decodes and generates images on the CPU and turns them into textures,
//! cube maps and render target attachments.

pub mod image_source;
pub mod texture_resource;

// Re-export main types
pub use texture_resource::TextureResource;
