// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Binding type shorthands and the dynamic-offset uniform buffer used by
//! the backend.

pub mod binding_types;
pub mod uniform_buffer;

// Re-export main types
pub use binding_types::*;
pub use uniform_buffer::DynamicUniformBuffer;
