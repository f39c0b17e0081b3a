//! # Scene Management Module
//!
//! Hierarchical scene composition for the demo.
//!
//! ## Key Components
//!
//! - [`SceneGraph`] - Arena of nodes; each node's world transform is the
//!   product of its ancestors' local transforms and its own
//! - [`Mesh`] - Geometry, material bindings and a local transform
//! - [`SceneRegistry`] - Owns cameras and lights; the graph refers to them
//!   by id only
//! - [`ObjVertex`] - Interleaved vertex layout shared with the pipelines
//!
//! ## Usage
//!
//! ```no_run
//! use cgmath::Vector3;
//! use shadowbox::gfx::{scene::{SceneGraph, SceneRegistry}, FlyCamera, Light};
//!
//! let mut registry = SceneRegistry::new();
//! let camera = registry.add_camera(FlyCamera::new(Vector3::new(0.0, 3.0, -20.0), 1.2, 1.5));
//! let light = registry.add_light(Light::new(
//!     Vector3::new(-30.0, 24.0, 0.0),
//!     Vector3::new(2.0, 2.0, 2.0),
//!     0.1,
//!     0.8,
//!     0.5,
//! ));
//! let graph = SceneGraph::new(camera, light, 1.2);
//! assert!(graph.is_empty());
//! ```

pub mod graph;
pub mod mesh;
pub mod registry;
pub mod vertex;

// Re-export main types
pub use graph::{NodeId, SceneGraph};
pub use mesh::{Mesh, PassParams};
pub use registry::{CameraId, LightId, SceneRegistry};
pub use vertex::{ObjVertex, Quad, Triangle};
