//! # Mesh Geometry
//!
//! CPU-side geometry that feeds the scene graph: the flattened mesh data
//! produced by the OBJ loader, the axis-aligned bounds cached per mesh and
//! the fixed skybox cube.
//!
//! ## Usage
//!
//! ```no_run
//! use shadowbox::gfx::geometry::MeshLoader;
//!
//! let data = MeshLoader::new(false).load("assets/cube.obj").unwrap();
//! println!("{} triangles", data.triangle_count());
//! ```

pub mod aabb;
pub mod obj_loader;
pub mod skybox_cube;

pub use aabb::Aabb;
pub use obj_loader::MeshLoader;

use crate::{
    error::{RenderError, RenderResult},
    gfx::scene::vertex::{ObjVertex, Quad, Triangle},
};

/// Flattened mesh geometry ready for GPU upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Interleaved per-corner vertices
    pub vertices: Vec<ObjVertex>,
    /// Triangle list
    pub triangles: Vec<Triangle>,
    /// Quads kept for legacy compatibility mode only
    pub quads: Vec<Quad>,
}

impl MeshData {
    /// Get the number of vertices in this geometry
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles in this geometry
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Checks that every triangle and quad index addresses an existing vertex.
    pub fn validate(&self) -> RenderResult<()> {
        let vertex_count = self.vertices.len();
        let indices = self
            .triangles
            .iter()
            .flat_map(|t| t.0)
            .chain(self.quads.iter().flat_map(|q| q.0));

        for index in indices {
            if index as usize >= vertex_count {
                return Err(RenderError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Vertex positions in model space
    pub fn positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.vertices.iter().map(|v| v.position)
    }
}
