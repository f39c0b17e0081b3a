//! Wavefront OBJ mesh loading.
//!
//! Parsing is delegated to `tobj` with triangulation and single indexing
//! switched off, so every face corner keeps its own position, texcoord and
//! normal reference. Each corner becomes a fresh [`ObjVertex`] in face order,
//! which lets tangents be accumulated per corner without touching other faces.

use std::{
    fs::File,
    io::{BufReader, Cursor},
    path::Path,
};

use cgmath::{InnerSpace, Vector2, Vector3, Zero};
use log::{debug, warn};

use super::MeshData;
use crate::{
    error::MeshLoadError,
    gfx::scene::vertex::{ObjVertex, Quad, Triangle},
};

/// Below this UV determinant a triangle contributes no tangent frame.
const UV_EPSILON: f32 = 1e-8;

/// Loads OBJ files into flattened [`MeshData`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshLoader {
    keep_quads: bool,
}

impl MeshLoader {
    /// `keep_quads` preserves quad faces for legacy compatibility mode;
    /// otherwise quads are split into two triangles.
    pub fn new(keep_quads: bool) -> Self {
        Self { keep_quads }
    }

    /// Loads every model in the file at `path` into a single mesh.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<MeshData, MeshLoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| MeshLoadError::Open {
            path: path.to_path_buf(),
        })?;

        let data = self.load_from_reader(&mut BufReader::new(file))?;
        debug!(
            "Loaded mesh '{}': {} vertices, {} triangles, {} quads",
            path.display(),
            data.vertices.len(),
            data.triangles.len(),
            data.quads.len()
        );
        Ok(data)
    }

    /// Loads OBJ source text. Material libraries are not resolved.
    pub fn load_from_str(&self, source: &str) -> Result<MeshData, MeshLoadError> {
        self.load_from_reader(&mut BufReader::new(Cursor::new(source.as_bytes())))
    }

    fn load_from_reader<R: std::io::BufRead>(
        &self,
        reader: &mut R,
    ) -> Result<MeshData, MeshLoadError> {
        let options = tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };

        // Materials are bound by the application, not read from .mtl files
        let (models, _materials) =
            tobj::load_obj_buf(reader, &options, |_| Err(tobj::LoadError::OpenFileFailed))?;

        let mut builder = MeshBuilder::default();
        for model in &models {
            self.append_model(&mut builder, &model.name, &model.mesh);
        }

        let data = builder.finish();
        data.validate()?;
        Ok(data)
    }

    fn append_model(&self, builder: &mut MeshBuilder, name: &str, mesh: &tobj::Mesh) {
        let face_count = if mesh.face_arities.is_empty() {
            mesh.indices.len() / 3
        } else {
            mesh.face_arities.len()
        };

        let mut cursor = 0usize;
        for face in 0..face_count {
            let arity = mesh.face_arities.get(face).copied().unwrap_or(3) as usize;
            let corners = cursor..cursor + arity;
            cursor += arity;

            match arity {
                3 | 4 => {}
                _ => {
                    warn!(
                        "Skipping face {} of '{}' with {} corners (only triangles and quads are supported)",
                        face, name, arity
                    );
                    continue;
                }
            }

            let first = builder.vertices.len() as u32;
            for corner in corners {
                builder.push_corner(mesh, corner);
            }

            if arity == 3 {
                builder.push_triangle(Triangle([first, first + 1, first + 2]));
            } else {
                let quad = Quad([first, first + 1, first + 2, first + 3]);
                let [a, b] = quad.split();
                if self.keep_quads {
                    builder.accumulate_tangents(a);
                    builder.accumulate_tangents(b);
                    builder.quads.push(quad);
                } else {
                    builder.push_triangle(a);
                    builder.push_triangle(b);
                }
            }
        }
    }
}

/// Vertex and index storage plus the tangent/bitangent accumulators,
/// indexed by vertex id.
#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<ObjVertex>,
    triangles: Vec<Triangle>,
    quads: Vec<Quad>,
    tangents: Vec<Vector3<f32>>,
    bitangents: Vec<Vector3<f32>>,
}

impl MeshBuilder {
    fn push_corner(&mut self, mesh: &tobj::Mesh, corner: usize) {
        let position = read3(&mesh.positions, mesh.indices.get(corner).copied());
        let normal = read3(&mesh.normals, mesh.normal_indices.get(corner).copied());
        let texcoord = read2(&mesh.texcoords, mesh.texcoord_indices.get(corner).copied());

        self.vertices.push(ObjVertex {
            texcoord,
            normal,
            position,
            ..Default::default()
        });
        self.tangents.push(Vector3::zero());
        self.bitangents.push(Vector3::zero());
    }

    fn push_triangle(&mut self, triangle: Triangle) {
        self.accumulate_tangents(triangle);
        self.triangles.push(triangle);
    }

    fn accumulate_tangents(&mut self, triangle: Triangle) {
        let [i0, i1, i2] = triangle.0.map(|i| i as usize);
        let (v0, v1, v2) = (self.vertices[i0], self.vertices[i1], self.vertices[i2]);

        let p0 = Vector3::from(v0.position);
        let edge1 = Vector3::from(v1.position) - p0;
        let edge2 = Vector3::from(v2.position) - p0;

        let uv0 = Vector2::from(v0.texcoord);
        let duv1 = Vector2::from(v1.texcoord) - uv0;
        let duv2 = Vector2::from(v2.texcoord) - uv0;

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() <= UV_EPSILON {
            return;
        }
        let r = 1.0 / det;

        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;

        for i in [i0, i1, i2] {
            self.tangents[i] += tangent;
            self.bitangents[i] += bitangent;
        }
    }

    fn finish(mut self) -> MeshData {
        for (vertex, (tangent, bitangent)) in self
            .vertices
            .iter_mut()
            .zip(self.tangents.iter().zip(self.bitangents.iter()))
        {
            vertex.tangent = normalize_or_zero(*tangent).into();
            vertex.bitangent = normalize_or_zero(*bitangent).into();
        }

        MeshData {
            vertices: self.vertices,
            triangles: self.triangles,
            quads: self.quads,
        }
    }
}

fn normalize_or_zero(v: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > 0.0 {
        v.normalize()
    } else {
        v
    }
}

fn read3(data: &[f32], index: Option<u32>) -> [f32; 3] {
    index
        .map(|i| i as usize * 3)
        .and_then(|i| data.get(i..i + 3))
        .map(|s| [s[0], s[1], s[2]])
        .unwrap_or([0.0; 3])
}

fn read2(data: &[f32], index: Option<u32>) -> [f32; 2] {
    index
        .map(|i| i as usize * 2)
        .and_then(|i| data.get(i..i + 2))
        .map(|s| [s[0], s[1]])
        .unwrap_or([0.0; 2])
}
