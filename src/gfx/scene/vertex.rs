//! # Vertex Data Structures
//!
//! GPU-compatible vertex and primitive layouts shared by the OBJ loader,
//! the mesh uploader and the render pipelines.

/// A flattened OBJ vertex with everything the lit shader reads.
///
/// # Memory Layout
///
/// `#[repr(C)]` with only `f32` arrays, 56 bytes per vertex:
/// texcoord (8), normal (12), position (12), tangent (12), bitangent (12).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjVertex {
    pub texcoord: [f32; 2],
    pub normal: [f32; 3],
    pub position: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl ObjVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x3,
        2 => Float32x3,
        3 => Float32x3,
        4 => Float32x3
    ];

    /// Returns the vertex buffer layout for the lit and depth pipelines.
    ///
    /// - Location 0: texcoord
    /// - Location 1: normal
    /// - Location 2: position
    /// - Location 3: tangent
    /// - Location 4: bitangent
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ObjVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Three indices into a mesh's vertex array.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Triangle(pub [u32; 3]);

/// Four indices into a mesh's vertex array, only kept in legacy quad mode.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Quad(pub [u32; 4]);

impl Quad {
    /// Splits the quad into `(p0, p1, p2)` and `(p2, p3, p0)`.
    pub fn split(self) -> [Triangle; 2] {
        let [p0, p1, p2, p3] = self.0;
        [Triangle([p0, p1, p2]), Triangle([p2, p3, p0])]
    }
}

/// Position-only vertex layout used by the skybox cube.
pub fn position_desc() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride_matches_interleaved_layout() {
        assert_eq!(std::mem::size_of::<ObjVertex>(), 56);
        assert_eq!(ObjVertex::desc().attributes[2].offset, 20);
        assert_eq!(ObjVertex::desc().attributes[4].offset, 44);
    }

    #[test]
    fn test_quad_split_order() {
        let [a, b] = Quad([0, 1, 2, 3]).split();
        assert_eq!(a, Triangle([0, 1, 2]));
        assert_eq!(b, Triangle([2, 3, 0]));
    }
}
