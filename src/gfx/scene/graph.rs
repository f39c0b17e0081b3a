//! # Scene Graph
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Node 0 is
//! the root: it never holds a mesh and is never drawn. Children keep their
//! insertion order, which is also the draw order.
//!
//! A node's effective world transform is the product of the local
//! transforms on the path from the root, `T_a * T_b * ... * T_node`, so
//! moving an ancestor moves every descendant on the next frame. Nodes
//! without a mesh contribute identity.
//!
//! Acyclicity is enforced on attach: a node has at most one parent, the
//! root can never be a child, and a node cannot be attached under one of
//! its own descendants.

use std::f32::consts::PI;

use cgmath::{Matrix4, Rad, SquareMatrix, Vector3, Vector4};
use log::debug;

use super::{
    mesh::{Mesh, PassParams},
    registry::{CameraId, LightId, SceneRegistry},
};
use crate::{
    error::{RenderResult, SceneError},
    gfx::{
        camera::{
            camera_utils::{FRUSTUM_Z_FAR, Z_NEAR},
            Camera, OPENGL_TO_WGPU_MATRIX,
        },
        rendering::context::{CubeMapHandle, ProgramHandle, RenderContext, TextureHandle},
    },
};

const MIN_FRUSTUM_FOV: f32 = 0.1;
const MAX_FRUSTUM_FOV: f32 = PI - 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug, Default)]
pub struct SceneNode {
    mesh: Option<Mesh>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        self.mesh.as_mut()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The mesh transform, identity for nodes without a mesh
    pub fn local_transform(&self) -> Matrix4<f32> {
        self.mesh
            .as_ref()
            .map_or_else(Matrix4::identity, |mesh| mesh.transform)
    }
}

#[derive(Debug)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    camera: CameraId,
    light: LightId,
    /// Field of view of the debug frustum, radians
    frustum_fov: f32,
}

impl SceneGraph {
    pub fn new(camera: CameraId, light: LightId, frustum_fov: f32) -> Self {
        Self {
            nodes: vec![SceneNode::default()],
            camera,
            light,
            frustum_fov: frustum_fov.clamp(MIN_FRUSTUM_FOV, MAX_FRUSTUM_FOV),
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    pub fn light(&self) -> LightId {
        self.light
    }

    /// Number of mesh nodes, attached or not. The root is not counted.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a detached node holding `mesh`.
    pub fn add_node(&mut self, mesh: Mesh) -> NodeId {
        self.nodes.push(SceneNode {
            mesh: Some(mesh),
            ..Default::default()
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Appends `child` to `parent`'s children.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        if self.node(child)?.parent.is_some() {
            return Err(SceneError::AlreadyAttached(child));
        }
        if child == NodeId::ROOT {
            return Err(SceneError::RootAsChild);
        }

        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(SceneError::Cycle { parent, child });
            }
            ancestor = self.nodes[id.0].parent;
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    pub fn attach_to_root(&mut self, child: NodeId) -> Result<(), SceneError> {
        self.attach(NodeId::ROOT, child)
    }

    /// Adds `mesh` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, mesh: Mesh) -> Result<NodeId, SceneError> {
        self.node(parent)?;
        let id = self.add_node(mesh);
        self.attach(parent, id)?;
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&SceneNode, SceneError> {
        self.nodes.get(id.0).ok_or(SceneError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(id.0).ok_or(SceneError::UnknownNode(id))
    }

    /// Replaces the local transform of `id`'s mesh.
    pub fn set_transform(&mut self, id: NodeId, transform: Matrix4<f32>) -> Result<(), SceneError> {
        match self.node_mut(id)?.mesh.as_mut() {
            Some(mesh) => {
                mesh.transform = transform;
                Ok(())
            }
            None => Err(SceneError::UnknownNode(id)),
        }
    }

    /// Nodes reachable from the root in depth-first pre-order, with their
    /// effective world transforms. The root itself is not included.
    pub fn traverse(&self) -> Vec<(NodeId, Matrix4<f32>)> {
        let mut visited = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, Matrix4<f32>)> = self.nodes[0]
            .children
            .iter()
            .rev()
            .map(|&id| (id, Matrix4::identity()))
            .collect();

        while let Some((id, parent_world)) = stack.pop() {
            let node = &self.nodes[id.0];
            let world = parent_world * node.local_transform();
            visited.push((id, world));

            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }

        visited
    }

    /// Effective world transform of a single node.
    pub fn world_transform(&self, id: NodeId) -> Result<Matrix4<f32>, SceneError> {
        let mut world = self.node(id)?.local_transform();
        let mut ancestor = self.nodes[id.0].parent;
        while let Some(parent) = ancestor {
            world = self.nodes[parent.0].local_transform() * world;
            ancestor = self.nodes[parent.0].parent;
        }
        Ok(world)
    }

    /// Draws every mesh in traversal order and returns how many were drawn.
    ///
    /// `shadow_map` is `None` while rendering the shadow pass itself.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        registry: &SceneRegistry,
        program: ProgramHandle,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        shadow_map: Option<TextureHandle>,
        skybox: Option<CubeMapHandle>,
    ) -> RenderResult<usize> {
        let camera = registry.camera(self.camera)?;
        let light = registry.light(self.light)?;

        let params = PassParams {
            program,
            view,
            projection,
            light,
            camera_position: camera.position(),
            shadow_map,
            skybox,
        };

        let mut drawn = 0;
        for (id, world) in self.traverse() {
            if let Some(mesh) = self.nodes[id.0].mesh.as_mut() {
                mesh.render(ctx, &params, world)?;
                drawn += 1;
            }
        }
        Ok(drawn)
    }

    // ------------------------------------------------------------------
    // Debug frustum
    // ------------------------------------------------------------------

    pub fn frustum_fov(&self) -> f32 {
        self.frustum_fov
    }

    pub fn set_frustum_fov(&mut self, fov: f32) {
        self.frustum_fov = fov.clamp(MIN_FRUSTUM_FOV, MAX_FRUSTUM_FOV);
        debug!("Frustum fov set to {:.2} rad", self.frustum_fov);
    }

    pub fn adjust_frustum_fov(&mut self, delta: f32) {
        self.set_frustum_fov(self.frustum_fov + delta);
    }

    /// View-projection built from the frustum fov instead of the camera's.
    /// Used for visualisation only, nothing is culled against it.
    pub fn frustum_view_projection(&self, view: Matrix4<f32>, aspect: f32) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX
            * cgmath::perspective(Rad(self.frustum_fov), aspect, Z_NEAR, FRUSTUM_Z_FAR)
            * view
    }

    /// World-space corners of the debug frustum, near plane first.
    pub fn frustum_corners(&self, view: Matrix4<f32>, aspect: f32) -> Option<[Vector3<f32>; 8]> {
        let inverse = self.frustum_view_projection(view, aspect).invert()?;
        let mut corners = [Vector3::new(0.0, 0.0, 0.0); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let x = if i & 1 == 0 { -1.0 } else { 1.0 };
            let y = if i & 2 == 0 { -1.0 } else { 1.0 };
            let z = if i & 4 == 0 { 0.0 } else { 1.0 };
            let p = inverse * Vector4::new(x, y, z, 1.0);
            *corner = p.truncate() / p.w;
        }
        Some(corners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        camera::FlyCamera,
        geometry::MeshData,
        light::Light,
        rendering::context::{
            AttachmentDesc, AttachmentFormat, Capabilities, ClearFlags, DrawUniforms, FramePhase,
            ProgramDesc, ProgramKind, TargetDesc, TextureUsage,
        },
        scene::vertex::{ObjVertex, Triangle},
    };
    use assert_approx_eq::assert_approx_eq;
    use cgmath::{InnerSpace, Point3, Transform};
    use image::RgbaImage;

    fn mesh(texture: TextureHandle, transform: Matrix4<f32>) -> Mesh {
        let data = MeshData {
            vertices: vec![ObjVertex::default(); 3],
            triangles: vec![Triangle([0, 1, 2])],
            quads: Vec::new(),
        };
        Mesh::new("node", data, texture, false, None)
            .unwrap()
            .with_transform(transform)
    }

    fn setup() -> (SceneRegistry, SceneGraph, RenderContext, TextureHandle) {
        let mut registry = SceneRegistry::new();
        let camera = registry.add_camera(FlyCamera::new(Vector3::new(0.0, 3.0, -20.0), 1.2, 1.0));
        let light = registry.add_light(Light::new(
            Vector3::new(-30.0, 24.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
            0.1,
            0.8,
            0.5,
        ));
        let mut ctx = RenderContext::new(Capabilities::default());
        let texture = ctx.create_texture("t", RgbaImage::new(1, 1), TextureUsage::Color);
        (registry, SceneGraph::new(camera, light, 1.2), ctx, texture)
    }

    fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::from_translation(Vector3::new(x, y, z))
    }

    #[test]
    fn test_chain_transform_propagates() {
        let (_, mut graph, _, texture) = setup();
        let a = graph.add_child(NodeId::ROOT, mesh(texture, translation(1.0, 0.0, 0.0))).unwrap();
        let b = graph.add_child(a, mesh(texture, translation(0.0, 2.0, 0.0))).unwrap();
        let c = graph.add_child(b, mesh(texture, translation(0.0, 0.0, 3.0))).unwrap();

        let (_, world) = graph.traverse()[2];
        let p = world.transform_point(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(p, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(graph.world_transform(c).unwrap(), world);
    }

    #[test]
    fn test_chain_multiplies_parent_first() {
        let (_, mut graph, _, texture) = setup();
        let ta = Matrix4::from_scale(2.0);
        let tb = translation(1.0, 0.0, 0.0);
        let tc = Matrix4::from_angle_y(cgmath::Deg(90.0));

        let a = graph.add_child(NodeId::ROOT, mesh(texture, ta)).unwrap();
        let b = graph.add_child(a, mesh(texture, tb)).unwrap();
        graph.add_child(b, mesh(texture, tc)).unwrap();

        let (_, world) = graph.traverse()[2];
        let expected = ta * tb * tc;
        let p = world.transform_point(Point3::new(0.0, 0.0, 1.0));
        let q = expected.transform_point(Point3::new(0.0, 0.0, 1.0));
        assert_approx_eq!(p.x, q.x, 1e-5);
        assert_approx_eq!(p.y, q.y, 1e-5);
        assert_approx_eq!(p.z, q.z, 1e-5);
        // (0,0,1) turns onto +x, shifts by one, then doubles
        assert_approx_eq!(p.x, 4.0, 1e-5);
    }

    #[test]
    fn test_animating_ancestor_moves_descendants() {
        let (_, mut graph, _, texture) = setup();
        let parent = graph.add_child(NodeId::ROOT, mesh(texture, translation(0.0, 0.0, 0.0))).unwrap();
        let child = graph.add_child(parent, mesh(texture, translation(10.0, 0.0, 0.0))).unwrap();

        graph.set_transform(parent, translation(0.0, 5.0, 0.0)).unwrap();
        let world = graph.world_transform(child).unwrap();
        assert_eq!(world.w.truncate(), Vector3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn test_preorder_insertion_order() {
        let (_, mut graph, _, texture) = setup();
        let identity = Matrix4::identity();
        let a = graph.add_child(NodeId::ROOT, mesh(texture, identity)).unwrap();
        let a1 = graph.add_child(a, mesh(texture, identity)).unwrap();
        let a2 = graph.add_child(a, mesh(texture, identity)).unwrap();
        let b = graph.add_child(NodeId::ROOT, mesh(texture, identity)).unwrap();
        let a1x = graph.add_child(a1, mesh(texture, identity)).unwrap();

        let order: Vec<NodeId> = graph.traverse().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, a1, a1x, a2, b]);
    }

    #[test]
    fn test_attach_rejects_cycles_and_reparenting() {
        let (_, mut graph, _, texture) = setup();
        let a = graph.add_node(mesh(texture, Matrix4::identity()));
        let b = graph.add_node(mesh(texture, Matrix4::identity()));
        graph.attach_to_root(a).unwrap();
        graph.attach(a, b).unwrap();

        assert_eq!(graph.attach(b, b), Err(SceneError::AlreadyAttached(b)));
        assert_eq!(graph.attach(b, a), Err(SceneError::AlreadyAttached(a)));
        assert_eq!(graph.attach(a, NodeId::ROOT), Err(SceneError::RootAsChild));

        // A detached node may not adopt its own ancestor either
        let c = graph.add_node(mesh(texture, Matrix4::identity()));
        let d = graph.add_node(mesh(texture, Matrix4::identity()));
        graph.attach(c, d).unwrap();
        assert_eq!(graph.attach(d, c), Err(SceneError::Cycle { parent: d, child: c }));

        assert_eq!(
            graph.attach(a, NodeId(99)),
            Err(SceneError::UnknownNode(NodeId(99)))
        );
    }

    #[test]
    fn test_detached_nodes_not_drawn() {
        let (_, mut graph, _, texture) = setup();
        graph.add_node(mesh(texture, Matrix4::identity()));
        assert!(graph.traverse().is_empty());
        assert!(graph.node(NodeId::ROOT).unwrap().mesh().is_none());
    }

    #[test]
    fn test_render_draws_in_traversal_order() {
        let (registry, mut graph, mut ctx, texture) = setup();
        let a = graph.add_child(NodeId::ROOT, mesh(texture, translation(1.0, 0.0, 0.0))).unwrap();
        graph.add_child(a, mesh(texture, translation(0.0, 1.0, 0.0))).unwrap();
        graph.add_child(NodeId::ROOT, mesh(texture, translation(0.0, 0.0, 7.0))).unwrap();

        let program = ctx.create_program(ProgramDesc {
            label: "depth",
            kind: ProgramKind::Depth,
            source: "",
        });
        let shadow = ctx
            .create_target(TargetDesc {
                label: "shadow".into(),
                color: None,
                depth: Some(AttachmentDesc::new(8, 8, AttachmentFormat::Depth32Float, 1)),
                resolve: None,
            })
            .unwrap();

        ctx.begin_frame().unwrap();
        ctx.enter_phase(FramePhase::ShadowPass).unwrap();
        ctx.bind_target(shadow.handle, ClearFlags::depth_only())
            .unwrap();
        let drawn = graph
            .render(
                &mut ctx,
                &registry,
                program,
                Matrix4::identity(),
                Matrix4::identity(),
                None,
                None,
            )
            .unwrap();
        ctx.unbind_target(false).unwrap();
        ctx.enter_phase(FramePhase::MainPass).unwrap();
        ctx.enter_phase(FramePhase::Composite).unwrap();
        let frame = ctx.end_frame().unwrap();

        assert_eq!(drawn, 3);
        let offsets: Vec<[f32; 4]> = frame
            .draws()
            .map(|(_, d)| match d.call.uniforms {
                DrawUniforms::Mesh(u) => u.model[3],
                _ => panic!("mesh uniforms expected"),
            })
            .collect();
        assert_eq!(
            offsets,
            vec![
                [1.0, 0.0, 0.0, 1.0],
                [1.0, 1.0, 0.0, 1.0],
                [0.0, 0.0, 7.0, 1.0]
            ]
        );
    }

    #[test]
    fn test_len_excludes_root() {
        let (_, mut graph, _, texture) = setup();
        assert_eq!(graph.len(), 0);
        assert!(graph.is_empty());

        graph.add_node(mesh(texture, Matrix4::identity()));
        assert_eq!(graph.len(), 1);
        assert!(!graph.is_empty());
    }

    #[test]
    fn test_frustum_fov_clamped() {
        let (_, mut graph, _, _) = setup();
        graph.adjust_frustum_fov(10.0);
        assert_approx_eq!(graph.frustum_fov(), PI - 0.1);
        graph.set_frustum_fov(-1.0);
        assert_approx_eq!(graph.frustum_fov(), 0.1);
    }

    #[test]
    fn test_frustum_corners_span_near_and_far() {
        let (registry, graph, _, _) = setup();
        let camera = registry.camera(graph.camera()).unwrap();
        let corners = graph.frustum_corners(camera.view_matrix(), 1.0).unwrap();

        let near = (corners[0] - camera.position).magnitude();
        let far = (corners[7] - camera.position).magnitude();
        assert!(near < 1.0);
        assert!(far > 90.0);
    }
}
