//! Render pipeline management system for wgpu
//!
//! Compiles one shader module per program and creates render pipelines
//! lazily, one per combination of program, raster state and target format
//! met while executing recorded frames.

use std::{collections::HashMap, sync::Arc};
use wgpu::*;

use crate::{
    gfx::{
        rendering::context::{
            CullFace, DepthFunc, MeshUniforms, ProgramDesc, ProgramHandle, ProgramKind,
            SkyboxUniforms,
        },
        scene::vertex::{position_desc, ObjVertex},
    },
    wgpu_utils::binding_types,
};

/// Which vertex buffer, if any, a pipeline reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    Mesh,
    Positions,
    None,
}

/// Configuration for creating a render pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub bind_group_layouts: Vec<BindGroupLayout>,
    pub vertex_layout: VertexLayout,
    pub cull_mode: Option<Face>,
    pub depth_format: Option<TextureFormat>,
    pub depth_compare: CompareFunction,
    pub depth_write: bool,
    pub multisample: MultisampleState,
    pub color_targets: Vec<Option<ColorTargetState>>,
    pub vertex_only: bool, // for shadow pass
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: "Default Pipeline".to_string(),
            bind_group_layouts: Vec::new(),
            vertex_layout: VertexLayout::Mesh,
            cull_mode: Some(Face::Back),
            depth_format: None,
            depth_compare: CompareFunction::Less,
            depth_write: true,
            multisample: MultisampleState::default(),
            color_targets: Vec::new(),
            vertex_only: false,
        }
    }
}

impl PipelineConfig {
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    pub fn with_cull_mode(mut self, face: Option<Face>) -> Self {
        self.cull_mode = face;
        self
    }

    pub fn with_vertex_only(mut self) -> Self {
        self.vertex_only = true;
        self
    }

    pub fn with_vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = layout;
        self
    }

    pub fn with_bind_group_layouts(mut self, layouts: Vec<BindGroupLayout>) -> Self {
        self.bind_group_layouts = layouts;
        self
    }

    /// Enables depth testing against an attachment of `format`
    pub fn with_depth(
        mut self,
        format: TextureFormat,
        compare: CompareFunction,
        write: bool,
    ) -> Self {
        self.depth_format = Some(format);
        self.depth_compare = compare;
        self.depth_write = write;
        self
    }

    /// Writes a single colour attachment of `format`
    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_targets = vec![Some(ColorTargetState {
            format,
            blend: Some(BlendState::REPLACE),
            write_mask: ColorWrites::ALL,
        })];
        self
    }

    pub fn with_samples(mut self, count: u32) -> Self {
        self.multisample = MultisampleState {
            count,
            ..Default::default()
        };
        self
    }
}

/// Everything that selects a distinct pipeline for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramHandle,
    pub cull: CullFace,
    pub depth_func: DepthFunc,
    pub color_format: Option<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
    pub samples: u32,
}

/// Bind group layouts shared by every pipeline of a program kind
pub struct BindingLayouts {
    /// Mesh uniform block with a dynamic offset
    pub mesh_uniforms: BindGroupLayout,
    /// Skybox uniform block with a dynamic offset
    pub skybox_uniforms: BindGroupLayout,
    /// Diffuse, shadow depth, environment cube and normal map
    pub lit_textures: BindGroupLayout,
    pub sky_textures: BindGroupLayout,
    pub post_textures: BindGroupLayout,
}

impl BindingLayouts {
    pub fn new(device: &Device) -> Self {
        let fragment = ShaderStages::FRAGMENT;
        let vertex_fragment = ShaderStages::VERTEX | ShaderStages::FRAGMENT;
        let filtering = || binding_types::sampler(SamplerBindingType::Filtering);

        let layout = |label: &str, entries: &[BindGroupLayoutEntry]| {
            device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            })
        };

        Self {
            mesh_uniforms: layout(
                "Mesh Uniforms Layout",
                &[binding_types::entry(
                    0,
                    vertex_fragment,
                    binding_types::uniform_dynamic(std::mem::size_of::<MeshUniforms>() as u64),
                )],
            ),
            skybox_uniforms: layout(
                "Skybox Uniforms Layout",
                &[binding_types::entry(
                    0,
                    ShaderStages::VERTEX,
                    binding_types::uniform_dynamic(std::mem::size_of::<SkyboxUniforms>() as u64),
                )],
            ),
            lit_textures: layout(
                "Lit Textures Layout",
                &[
                    binding_types::entry(0, fragment, binding_types::texture_2d()),
                    binding_types::entry(1, fragment, filtering()),
                    binding_types::entry(2, fragment, binding_types::texture_depth_2d()),
                    binding_types::entry(
                        3,
                        fragment,
                        binding_types::sampler(SamplerBindingType::Comparison),
                    ),
                    binding_types::entry(4, fragment, binding_types::texture_cube()),
                    binding_types::entry(5, fragment, filtering()),
                    binding_types::entry(6, fragment, binding_types::texture_2d()),
                    binding_types::entry(7, fragment, filtering()),
                ],
            ),
            sky_textures: layout(
                "Sky Textures Layout",
                &[
                    binding_types::entry(0, fragment, binding_types::texture_cube()),
                    binding_types::entry(1, fragment, filtering()),
                ],
            ),
            post_textures: layout(
                "Post Textures Layout",
                &[
                    binding_types::entry(0, fragment, binding_types::texture_2d()),
                    binding_types::entry(1, fragment, filtering()),
                ],
            ),
        }
    }

    /// Layouts in group order for a program kind
    pub fn for_kind(&self, kind: ProgramKind) -> Vec<BindGroupLayout> {
        match kind {
            ProgramKind::Lit => vec![self.mesh_uniforms.clone(), self.lit_textures.clone()],
            ProgramKind::Depth => vec![self.mesh_uniforms.clone()],
            ProgramKind::Skybox => vec![self.skybox_uniforms.clone(), self.sky_textures.clone()],
            ProgramKind::PostProcess => vec![self.post_textures.clone()],
        }
    }
}

pub fn cull_mode(cull: CullFace) -> Option<Face> {
    match cull {
        CullFace::None => None,
        CullFace::Front => Some(Face::Front),
        CullFace::Back => Some(Face::Back),
    }
}

pub fn depth_compare(depth_func: DepthFunc) -> CompareFunction {
    match depth_func {
        DepthFunc::Less => CompareFunction::Less,
        DepthFunc::LessEqual => CompareFunction::LessEqual,
        DepthFunc::Always => CompareFunction::Always,
    }
}

/// Pipeline description for `kind` under the state captured in `key`.
pub fn config_for(kind: ProgramKind, label: &str, key: &PipelineKey) -> PipelineConfig {
    let vertex_layout = match kind {
        ProgramKind::Lit | ProgramKind::Depth => VertexLayout::Mesh,
        ProgramKind::Skybox => VertexLayout::Positions,
        ProgramKind::PostProcess => VertexLayout::None,
    };
    let mut config = PipelineConfig::default()
        .with_label(&format!("{} Pipeline", label))
        .with_cull_mode(cull_mode(key.cull))
        .with_vertex_layout(vertex_layout)
        .with_samples(key.samples);

    if let Some(format) = key.depth_format {
        // The skybox is drawn behind everything already in the buffer
        let write = kind != ProgramKind::Skybox;
        config = config.with_depth(format, depth_compare(key.depth_func), write);
    }

    match key.color_format {
        Some(format) if kind != ProgramKind::Depth => config.with_color_format(format),
        _ => config.with_vertex_only(),
    }
}

struct Program {
    label: &'static str,
    kind: ProgramKind,
    module: ShaderModule,
}

/// Compiles programs and caches the pipelines built from them
pub struct PipelineManager {
    device: Arc<Device>,
    layouts: BindingLayouts,
    programs: HashMap<ProgramHandle, Program>,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
}

impl PipelineManager {
    pub fn new(device: Arc<Device>) -> Self {
        let layouts = BindingLayouts::new(&device);
        Self {
            device,
            layouts,
            programs: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    pub fn layouts(&self) -> &BindingLayouts {
        &self.layouts
    }

    pub fn program_kind(&self, handle: ProgramHandle) -> Option<ProgramKind> {
        self.programs.get(&handle).map(|p| p.kind)
    }

    /// Compiles a WGSL program, reporting validation errors.
    pub fn load_shader(&mut self, handle: ProgramHandle, desc: &ProgramDesc) -> Result<(), String> {
        self.device.push_error_scope(ErrorFilter::Validation);
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(desc.label),
            source: ShaderSource::Wgsl(desc.source.into()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        log::debug!("Compiled program '{}'", desc.label);
        self.programs.insert(
            handle,
            Program {
                label: desc.label,
                kind: desc.kind,
                module,
            },
        );
        Ok(())
    }

    /// Creates the pipeline for `key` unless it already exists.
    pub fn prepare(&mut self, key: &PipelineKey) -> Result<(), String> {
        if self.pipelines.contains_key(key) {
            return Ok(());
        }

        let program = self
            .programs
            .get(&key.program)
            .ok_or_else(|| format!("Program {:?} not loaded", key.program))?;
        let config = config_for(program.kind, program.label, key)
            .with_bind_group_layouts(self.layouts.for_kind(program.kind));

        self.device.push_error_scope(ErrorFilter::Validation);
        let pipeline = self.create_pipeline_from_config(&program.module, &config);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(format!("Pipeline '{}': {}", config.label, error));
        }

        log::debug!("Created pipeline '{}' for {:?}", config.label, key);
        self.pipelines.insert(*key, pipeline);
        Ok(())
    }

    pub fn pipeline(&self, key: &PipelineKey) -> Option<&RenderPipeline> {
        self.pipelines.get(key)
    }

    /// Creates a render pipeline from configuration
    fn create_pipeline_from_config(
        &self,
        shader: &ShaderModule,
        config: &PipelineConfig,
    ) -> RenderPipeline {
        let bind_group_layout_refs: Vec<&BindGroupLayout> =
            config.bind_group_layouts.iter().collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{} Layout", config.label)),
                bind_group_layouts: &bind_group_layout_refs,
                push_constant_ranges: &[],
            });

        let fragment_state = if config.vertex_only {
            None
        } else {
            Some(FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &config.color_targets,
                compilation_options: PipelineCompilationOptions::default(),
            })
        };

        let mesh_layout = [ObjVertex::desc()];
        let position_layout = [position_desc()];
        let vertex_buffers: &[VertexBufferLayout] = match config.vertex_layout {
            VertexLayout::Mesh => &mesh_layout,
            VertexLayout::Positions => &position_layout,
            VertexLayout::None => &[],
        };

        let depth_stencil = config.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: config.depth_write,
            depth_compare: config.depth_compare,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        });

        self.device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(&config.label),
                layout: Some(&pipeline_layout),
                vertex: VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: vertex_buffers,
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: fragment_state,
                primitive: PrimitiveState {
                    topology: PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: FrontFace::Ccw,
                    cull_mode: config.cull_mode,
                    polygon_mode: PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil,
                multisample: config.multisample,
                multiview: None,
                cache: None,
            })
    }

    /// Number of pipelines created so far
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::context::{Capabilities, RenderContext};

    fn key(program: ProgramHandle) -> PipelineKey {
        PipelineKey {
            program,
            cull: CullFace::Back,
            depth_func: DepthFunc::Less,
            color_format: Some(TextureFormat::Rgba8UnormSrgb),
            depth_format: Some(TextureFormat::Depth32Float),
            samples: 4,
        }
    }

    fn program(kind: ProgramKind) -> ProgramHandle {
        RenderContext::new(Capabilities::default()).create_program(ProgramDesc {
            label: "p",
            kind,
            source: "",
        })
    }

    #[test]
    fn test_lit_config() {
        let config = config_for(ProgramKind::Lit, "lit", &key(program(ProgramKind::Lit)));

        assert_eq!(config.vertex_layout, VertexLayout::Mesh);
        assert_eq!(config.cull_mode, Some(Face::Back));
        assert_eq!(config.multisample.count, 4);
        assert_eq!(config.color_targets.len(), 1);
        assert!(config.depth_write);
        assert!(!config.vertex_only);
    }

    #[test]
    fn test_depth_config_is_vertex_only() {
        let mut k = key(program(ProgramKind::Depth));
        k.color_format = None;
        k.cull = CullFace::Front;
        k.samples = 1;
        let config = config_for(ProgramKind::Depth, "shadow", &k);

        assert!(config.vertex_only);
        assert_eq!(config.cull_mode, Some(Face::Front));
        assert_eq!(config.depth_format, Some(TextureFormat::Depth32Float));
    }

    #[test]
    fn test_skybox_config_keeps_depth_read_only() {
        let mut k = key(program(ProgramKind::Skybox));
        k.depth_func = DepthFunc::LessEqual;
        k.cull = CullFace::None;
        let config = config_for(ProgramKind::Skybox, "skybox", &k);

        assert_eq!(config.vertex_layout, VertexLayout::Positions);
        assert_eq!(config.depth_compare, CompareFunction::LessEqual);
        assert!(!config.depth_write);
        assert_eq!(config.cull_mode, None);
    }

    #[test]
    fn test_post_config_has_no_vertex_buffers() {
        let mut k = key(program(ProgramKind::PostProcess));
        k.depth_format = None;
        k.samples = 1;
        let config = config_for(ProgramKind::PostProcess, "post", &k);

        assert_eq!(config.vertex_layout, VertexLayout::None);
        assert_eq!(config.depth_format, None);
    }
}
