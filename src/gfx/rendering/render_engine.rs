//! WGPU backend for recorded frames
//!
//! Owns the surface, device and queue. Resource requests queued on the
//! [`RenderContext`](super::context::RenderContext) are realised here, and a
//! [`RecordedFrame`] is replayed as one render pass per recorded pass.

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use image::RgbaImage;
use log::{debug, error, info};
use wgpu::{util::DeviceExt, TextureFormat};

use crate::{
    error::{RenderError, RenderResult},
    gfx::{
        rendering::{
            context::{
                BindingTable, Capabilities, ClearFlags, CubeMapHandle, DrawCommand, DrawUniforms,
                FramebufferStatus, GeometryData, GeometryHandle, MeshUniforms, PassTarget,
                Primitive, ProgramHandle, ProgramKind, RecordedFrame, RecordedPass,
                ResourceRequest, SkyboxUniforms, TargetDesc, TargetHandle, TargetInfo,
                TextureHandle, TextureUsage, Viewport,
            },
            pipeline_manager::{PipelineKey, PipelineManager},
        },
        resources::{image_source::FLAT_NORMAL, TextureResource},
        scene::vertex::Quad,
    },
    wgpu_utils::DynamicUniformBuffer,
};

enum GpuGeometry {
    Mesh {
        vertices: wgpu::Buffer,
        triangles: Option<wgpu::Buffer>,
        /// Quads expanded to two triangles each
        quads: Option<wgpu::Buffer>,
    },
    Positions(wgpu::Buffer),
}

struct GpuTarget {
    info: TargetInfo,
    desc: TargetDesc,
}

/// Sets `slots[index]`, growing the vector with empty slots as needed.
fn store<T>(slots: &mut Vec<Option<T>>, index: usize, value: T) {
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }
    slots[index] = Some(value);
}

/// Index list drawing each quad `(a, b, c, d)` as `(a, b, c)` and `(c, d, a)`.
pub fn expand_quads(quad_indices: &[u32]) -> Vec<u32> {
    quad_indices
        .chunks_exact(4)
        .flat_map(|q| Quad([q[0], q[1], q[2], q[3]]).split())
        .flat_map(|t| t.0)
        .collect()
}

fn load_op<T>(clear: Option<T>) -> wgpu::LoadOp<T> {
    match clear {
        Some(value) => wgpu::LoadOp::Clear(value),
        None => wgpu::LoadOp::Load,
    }
}

fn clear_color(clear: &ClearFlags) -> Option<wgpu::Color> {
    clear.color.map(|[r, g, b, a]| wgpu::Color { r, g, b, a })
}

/// Core rendering backend managing GPU resources and draw submission
pub struct GpuBackend {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    caps: Capabilities,
    pipeline_manager: PipelineManager,

    uniforms: DynamicUniformBuffer,
    mesh_uniform_group: Option<(u64, wgpu::BindGroup)>,
    skybox_uniform_group: Option<(u64, wgpu::BindGroup)>,
    texture_groups: HashMap<(ProgramKind, BindingTable), wgpu::BindGroup>,

    textures: Vec<Option<TextureResource>>,
    cube_maps: Vec<Option<TextureResource>>,
    geometries: Vec<Option<GpuGeometry>>,
    targets: Vec<Option<GpuTarget>>,
    /// Bound in place of a missing normal map
    flat_normal: TextureResource,
}

impl GpuBackend {
    /// Creates the backend for the given window.
    ///
    /// MSAA beyond 4x is only offered when the adapter reports
    /// adapter-specific format features.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
        legacy_quads: bool,
    ) -> anyhow::Result<GpuBackend> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request adapter")?;
        info!("Using adapter {:?}", adapter.get_info().name);

        let adapter_specific = adapter
            .features()
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
        let required_features = if adapter_specific {
            wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features,
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to request a device")?;

        let max_samples = if adapter_specific {
            let color = adapter.get_texture_format_features(TextureResource::COLOR_FORMAT);
            let depth = adapter.get_texture_format_features(TextureResource::DEPTH_FORMAT);
            [16, 8, 4, 2]
                .into_iter()
                .find(|&n| {
                    color.flags.sample_count_supported(n) && depth.flags.sample_count_supported(n)
                })
                .unwrap_or(1)
        } else {
            4
        };
        let caps = Capabilities {
            max_samples,
            legacy_quads,
        };
        info!("Device capabilities: {:?}", caps);

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .context("Surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::Fifo
            } else {
                wgpu::PresentMode::Immediate
            },
            alpha_mode: surface_capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let flat_normal = TextureResource::create_from_image(
            &device,
            &queue,
            &RgbaImage::from_pixel(1, 1, image::Rgba(FLAT_NORMAL)),
            "Flat Normal",
            TextureUsage::Data,
        );

        Ok(GpuBackend {
            uniforms: DynamicUniformBuffer::new(&device, alignment),
            pipeline_manager: PipelineManager::new(device.clone()),
            surface,
            device,
            queue,
            config,
            format,
            caps,
            mesh_uniform_group: None,
            skybox_uniform_group: None,
            texture_groups: HashMap::new(),
            textures: Vec::new(),
            cube_maps: Vec::new(),
            geometries: Vec::new(),
            targets: Vec::new(),
            flat_normal,
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Creates the GPU side of every queued request.
    ///
    /// A target the device rejects is reported as an incomplete framebuffer.
    pub fn realize(&mut self, requests: Vec<ResourceRequest>) -> RenderResult<()> {
        for request in requests {
            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let described = self.realize_one(&request);
            let scope = pollster::block_on(self.device.pop_error_scope());
            let what = described?;

            if let Some(gpu_error) = scope {
                return Err(match request {
                    ResourceRequest::Target { desc, .. } => {
                        let status = FramebufferStatus::Unsupported;
                        error!(
                            "Framebuffer '{}' is incomplete: {} ({})",
                            desc.label, status, gpu_error
                        );
                        RenderError::IncompleteFramebuffer {
                            label: desc.label,
                            status,
                        }
                    }
                    _ => RenderError::Gpu {
                        what,
                        message: gpu_error.to_string(),
                    },
                });
            }
        }
        Ok(())
    }

    fn realize_one(&mut self, request: &ResourceRequest) -> RenderResult<String> {
        match request {
            ResourceRequest::Texture {
                handle,
                label,
                image,
                usage,
            } => {
                let texture = TextureResource::create_from_image(
                    &self.device,
                    &self.queue,
                    image,
                    label,
                    *usage,
                );
                store(&mut self.textures, handle.index(), texture);
                Ok(format!("texture '{}'", label))
            }
            ResourceRequest::CubeMap {
                handle,
                label,
                faces,
            } => {
                let cube =
                    TextureResource::create_cube_map(&self.device, &self.queue, faces, label);
                store(&mut self.cube_maps, handle.index(), cube);
                Ok(format!("cube map '{}'", label))
            }
            ResourceRequest::Geometry {
                handle,
                label,
                data,
            } => {
                let geometry = self.create_geometry(label, data);
                store(&mut self.geometries, handle.index(), geometry);
                Ok(format!("geometry '{}'", label))
            }
            ResourceRequest::Program { handle, desc } => {
                self.pipeline_manager
                    .load_shader(*handle, desc)
                    .map_err(|message| RenderError::Gpu {
                        what: format!("program '{}'", desc.label),
                        message,
                    })?;
                Ok(format!("program '{}'", desc.label))
            }
            ResourceRequest::Target { info, desc } => {
                let attachments = [
                    (info.color, desc.color, "Color"),
                    (info.depth, desc.depth, "Depth"),
                    (info.resolve, desc.resolve, "Resolve"),
                ];
                for (handle, attachment, slot) in attachments {
                    if let (Some(handle), Some(attachment)) = (handle, attachment) {
                        let texture = TextureResource::create_attachment(
                            &self.device,
                            &attachment,
                            &format!("{} {}", desc.label, slot),
                        );
                        store(&mut self.textures, handle.index(), texture);
                    }
                }
                store(
                    &mut self.targets,
                    info.handle.index(),
                    GpuTarget {
                        info: *info,
                        desc: desc.clone(),
                    },
                );
                Ok(format!("target '{}'", desc.label))
            }
        }
    }

    fn create_geometry(&self, label: &str, data: &GeometryData) -> GpuGeometry {
        let index_buffer = |indices: &[u32], suffix: &str| {
            (!indices.is_empty()).then(|| {
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} {}", label, suffix)),
                        contents: bytemuck::cast_slice(indices),
                        usage: wgpu::BufferUsages::INDEX,
                    })
            })
        };

        match data {
            GeometryData::Mesh {
                vertices,
                triangle_indices,
                quad_indices,
            } => GpuGeometry::Mesh {
                vertices: self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Vertices", label)),
                        contents: bytemuck::cast_slice(vertices),
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
                triangles: index_buffer(triangle_indices, "Triangles"),
                quads: index_buffer(&expand_quads(quad_indices), "Quads"),
            },
            GeometryData::Positions(positions) => GpuGeometry::Positions(
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Positions", label)),
                        contents: bytemuck::cast_slice(positions),
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
            ),
        }
    }

    fn texture(&self, handle: TextureHandle) -> RenderResult<&TextureResource> {
        self.textures
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(RenderError::UnknownHandle {
                kind: TextureHandle::KIND,
                id: handle.index() as u32,
            })
    }

    fn cube_map(&self, handle: CubeMapHandle) -> RenderResult<&TextureResource> {
        self.cube_maps
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(RenderError::UnknownHandle {
                kind: CubeMapHandle::KIND,
                id: handle.index() as u32,
            })
    }

    fn geometry(&self, handle: GeometryHandle) -> RenderResult<&GpuGeometry> {
        self.geometries
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(RenderError::UnknownHandle {
                kind: GeometryHandle::KIND,
                id: handle.index() as u32,
            })
    }

    fn pass_target(&self, target: PassTarget) -> RenderResult<Option<&GpuTarget>> {
        match target {
            PassTarget::Screen => Ok(None),
            PassTarget::Offscreen(handle) => self
                .targets
                .get(handle.index())
                .and_then(Option::as_ref)
                .map(Some)
                .ok_or(RenderError::UnknownHandle {
                    kind: TargetHandle::KIND,
                    id: handle.index() as u32,
                }),
        }
    }

    // ------------------------------------------------------------------
    // Frame execution
    // ------------------------------------------------------------------

    fn pipeline_key(
        &self,
        pass: &RecordedPass,
        draw: &DrawCommand,
    ) -> RenderResult<PipelineKey> {
        let (color_format, depth_format, samples) = match self.pass_target(pass.target)? {
            None => (Some(self.format), None, 1),
            Some(target) => (
                target.desc.color.map(|c| TextureResource::format_of(c.format)),
                target.desc.depth.map(|d| TextureResource::format_of(d.format)),
                target.desc.samples(),
            ),
        };
        Ok(PipelineKey {
            program: draw.call.program,
            cull: draw.raster.cull,
            depth_func: draw.raster.depth_func,
            color_format,
            depth_format,
            samples,
        })
    }

    fn ensure_uniform_groups(&mut self) {
        let generation = self.uniforms.generation();
        let layouts = self.pipeline_manager.layouts();

        if self
            .mesh_uniform_group
            .as_ref()
            .is_none_or(|(g, _)| *g != generation)
        {
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Mesh Uniforms"),
                layout: &layouts.mesh_uniforms,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.binding_resource::<MeshUniforms>(),
                }],
            });
            self.mesh_uniform_group = Some((generation, group));
        }

        if self
            .skybox_uniform_group
            .as_ref()
            .is_none_or(|(g, _)| *g != generation)
        {
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Skybox Uniforms"),
                layout: &layouts.skybox_uniforms,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.binding_resource::<SkyboxUniforms>(),
                }],
            });
            self.skybox_uniform_group = Some((generation, group));
        }
    }

    fn ensure_texture_group(
        &mut self,
        kind: ProgramKind,
        table: BindingTable,
    ) -> RenderResult<()> {
        if kind == ProgramKind::Depth || self.texture_groups.contains_key(&(kind, table)) {
            return Ok(());
        }

        let missing =
            |what: &str| RenderError::InvalidDraw(format!("{:?} draw has no {}", kind, what));
        let layouts = self.pipeline_manager.layouts();

        let group = match kind {
            ProgramKind::Lit => {
                let diffuse = self.texture(table.diffuse.ok_or_else(|| missing("diffuse"))?)?;
                let shadow =
                    self.texture(table.shadow_map.ok_or_else(|| missing("shadow map"))?)?;
                let environment =
                    self.cube_map(table.environment.ok_or_else(|| missing("environment"))?)?;
                let normal = match table.normal_map {
                    Some(handle) => self.texture(handle)?,
                    None => &self.flat_normal,
                };
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Lit Textures"),
                    layout: &layouts.lit_textures,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&diffuse.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(&shadow.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::Sampler(&shadow.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::TextureView(&environment.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: wgpu::BindingResource::Sampler(&environment.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 6,
                            resource: wgpu::BindingResource::TextureView(&normal.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 7,
                            resource: wgpu::BindingResource::Sampler(&normal.sampler),
                        },
                    ],
                })
            }
            ProgramKind::Skybox => {
                let sky =
                    self.cube_map(table.environment.ok_or_else(|| missing("environment"))?)?;
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Sky Textures"),
                    layout: &layouts.sky_textures,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&sky.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&sky.sampler),
                        },
                    ],
                })
            }
            ProgramKind::PostProcess => {
                let source = self.texture(table.diffuse.ok_or_else(|| missing("source"))?)?;
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Post Textures"),
                    layout: &layouts.post_textures,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&source.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&source.sampler),
                        },
                    ],
                })
            }
            ProgramKind::Depth => return Ok(()),
        };

        self.texture_groups.insert((kind, table), group);
        Ok(())
    }

    /// Replays a recorded frame onto the surface and presents it.
    pub fn execute(&mut self, frame: &RecordedFrame) -> RenderResult<()> {
        // Uniform offsets and pipelines first, encoding borrows self immutably
        self.uniforms.clear();
        let mut offsets = Vec::with_capacity(frame.draw_count());
        let mut keys = Vec::with_capacity(frame.draw_count());
        for (pass, draw) in frame.draws() {
            offsets.push(match &draw.call.uniforms {
                DrawUniforms::None => None,
                DrawUniforms::Mesh(u) => Some(self.uniforms.push(u)),
                DrawUniforms::Skybox(u) => Some(self.uniforms.push(u)),
            });

            let key = self.pipeline_key(pass, draw)?;
            self.pipeline_manager
                .prepare(&key)
                .map_err(|message| RenderError::Gpu {
                    what: format!("pipeline for {:?}", draw.call.program),
                    message,
                })?;
            let kind = self
                .pipeline_manager
                .program_kind(draw.call.program)
                .ok_or(RenderError::UnknownHandle {
                    kind: ProgramHandle::KIND,
                    id: draw.call.program.index() as u32,
                })?;
            self.ensure_texture_group(kind, draw.call.bindings)?;
            keys.push((key, kind));
        }
        if self.uniforms.upload(&self.device, &self.queue) {
            debug!("Uniform buffer reallocated, rebuilding uniform bind groups");
        }
        self.ensure_uniform_groups();

        let surface_texture = self.surface.get_current_texture()?;
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let mut draw_index = 0;
        for pass in &frame.passes {
            let target = self.pass_target(pass.target)?;
            let (color_view, resolve_view, depth_view, size) = match target {
                None => (
                    Some(&surface_view),
                    None,
                    None,
                    (self.config.width, self.config.height),
                ),
                Some(target) => {
                    let view = |h: Option<TextureHandle>| -> RenderResult<_> {
                        h.map(|h| self.texture(h).map(|t| &t.view)).transpose()
                    };
                    let resolve = if pass.resolve {
                        view(target.info.resolve)?
                    } else {
                        None
                    };
                    (
                        view(target.info.color)?,
                        resolve,
                        view(target.info.depth)?,
                        target.desc.size(),
                    )
                }
            };

            // Depth-only passes have no colour slot at all
            let color_attachments: Vec<_> = color_view
                .map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: resolve_view,
                    ops: wgpu::Operations {
                        load: load_op(clear_color(&pass.clear)),
                        store: wgpu::StoreOp::Store,
                    },
                })
                .into_iter()
                .map(Some)
                .collect();
            let depth_attachment =
                depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: load_op(pass.clear.depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("{:?} Pass", pass.phase)),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &pass.draws {
                let (key, kind) = keys[draw_index];
                let offset = offsets[draw_index];
                draw_index += 1;

                let pipeline = self.pipeline_manager.pipeline(&key).ok_or_else(|| {
                    RenderError::InvalidDraw(format!("no pipeline for {:?}", key))
                })?;
                render_pass.set_pipeline(pipeline);

                let viewport = draw
                    .raster
                    .viewport
                    .unwrap_or_else(|| Viewport::full(size.0, size.1));
                render_pass.set_viewport(
                    viewport.x,
                    viewport.y,
                    viewport.width,
                    viewport.height,
                    0.0,
                    1.0,
                );

                let uniform_group = match kind {
                    ProgramKind::Lit | ProgramKind::Depth => self.mesh_uniform_group.as_ref(),
                    ProgramKind::Skybox => self.skybox_uniform_group.as_ref(),
                    ProgramKind::PostProcess => None,
                };
                let mut group_index = 0;
                if let (Some((_, group)), Some(offset)) = (uniform_group, offset) {
                    render_pass.set_bind_group(group_index, group, &[offset]);
                    group_index += 1;
                }
                if let Some(group) = self.texture_groups.get(&(kind, draw.call.bindings)) {
                    render_pass.set_bind_group(group_index, group, &[]);
                }

                self.encode_draw(&mut render_pass, draw)?;
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn encode_draw(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        draw: &DrawCommand,
    ) -> RenderResult<()> {
        let geometry = draw.call.geometry.map(|g| self.geometry(g)).transpose()?;

        match (draw.call.primitive, geometry) {
            (
                Primitive::Triangles { count },
                Some(GpuGeometry::Mesh {
                    vertices,
                    triangles: Some(indices),
                    ..
                }),
            ) => {
                render_pass.set_vertex_buffer(0, vertices.slice(..));
                render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..count * 3, 0, 0..1);
            }
            (
                Primitive::Quads { count },
                Some(GpuGeometry::Mesh {
                    vertices,
                    quads: Some(indices),
                    ..
                }),
            ) => {
                render_pass.set_vertex_buffer(0, vertices.slice(..));
                render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..count * 6, 0, 0..1);
            }
            (Primitive::Positions { count }, Some(GpuGeometry::Positions(buffer))) => {
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                render_pass.draw(0..count, 0..1);
            }
            (Primitive::FullscreenTriangle, None) => render_pass.draw(0..3, 0..1),
            (primitive, _) => {
                return Err(RenderError::InvalidDraw(format!(
                    "{:?} does not match its geometry",
                    primitive
                )))
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Surface
    // ------------------------------------------------------------------

    /// Reconfigures the surface. Off-screen targets keep their size and
    /// are stretched by the composite pass.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn get_surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn surface_format(&self) -> TextureFormat {
        self.format
    }

    pub fn set_vsync(&mut self, enable: bool) {
        self.config.present_mode = if enable {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::Immediate
        };

        self.surface.configure(&self.device, &self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_quads() {
        assert_eq!(
            expand_quads(&[0, 1, 2, 3, 4, 5, 6, 7]),
            vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
        );
        assert!(expand_quads(&[]).is_empty());
    }

    #[test]
    fn test_store_grows_slots() {
        let mut slots: Vec<Option<u8>> = Vec::new();
        store(&mut slots, 2, 7);
        assert_eq!(slots, vec![None, None, Some(7)]);
        store(&mut slots, 0, 1);
        assert_eq!(slots[0], Some(1));
    }

    #[test]
    fn test_load_op() {
        assert!(matches!(load_op(Some(1.0f32)), wgpu::LoadOp::Clear(v) if v == 1.0));
        assert!(matches!(load_op::<f32>(None), wgpu::LoadOp::Load));
    }
}
