//! Shader modules, samplers and render pipelines.
//!
//! Every fullscreen stage is described by a [`FullscreenPass`]: an ordered
//! list of [`PassBinding`]s (binding index = position in the list) plus its
//! output targets. The bind group layout is generated from that list and one
//! generic routine records the draw, so stages carry no binding boilerplate.

use std::sync::Arc;

use depthfield_gpu_shared::uniforms::INSTANCE_STRIDE;

use crate::context::GpuContext;
use crate::error::{DofError, DofResult};
use crate::render_targets::{RenderTargetPool, TargetId, DEPTH_FORMAT, HDR_FORMAT, MSAA_SAMPLES};

/// Compile WGSL, turning validation errors into [`DofError::ShaderCompile`].
pub fn create_shader_module(
    ctx: &GpuContext,
    stage: &str,
    source: &str,
) -> DofResult<wgpu::ShaderModule> {
    ctx.capture_validation(|device| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })
    .map_err(|e| shader_error(stage, e))
}

fn shader_error(stage: &str, err: wgpu::Error) -> DofError {
    log::error!("Shader stage '{stage}' failed validation: {err}");
    DofError::ShaderCompile {
        stage: stage.to_owned(),
        message: err.to_string(),
    }
}

/// Shared fullscreen triangle vertex state (vertex-index based, no buffers).
fn fullscreen_vertex_state(module: &wgpu::ShaderModule) -> wgpu::VertexState<'_> {
    wgpu::VertexState {
        module,
        entry_point: Some("vs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        buffers: &[],
    }
}

fn depth_stencil_rw() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

// ============================================================
// Samplers
// ============================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerKind {
    /// Blur chain and half-resolution reads.
    LinearClamp,
    /// Equirectangular environment lookups; wraps horizontally.
    LinearRepeat,
}

pub struct Samplers {
    linear_clamp: wgpu::Sampler,
    linear_repeat: wgpu::Sampler,
}

impl Samplers {
    pub fn new(device: &wgpu::Device) -> Self {
        let linear_clamp = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let linear_repeat = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Repeat Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            linear_clamp,
            linear_repeat,
        }
    }

    pub fn get(&self, kind: SamplerKind) -> &wgpu::Sampler {
        match kind {
            SamplerKind::LinearClamp => &self.linear_clamp,
            SamplerKind::LinearRepeat => &self.linear_repeat,
        }
    }
}

// ============================================================
// Fullscreen passes
// ============================================================

/// One bind group entry of a fullscreen pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PassBinding {
    /// The pass's own uniform buffer.
    Params,
    /// A pool target, resolved to its current view every frame.
    Target(TargetId),
    Sampler(SamplerKind),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PassOutput {
    /// Pool targets, one color attachment each (MRT when more than one).
    Targets(Vec<TargetId>),
    /// A view supplied at execution time (surface or headless output).
    External(wgpu::TextureFormat),
}

pub struct FullscreenPassDesc<'a> {
    pub label: &'static str,
    pub fragment_source: &'a str,
    pub bindings: Vec<PassBinding>,
    /// Size of the `Params` uniform block; ignored without a `Params` binding.
    pub params_size: u64,
    pub output: PassOutput,
}

/// Integer pixel rectangle in framebuffer coordinates (origin top-left).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Immutable once built; only the uniform contents and the views behind its
/// target handles change between frames.
pub struct FullscreenPass {
    label: &'static str,
    pipeline: Arc<wgpu::RenderPipeline>,
    layout: Arc<wgpu::BindGroupLayout>,
    bindings: Vec<PassBinding>,
    uniform: Option<wgpu::Buffer>,
    output: PassOutput,
}

impl FullscreenPass {
    pub fn new(
        ctx: &GpuContext,
        pool: &RenderTargetPool,
        vertex: &wgpu::ShaderModule,
        desc: FullscreenPassDesc<'_>,
    ) -> DofResult<Self> {
        log::debug!("Creating {} pipeline...", desc.label);
        let fragment = create_shader_module(ctx, desc.label, desc.fragment_source)?;

        let entries: Vec<wgpu::BindGroupLayoutEntry> = desc
            .bindings
            .iter()
            .enumerate()
            .map(|(index, binding)| layout_entry(index as u32, binding, pool))
            .collect();
        let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });

        let formats: Vec<wgpu::TextureFormat> = match &desc.output {
            PassOutput::Targets(ids) => ids.iter().map(|id| pool.get(*id).kind.format()).collect(),
            PassOutput::External(format) => vec![*format],
        };
        let pipeline = create_fullscreen_pipeline(ctx, desc.label, vertex, &fragment, &layout, &formats)?;

        let uniform = desc
            .bindings
            .contains(&PassBinding::Params)
            .then(|| create_params_buffer(&ctx.device, desc.label, desc.params_size));

        Ok(Self {
            label: desc.label,
            pipeline: Arc::new(pipeline),
            layout: Arc::new(layout),
            bindings: desc.bindings,
            uniform,
            output: desc.output,
        })
    }

    /// Same pipeline and bindings with a uniform buffer of its own.
    pub fn fork(&self, device: &wgpu::Device) -> Self {
        Self {
            label: self.label,
            pipeline: Arc::clone(&self.pipeline),
            layout: Arc::clone(&self.layout),
            bindings: self.bindings.clone(),
            uniform: self
                .uniform
                .as_ref()
                .map(|buffer| create_params_buffer(device, self.label, buffer.size())),
            output: self.output.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn bindings(&self) -> &[PassBinding] {
        &self.bindings
    }

    pub fn output(&self) -> &PassOutput {
        &self.output
    }

    pub fn write_params<T: bytemuck::Pod>(&self, queue: &wgpu::Queue, params: &T) {
        if let Some(buffer) = &self.uniform {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(params));
        }
    }

    fn bind_group(
        &self,
        device: &wgpu::Device,
        pool: &RenderTargetPool,
        samplers: &Samplers,
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = self
            .bindings
            .iter()
            .enumerate()
            .filter_map(|(index, binding)| {
                let resource = match binding {
                    PassBinding::Params => self.uniform.as_ref()?.as_entire_binding(),
                    PassBinding::Target(id) => wgpu::BindingResource::TextureView(pool.view(*id)),
                    PassBinding::Sampler(kind) => wgpu::BindingResource::Sampler(samplers.get(*kind)),
                };
                Some(wgpu::BindGroupEntry {
                    binding: index as u32,
                    resource,
                })
            })
            .collect();

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        })
    }

    /// Draw into the pass's own targets, clearing them first.
    pub fn execute(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pool: &RenderTargetPool,
        samplers: &Samplers,
    ) -> DofResult<()> {
        let ids = target_outputs(self.label, &self.output)?;
        let attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = ids
            .iter()
            .map(|id| {
                Some(wgpu::RenderPassColorAttachment {
                    view: pool.view(*id),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let bind_group = self.bind_group(device, pool, samplers);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &attachments,
            depth_stencil_attachment: None,
            ..Default::default()
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    /// Draw into `view`, optionally restricted to `rect` (viewport + scissor).
    #[allow(clippy::too_many_arguments)]
    pub fn execute_into(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pool: &RenderTargetPool,
        samplers: &Samplers,
        view: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
        rect: Option<PixelRect>,
    ) {
        let bind_group = self.bind_group(device, pool, samplers);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        if let Some(r) = rect {
            pass.set_viewport(
                r.x as f32,
                r.y as f32,
                r.width as f32,
                r.height as f32,
                0.0,
                1.0,
            );
            pass.set_scissor_rect(r.x, r.y, r.width, r.height);
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Pool targets a pass clears and draws into. External outputs have no view
/// until execution and must go through [`FullscreenPass::execute_into`].
fn target_outputs<'a>(label: &str, output: &'a PassOutput) -> DofResult<&'a [TargetId]> {
    match output {
        PassOutput::Targets(ids) => Ok(ids),
        PassOutput::External(_) => Err(DofError::InvalidArgument(format!(
            "{label} writes to an external view and needs a target to draw into"
        ))),
    }
}

fn layout_entry(
    binding: u32,
    kind: &PassBinding,
    pool: &RenderTargetPool,
) -> wgpu::BindGroupLayoutEntry {
    let ty = match kind {
        PassBinding::Params => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        PassBinding::Target(id) => {
            let target = pool.get(*id).kind;
            wgpu::BindingType::Texture {
                sample_type: target.sample_type(),
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: target.sample_count() > 1,
            }
        }
        PassBinding::Sampler(_) => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty,
        count: None,
    }
}

fn create_params_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{label} Params")),
        size: size.max(16),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub fn create_fullscreen_pipeline(
    ctx: &GpuContext,
    label: &str,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
    formats: &[wgpu::TextureFormat],
) -> DofResult<wgpu::RenderPipeline> {
    let targets: Vec<Option<wgpu::ColorTargetState>> = formats
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: *format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    ctx.capture_validation(|device| {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: fullscreen_vertex_state(vertex),
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    })
    .map_err(|e| shader_error(label, e))
}

// ============================================================
// Scene pipeline
// ============================================================

const SCENE_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

// Model matrix columns at 3..=6, normal matrix columns at 7..=9, tint at 10.
const SCENE_INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
    3 => Float32x4,
    4 => Float32x4,
    5 => Float32x4,
    6 => Float32x4,
    7 => Float32x4,
    8 => Float32x4,
    9 => Float32x4,
    10 => Float32x4
];

/// Bytes per interleaved cube vertex: position, normal, uv.
pub const SCENE_VERTEX_STRIDE: u64 = 32;

pub fn create_scene_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Scene Bind Group Layout"),
        entries: &[
            // binding 0: SceneUniforms
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // binding 1: environment texture
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            // binding 2: environment sampler
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Instanced, depth-tested, back-face culled, 4x MSAA.
pub fn create_scene_pipeline(
    ctx: &GpuContext,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> DofResult<wgpu::RenderPipeline> {
    log::debug!("Creating scene pipeline...");
    ctx.capture_validation(|device| {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: SCENE_VERTEX_STRIDE,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &SCENE_VERTEX_ATTRIBUTES,
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: INSTANCE_STRIDE,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &SCENE_INSTANCE_ATTRIBUTES,
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(depth_stencil_rw()),
            multisample: wgpu::MultisampleState {
                count: MSAA_SAMPLES,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    })
    .map_err(|e| shader_error("Scene Pipeline", e))
}
