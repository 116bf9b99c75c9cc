//! Frame encoder. Owns the target pool and every pass, and records a whole
//! frame (scene → resolve → CoC pack → blur → composite → previews) into a
//! single command buffer.

use depthfield_gpu_shared::coc::DepthOfFieldParams;
use depthfield_gpu_shared::uniforms::{InstanceRaw, SceneUniforms};

use crate::config::{OutputMode, PipelineConfig, PreviewAnchor};
use crate::context::GpuContext;
use crate::error::DofResult;
use crate::passes::blur::SeparableBlur;
use crate::passes::coc_pack::CoCPacker;
use crate::passes::composite::{CompositeInputs, Compositor};
use crate::passes::preview::PreviewOverlay;
use crate::passes::resolve::Resolver;
use crate::passes::scene::SceneRenderer;
use crate::pipeline::{self, Samplers};
use crate::render_targets::RenderTargetPool;

/// Per-frame values uploaded before encoding.
pub struct FrameInputs<'a> {
    pub scene: SceneUniforms,
    pub instances: &'a [InstanceRaw],
    pub dof: &'a DepthOfFieldParams,
    pub z_near: f32,
    pub z_far: f32,
}

pub struct DofRenderer {
    pool: RenderTargetPool,
    samplers: Samplers,
    scene: SceneRenderer,
    resolver: Resolver,
    coc: CoCPacker,
    blur: SeparableBlur,
    compositor: Compositor,
    previews: PreviewOverlay,
}

impl DofRenderer {
    pub fn new(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        output_format: wgpu::TextureFormat,
        config: &PipelineConfig,
        instance_count: usize,
    ) -> DofResult<Self> {
        log::info!("Creating depth-of-field pipeline ({width}x{height}, {instance_count} instances)");
        let mut pool = RenderTargetPool::new(width, height);
        let samplers = Samplers::new(&ctx.device);
        let sources = &config.shaders;
        let vertex = pipeline::create_shader_module(ctx, "Fullscreen Vertex", &sources.fullscreen)?;

        let scene = SceneRenderer::new(ctx, &mut pool, &samplers, sources, instance_count)?;
        let resolver = Resolver::new(
            ctx,
            &mut pool,
            &vertex,
            sources,
            scene.color_target(),
            scene.depth_target(),
        )?;
        let coc = CoCPacker::new(
            ctx,
            &mut pool,
            &vertex,
            sources,
            resolver.resolved_depth(),
            resolver.resolved_color(),
        )?;
        let blur = SeparableBlur::new(
            ctx,
            &mut pool,
            &vertex,
            sources,
            coc.packed(),
            config.dof.max_coc_radius,
        )?;
        let compositor = Compositor::new(
            ctx,
            &pool,
            &vertex,
            sources,
            CompositeInputs {
                packed: coc.packed(),
                color: resolver.resolved_color(),
                far: blur.far(),
                near: blur.near(),
            },
            output_format,
            config.output_mode,
        )?;
        let previews = PreviewOverlay::new(&ctx.device, &config.preview, &compositor);

        log::info!("Allocated {} render targets", pool.len());
        Ok(Self {
            pool,
            samplers,
            scene,
            resolver,
            coc,
            blur,
            compositor,
            previews,
        })
    }

    /// Reallocate every target. Returns whether anything changed.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) -> DofResult<bool> {
        self.pool.resize(ctx, width, height)
    }

    pub fn render(&self, ctx: &GpuContext, view: &wgpu::TextureView, inputs: &FrameInputs<'_>) -> DofResult<()> {
        let queue = &ctx.queue;
        let device = &ctx.device;

        self.scene.prepare(queue, &inputs.scene, inputs.instances);
        self.coc.update(queue, inputs.dof, inputs.z_near, inputs.z_far);
        self.blur.update(queue, &self.pool);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Depth of Field Frame"),
        });
        self.scene.render(&mut encoder, &self.pool);
        self.resolver.render(device, &mut encoder, &self.pool, &self.samplers)?;
        self.coc.render(device, &mut encoder, &self.pool, &self.samplers)?;
        self.blur.render(device, &mut encoder, &self.pool, &self.samplers)?;

        let viewport = self.pool.viewport();
        self.compositor
            .render(device, queue, &mut encoder, &self.pool, &self.samplers, view, viewport);
        self.previews
            .render(device, queue, &mut encoder, &self.pool, &self.samplers, view, viewport);

        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    pub fn set_max_coc_radius(&mut self, max_coc_radius: f32) {
        self.blur.set_max_coc_radius(max_coc_radius);
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.compositor.set_mode(mode);
    }

    pub fn set_previews(&mut self, device: &wgpu::Device, modes: &[OutputMode]) {
        self.previews.set_modes(device, modes, &self.compositor);
    }

    pub fn set_preview_anchor(&mut self, anchor: PreviewAnchor) {
        self.previews.set_anchor(anchor);
    }

    pub fn set_preview_size(&mut self, fraction: f32) {
        self.previews.set_fraction(fraction);
    }

    pub fn set_environment(&mut self, ctx: &GpuContext, width: u32, height: u32, rgba: &[u8]) -> DofResult<()> {
        self.scene.set_environment(ctx, &self.samplers, width, height, rgba)
    }

    pub fn output_mode(&self) -> OutputMode {
        self.compositor.mode()
    }

    pub fn previews(&self) -> &PreviewOverlay {
        &self.previews
    }

    pub fn blur(&self) -> &SeparableBlur {
        &self.blur
    }

    pub fn pool(&self) -> &RenderTargetPool {
        &self.pool
    }
}
