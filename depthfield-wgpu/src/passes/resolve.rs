//! Resolve pass: MSAA color and depth into single-sample targets.
//!
//! Color goes through the hardware resolve. Depth is copied from sample 0 by
//! a fullscreen pass; averaging discrete depths would invent surfaces that
//! were never rendered.

use crate::config::ShaderSources;
use crate::context::GpuContext;
use crate::error::DofResult;
use crate::pipeline::{FullscreenPass, FullscreenPassDesc, PassBinding, PassOutput, Samplers};
use crate::render_targets::{RenderTargetPool, TargetId, TargetKind};

pub struct Resolver {
    depth_pass: FullscreenPass,
    color_msaa: TargetId,
    resolved_color: TargetId,
    resolved_depth: TargetId,
}

impl Resolver {
    pub fn new(
        ctx: &GpuContext,
        pool: &mut RenderTargetPool,
        vertex: &wgpu::ShaderModule,
        sources: &ShaderSources,
        color_msaa: TargetId,
        depth_msaa: TargetId,
    ) -> DofResult<Self> {
        let resolved_color = pool.allocate(ctx, TargetKind::ResolvedColor, 1.0)?;
        let resolved_depth = pool.allocate(ctx, TargetKind::ResolvedDepth, 1.0)?;

        let depth_pass = FullscreenPass::new(
            ctx,
            pool,
            vertex,
            FullscreenPassDesc {
                label: "Depth Resolve",
                fragment_source: &sources.depth_resolve,
                bindings: vec![PassBinding::Target(depth_msaa)],
                params_size: 0,
                output: PassOutput::Targets(vec![resolved_depth]),
            },
        )?;

        Ok(Self {
            depth_pass,
            color_msaa,
            resolved_color,
            resolved_depth,
        })
    }

    pub fn render(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pool: &RenderTargetPool,
        samplers: &Samplers,
    ) -> DofResult<()> {
        // No draws: the pass exists only for its resolve target.
        let resolve = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Color Resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: pool.view(self.color_msaa),
                resolve_target: Some(pool.view(self.resolved_color)),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        drop(resolve);

        self.depth_pass.execute(device, encoder, pool, samplers)
    }

    pub fn resolved_color(&self) -> TargetId {
        self.resolved_color
    }

    pub fn resolved_depth(&self) -> TargetId {
        self.resolved_depth
    }
}
