//! CoC pack pass: resolved color in rgb, signed circle of confusion in alpha.

use depthfield_gpu_shared::coc::DepthOfFieldParams;
use depthfield_gpu_shared::uniforms::CoCParams;

use crate::config::ShaderSources;
use crate::context::GpuContext;
use crate::error::DofResult;
use crate::pipeline::{FullscreenPass, FullscreenPassDesc, PassBinding, PassOutput, Samplers};
use crate::render_targets::{RenderTargetPool, TargetId, TargetKind};

pub struct CoCPacker {
    pass: FullscreenPass,
    packed: TargetId,
}

impl CoCPacker {
    pub fn new(
        ctx: &GpuContext,
        pool: &mut RenderTargetPool,
        vertex: &wgpu::ShaderModule,
        sources: &ShaderSources,
        resolved_depth: TargetId,
        resolved_color: TargetId,
    ) -> DofResult<Self> {
        let packed = pool.allocate(ctx, TargetKind::Packed, 1.0)?;
        let pass = FullscreenPass::new(
            ctx,
            pool,
            vertex,
            FullscreenPassDesc {
                label: "DOF CoC Pack",
                fragment_source: &sources.coc_pack,
                bindings: vec![
                    PassBinding::Params,
                    PassBinding::Target(resolved_depth),
                    PassBinding::Target(resolved_color),
                ],
                params_size: std::mem::size_of::<CoCParams>() as u64,
                output: PassOutput::Targets(vec![packed]),
            },
        )?;
        Ok(Self { pass, packed })
    }

    pub fn update(&self, queue: &wgpu::Queue, dof: &DepthOfFieldParams, z_near: f32, z_far: f32) {
        self.pass.write_params(queue, &CoCParams::new(dof, z_near, z_far));
    }

    pub fn render(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pool: &RenderTargetPool,
        samplers: &Samplers,
    ) -> DofResult<()> {
        self.pass.execute(device, encoder, pool, samplers)
    }

    pub fn packed(&self) -> TargetId {
        self.packed
    }
}
