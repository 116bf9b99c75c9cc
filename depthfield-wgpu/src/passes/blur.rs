//! Separable near/far blur at `DOF_TEXTURE_SCALE` resolution.
//!
//! The horizontal pass splits the packed target into a far/mid layer and a
//! CoC-weighted near layer (MRT). The vertical pass runs the same kernel over
//! both layers. Each direction owns its own parameter buffer and no pass
//! reads the target it writes.

use depthfield_gpu_shared::kernel::{BlurKernel, DOF_TEXTURE_SCALE};
use depthfield_gpu_shared::uniforms::BlurParams;

use crate::config::ShaderSources;
use crate::context::GpuContext;
use crate::error::DofResult;
use crate::pipeline::{FullscreenPass, FullscreenPassDesc, PassBinding, PassOutput, SamplerKind, Samplers};
use crate::render_targets::{RenderTargetPool, TargetId, TargetKind};

pub struct SeparableBlur {
    horizontal: FullscreenPass,
    vertical: FullscreenPass,
    kernel: BlurKernel,
    far_h: TargetId,
    far: TargetId,
    near: TargetId,
}

impl SeparableBlur {
    pub fn new(
        ctx: &GpuContext,
        pool: &mut RenderTargetPool,
        vertex: &wgpu::ShaderModule,
        sources: &ShaderSources,
        packed: TargetId,
        max_coc_radius: f32,
    ) -> DofResult<Self> {
        let far_h = pool.allocate(ctx, TargetKind::BlurFarH, DOF_TEXTURE_SCALE)?;
        let near_h = pool.allocate(ctx, TargetKind::BlurNearH, DOF_TEXTURE_SCALE)?;
        let far = pool.allocate(ctx, TargetKind::BlurFar, DOF_TEXTURE_SCALE)?;
        let near = pool.allocate(ctx, TargetKind::BlurNear, DOF_TEXTURE_SCALE)?;
        let params_size = std::mem::size_of::<BlurParams>() as u64;

        let horizontal = FullscreenPass::new(
            ctx,
            pool,
            vertex,
            FullscreenPassDesc {
                label: "DOF Blur H",
                fragment_source: &sources.blur_h,
                bindings: vec![
                    PassBinding::Params,
                    PassBinding::Target(packed),
                    PassBinding::Sampler(SamplerKind::LinearClamp),
                ],
                params_size,
                output: PassOutput::Targets(vec![far_h, near_h]),
            },
        )?;
        let vertical = FullscreenPass::new(
            ctx,
            pool,
            vertex,
            FullscreenPassDesc {
                label: "DOF Blur V",
                fragment_source: &sources.blur_v,
                bindings: vec![
                    PassBinding::Params,
                    PassBinding::Target(far_h),
                    PassBinding::Target(near_h),
                    PassBinding::Sampler(SamplerKind::LinearClamp),
                ],
                params_size,
                output: PassOutput::Targets(vec![far, near]),
            },
        )?;

        Ok(Self {
            horizontal,
            vertical,
            kernel: BlurKernel::for_coc_radius(max_coc_radius, DOF_TEXTURE_SCALE),
            far_h,
            far,
            near,
        })
    }

    pub fn set_max_coc_radius(&mut self, max_coc_radius: f32) {
        self.kernel = BlurKernel::for_coc_radius(max_coc_radius, DOF_TEXTURE_SCALE);
        log::debug!("Blur kernel radius now {}", self.kernel.radius());
    }

    /// Upload kernel and texel sizes; offsets are in blur-target texels.
    pub fn update(&self, queue: &wgpu::Queue, pool: &RenderTargetPool) {
        let texel = |id: TargetId| {
            let (w, h) = pool.size(id);
            [1.0 / w as f32, 1.0 / h as f32]
        };
        self.horizontal
            .write_params(queue, &BlurParams::new([1.0, 0.0], texel(self.far_h), &self.kernel));
        self.vertical
            .write_params(queue, &BlurParams::new([0.0, 1.0], texel(self.far), &self.kernel));
    }

    pub fn render(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pool: &RenderTargetPool,
        samplers: &Samplers,
    ) -> DofResult<()> {
        self.horizontal.execute(device, encoder, pool, samplers)?;
        self.vertical.execute(device, encoder, pool, samplers)
    }

    pub fn kernel(&self) -> &BlurKernel {
        &self.kernel
    }

    pub fn far(&self) -> TargetId {
        self.far
    }

    pub fn near(&self) -> TargetId {
        self.near
    }
}
