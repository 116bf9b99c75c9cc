//! Composite pass: blends sharp, far and near layers or passes an
//! intermediate target through for inspection. Writes to an external view.

use depthfield_gpu_shared::uniforms::CompositeParams;

use crate::config::{OutputMode, ShaderSources};
use crate::context::GpuContext;
use crate::error::DofResult;
use crate::pipeline::{FullscreenPass, FullscreenPassDesc, PassBinding, PassOutput, SamplerKind, Samplers};
use crate::render_targets::{RenderTargetPool, TargetId};

/// Targets the compositor reads.
#[derive(Clone, Copy, Debug)]
pub struct CompositeInputs {
    pub packed: TargetId,
    pub color: TargetId,
    pub far: TargetId,
    pub near: TargetId,
}

pub struct Compositor {
    pass: FullscreenPass,
    mode: OutputMode,
}

impl Compositor {
    pub fn new(
        ctx: &GpuContext,
        pool: &RenderTargetPool,
        vertex: &wgpu::ShaderModule,
        sources: &ShaderSources,
        inputs: CompositeInputs,
        output_format: wgpu::TextureFormat,
        mode: OutputMode,
    ) -> DofResult<Self> {
        let pass = FullscreenPass::new(
            ctx,
            pool,
            vertex,
            FullscreenPassDesc {
                label: "DOF Composite",
                fragment_source: &sources.composite,
                bindings: vec![
                    PassBinding::Params,
                    PassBinding::Target(inputs.packed),
                    PassBinding::Target(inputs.color),
                    PassBinding::Target(inputs.far),
                    PassBinding::Target(inputs.near),
                    PassBinding::Sampler(SamplerKind::LinearClamp),
                ],
                params_size: std::mem::size_of::<CompositeParams>() as u64,
                output: PassOutput::External(output_format),
            },
        )?;
        Ok(Self { pass, mode })
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    /// A copy of the composite pass with its own parameters, for previews.
    pub fn fork_pass(&self, device: &wgpu::Device) -> FullscreenPass {
        self.pass.fork(device)
    }

    /// Fill the whole of `view` (`size` pixels) with the current mode.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        pool: &RenderTargetPool,
        samplers: &Samplers,
        view: &wgpu::TextureView,
        size: (u32, u32),
    ) {
        let params = CompositeParams::new(self.mode.index(), [0.0, 0.0], [size.0 as f32, size.1 as f32]);
        self.pass.write_params(queue, &params);
        self.pass.execute_into(
            device,
            encoder,
            pool,
            samplers,
            view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            None,
        );
    }
}
