//! Render target pool for the depth-of-field pipeline.
//! MSAA scene targets, resolved color/depth, the packed CoC target and the
//! half-resolution near/far blur chain. Every target is sized relative to the
//! viewport and all of them are recreated together on resize.

use depthfield_gpu_shared::kernel::DOF_TEXTURE_SCALE;

use crate::context::GpuContext;
use crate::error::{DofError, DofResult};

/// HDR color format used throughout the pipeline.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Depth attachment format.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Single-sample copy of the depth buffer, readable as a color texture.
pub const RESOLVED_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
/// Scene rasterization sample count.
pub const MSAA_SAMPLES: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    SceneColorMsaa,
    SceneDepthMsaa,
    ResolvedColor,
    ResolvedDepth,
    /// rgb = resolved color, a = signed CoC.
    Packed,
    BlurFarH,
    BlurNearH,
    BlurFar,
    BlurNear,
}

impl TargetKind {
    pub const ALL: [TargetKind; 9] = [
        TargetKind::SceneColorMsaa,
        TargetKind::SceneDepthMsaa,
        TargetKind::ResolvedColor,
        TargetKind::ResolvedDepth,
        TargetKind::Packed,
        TargetKind::BlurFarH,
        TargetKind::BlurNearH,
        TargetKind::BlurFar,
        TargetKind::BlurNear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TargetKind::SceneColorMsaa => "Scene Color MSAA",
            TargetKind::SceneDepthMsaa => "Scene Depth MSAA",
            TargetKind::ResolvedColor => "Resolved Color",
            TargetKind::ResolvedDepth => "Resolved Depth",
            TargetKind::Packed => "DOF Packed",
            TargetKind::BlurFarH => "DOF Blur Far H",
            TargetKind::BlurNearH => "DOF Blur Near H",
            TargetKind::BlurFar => "DOF Blur Far",
            TargetKind::BlurNear => "DOF Blur Near",
        }
    }

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            TargetKind::SceneDepthMsaa => DEPTH_FORMAT,
            TargetKind::ResolvedDepth => RESOLVED_DEPTH_FORMAT,
            _ => HDR_FORMAT,
        }
    }

    pub fn sample_count(self) -> u32 {
        match self {
            TargetKind::SceneColorMsaa | TargetKind::SceneDepthMsaa => MSAA_SAMPLES,
            _ => 1,
        }
    }

    pub fn is_depth(self) -> bool {
        self == TargetKind::SceneDepthMsaa
    }

    /// Scale the pipeline allocates this kind at.
    pub fn default_scale(self) -> f32 {
        match self {
            TargetKind::BlurFarH
            | TargetKind::BlurNearH
            | TargetKind::BlurFar
            | TargetKind::BlurNear => DOF_TEXTURE_SCALE,
            _ => 1.0,
        }
    }

    pub fn usage(self) -> wgpu::TextureUsages {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if self.sample_count() == 1 {
            usage | wgpu::TextureUsages::COPY_SRC
        } else {
            usage
        }
    }

    /// Whether `adapter` can render, multisample and resolve this kind.
    pub fn check_support(self, adapter: &wgpu::Adapter) -> Result<(), String> {
        self.check_features(&adapter.get_texture_format_features(self.format()))
    }

    fn check_features(self, features: &wgpu::TextureFormatFeatures) -> Result<(), String> {
        let format = self.format();
        let samples = self.sample_count();
        if !features.allowed_usages.contains(self.usage()) {
            return Err(format!("{format:?} does not allow {:?}", self.usage()));
        }
        if samples > 1 {
            if !features.flags.sample_count_supported(samples) {
                return Err(format!("{format:?} does not support {samples}x multisampling"));
            }
            if !self.is_depth()
                && !features
                    .flags
                    .contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
            {
                return Err(format!("{format:?} cannot be resolved"));
            }
        }
        Ok(())
    }

    /// How a fragment stage sees this target when it is bound as an input.
    pub fn sample_type(self) -> wgpu::TextureSampleType {
        match self {
            TargetKind::SceneDepthMsaa => wgpu::TextureSampleType::Depth,
            TargetKind::ResolvedDepth => wgpu::TextureSampleType::Float { filterable: false },
            TargetKind::SceneColorMsaa => wgpu::TextureSampleType::Float { filterable: false },
            _ => wgpu::TextureSampleType::Float { filterable: true },
        }
    }
}

/// Stable handle into a [`RenderTargetPool`]. Survives resizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(usize);

pub struct RenderTarget {
    pub kind: TargetKind,
    pub scale: f32,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// `max(floor(viewport × scale), 1)` per axis.
pub fn target_dimensions(viewport: (u32, u32), scale: f32) -> (u32, u32) {
    let axis = |extent: u32| ((extent as f32 * scale).floor() as u32).max(1);
    (axis(viewport.0), axis(viewport.1))
}

fn create_target(
    ctx: &GpuContext,
    kind: TargetKind,
    scale: f32,
    viewport: (u32, u32),
) -> DofResult<RenderTarget> {
    let label = kind.label();
    let format = kind.format();
    let samples = kind.sample_count();

    kind.check_support(&ctx.adapter)
        .map_err(|reason| DofError::incomplete(label, reason))?;

    let (width, height) = target_dimensions(viewport, scale);
    let texture = ctx
        .capture_validation(|device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: samples,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: kind.usage(),
                view_formats: &[],
            })
        })
        .map_err(|e| DofError::incomplete(label, e))?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    log::debug!("Created {label} target {width}x{height} ({format:?}, {samples}x)");
    Ok(RenderTarget {
        kind,
        scale,
        texture,
        view,
        width,
        height,
    })
}

/// Owns every render target. At most one target exists per `(kind, scale)`.
pub struct RenderTargetPool {
    viewport: (u32, u32),
    targets: Vec<RenderTarget>,
    generation: u64,
}

impl RenderTargetPool {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width.max(1), height.max(1)),
            targets: Vec::new(),
            generation: 0,
        }
    }

    /// Return the handle for `(kind, scale)`, creating the target on first use.
    pub fn allocate(&mut self, ctx: &GpuContext, kind: TargetKind, scale: f32) -> DofResult<TargetId> {
        if let Some(index) = self
            .targets
            .iter()
            .position(|t| t.kind == kind && t.scale.to_bits() == scale.to_bits())
        {
            return Ok(TargetId(index));
        }
        let target = create_target(ctx, kind, scale, self.viewport)?;
        self.targets.push(target);
        Ok(TargetId(self.targets.len() - 1))
    }

    /// Recreate every target for a new viewport. Returns `false` without
    /// touching anything when the clamped size is unchanged.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) -> DofResult<bool> {
        let viewport = (width.max(1), height.max(1));
        if viewport == self.viewport {
            return Ok(false);
        }

        let rebuilt = self
            .targets
            .iter()
            .map(|t| create_target(ctx, t.kind, t.scale, viewport))
            .collect::<DofResult<Vec<_>>>()?;

        self.targets = rebuilt;
        self.viewport = viewport;
        self.generation += 1;
        log::info!("Targets resized to {}x{}", viewport.0, viewport.1);
        Ok(true)
    }

    pub fn get(&self, id: TargetId) -> &RenderTarget {
        &self.targets[id.0]
    }

    /// First target of `kind`, if one was allocated.
    pub fn find(&self, kind: TargetKind) -> Option<TargetId> {
        self.targets.iter().position(|t| t.kind == kind).map(TargetId)
    }

    pub fn view(&self, id: TargetId) -> &wgpu::TextureView {
        &self.targets[id.0].view
    }

    pub fn size(&self, id: TargetId) -> (u32, u32) {
        let target = &self.targets[id.0];
        (target.width, target.height)
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Bumped on every reallocation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
