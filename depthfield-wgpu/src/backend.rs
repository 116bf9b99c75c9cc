//! Host-facing pipeline state. The host owns the frame loop and calls
//! [`DepthOfFieldPipeline::tick`]; everything else is setters and accessors.

use std::sync::mpsc;

use depthfield_gpu_shared::coc::DepthOfFieldParams;
use depthfield_gpu_shared::uniforms::SceneUniforms;
use glam::Vec3;

use crate::animator::InstanceAnimator;
use crate::camera::OrbitCamera;
use crate::config::{OutputMode, PipelineConfig, PreviewAnchor};
use crate::context::GpuContext;
use crate::error::{DofError, DofResult};
use crate::frame::FrameState;
use crate::render_targets::TargetKind;
use crate::renderer::{DofRenderer, FrameInputs};

/// Format of the offscreen output; readback bytes are sRGB-encoded RGBA8.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Direction the key light travels.
const LIGHT_DIR: Vec3 = Vec3::new(-0.4, -1.0, -0.6);

enum Output {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Headless {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

fn create_headless_output(ctx: &GpuContext, width: u32, height: u32) -> DofResult<Output> {
    ctx.check_extent("output", width, height)?;
    let texture = ctx
        .capture_validation(|device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Headless Output"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: HEADLESS_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })
        .map_err(|e| DofError::incomplete("Headless Output", e))?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(Output::Headless { texture, view })
}

fn configure_surface(
    ctx: &GpuContext,
    surface: &wgpu::Surface<'static>,
    config: &wgpu::SurfaceConfiguration,
) -> DofResult<()> {
    ctx.capture_validation(|device| surface.configure(device, config))
        .map_err(|e| DofError::Surface(e.to_string()))
}

pub struct DepthOfFieldPipeline {
    ctx: GpuContext,
    output: Output,
    renderer: DofRenderer,
    camera: OrbitCamera,
    animator: InstanceAnimator,
    dof: DepthOfFieldParams,
    frame: FrameState,
    width: u32,
    height: u32,
}

impl DepthOfFieldPipeline {
    /// Create a pipeline presenting to a window surface.
    pub fn new(
        window: impl raw_window_handle::HasWindowHandle
            + raw_window_handle::HasDisplayHandle
            + Send
            + Sync
            + 'static,
        width: u32,
        height: u32,
        config: PipelineConfig,
    ) -> DofResult<Self> {
        let (width, height) = (width.max(1), height.max(1));
        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(window)
            .map_err(|e| DofError::context(format!("Failed to create surface: {e}")))
            .inspect_err(|e| log::error!("Surface creation failed: {e}"))?;
        let ctx = GpuContext::from_instance(instance, Some(&surface))
            .inspect_err(|e| log::error!("GPU context creation failed: {e}"))?;

        let caps = surface.get_capabilities(&ctx.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| DofError::context("Surface reports no supported formats"))?;
        let config_surface = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        ctx.check_extent("surface", width, height)?;
        configure_surface(&ctx, &surface, &config_surface)?;

        let output = Output::Surface {
            surface,
            config: config_surface,
        };
        Self::build(ctx, output, format, width, height, config)
    }

    /// Create a pipeline rendering into an offscreen texture readable with
    /// [`read_output`](Self::read_output).
    pub fn new_headless(width: u32, height: u32, config: PipelineConfig) -> DofResult<Self> {
        let (width, height) = (width.max(1), height.max(1));
        let ctx = GpuContext::headless().inspect_err(|e| log::error!("GPU context creation failed: {e}"))?;
        let output = create_headless_output(&ctx, width, height)?;
        Self::build(ctx, output, HEADLESS_FORMAT, width, height, config)
    }

    fn build(
        ctx: GpuContext,
        output: Output,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: PipelineConfig,
    ) -> DofResult<Self> {
        let animator = InstanceAnimator::from_config(&config.scene);
        let renderer = DofRenderer::new(&ctx, width, height, format, &config, animator.len())
            .inspect_err(|e| log::error!("Depth-of-field pipeline creation failed: {e}"))?;
        let camera = OrbitCamera::new(&config.camera, width as f32 / height as f32);

        Ok(Self {
            ctx,
            output,
            renderer,
            camera,
            animator,
            dof: config.dof,
            frame: FrameState::default(),
            width,
            height,
        })
    }

    /// Reallocate every target for a new size. Zero clamps to 1; an unchanged
    /// size is a no-op. On error the previous size stays in effect.
    pub fn on_resize(&mut self, width: u32, height: u32) -> DofResult<()> {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.ctx.check_extent("output", width, height)?;

        let headless = match &self.output {
            Output::Headless { .. } => Some(create_headless_output(&self.ctx, width, height)?),
            Output::Surface { .. } => None,
        };
        self.renderer.resize(&self.ctx, width, height)?;

        if let Some(next) = headless {
            self.output = next;
        } else if let Output::Surface { surface, config } = &mut self.output {
            let previous = (config.width, config.height);
            config.width = width;
            config.height = height;
            if let Err(e) = configure_surface(&self.ctx, surface, config) {
                (config.width, config.height) = previous;
                self.renderer.resize(&self.ctx, previous.0, previous.1)?;
                return Err(e);
            }
        }

        self.camera.set_aspect(width as f32 / height as f32);
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Advance to `elapsed_ms`, animate, and render one frame.
    pub fn tick(&mut self, elapsed_ms: f64) -> DofResult<()> {
        self.frame.advance(elapsed_ms);
        self.camera.update();
        self.animator.update(&self.frame);

        let inputs = FrameInputs {
            scene: self.scene_uniforms(),
            instances: self.animator.raw(),
            dof: &self.dof,
            z_near: self.camera.z_near(),
            z_far: self.camera.z_far(),
        };

        match &self.output {
            Output::Headless { view, .. } => {
                self.renderer.render(&self.ctx, view, &inputs)?;
            }
            Output::Surface { surface, config } => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        log::warn!("Surface lost or outdated; reconfiguring and skipping frame");
                        configure_surface(&self.ctx, surface, config)?;
                        return Ok(());
                    }
                    Err(e) => return Err(DofError::Surface(e.to_string())),
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.renderer.render(&self.ctx, &view, &inputs)?;
                frame.present();
            }
        }
        Ok(())
    }

    fn scene_uniforms(&self) -> SceneUniforms {
        SceneUniforms {
            view: self.camera.view().to_cols_array_2d(),
            projection: self.camera.projection().to_cols_array_2d(),
            camera_pos: self.camera.position().extend(1.0).to_array(),
            light_dir: LIGHT_DIR.normalize().extend(0.0).to_array(),
            time: self.frame.elapsed_secs(),
            _pad1: 0.0,
            _pad2: 0.0,
            _pad3: 0.0,
        }
    }

    // ---- Setters -------------------------------------------------------

    pub fn set_clip_planes(&mut self, z_near: f32, z_far: f32) {
        self.camera.set_clip_planes(z_near, z_far);
    }

    pub fn set_near_blurry(&mut self, distance: f32) {
        self.dof.near_blurry = distance;
    }

    pub fn set_near_sharp(&mut self, distance: f32) {
        self.dof.near_sharp = distance;
    }

    pub fn set_far_sharp(&mut self, distance: f32) {
        self.dof.far_sharp = distance;
    }

    pub fn set_far_blurry(&mut self, distance: f32) {
        self.dof.far_blurry = distance;
    }

    /// Also rebuilds the blur kernel.
    pub fn set_max_coc_radius(&mut self, radius: f32) {
        self.dof.max_coc_radius = radius;
        self.renderer.set_max_coc_radius(radius);
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.renderer.set_output_mode(mode);
    }

    pub fn set_previews(&mut self, modes: &[OutputMode]) {
        self.renderer.set_previews(&self.ctx.device, modes);
    }

    pub fn set_preview_anchor(&mut self, anchor: PreviewAnchor) {
        self.renderer.set_preview_anchor(anchor);
    }

    pub fn set_preview_size(&mut self, fraction: f32) {
        self.renderer.set_preview_size(fraction);
    }

    /// Equirectangular environment map, tightly packed sRGB RGBA8.
    pub fn set_environment(&mut self, width: u32, height: u32, rgba: &[u8]) -> DofResult<()> {
        self.renderer.set_environment(&self.ctx, width, height, rgba)
    }

    // ---- Pointer input -------------------------------------------------

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.camera.pointer_down(x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.camera.pointer_move(x, y);
    }

    pub fn pointer_up(&mut self) {
        self.camera.pointer_up();
    }

    // ---- Accessors -----------------------------------------------------

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn params(&self) -> &DepthOfFieldParams {
        &self.dof
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Largest width or height accepted by `on_resize` and `set_environment`.
    pub fn max_extent(&self) -> u32 {
        self.ctx.max_extent()
    }

    pub fn output_mode(&self) -> OutputMode {
        self.renderer.output_mode()
    }

    pub fn preview_modes(&self) -> &[OutputMode] {
        self.renderer.previews().modes()
    }

    pub fn blur_radius(&self) -> usize {
        self.renderer.blur().kernel().radius()
    }

    pub fn instance_count(&self) -> usize {
        self.animator.len()
    }

    /// Render target generation; bumped whenever targets are reallocated.
    pub fn target_generation(&self) -> u64 {
        self.renderer.pool().generation()
    }

    /// Copy the last headless frame back as tightly packed RGBA8 rows.
    pub fn read_output(&self) -> DofResult<Vec<u8>> {
        let Output::Headless { texture, .. } = &self.output else {
            return Err(DofError::readback("pipeline renders to a window surface"));
        };
        read_texture(&self.ctx, texture, self.width, self.height, 4)
    }

    /// Copy an intermediate target back in its native texel format, tightly
    /// packed. Returns the target's size alongside the bytes.
    pub fn read_target(&self, kind: TargetKind) -> DofResult<(u32, u32, Vec<u8>)> {
        let pool = self.renderer.pool();
        let id = pool
            .find(kind)
            .ok_or_else(|| DofError::readback(format!("no {} target", kind.label())))?;
        if kind.sample_count() > 1 {
            return Err(DofError::readback(format!("{} is multisampled", kind.label())));
        }
        let bytes_per_texel = kind
            .format()
            .block_copy_size(None)
            .ok_or_else(|| DofError::readback(format!("{} cannot be copied", kind.label())))?;
        let target = pool.get(id);
        let pixels = read_texture(&self.ctx, &target.texture, target.width, target.height, bytes_per_texel)?;
        Ok((target.width, target.height, pixels))
    }

    /// Release every GPU resource.
    pub fn destroy(self) {
        log::info!("Depth-of-field pipeline shut down");
        drop(self);
    }
}

fn read_texture(
    ctx: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    bytes_per_texel: u32,
) -> DofResult<Vec<u8>> {
    let unpadded = width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| DofError::readback(format!("map callback dropped: {e}")))?
        .map_err(DofError::readback)?;

    let mut pixels = Vec::with_capacity((unpadded * height) as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
    }
    buffer.unmap();
    Ok(pixels)
}
