//! Scene pass: instanced cubes into the multisampled color + depth targets.

use bytemuck::{Pod, Zeroable};
use depthfield_gpu_shared::uniforms::{InstanceRaw, SceneUniforms, INSTANCE_STRIDE};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::config::ShaderSources;
use crate::context::GpuContext;
use crate::error::{DofError, DofResult};
use crate::pipeline::{self, SamplerKind, Samplers};
use crate::render_targets::{RenderTargetPool, TargetId, TargetKind};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Unit cube centered on the origin: 24 vertices (4 per face, so normals
/// stay flat) and 36 counter-clockwise indices.
pub fn cube_mesh() -> (Vec<CubeVertex>, Vec<u16>) {
    // (normal, u, v) with u × v = normal.
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face, (n, u, v)) in faces.iter().enumerate() {
        let base = (face * 4) as u16;
        for (su, sv) in corners {
            let position = (*n + *u * su + *v * sv) * 0.5;
            vertices.push(CubeVertex {
                position: position.to_array(),
                normal: n.to_array(),
                uv: [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

struct Environment {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn create_environment(
    ctx: &GpuContext,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> DofResult<Environment> {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = ctx
        .capture_validation(|device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Environment Texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })
        .map_err(|e| DofError::InvalidArgument(format!("environment texture rejected: {e}")))?;
    ctx.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(Environment {
        _texture: texture,
        view,
    })
}

pub struct SceneRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    environment: Environment,
    color: TargetId,
    depth: TargetId,
}

impl SceneRenderer {
    pub fn new(
        ctx: &GpuContext,
        pool: &mut RenderTargetPool,
        samplers: &Samplers,
        sources: &ShaderSources,
        instance_count: usize,
    ) -> DofResult<Self> {
        let color = pool.allocate(ctx, TargetKind::SceneColorMsaa, 1.0)?;
        let depth = pool.allocate(ctx, TargetKind::SceneDepthMsaa, 1.0)?;

        let vert = pipeline::create_shader_module(ctx, "Scene Vertex", &sources.scene_vert)?;
        let frag = pipeline::create_shader_module(ctx, "Scene Fragment", &sources.scene_frag)?;
        let bind_group_layout = pipeline::create_scene_bind_group_layout(&ctx.device);
        let render_pipeline = pipeline::create_scene_pipeline(ctx, &vert, &frag, &bind_group_layout)?;

        let (vertices, indices) = cube_mesh();
        let vertex_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        // Never zero-sized, even for an empty scene.
        let instance_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Transforms"),
            size: INSTANCE_STRIDE * instance_count.max(1) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // 1x1 white until the host supplies an environment map.
        let environment = create_environment(ctx, 1, 1, &[255, 255, 255, 255])?;
        let bind_group = create_bind_group(
            &ctx.device,
            &bind_group_layout,
            &uniform_buffer,
            &environment.view,
            samplers.get(SamplerKind::LinearRepeat),
        );

        Ok(Self {
            pipeline: render_pipeline,
            bind_group_layout,
            bind_group,
            uniform_buffer,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            instance_buffer,
            instance_count: instance_count as u32,
            environment,
            color,
            depth,
        })
    }

    /// Replace the equirectangular environment map (tightly packed RGBA8).
    pub fn set_environment(
        &mut self,
        ctx: &GpuContext,
        samplers: &Samplers,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> DofResult<()> {
        ctx.check_extent("environment", width, height)?;
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(DofError::InvalidArgument(format!(
                "environment {width}x{height} needs {expected} RGBA bytes, got {}",
                rgba.len()
            )));
        }
        self.environment = create_environment(ctx, width, height, rgba)?;
        self.bind_group = create_bind_group(
            &ctx.device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &self.environment.view,
            samplers.get(SamplerKind::LinearRepeat),
        );
        log::info!("Environment map set ({width}x{height})");
        Ok(())
    }

    pub fn prepare(&self, queue: &wgpu::Queue, uniforms: &SceneUniforms, instances: &[InstanceRaw]) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        let count = instances.len().min(self.instance_count as usize);
        if count > 0 {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances[..count]));
        }
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, pool: &RenderTargetPool) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: pool.view(self.color),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: pool.view(self.depth),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        if self.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..self.index_count, 0, 0..self.instance_count);
    }

    pub fn color_target(&self) -> TargetId {
        self.color
    }

    pub fn depth_target(&self) -> TargetId {
        self.depth
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    environment: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Scene Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(environment) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_mesh_counts() {
        let (vertices, indices) = cube_mesh();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        assert_eq!(std::mem::size_of::<CubeVertex>() as u64, pipeline::SCENE_VERTEX_STRIDE);
    }

    #[test]
    fn test_cube_faces_wind_outward() {
        let (vertices, indices) = cube_mesh();
        for tri in indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(vertices[i as usize].position));
            let normal = Vec3::from(vertices[tri[0] as usize].normal);
            let facing = (b - a).cross(c - a).normalize();
            assert!((facing - normal).length() < 1e-5, "triangle {tri:?}");
        }
    }

    #[test]
    fn test_cube_is_unit_sized() {
        let (vertices, _) = cube_mesh();
        for v in &vertices {
            assert!(v.position.iter().all(|c| c.abs() == 0.5));
            assert!(v.uv.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }
}
