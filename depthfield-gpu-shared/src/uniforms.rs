use bytemuck::{Pod, Zeroable};

use crate::coc::DepthOfFieldParams;
use crate::kernel::{BlurKernel, KERNEL_WEIGHT_VEC4S};

/// Per-frame scene uniforms, bound at group 0 binding 0 of the scene pass.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    /// xyz = direction the light travels, w unused.
    pub light_dir: [f32; 4],
    pub time: f32,
    pub _pad1: f32,
    pub _pad2: f32,
    pub _pad3: f32,
}

/// Per-instance vertex data: model columns, normal matrix columns, tint.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub tint: [f32; 4],
}

/// Byte stride of [`InstanceRaw`] in the instance vertex buffer.
pub const INSTANCE_STRIDE: u64 = std::mem::size_of::<InstanceRaw>() as u64;

/// CoC pack pass parameters.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CoCParams {
    pub near_blurry: f32,
    pub near_sharp: f32,
    pub far_sharp: f32,
    pub far_blurry: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub _pad1: f32,
    pub _pad2: f32,
}

impl CoCParams {
    pub fn new(dof: &DepthOfFieldParams, z_near: f32, z_far: f32) -> Self {
        Self {
            near_blurry: dof.near_blurry,
            near_sharp: dof.near_sharp,
            far_sharp: dof.far_sharp,
            far_blurry: dof.far_blurry,
            z_near,
            z_far,
            _pad1: 0.0,
            _pad2: 0.0,
        }
    }
}

/// Separable blur parameters (one buffer per direction).
/// Weights are one-sided: `weights[k / 4][k % 4]` is the weight at offset ±k.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BlurParams {
    pub direction: [f32; 2],
    pub texel_size: [f32; 2],
    pub radius: i32,
    pub _pad0: i32,
    pub _pad1: i32,
    pub _pad2: i32,
    pub weights: [[f32; 4]; KERNEL_WEIGHT_VEC4S],
}

impl BlurParams {
    pub fn new(direction: [f32; 2], texel_size: [f32; 2], kernel: &BlurKernel) -> Self {
        Self {
            direction,
            texel_size,
            radius: kernel.radius() as i32,
            _pad0: 0,
            _pad1: 0,
            _pad2: 0,
            weights: kernel.packed_weights(),
        }
    }
}

/// Composite parameters. The viewport lets the same pass draw previews.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CompositeParams {
    pub mode: u32,
    pub _pad0: u32,
    pub viewport_origin: [f32; 2],
    pub viewport_size: [f32; 2],
    pub _pad1: [f32; 2],
}

impl CompositeParams {
    pub fn new(mode: u32, origin: [f32; 2], size: [f32; 2]) -> Self {
        Self {
            mode,
            _pad0: 0,
            viewport_origin: origin,
            viewport_size: size,
            _pad1: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sizes must match the WGSL struct layouts (16-byte aligned uniform blocks).
    #[test]
    fn test_uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 176);
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 128);
        assert_eq!(std::mem::size_of::<CoCParams>(), 32);
        assert_eq!(std::mem::size_of::<BlurParams>(), 160);
        assert_eq!(std::mem::size_of::<CompositeParams>(), 32);
    }

    #[test]
    fn test_blur_params_carry_kernel() {
        let kernel = BlurKernel::gaussian(3);
        let params = BlurParams::new([1.0, 0.0], [0.01, 0.02], &kernel);
        assert_eq!(params.radius, 3);
        assert_eq!(params.weights[0][0], kernel.weight(0));
        assert_eq!(params.weights[0][3], kernel.weight(3));
        assert_eq!(params.weights[1][0], 0.0);
    }
}
