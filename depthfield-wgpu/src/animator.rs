//! Instance transforms. Instances are created once and animated in place;
//! the raw arena is uploaded verbatim as the instance vertex buffer.

use std::f32::consts::TAU;

use depthfield_gpu_shared::uniforms::InstanceRaw;
use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{SceneConfig, SceneLayout};
use crate::frame::FrameState;

/// Axis the per-instance rotation rate spins about.
pub const ANIMATION_AXIS: Vec3 = Vec3::Y;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub translation: Vec3,
    /// Euler angles in radians, applied Y then X then Z.
    pub rotation: Vec3,
    /// Radians per second about [`ANIMATION_AXIS`].
    pub rotation_rate: f32,
    pub scale: Vec3,
    pub tint: Vec3,
}

impl Instance {
    /// Unrotated, static, white instance.
    pub fn at(translation: Vec3, scale: f32) -> Self {
        Self {
            translation,
            rotation: Vec3::ZERO,
            rotation_rate: 0.0,
            scale: Vec3::splat(scale),
            tint: Vec3::ONE,
        }
    }
}

/// `T · R(rotation + axis · elapsed · rate) · S`
pub fn pose(instance: &Instance, elapsed_secs: f32) -> Mat4 {
    let euler = instance.rotation + ANIMATION_AXIS * (elapsed_secs * instance.rotation_rate);
    let rotation = Quat::from_euler(EulerRot::YXZ, euler.y, euler.x, euler.z);
    Mat4::from_scale_rotation_translation(instance.scale, rotation, instance.translation)
}

fn to_raw(model: Mat4, tint: Vec3) -> InstanceRaw {
    let linear = Mat3::from_mat4(model);
    let normal = if linear.determinant().abs() > f32::EPSILON {
        linear.inverse().transpose()
    } else {
        Mat3::IDENTITY
    };
    InstanceRaw {
        model: model.to_cols_array_2d(),
        normal: [
            normal.x_axis.extend(0.0).to_array(),
            normal.y_axis.extend(0.0).to_array(),
            normal.z_axis.extend(0.0).to_array(),
        ],
        tint: tint.extend(1.0).to_array(),
    }
}

/// `count³` cubes on a lattice with `spacing` between centers. Cell indices
/// run from `-count / 2`, so even counts sit one cell off center.
pub fn grid_instances(count: u32, spacing: f32, scale: f32, seed: u64) -> Vec<Instance> {
    let mut rng = StdRng::seed_from_u64(seed);
    let side = count as usize;
    let offset = (side / 2) as i64;
    let Some((layer, total)) = side
        .checked_mul(side)
        .and_then(|layer| Some((layer, layer.checked_mul(side)?)))
    else {
        log::warn!("Grid of {count}³ instances overflows the instance count; scene left empty");
        return Vec::new();
    };

    (0..total)
        .map(|i| {
            let x = (i % side) as i64 - offset;
            let y = ((i % layer) / side) as i64 - offset;
            let z = (i / layer) as i64 - offset;
            Instance {
                translation: Vec3::new(x as f32, y as f32, z as f32) * spacing,
                rotation: Vec3::new(
                    rng.gen_range(0.0..TAU),
                    rng.gen_range(0.0..TAU),
                    rng.gen_range(0.0..TAU),
                ),
                rotation_rate: rng.gen_range(-0.8..0.8),
                scale: Vec3::splat(scale),
                tint: Vec3::new(
                    rng.gen_range(0.35..1.0),
                    rng.gen_range(0.35..1.0),
                    rng.gen_range(0.35..1.0),
                ),
            }
        })
        .collect()
}

pub struct InstanceAnimator {
    instances: Vec<Instance>,
    raw: Vec<InstanceRaw>,
}

impl InstanceAnimator {
    pub fn new(instances: Vec<Instance>) -> Self {
        let raw = instances
            .iter()
            .map(|instance| to_raw(pose(instance, 0.0), instance.tint))
            .collect();
        Self { instances, raw }
    }

    pub fn from_config(scene: &SceneConfig) -> Self {
        match &scene.layout {
            SceneLayout::Grid {
                count,
                spacing,
                scale,
            } => Self::new(grid_instances(*count, *spacing, *scale, scene.seed)),
            SceneLayout::Instances(instances) => Self::new(instances.clone()),
        }
    }

    /// Rewrite every raw entry for the frame's elapsed time.
    pub fn update(&mut self, frame: &FrameState) {
        let elapsed = frame.elapsed_secs();
        for (raw, instance) in self.raw.iter_mut().zip(&self.instances) {
            *raw = to_raw(pose(instance, elapsed), instance.tint);
        }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn raw(&self) -> &[InstanceRaw] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-4;

    fn approx_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    fn spinning(rate: f32) -> Instance {
        Instance {
            rotation_rate: rate,
            ..Instance::at(Vec3::new(10.0, -4.0, 2.0), 2.0)
        }
    }

    #[test]
    fn test_elapsed_zero_is_initial_pose() {
        let instance = Instance {
            rotation: Vec3::new(0.3, 1.2, -0.4),
            ..spinning(1.5)
        };
        let mut animator = InstanceAnimator::new(vec![instance]);
        let initial = animator.raw()[0];

        animator.update(&FrameState::default());
        assert_eq!(animator.raw()[0], initial);
        assert_eq!(initial.model, pose(&instance, 0.0).to_cols_array_2d());
    }

    #[test]
    fn test_rate_rotates_about_y() {
        let instance = spinning(FRAC_PI_2);
        let mut animator = InstanceAnimator::new(vec![instance]);
        let mut frame = FrameState::default();
        frame.advance(1000.0);
        animator.update(&frame);

        let model = Mat4::from_cols_array_2d(&animator.raw()[0].model);
        // A quarter turn about +Y takes +X to -Z; translation is untouched.
        let moved = model.transform_point3(Vec3::X) - instance.translation;
        assert!(approx_vec3(moved, Vec3::new(0.0, 0.0, -2.0)), "{moved:?}");
        let up = model.transform_vector3(Vec3::Y);
        assert!(approx_vec3(up, Vec3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn test_normal_matrix_undoes_scale() {
        let instance = Instance {
            scale: Vec3::new(2.0, 4.0, 1.0),
            ..Instance::at(Vec3::ZERO, 1.0)
        };
        let raw = InstanceAnimator::new(vec![instance]).raw()[0];
        assert!((raw.normal[0][0] - 0.5).abs() < EPSILON);
        assert!((raw.normal[1][1] - 0.25).abs() < EPSILON);
        assert_eq!(raw.tint, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_grid_layout_and_seed() {
        let grid = grid_instances(6, 62.0, 13.0, 7);
        assert_eq!(grid.len(), 216);
        assert_eq!(grid[0].translation, Vec3::splat(-3.0 * 62.0));
        assert_eq!(grid[215].translation, Vec3::splat(2.0 * 62.0));
        assert_eq!(grid[1].translation, Vec3::new(-2.0 * 62.0, -186.0, -186.0));
        assert!(grid.iter().all(|i| i.scale == Vec3::splat(13.0)));

        assert_eq!(grid, grid_instances(6, 62.0, 13.0, 7));
        assert_ne!(grid, grid_instances(6, 62.0, 13.0, 8));
    }

    #[test]
    fn test_oversized_grid_is_empty() {
        assert!(grid_instances(u32::MAX, 62.0, 13.0, 7).is_empty());
        assert!(grid_instances(0, 62.0, 13.0, 7).is_empty());
        assert_eq!(grid_instances(1, 62.0, 13.0, 7)[0].translation, Vec3::ZERO);
    }

    #[test]
    fn test_from_config_uses_explicit_instances() {
        let scene = SceneConfig {
            layout: SceneLayout::Instances(vec![Instance::at(Vec3::ZERO, 13.0)]),
            seed: 0,
        };
        let animator = InstanceAnimator::from_config(&scene);
        assert_eq!(animator.len(), 1);
        assert_eq!(animator.instances()[0].translation, Vec3::ZERO);

        let grid = InstanceAnimator::from_config(&SceneConfig::default());
        assert_eq!(grid.raw().len(), 216);
    }
}
