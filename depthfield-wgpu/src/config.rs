//! Pipeline configuration. `Default` values reproduce the reference scene:
//! a 6×6×6 cube grid seen from (0, 0, 150) with the CoC view previewed.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use depthfield_gpu_shared::coc::DepthOfFieldParams;
use depthfield_gpu_shared::shaders;
use glam::Vec3;

use crate::animator::Instance;

/// What the compositor writes to the output. Discriminants match the
/// `mode` field of `CompositeParams`.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OutputMode {
    #[default]
    Result = 0,
    Regions = 1,
    NearField = 2,
    FarField = 3,
    Packed = 4,
    CoC = 5,
}

impl OutputMode {
    pub const ALL: [OutputMode; 6] = [
        OutputMode::Result,
        OutputMode::Regions,
        OutputMode::NearField,
        OutputMode::FarField,
        OutputMode::Packed,
        OutputMode::CoC,
    ];

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputMode::Result => "result",
            OutputMode::Regions => "regions",
            OutputMode::NearField => "near",
            OutputMode::FarField => "far",
            OutputMode::Packed => "packed",
            OutputMode::CoC => "coc",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| {
                format!("unknown output mode '{s}' (expected result, regions, near, far, packed or coc)")
            })
    }
}

/// Surface corner the preview stack grows from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PreviewAnchor {
    #[default]
    BottomLeft,
    TopLeft,
    BottomRight,
    TopRight,
}

impl PreviewAnchor {
    pub fn name(self) -> &'static str {
        match self {
            PreviewAnchor::BottomLeft => "bottom-left",
            PreviewAnchor::TopLeft => "top-left",
            PreviewAnchor::BottomRight => "bottom-right",
            PreviewAnchor::TopRight => "top-right",
        }
    }

    pub fn is_right(self) -> bool {
        matches!(self, PreviewAnchor::BottomRight | PreviewAnchor::TopRight)
    }

    pub fn is_bottom(self) -> bool {
        matches!(self, PreviewAnchor::BottomLeft | PreviewAnchor::BottomRight)
    }
}

impl fmt::Display for PreviewAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PreviewAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "bottom-left" => Ok(PreviewAnchor::BottomLeft),
            "top-left" => Ok(PreviewAnchor::TopLeft),
            "bottom-right" => Ok(PreviewAnchor::BottomRight),
            "top-right" => Ok(PreviewAnchor::TopRight),
            _ => Err(format!("unknown preview anchor '{s}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PreviewConfig {
    /// Modes drawn as picture-in-picture previews, in stacking order.
    pub modes: Vec<OutputMode>,
    pub anchor: PreviewAnchor,
    /// Preview edge length as a fraction of the surface, in `[0, 1]`.
    pub size: f32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            modes: vec![OutputMode::CoC],
            anchor: PreviewAnchor::BottomLeft,
            size: 1.0 / 6.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    pub z_near: f32,
    pub z_far: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 150.0),
            target: Vec3::ZERO,
            z_near: 1.0,
            z_far: 500.0,
            fov_y: std::f32::consts::FRAC_PI_4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneLayout {
    /// `count³` cubes on a lattice, randomized from the scene seed.
    Grid { count: u32, spacing: f32, scale: f32 },
    /// Explicit instances, used as given.
    Instances(Vec<Instance>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub layout: SceneLayout,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            layout: SceneLayout::Grid {
                count: 6,
                spacing: 62.0,
                scale: 13.0,
            },
            seed: 7,
        }
    }
}

/// WGSL source for every stage. Each fullscreen fragment stage pairs with
/// the shared `fullscreen` vertex stage.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderSources {
    pub fullscreen: Cow<'static, str>,
    pub scene_vert: Cow<'static, str>,
    pub scene_frag: Cow<'static, str>,
    pub depth_resolve: Cow<'static, str>,
    pub coc_pack: Cow<'static, str>,
    pub blur_h: Cow<'static, str>,
    pub blur_v: Cow<'static, str>,
    pub composite: Cow<'static, str>,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            fullscreen: Cow::Borrowed(shaders::FULLSCREEN_VERT),
            scene_vert: Cow::Borrowed(shaders::SCENE_VERT),
            scene_frag: Cow::Borrowed(shaders::SCENE_FRAG),
            depth_resolve: Cow::Borrowed(shaders::DEPTH_RESOLVE_FRAG),
            coc_pack: Cow::Borrowed(shaders::DOF_COC_PACK_FRAG),
            blur_h: Cow::Borrowed(shaders::DOF_BLUR_H_FRAG),
            blur_v: Cow::Borrowed(shaders::DOF_BLUR_V_FRAG),
            composite: Cow::Borrowed(shaders::DOF_COMPOSITE_FRAG),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineConfig {
    pub dof: DepthOfFieldParams,
    pub camera: CameraConfig,
    pub scene: SceneConfig,
    pub shaders: ShaderSources,
    pub preview: PreviewConfig,
    pub output_mode: OutputMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_indices_match_shader() {
        for (i, mode) in OutputMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i as u32);
            assert_eq!(OutputMode::from_index(i as u32), Some(*mode));
        }
        assert_eq!(OutputMode::from_index(6), None);
    }

    #[test]
    fn test_output_mode_parses_names() {
        assert_eq!("CoC".parse::<OutputMode>(), Ok(OutputMode::CoC));
        assert_eq!(" near ".parse::<OutputMode>(), Ok(OutputMode::NearField));
        assert_eq!(OutputMode::FarField.to_string().parse::<OutputMode>(), Ok(OutputMode::FarField));
        assert!("bokeh".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_preview_anchor_parses_names() {
        assert_eq!("top_right".parse::<PreviewAnchor>(), Ok(PreviewAnchor::TopRight));
        assert_eq!("Bottom-Left".parse::<PreviewAnchor>(), Ok(PreviewAnchor::BottomLeft));
        assert!("middle".parse::<PreviewAnchor>().is_err());
    }

    #[test]
    fn test_defaults_match_reference_scene() {
        let config = PipelineConfig::default();
        assert_eq!(config.camera.position, Vec3::new(0.0, 0.0, 150.0));
        assert_eq!((config.camera.z_near, config.camera.z_far), (1.0, 500.0));
        assert_eq!(config.dof.near_sharp, 110.0);
        assert_eq!(config.dof.max_coc_radius, 15.0);
        assert_eq!(config.preview.modes, vec![OutputMode::CoC]);
        assert_eq!(config.preview.anchor, PreviewAnchor::BottomLeft);
        assert_eq!(config.output_mode, OutputMode::Result);
        assert!(matches!(config.scene.layout, SceneLayout::Grid { count: 6, .. }));
        assert!(config.shaders.composite.contains("fs_main"));
    }
}
