//! Embedded WGSL shader sources for the depth-of-field pipeline.
//! The backend receives these through its shader source set, so a host can
//! substitute its own text for any stage.

pub const FULLSCREEN_VERT: &str = include_str!("../shaders/fullscreen.wgsl");
pub const SCENE_VERT: &str = include_str!("../shaders/scene_vert.wgsl");
pub const SCENE_FRAG: &str = include_str!("../shaders/scene_frag.wgsl");
pub const DEPTH_RESOLVE_FRAG: &str = include_str!("../shaders/depth_resolve.wgsl");
pub const DOF_COC_PACK_FRAG: &str = include_str!("../shaders/dof_coc_pack.wgsl");
pub const DOF_BLUR_H_FRAG: &str = include_str!("../shaders/dof_blur_h.wgsl");
pub const DOF_BLUR_V_FRAG: &str = include_str!("../shaders/dof_blur_v.wgsl");
pub const DOF_COMPOSITE_FRAG: &str = include_str!("../shaders/dof_composite.wgsl");
