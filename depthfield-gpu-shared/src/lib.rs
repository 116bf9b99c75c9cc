//! Data shared between the depth-of-field GPU backend and its host tools:
//! uniform layouts, embedded WGSL, and the CPU definitions of the CoC and
//! blur kernel the shaders implement.

pub mod coc;
pub mod kernel;
pub mod shaders;
pub mod uniforms;
