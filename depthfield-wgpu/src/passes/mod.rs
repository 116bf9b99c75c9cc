//! Render passes of the depth-of-field pipeline, in execution order.

pub mod scene;
pub mod resolve;
pub mod coc_pack;
pub mod blur;
pub mod composite;
pub mod preview;
