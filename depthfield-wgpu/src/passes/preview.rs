//! Picture-in-picture previews of intermediate targets.
//!
//! Each selected mode is drawn by a fork of the composite pass into a
//! scissored rectangle. Rectangles stack away from the anchor corner and
//! the rest of the frame is loaded, not cleared.

use depthfield_gpu_shared::uniforms::CompositeParams;

use crate::config::{OutputMode, PreviewAnchor, PreviewConfig};
use crate::pipeline::{FullscreenPass, PixelRect, Samplers};
use crate::passes::composite::Compositor;
use crate::render_targets::RenderTargetPool;

/// Rectangles for `count` previews of `fraction × surface` each. Stops early
/// rather than overlap or leave the surface.
pub fn preview_rects(
    surface: (u32, u32),
    anchor: PreviewAnchor,
    fraction: f32,
    count: usize,
) -> Vec<PixelRect> {
    let (surface_w, surface_h) = surface;
    if count == 0 || surface_w == 0 || surface_h == 0 || !(fraction > 0.0) {
        return Vec::new();
    }
    let fraction = fraction.min(1.0);
    let width = ((surface_w as f32 * fraction).floor() as u32).clamp(1, surface_w);
    let height = ((surface_h as f32 * fraction).floor() as u32).clamp(1, surface_h);
    let fits = (surface_h / height) as usize;

    let x = if anchor.is_right() { surface_w - width } else { 0 };
    (0..count.min(fits) as u32)
        .map(|i| {
            let y = if anchor.is_bottom() {
                surface_h - (i + 1) * height
            } else {
                i * height
            };
            PixelRect { x, y, width, height }
        })
        .collect()
}

pub struct PreviewOverlay {
    slots: Vec<FullscreenPass>,
    modes: Vec<OutputMode>,
    anchor: PreviewAnchor,
    fraction: f32,
}

impl PreviewOverlay {
    pub fn new(device: &wgpu::Device, config: &PreviewConfig, compositor: &Compositor) -> Self {
        let mut overlay = Self {
            slots: Vec::new(),
            modes: Vec::new(),
            anchor: config.anchor,
            fraction: config.size.clamp(0.0, 1.0),
        };
        overlay.set_modes(device, &config.modes, compositor);
        overlay
    }

    /// Replace the preview list. Slots are only ever added, so toggling
    /// previews does not rebuild passes.
    pub fn set_modes(&mut self, device: &wgpu::Device, modes: &[OutputMode], compositor: &Compositor) {
        while self.slots.len() < modes.len() {
            self.slots.push(compositor.fork_pass(device));
        }
        self.modes = modes.to_vec();
    }

    pub fn set_anchor(&mut self, anchor: PreviewAnchor) {
        self.anchor = anchor;
    }

    pub fn set_fraction(&mut self, fraction: f32) {
        self.fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    }

    pub fn modes(&self) -> &[OutputMode] {
        &self.modes
    }

    pub fn anchor(&self) -> PreviewAnchor {
        self.anchor
    }

    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        pool: &RenderTargetPool,
        samplers: &Samplers,
        view: &wgpu::TextureView,
        surface: (u32, u32),
    ) {
        if self.modes.is_empty() {
            return;
        }
        let rects = preview_rects(surface, self.anchor, self.fraction, self.modes.len());
        for ((mode, slot), rect) in self.modes.iter().zip(&self.slots).zip(rects) {
            let params = CompositeParams::new(
                mode.index(),
                [rect.x as f32, rect.y as f32],
                [rect.width as f32, rect.height as f32],
            );
            slot.write_params(queue, &params);
            slot.execute_into(device, encoder, pool, samplers, view, wgpu::LoadOp::Load, Some(rect));
        }
    }
}
