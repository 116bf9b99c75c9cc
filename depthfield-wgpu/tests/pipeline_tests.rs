//! End-to-end tests against a real adapter. Each test returns early when the
//! machine has no usable GPU (or software rasterizer).

use std::borrow::Cow;

use depthfield_wgpu::render_targets::TargetKind;
use depthfield_wgpu::{
    DepthOfFieldPipeline, DofError, Instance, OutputMode, PipelineConfig, SceneConfig, SceneLayout,
};
use glam::Vec3;
use half::f16;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

/// One white cube at the origin, in focus at the default camera distance.
fn single_cube_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.scene = SceneConfig {
        layout: SceneLayout::Instances(vec![Instance::at(Vec3::ZERO, 13.0)]),
        seed: 0,
    };
    config.preview.modes.clear();
    config
}

/// `None` only when no adapter passes the capability check; every other
/// creation failure is a test failure.
fn headless(width: u32, height: u32, config: PipelineConfig) -> Option<DepthOfFieldPipeline> {
    match DepthOfFieldPipeline::new_headless(width, height, config) {
        Ok(pipeline) => Some(pipeline),
        Err(e @ DofError::NoCompatibleContext(_)) => {
            eprintln!("skipping: {e}");
            None
        }
        Err(e) => panic!("pipeline creation failed: {e}"),
    }
}

fn pixel(data: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}

fn linear_to_srgb8(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let s = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round() as u8
}

fn render_mode(pipeline: &mut DepthOfFieldPipeline, mode: OutputMode) -> Vec<u8> {
    pipeline.set_output_mode(mode);
    pipeline.tick(0.0).expect("tick");
    pipeline.read_output().expect("readback")
}

#[test]
fn test_in_focus_center_matches_sharp_color() {
    let Some(mut pipeline) = headless(WIDTH, HEIGHT, single_cube_config()) else {
        return;
    };
    let result = render_mode(&mut pipeline, OutputMode::Result);
    let packed = render_mode(&mut pipeline, OutputMode::Packed);

    let (cx, cy) = (WIDTH / 2, HEIGHT / 2);
    let center = pixel(&result, WIDTH, cx, cy);
    assert_eq!(center[..3], pixel(&packed, WIDTH, cx, cy)[..3]);
    assert!(center[..3].iter().any(|&c| c > 0), "center is black: {center:?}");
}

#[test]
fn test_packed_alpha_carries_coc() {
    let Some(mut pipeline) = headless(WIDTH, HEIGHT, single_cube_config()) else {
        return;
    };
    let packed = render_mode(&mut pipeline, OutputMode::Packed);

    // Cube face sits inside the sharp range; the cleared background is at
    // the far plane, fully in the far field.
    assert_eq!(pixel(&packed, WIDTH, WIDTH / 2, HEIGHT / 2)[3], 0);
    assert_eq!(pixel(&packed, WIDTH, 2, 2)[3], 255);
}

#[test]
fn test_coc_view_is_gray() {
    let Some(mut pipeline) = headless(WIDTH, HEIGHT, single_cube_config()) else {
        return;
    };
    let coc = render_mode(&mut pipeline, OutputMode::CoC);

    assert_eq!(pixel(&coc, WIDTH, WIDTH / 2, HEIGHT / 2), [0, 0, 0, 255]);
    assert_eq!(pixel(&coc, WIDTH, 2, 2), [255, 255, 255, 255]);
}

#[test]
fn test_resize_reallocates_once() {
    let Some(mut pipeline) = headless(320, 240, single_cube_config()) else {
        return;
    };
    let before = pipeline.target_generation();

    pipeline.on_resize(320, 240).expect("same size");
    assert_eq!(pipeline.target_generation(), before);

    pipeline.on_resize(641, 359).expect("resize");
    assert_eq!(pipeline.target_generation(), before + 1);
    assert_eq!(pipeline.size(), (641, 359));

    pipeline.on_resize(0, 0).expect("zero clamps");
    assert_eq!(pipeline.size(), (1, 1));
    pipeline.tick(16.0).expect("tick at 1x1");
}

#[test]
fn test_readback_is_tightly_packed() {
    let Some(mut pipeline) = headless(123, 45, single_cube_config()) else {
        return;
    };
    pipeline.tick(0.0).expect("tick");
    let pixels = pipeline.read_output().expect("readback");
    assert_eq!(pixels.len(), 123 * 45 * 4);
}

#[test]
fn test_previews_do_not_touch_center() {
    let Some(mut pipeline) = headless(WIDTH, HEIGHT, single_cube_config()) else {
        return;
    };
    let plain = render_mode(&mut pipeline, OutputMode::Result);
    pipeline.set_previews(&[OutputMode::CoC, OutputMode::Regions]);
    let with_previews = render_mode(&mut pipeline, OutputMode::Result);

    assert_eq!(pipeline.preview_modes(), &[OutputMode::CoC, OutputMode::Regions]);
    assert_eq!(
        pixel(&plain, WIDTH, WIDTH / 2, HEIGHT / 2),
        pixel(&with_previews, WIDTH, WIDTH / 2, HEIGHT / 2)
    );
    // Bottom-left preview shows the CoC view of the background.
    assert_eq!(pixel(&with_previews, WIDTH, 2, HEIGHT - 3), [255, 255, 255, 255]);
}

#[test]
fn test_empty_scene_renders() {
    let mut config = single_cube_config();
    config.scene.layout = SceneLayout::Instances(Vec::new());
    let Some(mut pipeline) = headless(64, 64, config) else {
        return;
    };
    assert_eq!(pipeline.instance_count(), 0);
    let result = render_mode(&mut pipeline, OutputMode::Result);
    assert!(result.chunks(4).all(|p| p[..3] == [0, 0, 0]));
}

#[test]
fn test_invalid_shader_fails_creation() {
    let mut config = single_cube_config();
    config.shaders.coc_pack = Cow::Borrowed("fn fs_main( -> {");
    match DepthOfFieldPipeline::new_headless(64, 64, config) {
        Err(DofError::ShaderCompile { stage, .. }) => assert!(stage.contains("CoC"), "{stage}"),
        Err(e @ DofError::NoCompatibleContext(_)) => eprintln!("skipping: {e}"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("invalid shader accepted"),
    }
}

#[test]
fn test_surface_pipeline_api_on_headless() {
    let Some(mut pipeline) = headless(64, 64, single_cube_config()) else {
        return;
    };
    pipeline.set_max_coc_radius(4.0);
    assert_eq!(pipeline.params().max_coc_radius, 4.0);
    assert!(pipeline.set_environment(2, 1, &[0; 4]).is_err());
    pipeline.set_environment(2, 1, &[255; 8]).expect("environment");
    pipeline.tick(0.0).expect("tick");
}

#[test]
fn test_packed_view_matches_packed_target() {
    let Some(mut pipeline) = headless(WIDTH, HEIGHT, single_cube_config()) else {
        return;
    };
    let result = render_mode(&mut pipeline, OutputMode::Result);
    let shown = render_mode(&mut pipeline, OutputMode::Packed);
    let (width, height, raw) = pipeline.read_target(TargetKind::Packed).expect("packed readback");
    assert_eq!((width, height), (WIDTH, HEIGHT));
    assert_eq!(raw.len(), (WIDTH * HEIGHT * 8) as usize);

    let texels: Vec<[f32; 4]> = raw
        .chunks_exact(8)
        .map(|t| {
            let channel = |i: usize| f16::from_le_bytes([t[2 * i], t[2 * i + 1]]).to_f32();
            [channel(0), channel(1), channel(2), channel(3)]
        })
        .collect();

    // Nothing in the scene is closer than the sharp range.
    assert!(texels.iter().all(|t| t[3] >= 0.0));

    let mut footprint = 0;
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let texel = texels[(y * WIDTH + x) as usize];
            let out = pixel(&shown, WIDTH, x, y);
            for c in 0..3 {
                let expected = linear_to_srgb8(texel[c]);
                assert!(out[c].abs_diff(expected) <= 1, "({x}, {y}) channel {c}: {out:?} vs {texel:?}");
            }
            let alpha = (texel[3].clamp(0.0, 1.0) * 255.0).round() as u8;
            assert!(out[3].abs_diff(alpha) <= 1, "({x}, {y}) alpha: {out:?} vs {texel:?}");

            if texel[3] == 0.0 {
                footprint += 1;
                assert_eq!(
                    pixel(&result, WIDTH, x, y)[..3],
                    out[..3],
                    "in-focus pixel ({x}, {y}) differs from the sharp colour"
                );
            }
        }
    }
    assert!(footprint > 0);
    let center = texels[(HEIGHT / 2 * WIDTH + WIDTH / 2) as usize];
    assert_eq!(center[3], 0.0);
}

#[test]
fn test_multisampled_target_cannot_be_read() {
    let Some(pipeline) = headless(64, 64, single_cube_config()) else {
        return;
    };
    assert!(matches!(
        pipeline.read_target(TargetKind::SceneColorMsaa),
        Err(DofError::Readback(_))
    ));
    let (width, height, _) = pipeline.read_target(TargetKind::BlurFar).expect("blur readback");
    assert_eq!((width, height), (32, 32));
}

#[test]
fn test_oversized_resize_keeps_previous_targets() {
    let Some(mut pipeline) = headless(320, 240, single_cube_config()) else {
        return;
    };
    let generation = pipeline.target_generation();
    let too_wide = pipeline.max_extent() + 1;

    match pipeline.on_resize(too_wide, 1) {
        Err(DofError::InvalidArgument(message)) => assert!(message.contains("size"), "{message}"),
        other => panic!("oversized resize accepted: {other:?}"),
    }
    assert_eq!(pipeline.size(), (320, 240));
    assert_eq!(pipeline.target_generation(), generation);

    pipeline.tick(16.0).expect("tick after rejected resize");
    assert_eq!(pipeline.read_output().expect("readback").len(), 320 * 240 * 4);
}

#[test]
fn test_oversized_environment_is_rejected() {
    let Some(mut pipeline) = headless(64, 64, single_cube_config()) else {
        return;
    };
    let too_wide = pipeline.max_extent() + 1;
    let rgba = vec![0u8; too_wide as usize * 4];

    assert!(matches!(
        pipeline.set_environment(too_wide, 1, &rgba),
        Err(DofError::InvalidArgument(_))
    ));
    pipeline.tick(0.0).expect("tick with previous environment");
}
