mod cli;

use std::fs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use depthfield_wgpu::DepthOfFieldPipeline;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = cli::Cli::parse();

    let mut pipeline = DepthOfFieldPipeline::new_headless(cli.width, cli.height, cli.pipeline_config())
        .context("failed to create depth-of-field pipeline")?;

    if let Some(path) = &cli.environment {
        let image = image::open(path)
            .with_context(|| format!("failed to read environment map {}", path.display()))?
            .to_rgba8();
        pipeline.set_environment(image.width(), image.height(), image.as_raw())?;
    }

    // The drag eases in over the simulated frames.
    if let Some(orbit) = &cli.orbit {
        let &[dx, dy] = orbit.as_slice() else {
            bail!("--orbit takes exactly two values");
        };
        let (cx, cy) = (cli.width as f32 * 0.5, cli.height as f32 * 0.5);
        pipeline.pointer_down(cx, cy);
        pipeline.pointer_move(cx + dx, cy + dy);
    }

    for elapsed in cli.frame_times() {
        pipeline.tick(elapsed)?;
    }
    pipeline.pointer_up();

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;

    let (width, height) = pipeline.size();
    let last = cli.frame_times().last().copied().unwrap_or(0.0);
    for &mode in &cli.modes {
        pipeline.set_output_mode(mode);
        // Same timestamp: re-renders the captured frame in another view.
        pipeline.tick(last)?;
        let pixels = pipeline.read_output()?;

        let path = cli.output.join(format!("dof_{}.png", mode.name()));
        image::save_buffer(&path, &pixels, width, height, image::ColorType::Rgba8)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("Wrote {}", path.display());
    }

    pipeline.destroy();
    Ok(())
}
