use std::path::PathBuf;

use clap::Parser;
use depthfield_wgpu::{OutputMode, PipelineConfig, PreviewAnchor, SceneLayout};

#[derive(Parser, Debug)]
#[command(
    name = "dfcli",
    about = "Render the depth-of-field demo scene offscreen and save each view as PNG",
    version
)]
pub struct Cli {
    /// Output width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,
    /// Output height in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Directory the PNGs are written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Views to write, one file each (result, regions, near, far, packed, coc)
    #[arg(short, long, value_delimiter = ',', default_value = "result")]
    pub modes: Vec<OutputMode>,

    /// Views drawn as picture-in-picture previews
    #[arg(long, value_delimiter = ',', default_value = "coc")]
    pub previews: Vec<OutputMode>,
    /// Disable previews entirely
    #[arg(long)]
    pub no_previews: bool,
    /// Corner the previews stack from
    #[arg(long, default_value = "bottom-left")]
    pub preview_anchor: PreviewAnchor,
    /// Preview edge length as a fraction of the output
    #[arg(long, default_value_t = 1.0 / 6.0)]
    pub preview_size: f32,

    /// Animation time of the captured frame, in milliseconds
    #[arg(long, default_value_t = 0.0)]
    pub time_ms: f64,
    /// Frames simulated before capturing, spread evenly up to --time-ms
    #[arg(long, default_value_t = 1)]
    pub frames: u32,

    /// Orbit drag applied before rendering, in pixels (dx,dy)
    #[arg(long, value_delimiter = ',', num_args = 2, allow_negative_numbers = true)]
    pub orbit: Option<Vec<f32>>,

    #[arg(long, default_value_t = 40.0)]
    pub near_blurry: f32,
    #[arg(long, default_value_t = 110.0)]
    pub near_sharp: f32,
    #[arg(long, default_value_t = 200.0)]
    pub far_sharp: f32,
    #[arg(long, default_value_t = 280.0)]
    pub far_blurry: f32,
    /// Largest blur radius in full-resolution pixels
    #[arg(long, default_value_t = 15.0)]
    pub max_coc_radius: f32,

    /// Cubes per grid axis
    #[arg(long, default_value_t = 6)]
    pub grid: u32,
    /// Seed for cube rotations and tints
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Equirectangular environment map (PNG)
    #[arg(long)]
    pub environment: Option<PathBuf>,
}

impl Cli {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.dof.near_blurry = self.near_blurry;
        config.dof.near_sharp = self.near_sharp;
        config.dof.far_sharp = self.far_sharp;
        config.dof.far_blurry = self.far_blurry;
        config.dof.max_coc_radius = self.max_coc_radius;

        if let SceneLayout::Grid { count, .. } = &mut config.scene.layout {
            *count = self.grid;
        }
        config.scene.seed = self.seed;

        config.preview.modes = if self.no_previews {
            Vec::new()
        } else {
            self.previews.clone()
        };
        config.preview.anchor = self.preview_anchor;
        config.preview.size = self.preview_size;
        config
    }

    /// Timestamps of the simulated frames; the last one is `time_ms`.
    pub fn frame_times(&self) -> Vec<f64> {
        let frames = self.frames.max(1);
        (1..=frames)
            .map(|i| self.time_ms * i as f64 / frames as f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_defaults() {
        let cli = Cli::parse_from(["dfcli"]);
        let config = cli.pipeline_config();
        assert_eq!(config.dof, PipelineConfig::default().dof);
        assert_eq!(config.scene, PipelineConfig::default().scene);
        assert_eq!(config.preview.modes, vec![OutputMode::CoC]);
        assert_eq!(cli.modes, vec![OutputMode::Result]);
    }

    #[test]
    fn test_parses_mode_lists() {
        let cli = Cli::parse_from(["dfcli", "-m", "result,coc,packed", "--no-previews", "--grid", "3"]);
        assert_eq!(cli.modes, vec![OutputMode::Result, OutputMode::CoC, OutputMode::Packed]);
        let config = cli.pipeline_config();
        assert!(config.preview.modes.is_empty());
        assert!(matches!(config.scene.layout, SceneLayout::Grid { count: 3, .. }));
    }

    #[test]
    fn test_parses_orbit_and_anchor() {
        let cli = Cli::parse_from(["dfcli", "--orbit=-40,12.5", "--preview-anchor", "top_right"]);
        assert_eq!(cli.orbit, Some(vec![-40.0, 12.5]));
        assert_eq!(cli.preview_anchor, PreviewAnchor::TopRight);
    }

    #[test]
    fn test_frame_times_end_at_capture_time() {
        let cli = Cli::parse_from(["dfcli", "--time-ms", "1000", "--frames", "4"]);
        assert_eq!(cli.frame_times(), vec![250.0, 500.0, 750.0, 1000.0]);
        let single = Cli::parse_from(["dfcli", "--frames", "0"]);
        assert_eq!(single.frame_times(), vec![0.0]);
    }
}
