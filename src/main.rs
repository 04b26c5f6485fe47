mod app;
mod config;
mod error;
mod input;
mod kernels;
mod render;
mod surface;

use anyhow::{Context, Result};
use clap::Parser;
use kernels::life::{parse_rule, RuleSet};
use kernels::video::Ramp;
use kernels::KernelKind;
use log::info;
use std::{fs::OpenOptions, path::Path, path::PathBuf};

#[derive(Parser, Debug)]
#[command(name = "glyphscape")]
#[command(about = "Glyph animations for the terminal: video as text, digital rain, Life and fire")]
struct Cli {
    /// Kernel to start in
    #[arg(long, value_enum)]
    mode: Option<KernelKind>,

    /// GIF, still image or directory of stills for the video kernel
    #[arg(long)]
    video: Option<PathBuf>,

    /// Brightness ramp for the video kernel
    #[arg(long, value_enum)]
    ramp: Option<Ramp>,

    /// Frame rate cap
    #[arg(long)]
    fps: Option<u32>,

    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Life rule in B../S.. notation (B36/S23) or a preset name (HighLife)
    #[arg(long, value_parser = parse_rule)]
    rule: Option<RuleSet>,

    /// Initial Life density, 0.01-0.5
    #[arg(long)]
    density: Option<f32>,

    /// Start with the status line hidden
    #[arg(long, default_value_t = false)]
    no_hud: bool,

    /// Do not write settings back on exit
    #[arg(long, default_value_t = false)]
    no_save: bool,

    /// Log destination (default: glyphscape.log in the data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print one frame of COLSxROWS[:FRAMES] to stdout instead of animating
    #[arg(long)]
    snapshot: Option<app::SnapshotPlan>,
}

impl Cli {
    fn apply(&self, settings: &mut config::Settings) {
        if let Some(mode) = self.mode {
            settings.start_mode = mode;
        }
        if let Some(path) = &self.video {
            settings.video.source = Some(path.clone());
        }
        if let Some(ramp) = self.ramp {
            settings.video.ramp = ramp;
        }
        if let Some(fps) = self.fps {
            settings.fps_cap = fps;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if let Some(rules) = self.rule {
            settings.life.rules = rules;
        }
        if let Some(density) = self.density {
            settings.life.set_density(density);
        }
        if self.no_hud {
            settings.hud = false;
        }
    }
}

fn init_logging(path: &Path) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = config::project_paths()?;
    init_logging(cli.log_file.as_deref().unwrap_or(&paths.log_path))?;
    info!("starting glyphscape");

    let mut settings = config::load_settings(&paths.settings_path);
    cli.apply(&mut settings);

    if let Some(plan) = cli.snapshot {
        println!("{}", app::snapshot(settings.start_mode, plan, &settings));
        return Ok(());
    }

    let save_to = (!cli.no_save).then(|| paths.settings_path.clone());
    app::run(settings, save_to)
}
