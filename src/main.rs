//! Caustic Waves
//!
//! Renders the caustic pattern of light refracted through a wavy water
//! surface, one image per simulated time step.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use caustic_waves::config::SimulationConfig;
use caustic_waves::export::OutputFormat;
use caustic_waves::physics::SurfacePreset;
use caustic_waves::scheduler::{BatchScheduler, FileSink};

/// Caustic pattern renderer for a wavy water surface
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to JSON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Directory receiving the frames (created if missing)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// File name prefix of the frames
    #[arg(long)]
    prefix: Option<String>,

    /// Stop after this many frames (default: run until interrupted)
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Frames rendered concurrently per batch
    #[arg(short, long)]
    workers: Option<usize>,

    /// Floor grid width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Gray level added per ray landing
    #[arg(long)]
    brightness: Option<u32>,

    /// Surface shape
    #[arg(long, value_enum)]
    surface: Option<SurfacePreset>,

    /// Image format of the frames
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Also split each frame's rows across all cores
    #[arg(long)]
    row_parallel: bool,

    /// Where to write the configuration summary (default: <prefix>.txt)
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = if let Some(ref path) = args.config {
        match SimulationConfig::from_file(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path);
                cfg
            }
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                SimulationConfig::default()
            }
        }
    } else {
        SimulationConfig::default()
    };

    // CLI overrides
    if let Some(dir) = args.output_dir {
        config.render.output_dir = dir;
    }
    if let Some(prefix) = args.prefix {
        config.render.prefix = prefix;
    }
    if let Some(frames) = args.frames {
        config.scheduler.max_frames = Some(frames);
    }
    if let Some(workers) = args.workers {
        config.scheduler.max_workers = workers;
    }
    if let Some(width) = args.width {
        config.grid.width = width;
    }
    if let Some(brightness) = args.brightness {
        config.render.brightness = brightness;
    }
    if let Some(surface) = args.surface {
        config.waves.preset = surface;
    }
    if let Some(format) = args.format {
        config.render.format = format;
    }
    if args.row_parallel {
        config.scheduler.row_parallel = true;
    }

    if let Err(e) = config.validate() {
        log::error!("{}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = fs::create_dir_all(&config.render.output_dir) {
        log::error!(
            "Cannot create output directory '{}': {}",
            config.render.output_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let summary_path = args
        .summary
        .unwrap_or_else(|| PathBuf::from(format!("{}.txt", config.render.prefix)));
    match config.write_summary(&summary_path) {
        Ok(()) => log::info!("Configuration written to {}", summary_path.display()),
        Err(e) => log::warn!("{}", e),
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Interrupt received, finishing current batch");
        handler_stop.store(true, Ordering::SeqCst);
    }) {
        log::warn!("Failed to install interrupt handler: {}", e);
    }

    log::info!(
        "Starting render: {} surface, {}x{} floor, depth {}, into {}",
        config.waves.preset.name(),
        config.grid.width,
        config.grid.width,
        config.waves.depth,
        config.render.output_dir.display()
    );

    let sink = FileSink::from_config(&config);
    let scheduler = BatchScheduler::new(config);
    let summary = scheduler.run(&sink, &stop, |_| {});

    if summary.failed > 0 {
        log::error!("{} frames could not be rendered or written", summary.failed);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
