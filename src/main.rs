mod core;
mod input;
mod output;
mod playback;

use std::time::Duration;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;

use crate::output::{FrameSink, JsonLinesSink};
use crate::playback::{PlaybackConfig, PlaybackEngine};

/// Replay a recorded aircraft track log at an adjustable virtual speed
#[derive(Parser, Debug)]
#[command(name = "trackplay", version, about)]
struct Args {
    /// Track log file (JSON array or CSV)
    log: String,

    /// Initial playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Tick interval in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Write frames to this file instead of stdout
    #[arg(long)]
    output: Option<String>,

    /// Smoothing blend factor (0-1); omit to emit samples unchanged
    #[arg(long)]
    smoothing: Option<f64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let log = input::load_or_empty(&args.log);

    let config = PlaybackConfig {
        tick_interval: Duration::from_millis(args.tick_ms),
        smoothing_factor: args.smoothing,
        ..PlaybackConfig::default()
    };

    let sink: Box<dyn FrameSink> = match &args.output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output file {}", path))?;
            Box::new(JsonLinesSink::new(file))
        }
        None => Box::new(JsonLinesSink::stdout()),
    };

    let engine = PlaybackEngine::new(log, config, sink);
    engine.set_speed(args.speed).await?;
    engine.start().await;

    let runner = engine.clone();
    tokio::spawn(async move {
        runner.run().await;
    });

    signal::ctrl_c().await?;
    info!("Shutting down");
    engine.stop().await;

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
