//! Terrain Collider Testbed
//!
//! Runs the collider pipeline headless against a procedural world and
//! reports pipeline statistics. Use `RUST_LOG=debug` for per-section detail.

use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use terrain_testbed::config::TestbedConfig;
use terrain_testbed::Testbed;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Terrain Collider Testbed
#[derive(Parser)]
#[command(name = "terrain-testbed")]
#[command(about = "Streams a procedural world through the terrain collider pipeline")]
struct Args {
    /// TOML config file with [world], [pipeline] and [simulation] tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u64,

    /// Streaming radius in sections (overrides the config file)
    #[arg(short, long)]
    radius: Option<i32>,

    /// Directory for collision region files (overrides the config file)
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TestbedConfig::load(path)?,
        None => TestbedConfig::default(),
    };
    if let Some(radius) = args.radius {
        config.world.radius = radius;
    }
    if let Some(dir) = args.store_dir {
        std::fs::create_dir_all(&dir)?;
        config.pipeline.store_dir = Some(dir);
    }

    let mut testbed = Testbed::new(config)?;
    let started = Instant::now();
    testbed.stream();
    if !testbed.settle(Duration::from_secs(30)) {
        warn!("initial terrain still generating after 30s");
    }
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "initial terrain ready");

    let report = testbed.run(args.frames);
    testbed.shutdown();

    info!(
        frames = report.frames,
        sections = report.loaded_sections,
        balls = report.balls,
        balls_above_ground = report.balls_above_ground,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run finished"
    );
    let stats = report.stats;
    println!("frames:      {}", report.frames);
    println!("sections:    {}", report.loaded_sections);
    println!("balls:       {} ({} above ground)", report.balls, report.balls_above_ground);
    println!("dispatched:  {}", stats.dispatched);
    println!("generated:   {}", stats.generated);
    println!("cache hits:  {}", stats.cache_hits);
    println!("store hits:  {}", stats.store_hits);
    println!("unchanged:   {}", stats.unchanged);
    println!("empty:       {}", stats.empty);
    println!("stale:       {}", stats.stale);
    println!("dropped:     {}", stats.dropped);
    println!("failures:    {}", stats.failures);
    println!("commands:    {}", stats.commands);

    Ok(())
}
