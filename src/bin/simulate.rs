use std::path::PathBuf;

use clap::Parser;
use hft_matching_engine::{SimulationConfig, Simulator};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simulate", about = "Run the latency-aware double auction simulation")]
struct Args {
    /// JSON simulation config. Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    duration_secs: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Per-order processing delay in the inbound queue.
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Do not sleep between ticks.
    #[arg(long)]
    fast: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(duration_secs) = args.duration_secs {
        config.duration_secs = duration_secs;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(latency_ms) = args.latency_ms {
        config.engine.latency_ms = latency_ms;
    }
    if args.fast {
        config.realtime = false;
    }

    let simulator = Simulator::with_default_agents(config);
    let report = simulator.run().await;
    report.log();
    Ok(())
}
