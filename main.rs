use clap::Parser;
use lm_accuracy::bench;
use lm_accuracy::config::{Args, BenchConfig};
use lm_accuracy::loader::CheckpointSource;
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = BenchConfig::from_args(Args::parse())?;
    let source = CheckpointSource::for_config(&config)?;

    info!("Starting accuracy benchmark for {}", config.checkpoint);
    bench::execute(&config, &source)?;
    info!("Benchmark finished");

    Ok(())
}
