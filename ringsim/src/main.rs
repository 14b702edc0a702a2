//! ringsim - run the scripted ring DHT demo.

use anyhow::{ensure, Result};
use clap::Parser;
use ringsim::{demo_scenario, Duration, LatencyRange};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ringsim")]
#[command(about = "Simulate a self-organizing ring DHT")]
struct Cli {
    /// Number of peers in the network
    #[arg(long, default_value_t = 10)]
    peers: usize,

    /// Seed for every random choice in the run
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Smallest packet delay, in ticks
    #[arg(long, default_value_t = ringdht::config::DEFAULT_MIN_DELAY)]
    min_delay: u64,

    /// Largest packet delay (exclusive), in ticks
    #[arg(long, default_value_t = ringdht::config::DEFAULT_MAX_DELAY)]
    max_delay: u64,

    /// Stop after this many events even if the queue is not empty
    #[arg(long, default_value_t = 1_000_000)]
    max_events: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    ensure!(cli.peers > 0, "need at least one peer");
    ensure!(
        cli.min_delay <= cli.max_delay,
        "--min-delay ({}) must not exceed --max-delay ({})",
        cli.min_delay,
        cli.max_delay
    );

    let latency = LatencyRange::new(
        Duration::from_ticks(cli.min_delay),
        Duration::from_ticks(cli.max_delay),
    );
    info!(peers = cli.peers, seed = cli.seed, min_delay = cli.min_delay, max_delay = cli.max_delay, "starting simulation");

    let (mut sim, _) = demo_scenario(cli.peers, cli.seed, latency).build();
    let result = sim.run_until_idle(cli.max_events);

    println!("Final ring: {}", result.final_ring());
    println!(
        "Consistent: {} ({} active peers)",
        result.consistent(),
        result.final_active_count()
    );
    for record in sim.get_results() {
        match &record.result {
            Some(lookup) => match lookup.value() {
                Some(value) => println!(
                    "For key `{}`, got: {}",
                    record.key,
                    String::from_utf8_lossy(value)
                ),
                None => println!("For key `{}`, got: nothing", record.key),
            },
            None => println!("For key `{}`, no answer", record.key),
        }
    }
    println!(
        "Packets: {} scheduled, {} delivered, {} rejected; {} ticks; queue {}",
        result.metrics.packets_scheduled,
        result.metrics.packets_delivered,
        result.metrics.packets_rejected,
        result.end_time.as_ticks(),
        if result.queue_exhausted { "drained" } else { "not drained" },
    );
    Ok(())
}
