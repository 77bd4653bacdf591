//! minerelay demo runner.
//!
//! Drives a full [`UpSessionManager`] lifecycle over the in-process
//! simulator: staggered authorization, downstream routing and balancing,
//! a broken slot with immediate reconnect, and a clean exit.
//!
//! Run with:
//!   cargo run -p minerelay-example
//!   cargo run -p minerelay-example -- --slots 4 --downstreams 12
//!   cargo run -p minerelay-example -- --pools pools.json
//!
//! The optional pools file is a JSON array of candidates:
//!   [{ "name": "eu-1", "host": "pool.example.com", "port": 3333 }, ...]
//!
//! [`UpSessionManager`]: minerelay_pool::UpSessionManager

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use minerelay_domain::PoolEndpoint;

mod failover_demo;
mod pool_demo;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(
    name = "minerelay-example",
    about = "minerelay up-session pool demo runner"
)]
struct Config {
    // ---
    /// Account name the simulated connections authorize as.
    #[arg(long, default_value = "worker.demo")]
    account: String,

    /// Upstream slots to keep alive.
    #[arg(long, default_value_t = 3)]
    slots: usize,

    /// Downstream sessions to route in the balancing demo.
    #[arg(long, default_value_t = 8)]
    downstreams: usize,

    /// JSON file with the candidate list; built-in endpoints when omitted.
    #[arg(long)]
    pools: Option<PathBuf>,
}

// ---

impl Config {
    fn endpoints(&self) -> anyhow::Result<Vec<PoolEndpoint>> {
        // ---
        match &self.pools {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                let pools: Vec<PoolEndpoint> = serde_json::from_str(&raw)?;
                anyhow::ensure!(!pools.is_empty(), "pools file {} is empty", path.display());
                Ok(pools)
            }
            None => Ok(vec![
                PoolEndpoint::new("eu-1", "pool-eu.example.com", 3333),
                PoolEndpoint::new("us-1", "pool-us.example.com", 3333),
                PoolEndpoint::new("ap-1", "pool-ap.example.com", 3333),
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    let cfg = Config::parse();

    let no_color = std::env::var("EMACS").is_ok()
        || std::env::var("NO_COLOR").is_ok()
        || std::env::var("CARGO_TERM_COLOR").as_deref() == Ok("never")
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::fmt()
        .with_target(false)
        .without_time()
        .with_ansi(!no_color)
        .init();

    let endpoints = cfg.endpoints()?;

    println!("=== 1. Pool lifecycle & balancing demo ===");
    pool_demo::run(&cfg.account, endpoints.clone(), cfg.slots, cfg.downstreams).await?;

    println!();
    println!("=== 2. Failover & recovery demo ===");
    failover_demo::run(&cfg.account, endpoints).await?;

    Ok(())
}
