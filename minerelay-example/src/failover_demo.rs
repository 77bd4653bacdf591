//! Failover demo — only the last candidate is healthy; shows the ordered
//! candidate scan, the zero-delay broken-slot reconnect, and recovery from
//! full candidate exhaustion via the init-failure backoff.

use std::sync::Arc;
use std::time::Duration;

use minerelay_domain::PoolEndpoint;
use minerelay_pool::{ManagerConfig, RetryPolicy, UpSessionManager};
use minerelay_sim::{SimBehavior, SimConnector};

// ---

pub async fn run(account: &str, endpoints: Vec<PoolEndpoint>) -> anyhow::Result<()> {
    // ---
    let sim = Arc::new(SimConnector::new());

    // Everything dead except the last candidate: the scan has to walk the
    // whole list to find it.
    for ep in &endpoints {
        sim.set_behavior(&ep.name, SimBehavior::Unreachable);
    }
    let last = endpoints
        .last()
        .expect("main ensures a non-empty candidate list")
        .name
        .clone();
    sim.set_behavior(&last, SimBehavior::Authorize);

    let config = ManagerConfig {
        account: account.to_string(),
        pools: endpoints,
        slots_per_account: 1,
        event_queue_capacity: 64,
        retry: RetryPolicy {
            init_failed_backoff_ms: 400,
            no_ready_slot_retry_ms: 300,
        },
    };
    config.validate()?;

    let (manager, handle) = UpSessionManager::new(config, sim.clone());
    let join = tokio::spawn(manager.run());

    wait_for(|| sim.sessions().len() == 1, "first authorization").await?;
    println!(
        "  scanned {} candidates, bound to {}",
        sim.attempts().len(),
        sim.sessions()[0].endpoint_name(),
    );

    // A mid-operation disconnect reconnects with no backoff.
    handle.report_upstream_broken(0).await?;
    wait_for(|| sim.sessions().len() == 2, "immediate reconnect").await?;
    println!("  broken slot re-bound without delay");

    // Now the whole list goes dark: the scan exhausts, backs off, and keeps
    // cycling until the server returns.
    sim.set_behavior(&last, SimBehavior::Unreachable);
    let scans_before = sim.attempts().len();
    handle.report_upstream_broken(0).await?;

    tokio::time::sleep(Duration::from_millis(900)).await;
    println!(
        "  while dark: {} further candidate attempts (exhaustion + backoff retries)",
        sim.attempts().len() - scans_before,
    );

    sim.set_behavior(&last, SimBehavior::Authorize);
    wait_for(|| sim.sessions().len() == 3, "recovery after backoff").await?;
    println!("  recovered once the server came back");

    handle.request_exit().await?;
    join.await?;
    println!("  manager stopped");

    Ok(())
}

// ---------------------------------------------------------------------------
// wait_for
// ---------------------------------------------------------------------------

/// Poll until `pred` holds; bail after three seconds.
async fn wait_for(mut pred: impl FnMut() -> bool, what: &str) -> anyhow::Result<()> {
    // ---
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while tokio::time::Instant::now() < deadline {
        if pred() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("timed out waiting for {what}")
}
