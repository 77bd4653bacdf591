//! Pool lifecycle demo — every candidate healthy; shows startup fan-out,
//! least-loaded routing, disconnect accounting, and a clean exit.

use std::sync::Arc;
use std::time::Duration;

use minerelay_domain::PoolEndpoint;
use minerelay_pool::{ManagerConfig, RetryPolicy, UpSessionManager};
use minerelay_sim::{SimBehavior, SimConnector, SimDownSession};

// ---

pub async fn run(
    account: &str,
    endpoints: Vec<PoolEndpoint>,
    slots: usize,
    downstreams: usize,
) -> anyhow::Result<()> {
    // ---
    let sim = Arc::new(SimConnector::new());
    for ep in &endpoints {
        sim.set_behavior(&ep.name, SimBehavior::Authorize);
    }

    let config = ManagerConfig {
        account: account.to_string(),
        pools: endpoints,
        slots_per_account: slots,
        event_queue_capacity: 64,
        retry: RetryPolicy {
            init_failed_backoff_ms: 500,
            no_ready_slot_retry_ms: 300,
        },
    };
    config.validate()?;

    let (manager, handle) = UpSessionManager::new(config, sim.clone());
    let join = tokio::spawn(manager.run());

    wait_for(|| sim.sessions().len() == slots, "slots to come up").await?;
    // Let the ready events drain into the dispatcher before routing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("  {} slots ready", slots);

    // Route the downstream sessions; the balancer spreads them evenly.
    for _ in 0..downstreams {
        handle.submit_down_session(SimDownSession::new()).await?;
    }
    wait_for(
        || sim.sessions().iter().map(|s| s.assigned().len()).sum::<usize>() == downstreams,
        "downstream sessions to be routed",
    )
    .await?;

    for session in sim.sessions() {
        println!(
            "  slot {} ({}): {} miners",
            session.slot(),
            session.endpoint_name(),
            session.assigned().len(),
        );
    }

    // Miners leaving slot 0 tilts the next assignments toward it.
    handle.report_miner_disconnects(0, 2).await?;
    for _ in 0..2 {
        handle.submit_down_session(SimDownSession::new()).await?;
    }
    wait_for(
        || {
            sim.sessions().iter().map(|s| s.assigned().len()).sum::<usize>()
                == downstreams + 2
        },
        "replacement sessions to be routed",
    )
    .await?;
    println!(
        "  after 2 disconnects on slot 0, replacements went to slot 0: {} total there",
        sim.sessions()
            .iter()
            .find(|s| s.slot() == 0)
            .map(|s| s.assigned().len())
            .unwrap_or(0),
    );

    handle.request_exit().await?;
    join.await?;

    let exited = sim.sessions().iter().filter(|s| s.exited()).count();
    println!("  exit delivered to {exited}/{slots} sessions, manager stopped");

    Ok(())
}

// ---------------------------------------------------------------------------
// wait_for
// ---------------------------------------------------------------------------

/// Poll until `pred` holds; bail after two seconds.
async fn wait_for(mut pred: impl FnMut() -> bool, what: &str) -> anyhow::Result<()> {
    // ---
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if pred() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("timed out waiting for {what}")
}
