//! [`UpSessionManager`] — keeps a fixed pool of up-session slots alive and
//! spreads downstream sessions across the healthy ones.
//!
//! # Shape
//!
//! One manager per account. All slot state lives behind a single event loop:
//!
//! ```text
//! connect tasks ──┐
//! retry timers ───┤  mpsc (bounded)          UpSessionManager
//! handle (API) ───┼──────────────────► handle_events() ──► slots[..]
//! up-sessions ────┘                     (sole consumer)
//! ```
//!
//! Connection attempts, retry timers, and external callers never touch the
//! slot array — they only enqueue [`ManagerEvent`] values. The dispatcher is
//! the one writer, so slot state needs no lock.
//!
//! # Retry policy
//!
//! - Every candidate failed during an attempt: retry the whole scan after
//!   [`RetryPolicy::init_failed_backoff`] (systemic problem, slow down).
//! - A live connection broke: reconnect with no delay (transient, retry
//!   fast).
//! - No ready slot for an incoming downstream session: re-deliver the same
//!   event after [`RetryPolicy::no_ready_slot_retry`].
//!
//! None of these give up. A slot that can never connect keeps cycling and
//! keeps logging; shutdown is the only terminal state.

use std::sync::Arc;
use std::time::Duration;

// ---

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ---

use minerelay_domain::{
    //
    AuthOutcome,
    DownSessionPtr,
    PoolEndpoint,
    RelayError,
    Result,
    UpSessionConnector,
    UpSessionEvent,
    UpSessionPtr,
};

// ---

use super::{ManagerConfig, RetryPolicy};

// ---------------------------------------------------------------------------
// ManagerEvent
// ---------------------------------------------------------------------------

/// Everything that can change manager state, as a value.
///
/// Slot indices inside `UpSessionReady` / `UpSessionInitFailed` are produced
/// only by the manager's own connect tasks and are valid by construction.
/// `UpSessionBroken` and `UpdateMinerNum` carry indices reported from
/// outside and are range-checked at the handler.
pub enum ManagerEvent {
    // ---
    /// A connect task authorized a session for `slot`.
    UpSessionReady { slot: usize, session: UpSessionPtr },

    /// A connect task exhausted every candidate for `slot`.
    UpSessionInitFailed { slot: usize },

    /// The session bound to `slot` reported itself unusable.
    UpSessionBroken { slot: usize },

    /// Route a downstream session to the least-loaded ready slot.
    AddDownSession { down: DownSessionPtr },

    /// `disconnected` miners left `slot` since its last report.
    UpdateMinerNum { slot: usize, disconnected: u64 },

    /// Fan an exit out to every bound session, then stop the loop.
    Exit,
}

// ---------------------------------------------------------------------------
// UpSlot
// ---------------------------------------------------------------------------

/// One upstream-connection capacity. Index into the slot array is the
/// slot's stable identity; events correlate by it.
#[derive(Default)]
struct UpSlot {
    // ---
    /// Downstream sessions currently routed here. Advisory load signal:
    /// incremented optimistically on assignment, decremented by disconnect
    /// reports applied unchecked, so transient drift — including negative
    /// values — is tolerated.
    miner_num: i64,

    /// Bound up-session. `None` while (re)connecting. A slot is ready
    /// exactly when this is present.
    session: Option<UpSessionPtr>,
}

// ---

impl UpSlot {
    fn is_ready(&self) -> bool {
        self.session.is_some()
    }
}

// ---------------------------------------------------------------------------
// UpSessionManager
// ---------------------------------------------------------------------------

pub struct UpSessionManager {
    // ---
    account: String,

    /// Shared read-only across all connect tasks.
    candidates: Arc<[PoolEndpoint]>,

    connector: Arc<dyn UpSessionConnector>,

    /// Fixed length for the manager's lifetime; indices are stable.
    slots: Vec<UpSlot>,

    retry: RetryPolicy,

    /// Kept for handing to connect tasks and retry timers.
    event_tx: mpsc::Sender<ManagerEvent>,

    event_rx: mpsc::Receiver<ManagerEvent>,
}

// ---

impl UpSessionManager {
    // ---
    /// Build a manager and its producer handle. Call [`run`](Self::run) to
    /// start it; nothing connects until then.
    pub fn new(
        config: ManagerConfig,
        connector: Arc<dyn UpSessionConnector>,
    ) -> (Self, UpSessionManagerHandle) {
        // ---
        let (event_tx, event_rx) = mpsc::channel(config.event_queue_capacity);

        let mut slots = Vec::with_capacity(config.slots_per_account);
        slots.resize_with(config.slots_per_account, UpSlot::default);

        let manager = Self {
            account: config.account,
            candidates: config.pools.into(),
            connector,
            slots,
            retry: config.retry,
            event_tx: event_tx.clone(),
            event_rx,
        };

        (manager, UpSessionManagerHandle { tx: event_tx })
    }

    // ---

    /// Launch one connection attempt per slot, then dispatch events until
    /// exit. Spawn with `tokio::spawn`; the future resolves only when the
    /// manager's lifetime ends.
    pub async fn run(mut self) {
        // ---
        info!(
            account = %self.account,
            slots = self.slots.len(),
            candidates = self.candidates.len(),
            "up-session manager starting",
        );

        for slot in 0..self.slots.len() {
            self.spawn_connect(slot, Duration::ZERO);
        }

        self.handle_events().await;
    }

    // ---

    /// Detached task: wait `delay`, then scan the candidate list for `slot`.
    ///
    /// The task mutates nothing — success or exhaustion comes back through
    /// the event queue. Safe to have several in flight for the same slot;
    /// the dispatcher serializes whatever they produce.
    fn spawn_connect(&self, slot: usize, delay: Duration) {
        // ---
        let connector = Arc::clone(&self.connector);
        let candidates = Arc::clone(&self.candidates);
        let account = self.account.clone();
        let events = self.event_tx.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            connect(connector, account, candidates, slot, events).await;
        });
    }

    // ---

    /// The single consumer. Events are handled strictly in arrival order;
    /// the loop returns after processing [`ManagerEvent::Exit`], dropping
    /// the receiver so anything still queued behind it is discarded.
    async fn handle_events(&mut self) {
        // ---
        while let Some(event) = self.event_rx.recv().await {
            match event {
                ManagerEvent::UpSessionReady { slot, session } => {
                    self.up_session_ready(slot, session);
                }
                ManagerEvent::UpSessionInitFailed { slot } => {
                    self.up_session_init_failed(slot);
                }
                ManagerEvent::UpSessionBroken { slot } => {
                    self.up_session_broken(slot);
                }
                ManagerEvent::AddDownSession { down } => {
                    self.add_down_session(down).await;
                }
                ManagerEvent::UpdateMinerNum { slot, disconnected } => {
                    self.update_miner_num(slot, disconnected);
                }
                ManagerEvent::Exit => {
                    self.exit().await;
                    return;
                }
            }
        }

        // All senders dropped without an exit event; nothing left to do.
        info!(account = %self.account, "event queue closed, manager exiting");
    }

    // ---

    /// Bind an authorized session into its slot.
    ///
    /// A stale retry can race a live binding here; the newer session wins
    /// and the old reference is abandoned (it winds itself down).
    fn up_session_ready(&mut self, slot: usize, session: UpSessionPtr) {
        // ---
        info!(account = %self.account, slot, "pool connection ready");
        let info = &mut self.slots[slot];
        info.session = Some(session);
    }

    // ---

    /// Every candidate failed for this slot: schedule a full re-scan after
    /// the configured backoff. Exhausting the whole list is treated as a
    /// configuration problem, unlike a single broken connection.
    fn up_session_init_failed(&mut self, slot: usize) {
        // ---
        let backoff = self.retry.init_failed_backoff();
        error!(
            account = %self.account,
            slot,
            candidates = self.candidates.len(),
            "failed to connect to all pool servers, check your configuration; retrying in {backoff:?}",
        );
        self.spawn_connect(slot, backoff);
    }

    // ---

    /// A bound session became unusable: drop the binding and reconnect with
    /// no delay. A mid-operation disconnect is treated as transient, unlike
    /// full candidate exhaustion.
    fn up_session_broken(&mut self, slot: usize) {
        // ---
        let Some(info) = self.slots.get_mut(slot) else {
            error!(slot, "broken report for unknown slot, dropped");
            return;
        };

        info.session = None;
        warn!(account = %self.account, slot, "pool connection broken, reconnecting");
        self.spawn_connect(slot, Duration::ZERO);
    }

    // ---

    /// Route one downstream session to the ready slot with the fewest
    /// miners, first slot winning ties. With no ready slot, the event is
    /// re-delivered unchanged after a fixed delay — never dropped, however
    /// long readiness takes.
    async fn add_down_session(&mut self, down: DownSessionPtr) {
        // ---
        let mut selected: Option<usize> = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            if !slot.is_ready() {
                continue;
            }
            // Strict `<` keeps the earliest slot on ties.
            if selected.map_or(true, |best| slot.miner_num < self.slots[best].miner_num) {
                selected = Some(idx);
            }
        }

        let Some(idx) = selected else {
            let delay = self.retry.no_ready_slot_retry();
            warn!(
                down = %down.id(),
                "no ready pool connection for downstream session, retrying in {delay:?}",
            );
            let events = self.event_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // Dropped silently if the manager exited in the meantime.
                let _ = events.send(ManagerEvent::AddDownSession { down }).await;
            });
            return;
        };

        // Selection only yields ready slots, so the binding is present.
        if let Some(session) = self.slots[idx].session.clone() {
            debug!(down = %down.id(), slot = idx, "routing downstream session");
            if let Err(e) = session
                .deliver(UpSessionEvent::AssignDownSession(down))
                .await
            {
                warn!(slot = idx, "assignment delivery failed: {e}");
            }
        }

        // Optimistic accounting: counted as routed before the up-session
        // confirms anything. Disconnect reports reconcile later.
        self.slots[idx].miner_num += 1;
    }

    // ---

    /// Apply a disconnect report. No floor: a report larger than the
    /// current count drives `miner_num` negative and is accepted as-is.
    fn update_miner_num(&mut self, slot: usize, disconnected: u64) {
        // ---
        let Some(info) = self.slots.get_mut(slot) else {
            error!(slot, "miner count report for unknown slot, dropped");
            return;
        };

        info.miner_num -= disconnected as i64;
        info!(slot, miners = info.miner_num, "miner count updated");
    }

    // ---

    /// Best-effort exit fan-out. Slots with no bound session are skipped;
    /// in-flight connect tasks and retry timers are not chased down — their
    /// late events land in a closed queue and vanish.
    async fn exit(&mut self) {
        // ---
        info!(account = %self.account, "up-session manager exiting");

        for (idx, slot) in self.slots.iter().enumerate() {
            if let Some(session) = slot.session.as_ref() {
                if let Err(e) = session.deliver(UpSessionEvent::Exit).await {
                    debug!(slot = idx, "exit delivery failed: {e}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

/// One establishment attempt for one slot: try candidates in configuration
/// order, first authorized session wins, remaining candidates are not
/// tried. Reports back exclusively through the event queue.
///
/// A candidate that errors or refuses authorization is an expected outcome,
/// logged and skipped — only exhausting the whole list is surfaced (as an
/// event, not an error).
async fn connect(
    connector: Arc<dyn UpSessionConnector>,
    account: String,
    candidates: Arc<[PoolEndpoint]>,
    slot: usize,
    events: mpsc::Sender<ManagerEvent>,
) {
    // ---
    for endpoint in candidates.iter() {
        match connector.initialize(&account, endpoint, slot).await {
            Ok(AuthOutcome::Authorized(session)) => {
                info!(account = %account, slot, %endpoint, "authorized with pool server");

                // The session runs itself from here; the manager only
                // delivers events to it.
                tokio::spawn(Arc::clone(&session).run());

                let _ = events
                    .send(ManagerEvent::UpSessionReady { slot, session })
                    .await;
                return;
            }
            Ok(AuthOutcome::Rejected { reason }) => {
                debug!(account = %account, slot, %endpoint, %reason, "authorization rejected");
            }
            Err(e) => {
                debug!(account = %account, slot, %endpoint, "candidate unreachable: {e}");
            }
        }
    }

    let _ = events.send(ManagerEvent::UpSessionInitFailed { slot }).await;
}

// ---------------------------------------------------------------------------
// UpSessionManagerHandle
// ---------------------------------------------------------------------------

/// Cheap-clone producer handle; the manager's entire inbound surface.
///
/// Sends block while the event queue is full (backpressure) and return
/// [`RelayError::QueueClosed`] once the manager has exited.
#[derive(Clone)]
pub struct UpSessionManagerHandle {
    // ---
    tx: mpsc::Sender<ManagerEvent>,
}

// ---

impl UpSessionManagerHandle {
    // ---
    /// Route a downstream session to some ready upstream.
    pub async fn submit_down_session(&self, down: DownSessionPtr) -> Result<()> {
        self.send(ManagerEvent::AddDownSession { down }).await
    }

    /// Report downstream sessions that disconnected from `slot` since the
    /// last report.
    pub async fn report_miner_disconnects(&self, slot: usize, disconnected: u64) -> Result<()> {
        self.send(ManagerEvent::UpdateMinerNum { slot, disconnected })
            .await
    }

    /// Report that the session bound to `slot` is no longer usable.
    pub async fn report_upstream_broken(&self, slot: usize) -> Result<()> {
        self.send(ManagerEvent::UpSessionBroken { slot }).await
    }

    /// Ask the manager to shut down. The final thing it does.
    pub async fn request_exit(&self) -> Result<()> {
        self.send(ManagerEvent::Exit).await
    }

    // ---

    async fn send(&self, event: ManagerEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| RelayError::QueueClosed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::time::Duration;

    use minerelay_sim::{SimBehavior, SimConnector, SimDownSession, SimUpSession};

    use super::*;

    // ---

    fn endpoints(n: usize) -> Vec<PoolEndpoint> {
        (0..n)
            .map(|i| PoolEndpoint::new(format!("pool-{i}"), "127.0.0.1", 3333 + i as u16))
            .collect()
    }

    fn config(slots: usize, pools: Vec<PoolEndpoint>, retry: RetryPolicy) -> ManagerConfig {
        ManagerConfig {
            account: "worker.test".into(),
            pools,
            slots_per_account: slots,
            event_queue_capacity: 16,
            retry,
        }
    }

    fn retry_ms(init_failed: u64, no_ready: u64) -> RetryPolicy {
        RetryPolicy {
            init_failed_backoff_ms: init_failed,
            no_ready_slot_retry_ms: no_ready,
        }
    }

    /// Poll until `pred` holds or `timeout` passes; returns the final value.
    async fn wait_until(mut pred: impl FnMut() -> bool, timeout: Duration) -> bool {
        // ---
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if pred() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pred()
    }

    fn assigned_total(sessions: &[Arc<SimUpSession>]) -> usize {
        sessions.iter().map(|s| s.assigned().len()).sum()
    }

    /// The connector registers a session slightly before its `Ready` event
    /// reaches the dispatcher; give the queue a beat to drain before
    /// depending on slots being bound.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // ---

    #[tokio::test]
    async fn startup_scans_every_candidate_for_every_slot() {
        // ---
        // All candidates unreachable: each of the 3 slots must try both
        // endpoints in configuration order before reporting exhaustion.
        let sim = Arc::new(SimConnector::new());
        let (manager, _handle) = UpSessionManager::new(
            config(3, endpoints(2), retry_ms(10_000, 10_000)),
            sim.clone(),
        );
        tokio::spawn(manager.run());

        assert!(
            wait_until(|| sim.attempts().len() == 6, Duration::from_secs(2)).await,
            "expected 3 slots x 2 candidates = 6 attempts, got {}",
            sim.attempts().len()
        );

        for slot in 0..3 {
            let tried: Vec<String> = sim
                .attempts()
                .into_iter()
                .filter(|a| a.slot == slot)
                .map(|a| a.endpoint)
                .collect();
            assert_eq!(tried, ["pool-0", "pool-1"], "slot {slot} scan order");
        }
        assert!(sim.sessions().is_empty(), "nothing should have authorized");
    }

    // ---

    #[tokio::test]
    async fn first_authorizing_candidate_wins_and_later_ones_are_not_tried() {
        // ---
        let sim = Arc::new(SimConnector::new());
        sim.set_behavior("pool-0", SimBehavior::Reject);
        sim.set_behavior("pool-1", SimBehavior::Authorize);
        sim.set_behavior("pool-2", SimBehavior::Authorize);

        let (manager, _handle) = UpSessionManager::new(
            config(1, endpoints(3), retry_ms(10_000, 10_000)),
            sim.clone(),
        );
        tokio::spawn(manager.run());

        assert!(wait_until(|| sim.sessions().len() == 1, Duration::from_secs(2)).await);

        let session = &sim.sessions()[0];
        assert_eq!(session.endpoint_name(), "pool-1");
        assert_eq!(session.slot(), 0);

        let tried: Vec<String> = sim.attempts().into_iter().map(|a| a.endpoint).collect();
        assert_eq!(
            tried,
            ["pool-0", "pool-1"],
            "pool-2 must not be tried after pool-1 authorized"
        );
    }

    // ---

    #[tokio::test]
    async fn candidate_exhaustion_retries_after_backoff_until_recovery() {
        // ---
        let sim = Arc::new(SimConnector::new()); // default: unreachable
        let (manager, _handle) =
            UpSessionManager::new(config(1, endpoints(1), retry_ms(30, 10_000)), sim.clone());
        tokio::spawn(manager.run());

        // At least two full scans prove a retry was scheduled after the
        // first exhaustion.
        assert!(wait_until(|| sim.attempts().len() >= 2, Duration::from_secs(2)).await);
        assert!(sim.sessions().is_empty());

        // Server comes back: some later cycle must bind the slot.
        sim.set_behavior("pool-0", SimBehavior::Authorize);
        assert!(wait_until(|| sim.sessions().len() == 1, Duration::from_secs(2)).await);
    }

    // ---

    #[tokio::test]
    async fn downstream_sessions_spread_to_least_loaded_slot_first() {
        // ---
        let sim = Arc::new(SimConnector::new());
        sim.set_behavior("pool-0", SimBehavior::Authorize);

        let (manager, handle) = UpSessionManager::new(
            config(3, endpoints(1), retry_ms(10_000, 10_000)),
            sim.clone(),
        );
        tokio::spawn(manager.run());
        assert!(wait_until(|| sim.sessions().len() == 3, Duration::from_secs(2)).await);
        settle().await;

        for _ in 0..8 {
            handle
                .submit_down_session(SimDownSession::new())
                .await
                .unwrap();
        }

        let sessions = sim.sessions();
        assert!(
            wait_until(|| assigned_total(&sim.sessions()) == 8, Duration::from_secs(2)).await,
            "all 8 downstream sessions must be routed"
        );

        // Greedy least-loaded with lowest-index tie break walks the slots
        // round-robin from slot 0: 3 / 3 / 2.
        let mut counts: Vec<(usize, usize)> = sessions
            .iter()
            .map(|s| (s.slot(), s.assigned().len()))
            .collect();
        counts.sort();
        assert_eq!(counts, [(0, 3), (1, 3), (2, 2)]);
    }

    // ---

    #[tokio::test]
    async fn disconnect_reports_steer_routing_and_may_go_negative() {
        // ---
        let sim = Arc::new(SimConnector::new());
        sim.set_behavior("pool-0", SimBehavior::Authorize);

        let (manager, handle) = UpSessionManager::new(
            config(2, endpoints(1), retry_ms(10_000, 10_000)),
            sim.clone(),
        );
        tokio::spawn(manager.run());
        assert!(wait_until(|| sim.sessions().len() == 2, Duration::from_secs(2)).await);
        settle().await;

        // One assignment per slot: counts [1, 1].
        for _ in 0..2 {
            handle
                .submit_down_session(SimDownSession::new())
                .await
                .unwrap();
        }
        assert!(wait_until(|| assigned_total(&sim.sessions()) == 2, Duration::from_secs(2)).await);

        // Overshooting report: slot 1 drops to -2. Known edge case — the
        // count is applied unchecked, not clamped to zero.
        handle.report_miner_disconnects(1, 3).await.unwrap();

        // Slot 1 stays the least-loaded pick until its count catches back
        // up to slot 0's: -2 -> -1 -> 0 over the next three submissions.
        for _ in 0..3 {
            handle
                .submit_down_session(SimDownSession::new())
                .await
                .unwrap();
        }
        assert!(wait_until(|| assigned_total(&sim.sessions()) == 5, Duration::from_secs(2)).await);

        let sessions = sim.sessions();
        let slot1 = sessions.iter().find(|s| s.slot() == 1).unwrap();
        let slot0 = sessions.iter().find(|s| s.slot() == 0).unwrap();
        assert_eq!(slot0.assigned().len(), 1);
        assert_eq!(slot1.assigned().len(), 4);
    }

    // ---

    #[tokio::test]
    async fn downstream_session_is_never_dropped_while_no_slot_is_ready() {
        // ---
        let sim = Arc::new(SimConnector::new()); // unreachable for now
        let (manager, handle) =
            UpSessionManager::new(config(1, endpoints(1), retry_ms(60, 20)), sim.clone());
        tokio::spawn(manager.run());

        let down = SimDownSession::new();
        let down_id = down.id();
        handle.submit_down_session(down).await.unwrap();

        // A few re-delivery cycles pass with nothing ready.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(assigned_total(&sim.sessions()), 0);

        // Once a slot comes up, the originally submitted session arrives.
        sim.set_behavior("pool-0", SimBehavior::Authorize);
        assert!(
            wait_until(
                || sim
                    .sessions()
                    .first()
                    .is_some_and(|s| s.assigned().contains(&down_id)),
                Duration::from_secs(2),
            )
            .await,
            "original downstream session must eventually be routed"
        );
    }

    // ---

    #[tokio::test]
    async fn broken_slot_reconnects_without_backoff() {
        // ---
        let sim = Arc::new(SimConnector::new());
        sim.set_behavior("pool-0", SimBehavior::Authorize);

        // Init-failure backoff is deliberately huge: a reconnect inside the
        // test window can only have come through the zero-delay broken path.
        let (manager, handle) = UpSessionManager::new(
            config(1, endpoints(1), retry_ms(60_000, 10_000)),
            sim.clone(),
        );
        tokio::spawn(manager.run());
        assert!(wait_until(|| sim.sessions().len() == 1, Duration::from_secs(2)).await);

        handle.report_upstream_broken(0).await.unwrap();

        assert!(
            wait_until(|| sim.sessions().len() == 2, Duration::from_millis(500)).await,
            "broken slot must reconnect immediately"
        );

        // The abandoned session was never told to exit — it owns its own
        // wind-down.
        assert!(!sim.sessions()[0].exited());
    }

    // ---

    #[tokio::test]
    async fn broken_slot_is_not_routable_while_reconnecting() {
        // ---
        let sim = Arc::new(SimConnector::new());
        sim.set_behavior("pool-0", SimBehavior::Authorize);
        sim.set_authorize_limit(Some(1));

        let (manager, handle) =
            UpSessionManager::new(config(1, endpoints(1), retry_ms(40, 20)), sim.clone());
        tokio::spawn(manager.run());
        assert!(wait_until(|| sim.sessions().len() == 1, Duration::from_secs(2)).await);
        settle().await;

        // Break the only slot; the reconnect attempt is refused (limit hit),
        // so the slot stays unbound.
        handle.report_upstream_broken(0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Routing now takes the no-ready-slot path instead of handing the
        // miner to the dead session.
        handle
            .submit_down_session(SimDownSession::new())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(assigned_total(&sim.sessions()), 0);

        // Let the retry cycle authorize a replacement; the parked
        // downstream session lands on it.
        sim.set_authorize_limit(None);
        assert!(
            wait_until(|| assigned_total(&sim.sessions()) == 1, Duration::from_secs(2)).await
        );
        let sessions = sim.sessions();
        assert_eq!(sessions.last().unwrap().assigned().len(), 1);
    }

    // ---

    #[tokio::test]
    async fn exit_reaches_every_bound_session_and_stops_the_loop() {
        // ---
        let sim = Arc::new(SimConnector::new());
        sim.set_behavior("pool-0", SimBehavior::Authorize);
        // Third slot never binds: its scan is refused once the first two
        // sessions exist.
        sim.set_authorize_limit(Some(2));

        let (manager, handle) = UpSessionManager::new(
            config(3, endpoints(1), retry_ms(10_000, 10_000)),
            sim.clone(),
        );
        let join = tokio::spawn(manager.run());
        assert!(wait_until(|| sim.sessions().len() == 2, Duration::from_secs(2)).await);
        settle().await;

        handle.request_exit().await.unwrap();

        let joined = tokio::time::timeout(Duration::from_secs(2), join).await;
        assert!(joined.is_ok(), "dispatcher loop must return after exit");

        for session in sim.sessions() {
            assert!(session.exited(), "every bound session must see the exit");
        }

        // The manager is gone; the producer surface reports it.
        let err = handle
            .submit_down_session(SimDownSession::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::QueueClosed));
    }

    // ---

    #[tokio::test]
    async fn reports_for_unknown_slots_are_dropped_not_fatal() {
        // ---
        let sim = Arc::new(SimConnector::new());
        sim.set_behavior("pool-0", SimBehavior::Authorize);

        let (manager, handle) = UpSessionManager::new(
            config(1, endpoints(1), retry_ms(10_000, 10_000)),
            sim.clone(),
        );
        tokio::spawn(manager.run());
        assert!(wait_until(|| sim.sessions().len() == 1, Duration::from_secs(2)).await);
        settle().await;

        handle.report_miner_disconnects(99, 1).await.unwrap();
        handle.report_upstream_broken(99).await.unwrap();

        // The dispatcher survived both bogus reports and still routes.
        handle
            .submit_down_session(SimDownSession::new())
            .await
            .unwrap();
        assert!(wait_until(|| assigned_total(&sim.sessions()) == 1, Duration::from_secs(2)).await);
    }
}
