use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::endpoint::PoolEndpoint;
use super::error::Result;

// ---------------------------------------------------------------------------
// UpSessionEvent
// ---------------------------------------------------------------------------

/// Manager-originated events delivered to a live up-session.
///
/// Everything else an up-session processes (server notifications, share
/// submissions from its miners) arrives through its own run loop and is
/// none of the manager's business.
pub enum UpSessionEvent {
    // ---
    /// Route one downstream session onto this upstream. The up-session
    /// takes over the downstream from here on.
    AssignDownSession(DownSessionPtr),

    /// Begin an orderly shutdown. Sent once, at manager exit.
    Exit,
}

// ---------------------------------------------------------------------------
// AuthOutcome
// ---------------------------------------------------------------------------

/// Result of initializing an up-session against one candidate endpoint.
pub enum AuthOutcome {
    // ---
    /// Connected and authorized; carries the live session, ready to run.
    Authorized(UpSessionPtr),

    /// The server answered but refused authorization for this account.
    Rejected { reason: String },
}

// ---------------------------------------------------------------------------
// UpSession
// ---------------------------------------------------------------------------

/// One live, authorized connection to a remote pool server.
///
/// The manager starts `run` on its own task after authorization and from
/// then on talks to the session only through [`UpSession::deliver`]. The
/// session owns its socket and its own wind-down; the manager never closes
/// a session, it only abandons the reference when the session reports
/// itself broken.
#[async_trait]
pub trait UpSession: Send + Sync {
    // ---
    /// The session's own event loop. Runs until the connection ends or an
    /// [`UpSessionEvent::Exit`] is delivered.
    async fn run(self: Arc<Self>);

    /// Deliver a manager-originated event.
    ///
    /// Returns [`RelayError::SessionClosed`] once the run loop has ended.
    ///
    /// [`RelayError::SessionClosed`]: super::RelayError::SessionClosed
    async fn deliver(&self, event: UpSessionEvent) -> Result<()>;
}

// ---

/// Convenience type alias for a shared [`UpSession`].
pub type UpSessionPtr = Arc<dyn UpSession>;

/// Convenience type alias for a shared [`DownSession`].
pub type DownSessionPtr = Arc<dyn DownSession>;

// ---------------------------------------------------------------------------
// UpSessionConnector
// ---------------------------------------------------------------------------

/// Factory for up-sessions; the pluggable seam in front of the actual wire
/// protocol stack.
///
/// Implementations: `minerelay_sim::SimConnector`; production stratum
/// connectors live in their own crates and are out of scope here.
#[async_trait]
pub trait UpSessionConnector: Send + Sync {
    // ---
    /// Construct a session against `endpoint`, run the protocol handshake,
    /// and attempt to authorize as `account`.
    ///
    /// A transport-level failure (`Err`) and an explicit
    /// [`AuthOutcome::Rejected`] both mean "try the next candidate" to the
    /// caller; neither is escalated further.
    async fn initialize(
        &self,
        account: &str,
        endpoint: &PoolEndpoint,
        slot: usize,
    ) -> Result<AuthOutcome>;
}

// ---------------------------------------------------------------------------
// DownSession
// ---------------------------------------------------------------------------

/// One client (miner) connection awaiting or holding an upstream assignment.
pub trait DownSession: Send + Sync {
    // ---
    /// Opaque stable identity. The manager uses it only for logging.
    fn id(&self) -> Uuid;
}
