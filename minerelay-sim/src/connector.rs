use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ---

use async_trait::async_trait;

// ---

use minerelay_domain::{
    // ---
    AuthOutcome,
    PoolEndpoint,
    RelayError,
    Result,
    UpSessionConnector,
};

// ---

use super::SimUpSession;

// ---------------------------------------------------------------------------
// SimBehavior
// ---------------------------------------------------------------------------

/// Scripted outcome for one endpoint. Endpoints with no script are
/// unreachable, so a fresh connector authorizes nothing until told to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBehavior {
    // ---
    /// Handshake and authorization succeed.
    Authorize,

    /// The server answers but refuses the account.
    Reject,

    /// No answer at all; `initialize` returns a connection error.
    Unreachable,
}

// ---------------------------------------------------------------------------
// SimAttempt
// ---------------------------------------------------------------------------

/// One recorded `initialize` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimAttempt {
    // ---
    pub slot: usize,

    /// Endpoint name (the script key).
    pub endpoint: String,
}

// ---------------------------------------------------------------------------
// SimConnector
// ---------------------------------------------------------------------------

/// Scriptable [`UpSessionConnector`]. Interior state is behind std mutexes,
/// never held across an await.
#[derive(Default)]
pub struct SimConnector {
    // ---
    /// Per-endpoint script, keyed by endpoint name.
    behaviors: Mutex<HashMap<String, SimBehavior>>,

    /// Every `initialize` call, in call order.
    attempts: Mutex<Vec<SimAttempt>>,

    /// Every session ever authorized, in authorization order.
    sessions: Mutex<Vec<Arc<SimUpSession>>>,

    /// Cap on the total number of authorizations; further attempts are
    /// rejected. `None` means uncapped.
    authorize_limit: Mutex<Option<usize>>,
}

// ---

impl SimConnector {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    // ---

    /// Script (or re-script) the outcome for an endpoint name.
    pub fn set_behavior(&self, endpoint: &str, behavior: SimBehavior) {
        // ---
        self.behaviors
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), behavior);
    }

    /// Cap total authorizations; pass `None` to lift the cap.
    pub fn set_authorize_limit(&self, limit: Option<usize>) {
        *self.authorize_limit.lock().unwrap() = limit;
    }

    // ---

    /// Snapshot of all recorded attempts, in call order.
    pub fn attempts(&self) -> Vec<SimAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    /// Snapshot of all authorized sessions, in authorization order.
    pub fn sessions(&self) -> Vec<Arc<SimUpSession>> {
        self.sessions.lock().unwrap().clone()
    }
}

// ---

#[async_trait]
impl UpSessionConnector for SimConnector {
    // ---
    async fn initialize(
        &self,
        _account: &str,
        endpoint: &PoolEndpoint,
        slot: usize,
    ) -> Result<AuthOutcome> {
        // ---
        self.attempts.lock().unwrap().push(SimAttempt {
            slot,
            endpoint: endpoint.name.clone(),
        });

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&endpoint.name)
            .copied()
            .unwrap_or(SimBehavior::Unreachable);

        match behavior {
            SimBehavior::Unreachable => {
                Err(RelayError::Connection(format!("{endpoint}: no route")))
            }
            SimBehavior::Reject => Ok(AuthOutcome::Rejected {
                reason: "account not accepted".into(),
            }),
            SimBehavior::Authorize => {
                let mut sessions = self.sessions.lock().unwrap();
                if let Some(limit) = *self.authorize_limit.lock().unwrap() {
                    if sessions.len() >= limit {
                        return Ok(AuthOutcome::Rejected {
                            reason: "connection limit reached".into(),
                        });
                    }
                }

                let session = SimUpSession::new(slot, endpoint.name.clone());
                sessions.push(Arc::clone(&session));
                Ok(AuthOutcome::Authorized(session))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    // ---

    fn endpoint(name: &str) -> PoolEndpoint {
        PoolEndpoint::new(name, "127.0.0.1", 3333)
    }

    // ---

    #[tokio::test]
    async fn unscripted_endpoints_are_unreachable() {
        // ---
        let sim = SimConnector::new();
        let outcome = sim.initialize("acct", &endpoint("eu-1"), 0).await;

        assert!(matches!(outcome, Err(RelayError::Connection(_))));
        assert_eq!(sim.attempts().len(), 1);
        assert_eq!(sim.attempts()[0].endpoint, "eu-1");
    }

    // ---

    #[tokio::test]
    async fn authorize_limit_rejects_overflow_and_lifts() {
        // ---
        let sim = SimConnector::new();
        sim.set_behavior("eu-1", SimBehavior::Authorize);
        sim.set_authorize_limit(Some(1));

        let first = sim.initialize("acct", &endpoint("eu-1"), 0).await.unwrap();
        assert!(matches!(first, AuthOutcome::Authorized(_)));

        let second = sim.initialize("acct", &endpoint("eu-1"), 1).await.unwrap();
        assert!(matches!(second, AuthOutcome::Rejected { .. }));

        sim.set_authorize_limit(None);
        let third = sim.initialize("acct", &endpoint("eu-1"), 1).await.unwrap();
        assert!(matches!(third, AuthOutcome::Authorized(_)));

        assert_eq!(sim.sessions().len(), 2);
    }
}
