use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ---

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

// ---

use minerelay_domain::{
    // ---
    DownSession,
    RelayError,
    Result,
    UpSession,
    UpSessionEvent,
};

// ---------------------------------------------------------------------------
// SimUpSession
// ---------------------------------------------------------------------------

/// Mock up-session. Records every delivered assignment and parks its run
/// loop until an exit event arrives.
pub struct SimUpSession {
    // ---
    slot: usize,
    endpoint: String,

    /// Ids of downstream sessions assigned here, in delivery order.
    assigned: Mutex<Vec<Uuid>>,

    exited: AtomicBool,
    exit_notify: Notify,
}

// ---

impl SimUpSession {
    // ---
    pub(crate) fn new(slot: usize, endpoint: String) -> Arc<Self> {
        // ---
        Arc::new(Self {
            slot,
            endpoint,
            assigned: Mutex::new(Vec::new()),
            exited: AtomicBool::new(false),
            exit_notify: Notify::new(),
        })
    }

    // ---

    /// Slot this session was initialized for.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Name of the endpoint this session authorized against.
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint
    }

    /// Snapshot of assigned downstream ids, in delivery order.
    pub fn assigned(&self) -> Vec<Uuid> {
        self.assigned.lock().unwrap().clone()
    }

    /// True once an exit event has been delivered.
    pub fn exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

// ---

#[async_trait]
impl UpSession for SimUpSession {
    // ---
    async fn run(self: Arc<Self>) {
        // Nothing to process; a real session would drive its socket here.
        self.exit_notify.notified().await;
    }

    // ---

    async fn deliver(&self, event: UpSessionEvent) -> Result<()> {
        // ---
        if self.exited() {
            return Err(RelayError::SessionClosed);
        }

        match event {
            UpSessionEvent::AssignDownSession(down) => {
                self.assigned.lock().unwrap().push(down.id());
            }
            UpSessionEvent::Exit => {
                self.exited.store(true, Ordering::SeqCst);
                self.exit_notify.notify_one();
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SimDownSession
// ---------------------------------------------------------------------------

/// Mock downstream session: an identity and nothing else.
pub struct SimDownSession {
    // ---
    id: Uuid,
}

// ---

impl SimDownSession {
    // ---
    pub fn new() -> Arc<Self> {
        Arc::new(Self { id: Uuid::new_v4() })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

// ---

impl DownSession for SimDownSession {
    fn id(&self) -> Uuid {
        self.id
    }
}
