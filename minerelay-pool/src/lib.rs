//! Up-session pool core.
//!
//! One [`UpSessionManager`] per account keeps `slots_per_account` upstream
//! connections alive against an ordered candidate list and load-balances
//! downstream sessions across whichever slots are currently ready. All
//! collaborator types come from `minerelay-domain`; the wire protocol lives
//! behind [`UpSessionConnector`] implementations elsewhere.
//!
//! [`UpSessionConnector`]: minerelay_domain::UpSessionConnector

mod config;
mod session_manager;

// --- config
pub use config::{ManagerConfig, RetryPolicy};

// --- session_manager
pub use session_manager::{ManagerEvent, UpSessionManager, UpSessionManagerHandle};
