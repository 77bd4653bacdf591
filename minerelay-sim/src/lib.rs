//! In-process mock pool connections for minerelay unit and integration
//! testing.
//!
//! [`SimConnector`] implements [`minerelay_domain::UpSessionConnector`] with
//! per-endpoint scripted behavior instead of real sockets:
//!
//! - Authorize, reject, or be unreachable, per endpoint name
//! - Cap the number of concurrently authorized sessions
//! - Reseat behavior at runtime to script recovery scenarios
//!
//! Every `initialize` call and every authorized session is recorded, so
//! tests can assert scan order, candidate selection, and event deliveries.
//!
//! # Quick start
//!
//! ```rust
//! use minerelay_sim::{SimBehavior, SimConnector};
//!
//! let sim = SimConnector::new();
//! sim.set_behavior("eu-1", SimBehavior::Authorize);
//! ```

mod connector;
mod session;

// --- public API
pub use connector::{SimAttempt, SimBehavior, SimConnector};
pub use session::{SimDownSession, SimUpSession};
