//! Core traits and types for the minerelay up-session pool.
//!
//! This crate defines the vocabulary of the system. All other crates depend
//! on `minerelay-domain` and speak its types. No implementations live here.
//!
//! # Structure
//!
//! - [`error`]    — [`RelayError`] and [`Result<T>`] alias
//! - [`endpoint`] — [`PoolEndpoint`] candidate server addresses
//! - [`session`]  — [`UpSession`], [`UpSessionConnector`], [`DownSession`]
//!   traits and the [`UpSessionEvent`] / [`AuthOutcome`] values exchanged
//!   across them

mod endpoint;
mod error;
mod session;

// --- error
pub use error::{RelayError, Result};

// --- endpoint
pub use endpoint::PoolEndpoint;

// --- session
pub use session::{
    // ---
    AuthOutcome,
    DownSession,
    DownSessionPtr,
    UpSession,
    UpSessionConnector,
    UpSessionEvent,
    UpSessionPtr,
};
