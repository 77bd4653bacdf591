use std::fmt;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// PoolEndpoint
// ---------------------------------------------------------------------------

/// One configured remote pool server eligible to serve as a slot's upstream.
///
/// The candidate list is ordered: connection establishment tries endpoints
/// in configuration order and binds the first one that authorizes.
/// Deserializes directly from the operator's candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolEndpoint {
    // ---
    /// Operator-facing label, used in logs.
    pub name: String,

    pub host: String,

    pub port: u16,
}

// ---

impl PoolEndpoint {
    // ---
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }
}

// ---

impl fmt::Display for PoolEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
