//! Manager configuration.
//!
//! Everything here is handed in by the process-level configuration loader;
//! the pool core never reads files itself. Retry delays are expressed in
//! milliseconds so tests and simulations can shrink them without changing
//! the code paths.

use std::time::Duration;

use serde::Deserialize;

// ---

use minerelay_domain::{PoolEndpoint, RelayError};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Fixed backoff delays for the two scheduled-retry paths.
///
/// A broken connection is retried with no delay at all and therefore has no
/// knob here.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    // ---
    /// Delay before re-running the full candidate scan for a slot whose
    /// every candidate failed to authorize.
    #[serde(default = "default_init_failed_backoff_ms")]
    pub init_failed_backoff_ms: u64,

    /// Delay before re-submitting a downstream session that found no ready
    /// slot.
    #[serde(default = "default_no_ready_slot_retry_ms")]
    pub no_ready_slot_retry_ms: u64,
}

// ---

impl RetryPolicy {
    // ---
    pub fn init_failed_backoff(&self) -> Duration {
        Duration::from_millis(self.init_failed_backoff_ms)
    }

    pub fn no_ready_slot_retry(&self) -> Duration {
        Duration::from_millis(self.no_ready_slot_retry_ms)
    }
}

// ---

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            init_failed_backoff_ms: default_init_failed_backoff_ms(),
            no_ready_slot_retry_ms: default_no_ready_slot_retry_ms(),
        }
    }
}

// ---

fn default_init_failed_backoff_ms() -> u64 {
    5_000
}

fn default_no_ready_slot_retry_ms() -> u64 {
    3_000
}

// ---------------------------------------------------------------------------
// ManagerConfig
// ---------------------------------------------------------------------------

/// Per-account configuration for one [`UpSessionManager`].
///
/// [`UpSessionManager`]: super::UpSessionManager
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    // ---
    /// Account name the pool connections authenticate as.
    pub account: String,

    /// Candidate pool servers, tried in this order by every connection
    /// attempt.
    pub pools: Vec<PoolEndpoint>,

    /// Number of upstream slots kept alive for this account.
    #[serde(default = "default_slots_per_account")]
    pub slots_per_account: usize,

    /// Capacity of the manager's event queue. Producers block when it is
    /// full.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    #[serde(default)]
    pub retry: RetryPolicy,
}

// ---

impl ManagerConfig {
    // ---
    /// Reject configurations the manager cannot run with.
    pub fn validate(&self) -> Result<(), RelayError> {
        // ---
        if self.account.is_empty() {
            return Err(RelayError::Config("account name is empty".into()));
        }
        if self.pools.is_empty() {
            return Err(RelayError::Config("no pool servers configured".into()));
        }
        if self.slots_per_account == 0 {
            return Err(RelayError::Config("slots_per_account must be >= 1".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(RelayError::Config(
                "event_queue_capacity must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// ---

fn default_slots_per_account() -> usize {
    5
}

fn default_event_queue_capacity() -> usize {
    64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    // ---

    #[test]
    fn defaults_fill_omitted_fields() {
        // ---
        let cfg: ManagerConfig = serde_json::from_str(
            r#"{
                "account": "worker.001",
                "pools": [{ "name": "eu-1", "host": "pool.example.com", "port": 3333 }]
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.slots_per_account, 5);
        assert_eq!(cfg.event_queue_capacity, 64);
        assert_eq!(cfg.retry.init_failed_backoff(), Duration::from_secs(5));
        assert_eq!(cfg.retry.no_ready_slot_retry(), Duration::from_secs(3));
        assert!(cfg.validate().is_ok());
    }

    // ---

    #[test]
    fn empty_pool_list_rejected() {
        // ---
        let cfg = ManagerConfig {
            account: "worker.001".into(),
            pools: Vec::new(),
            slots_per_account: 2,
            event_queue_capacity: 16,
            retry: RetryPolicy::default(),
        };

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("no pool servers"));
    }

    // ---

    #[test]
    fn zero_slots_rejected() {
        // ---
        let cfg = ManagerConfig {
            account: "worker.001".into(),
            pools: vec![PoolEndpoint::new("eu-1", "pool.example.com", 3333)],
            slots_per_account: 0,
            event_queue_capacity: 16,
            retry: RetryPolicy::default(),
        };

        assert!(cfg.validate().is_err());
    }
}
