//! Per-state deadlines measured against the tokio clock
//!
//! The tokio clock is used so that paused-time tests can drive the
//! negotiation and message timeouts without sleeping.

use std::time::Duration;
use tokio::time::Instant;

/// An optional absolute point in time after which a state is stale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires
    pub fn none() -> Self {
        Self { at: None }
    }

    /// A deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    /// Re-arm the deadline `timeout` from now
    pub fn set(&mut self, timeout: Duration) {
        self.at = Some(Instant::now() + timeout);
    }

    /// Disarm the deadline
    pub fn clear(&mut self) {
        self.at = None;
    }

    /// Whether the deadline is armed and has been reached
    pub fn is_expired(&self) -> bool {
        self.at.map_or(false, |at| Instant::now() >= at)
    }
}
