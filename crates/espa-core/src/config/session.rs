//! Session and channel timing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::types::StationAddress;

/// Negotiation addresses and per-state deadlines of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Address the control equipment announces first
    pub control_address: StationAddress,

    /// Address of this paging system
    pub paging_address: StationAddress,

    /// Budget for the control equipment to start a transaction
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,

    /// Window for the whole `<1><ENQ><2><ENQ>` negotiation
    #[serde(with = "duration_secs")]
    pub negotiation_timeout: Duration,

    /// Budget for the message transaction after the negotiation ACK
    #[serde(with = "duration_secs")]
    pub message_timeout: Duration,

    /// Per-state deadline inside the block decoder
    #[serde(with = "duration_secs")]
    pub block_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_address: StationAddress::CONTROL_EQUIPMENT,
            paging_address: StationAddress::PAGING_SYSTEM,
            idle_timeout: Duration::from_secs(60),
            negotiation_timeout: Duration::from_millis(2500),
            message_timeout: Duration::from_secs(15),
            block_timeout: espa_protocol::DEFAULT_BLOCK_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Reply sent when a block is rejected: control address then NAK
    pub fn nak_reply(&self) -> [u8; 2] {
        [self.control_address.as_u8(), espa_protocol::frame::NAK]
    }
}

/// Link activity supervision and transport reopen policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Silence after which the link is declared dead
    #[serde(with = "duration_secs")]
    pub activity_timeout: Duration,

    /// Delay before a still-silent link may be declared dead again
    #[serde(with = "duration_secs")]
    pub dead_cooldown: Duration,

    /// Minimum delay between two transport open attempts
    #[serde(with = "duration_secs")]
    pub reopen_backoff: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            activity_timeout: Duration::from_secs(120),
            dead_cooldown: Duration::from_secs(60),
            reopen_backoff: Duration::from_secs(15),
        }
    }
}
