//! Core error types for ESPA links

use std::path::PathBuf;
use thiserror::Error;

/// Byte transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Port could not be opened
    #[error("Failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// Operation on a closed transport
    #[error("Transport not open")]
    NotOpen,

    /// Read or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Link worker errors
#[derive(Error, Debug)]
pub enum LinkError {
    /// Nobody drains the notification outbox any more
    #[error("Notification outbox closed")]
    OutboxClosed,

    /// Transport failure surfaced to the worker loop
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl LinkError {
    /// Whether the worker loop must terminate
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutboxClosed)
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Station address is not a printable ASCII character
    #[error("Invalid station address: {0:?}")]
    InvalidAddress(char),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
