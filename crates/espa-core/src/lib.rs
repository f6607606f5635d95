//! espa-core: Core abstractions and configuration for ESPA paging servers
//!
//! This crate provides the configuration structures, error taxonomy and the
//! transport/handler traits shared by the link workers and the daemon.

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{ConfigError, LinkError, TransportError};
pub use memory::{MemoryPeer, MemoryTransport};
pub use traits::{NotificationHandler, Transport};
pub use types::StationAddress;
