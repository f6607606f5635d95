//! Transports used by the daemon

mod serial;

pub use serial::{list_ports, SerialTransport};
