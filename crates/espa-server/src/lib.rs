//! espa-server: ESPA 4.4.4 paging-system server
//!
//! The server plays the paging-system role on one or more serial links.
//! Each link runs its own worker that negotiates sessions with the control
//! equipment, receives checksummed message blocks and publishes the decoded
//! notifications; the [`MultiLinkServer`] aggregates them for the
//! application.

pub mod channel;
pub mod handler;
pub mod link;
pub mod server;
pub mod session;
pub mod transport;

pub use channel::Channel;
pub use handler::{JsonLinesHandler, LoggingHandler};
pub use link::LinkWorker;
pub use server::MultiLinkServer;
pub use session::{SessionState, SessionStateMachine};
pub use transport::SerialTransport;
