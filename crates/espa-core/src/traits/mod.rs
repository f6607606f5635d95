//! Core trait definitions

mod handler;
mod transport;

pub use handler::NotificationHandler;
pub use transport::Transport;
