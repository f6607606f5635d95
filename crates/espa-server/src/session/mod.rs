//! Paging-system session handling

mod machine;

pub use machine::{SessionState, SessionStateMachine};
