//! Per-link workers

mod worker;

pub use worker::{LinkWorker, DEFAULT_TICK_INTERVAL};
