//! Link worker task
//!
//! A [`LinkWorker`] owns one channel and its session state machine and runs
//! them on a dedicated tokio task. Decoded notifications and link-timeout
//! edges are pushed into an unbounded outbox that the owner drains without
//! blocking.
//!
//! # Shutdown
//!
//! Stopping is cooperative: the cancellation token is checked once per loop
//! iteration, so a stop takes effect within one tick interval. `join`
//! requests the stop itself before waiting.
//!
//! # Faults
//!
//! Transport errors and panics inside a tick are logged and the loop goes
//! on with the next tick. Only a closed outbox ends the task early. On a
//! multi-threaded runtime each tick runs under `block_in_place`, since
//! serial port calls block.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use espa_core::config::{ChannelConfig, SessionConfig};
use espa_core::{LinkError, Transport};
use espa_protocol::{LinkName, Notification};

use crate::channel::Channel;
use crate::session::SessionStateMachine;

/// Sleep between two ticks of a link loop
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to one link's worker task
pub struct LinkWorker {
    name: LinkName,
    runner: Option<LinkRunner>,
    handle: Option<JoinHandle<()>>,
    outbox: mpsc::UnboundedReceiver<Notification>,
    cancel: CancellationToken,
}

impl LinkWorker {
    /// Create a worker for `transport`; the task is not started yet
    pub fn new(
        transport: Box<dyn Transport>,
        session: SessionConfig,
        channel: ChannelConfig,
        tick_interval: Duration,
    ) -> Self {
        let channel = Channel::new(transport, channel);
        Self::from_session(SessionStateMachine::new(channel, session), tick_interval)
    }

    /// Create a worker around an existing session state machine
    pub fn from_session(session: SessionStateMachine, tick_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let name = session.name().clone();
        let runner = LinkRunner {
            session,
            outbox: tx,
            tick_interval,
            cancel: cancel.clone(),
        };

        Self {
            name,
            runner: Some(runner),
            handle: None,
            outbox: rx,
            cancel,
        }
    }

    /// Link name, taken from the transport
    pub fn name(&self) -> &LinkName {
        &self.name
    }

    /// Spawn the worker task; must be called within a tokio runtime
    ///
    /// Calling it again after the first start has no effect.
    pub fn start(&mut self) {
        let Some(runner) = self.runner.take() else {
            return;
        };
        let span = tracing::info_span!("link", name = %self.name);
        self.handle = Some(tokio::spawn(runner.run().instrument(span)));
    }

    /// Request the worker loop to stop
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has been started and is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Whether the task has been started and has since exited
    pub fn has_exited(&self) -> bool {
        self.handle.as_ref().map_or(false, JoinHandle::is_finished)
    }

    /// Take the next pending notification without waiting
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.outbox.try_recv().ok()
    }

    /// Stop the worker and wait for its task to exit
    pub async fn join(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!("link {} worker panicked", self.name);
                } else {
                    tracing::warn!("link {} worker aborted: {}", self.name, e);
                }
            }
        }
    }
}

impl Drop for LinkWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State moved into the worker task
struct LinkRunner {
    session: SessionStateMachine,
    outbox: mpsc::UnboundedSender<Notification>,
    tick_interval: Duration,
    cancel: CancellationToken,
}

impl LinkRunner {
    async fn run(mut self) {
        tracing::info!("link worker started");
        if let Err(e) = self.session.channel_mut().open() {
            tracing::warn!("initial open failed: {}", e);
        }

        loop {
            match self.guarded_step() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_fatal() => {
                    tracing::error!("link worker stopping: {}", e);
                    break;
                }
                Ok(Err(e)) => tracing::warn!("link tick failed: {}", e),
                Err(payload) => {
                    tracing::error!(
                        state = ?self.session.state(),
                        "link tick panicked: {}",
                        panic_message(&*payload)
                    );
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        self.session.channel_mut().close();
        tracing::info!("link worker stopped");
    }

    /// One tick, with panics caught and blocking calls kept off the
    /// scheduler threads
    fn guarded_step(&mut self) -> std::thread::Result<Result<(), LinkError>> {
        if Handle::current().runtime_flavor() == RuntimeFlavor::MultiThread {
            tokio::task::block_in_place(|| catch_unwind(AssertUnwindSafe(|| self.step())))
        } else {
            catch_unwind(AssertUnwindSafe(|| self.step()))
        }
    }

    fn step(&mut self) -> Result<(), LinkError> {
        self.session.channel_mut().ensure_open()?;

        if let Some(notification) = self.session.tick() {
            self.publish(notification)?;
        }
        if self.session.channel_mut().consume_dead_edge() {
            let timeout = Notification::link_timeout(self.session.name().clone());
            self.publish(timeout)?;
        }
        Ok(())
    }

    fn publish(&self, notification: Notification) -> Result<(), LinkError> {
        self.outbox
            .send(notification)
            .map_err(|_| LinkError::OutboxClosed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
