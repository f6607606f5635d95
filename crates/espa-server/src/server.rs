//! Multi-link aggregator
//!
//! [`MultiLinkServer`] keeps one [`LinkWorker`] per link name and funnels
//! their outboxes into a single notification handler. It never touches a
//! worker's channel or session; the outboxes are the only shared state.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use espa_core::config::ServerConfig;
use espa_core::NotificationHandler;
use espa_protocol::{LinkName, Notification};

use crate::link::LinkWorker;
use crate::transport::SerialTransport;

/// Default aggregator polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Registry and aggregator of link workers
pub struct MultiLinkServer {
    workers: BTreeMap<LinkName, LinkWorker>,
    poll_interval: Duration,
    started: bool,
}

impl MultiLinkServer {
    /// Create an empty server
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            workers: BTreeMap::new(),
            poll_interval,
            started: false,
        }
    }

    /// Create a server with one serial worker per configured link
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut server = Self::new(config.poll_interval);
        for link in &config.links {
            let transport = SerialTransport::new(link.clone());
            server.add(LinkWorker::new(
                Box::new(transport),
                config.session_for(link).clone(),
                config.channel.clone(),
                config.tick_interval,
            ));
        }
        server
    }

    /// Register a worker under its link name
    ///
    /// A worker already registered under the same name is replaced, stopped
    /// and handed back. Workers added after `start` are started right away.
    pub fn add(&mut self, mut worker: LinkWorker) -> Option<LinkWorker> {
        if self.started {
            worker.start();
        }
        let name = worker.name().clone();
        let replaced = self.workers.insert(name.clone(), worker);
        if let Some(old) = &replaced {
            tracing::warn!("link {} registered twice, replacing the previous worker", name);
            old.stop();
        }
        replaced
    }

    /// Number of registered links
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Check if no link is registered
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Check if a link is registered
    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(&LinkName::from(name))
    }

    /// Get the worker of a link
    pub fn get(&self, name: &str) -> Option<&LinkWorker> {
        self.workers.get(&LinkName::from(name))
    }

    /// Registered link names in order
    pub fn links(&self) -> impl Iterator<Item = &LinkName> {
        self.workers.keys()
    }

    /// Start every registered worker
    pub fn start(&mut self) {
        tracing::info!("starting {} link(s)", self.workers.len());
        for worker in self.workers.values_mut() {
            worker.start();
        }
        self.started = true;
    }

    /// Drain every pending notification without waiting
    pub fn poll(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for worker in self.workers.values_mut() {
            while let Some(notification) = worker.try_recv() {
                notifications.push(notification);
            }
        }
        notifications
    }

    /// Name of a worker whose loop has exited on its own
    fn exited_link(&self) -> Option<&LinkName> {
        self.workers
            .iter()
            .find(|(_, worker)| worker.has_exited())
            .map(|(name, _)| name)
    }

    /// Request every worker to stop
    pub fn stop(&self) {
        for worker in self.workers.values() {
            worker.stop();
        }
    }

    /// Stop every worker and wait for all of them to exit
    pub async fn join(&mut self) {
        join_all(self.workers.values_mut().map(|worker| worker.join())).await;
        self.started = false;
    }

    /// Run until `shutdown` is cancelled or a worker exits on its own
    ///
    /// Every notification is handed to `handler`. On the way out all
    /// workers are stopped and joined, then notifications still queued are
    /// delivered.
    pub async fn run<H>(&mut self, handler: &mut H, shutdown: CancellationToken)
    where
        H: NotificationHandler + ?Sized,
    {
        self.start();

        loop {
            for notification in self.poll() {
                handler.on_notification(notification).await;
            }

            if let Some(name) = self.exited_link() {
                tracing::error!("link {} stopped unexpectedly, shutting down", name);
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.stop();
        self.join().await;

        for notification in self.poll() {
            handler.on_notification(notification).await;
        }
        tracing::info!("all links stopped");
    }
}

impl Default for MultiLinkServer {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
