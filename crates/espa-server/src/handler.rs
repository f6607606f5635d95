//! Notification handlers shipped with the daemon

use async_trait::async_trait;
use std::io::Write;

use espa_core::NotificationHandler;
use espa_protocol::Notification;

/// Logs every notification
#[derive(Debug, Default)]
pub struct LoggingHandler;

#[async_trait]
impl NotificationHandler for LoggingHandler {
    async fn on_notification(&mut self, notification: Notification) {
        match &notification {
            Notification::CallToPager(call) => tracing::info!(
                "[{}]->paging({}) with message <{}>",
                call.source(),
                call.call_address().unwrap_or_default(),
                call.message().unwrap_or_default()
            ),
            Notification::LinkTimeout(timeout) => {
                tracing::warn!("[{}] link timeout", timeout.source)
            }
        }
    }
}

/// Writes every notification as one JSON object per line
pub struct JsonLinesHandler<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesHandler<W> {
    /// Create a handler writing to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, notification: &Notification) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, notification)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[async_trait]
impl<W: Write + Send> NotificationHandler for JsonLinesHandler<W> {
    async fn on_notification(&mut self, notification: Notification) {
        if let Err(e) = self.write_line(&notification) {
            tracing::error!("failed to write notification {}: {}", notification, e);
        }
    }
}
