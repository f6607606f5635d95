//! Notification consumer trait

use async_trait::async_trait;

use espa_protocol::Notification;

/// Consumer of the notifications aggregated from every link
#[async_trait]
pub trait NotificationHandler: Send {
    /// Called once per notification, in per-link arrival order
    async fn on_notification(&mut self, notification: Notification);
}

#[async_trait]
impl<F> NotificationHandler for F
where
    F: FnMut(Notification) + Send,
{
    async fn on_notification(&mut self, notification: Notification) {
        (self)(notification)
    }
}
