//! Byte channel over one link transport
//!
//! The [`Channel`] owns the transport of a link and keeps an inbound
//! accumulation buffer in front of it. It also supervises link activity:
//! when nothing is received for the activity window the link is declared
//! dead, the transport is closed, and an edge is raised for the worker to
//! report a single `LinkTimeout`.
//!
//! # Failure policy
//!
//! Transport failures never propagate from `receive` or `send`. A failed
//! read or write closes the transport; the next use reopens it once the
//! reopen backoff has elapsed.

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

use espa_core::config::ChannelConfig;
use espa_core::{Transport, TransportError};
use espa_protocol::frame::{hex_dump, ACK, EOT, NAK};
use espa_protocol::{ByteSource, LinkName};

/// Buffered, activity-supervised byte channel
pub struct Channel {
    transport: Box<dyn Transport>,
    name: LinkName,
    config: ChannelConfig,
    inbuf: BytesMut,
    activity_deadline: Instant,
    dead: bool,
    dead_edge: bool,
    open: bool,
    next_open_attempt: Option<Instant>,
}

impl Channel {
    /// Wrap a transport; the activity window starts now
    pub fn new(transport: Box<dyn Transport>, config: ChannelConfig) -> Self {
        let name = LinkName::new(transport.name());
        let activity_deadline = Instant::now() + config.activity_timeout;
        Self {
            transport,
            name,
            config,
            inbuf: BytesMut::new(),
            activity_deadline,
            dead: false,
            dead_edge: false,
            open: false,
            next_open_attempt: None,
        }
    }

    /// Link name reported by the transport
    pub fn name(&self) -> &LinkName {
        &self.name
    }

    /// Whether the transport is currently open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the link is considered dead
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Number of bytes waiting in the inbound buffer
    pub fn buffered(&self) -> usize {
        self.inbuf.len()
    }

    /// Attempt to open the transport now
    pub fn open(&mut self) -> Result<(), TransportError> {
        if self.open {
            return Ok(());
        }
        self.next_open_attempt = Some(Instant::now() + self.config.reopen_backoff);
        tracing::info!("open()");
        self.transport.open()?;
        self.open = true;
        tracing::info!("link opened");
        Ok(())
    }

    /// Open the transport if it is closed and the reopen backoff allows it
    ///
    /// Returns whether the transport is open afterwards.
    pub fn ensure_open(&mut self) -> Result<bool, TransportError> {
        if self.open {
            return Ok(true);
        }
        if self
            .next_open_attempt
            .map_or(false, |at| Instant::now() < at)
        {
            return Ok(false);
        }
        self.open().map(|()| true)
    }

    fn ready(&mut self) -> bool {
        match self.ensure_open() {
            Ok(open) => open,
            Err(e) => {
                tracing::warn!("open failed: {}", e);
                false
            }
        }
    }

    /// Close the transport
    pub fn close(&mut self) {
        if self.open {
            tracing::info!("close()");
            self.transport.close();
            self.open = false;
        }
    }

    /// Close after a failure and hold off reopening for the backoff period
    fn tear_down(&mut self) {
        self.close();
        self.next_open_attempt = Some(Instant::now() + self.config.reopen_backoff);
    }

    /// Drop in-flight transport bytes and clear the inbound buffer
    pub fn reset(&mut self) {
        tracing::debug!("reset()");
        if self.ready() {
            if let Err(e) = self.transport.reset() {
                tracing::warn!("reset failed: {}", e);
                self.tear_down();
            }
        }
        self.inbuf.clear();
    }

    fn check_activity(&mut self) {
        let now = Instant::now();
        if now > self.activity_deadline {
            tracing::warn!("client activity timeout!");
            self.set_dead(true);
            self.close();
            self.activity_deadline = now + self.config.dead_cooldown;
        }
    }

    fn fill(&mut self) {
        if !self.ready() {
            return;
        }
        match self.transport.read() {
            Ok(Some(data)) if !data.is_empty() => {
                tracing::trace!("RX[{}]", hex_dump(&data));
                self.inbuf.extend_from_slice(&data);
                self.activity_deadline = Instant::now() + self.config.activity_timeout;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("read failed: {}", e);
                self.tear_down();
            }
        }
    }

    /// Take bytes from the inbound buffer
    ///
    /// With `n == 0` the whole buffer is returned (possibly empty). With
    /// `n > 0` exactly `n` bytes are returned, or nothing at all if fewer
    /// are available; a short buffer is never partially consumed.
    pub fn receive(&mut self, n: usize) -> Option<Bytes> {
        self.check_activity();

        if n == 0 || n > self.inbuf.len() {
            self.fill();
        }

        if n == 0 {
            return Some(self.inbuf.split().freeze());
        }
        if self.inbuf.len() >= n {
            Some(self.inbuf.split_to(n).freeze())
        } else {
            None
        }
    }

    /// Take a single byte
    pub fn receive_byte(&mut self) -> Option<u8> {
        self.receive(1).map(|b| b[0])
    }

    /// Write bytes to the transport; returns whether they were written
    pub fn send(&mut self, data: &[u8]) -> bool {
        if data.is_empty() || !self.ready() {
            return false;
        }
        tracing::trace!("TX[{}]", hex_dump(data));
        match self.transport.write(data) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("write failed: {}", e);
                self.tear_down();
                false
            }
        }
    }

    /// Send a single byte
    pub fn send_byte(&mut self, byte: u8) -> bool {
        self.send(&[byte])
    }

    /// Send `<ACK>`
    pub fn ack(&mut self) -> bool {
        tracing::debug!(">ACK");
        self.send_byte(ACK)
    }

    /// Send `<NAK>`
    pub fn nak(&mut self) -> bool {
        tracing::debug!(">NAK");
        self.send_byte(NAK)
    }

    /// Send `<EOT>`
    pub fn eot(&mut self) -> bool {
        tracing::debug!(">EOT");
        self.send_byte(EOT)
    }

    /// Mark the link dead or alive; going dead raises the edge
    pub fn set_dead(&mut self, dead: bool) {
        if dead {
            self.dead_edge = true;
        }
        self.dead = dead;
    }

    /// Return and clear the link-dead edge
    pub fn consume_dead_edge(&mut self) -> bool {
        std::mem::take(&mut self.dead_edge)
    }
}

impl ByteSource for Channel {
    fn receive_byte(&mut self) -> Option<u8> {
        Channel::receive_byte(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espa_core::{MemoryPeer, MemoryTransport};
    use std::time::Duration;

    fn channel() -> (Channel, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair("ts940");
        let mut channel = Channel::new(Box::new(transport), ChannelConfig::default());
        channel.open().unwrap();
        (channel, peer)
    }

    #[test]
    fn test_receive_exact_or_nothing() {
        let (mut channel, peer) = channel();
        peer.send(b"ab");

        assert!(channel.receive(3).is_none());
        assert_eq!(channel.buffered(), 2);

        assert_eq!(channel.receive(2).unwrap().as_ref(), b"ab");
        assert_eq!(channel.buffered(), 0);
    }

    #[test]
    fn test_receive_zero_drains_buffer() {
        let (mut channel, peer) = channel();
        assert_eq!(channel.receive(0).unwrap().len(), 0);

        peer.send(b"xyz");
        assert_eq!(channel.receive_byte(), Some(b'x'));
        assert_eq!(channel.receive(0).unwrap().as_ref(), b"yz");
        assert_eq!(channel.receive_byte(), None);
    }

    #[test]
    fn test_reset_discards_everything() {
        let (mut channel, peer) = channel();
        peer.send(b"12");
        assert_eq!(channel.receive_byte(), Some(b'1'));
        peer.send(b"34");

        channel.reset();
        assert_eq!(channel.buffered(), 0);
        assert_eq!(peer.pending(), 0);
        assert_eq!(channel.receive_byte(), None);
    }

    #[test]
    fn test_control_sends() {
        let (mut channel, peer) = channel();
        assert!(channel.ack());
        assert!(channel.nak());
        assert!(channel.eot());
        assert!(!channel.send(&[]));
        assert_eq!(peer.take_written(), vec![ACK, NAK, EOT]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_swallowed_and_backed_off() {
        let (mut channel, peer) = channel();
        peer.set_fail_io(true);
        assert!(!channel.ack());
        assert!(!channel.is_open());

        peer.set_fail_io(false);
        assert!(!channel.ack());
        assert_eq!(peer.open_count(), 1);

        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(channel.ack());
        assert_eq!(peer.open_count(), 2);
        assert_eq!(peer.take_written(), vec![ACK]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_retries_after_backoff() {
        let (transport, peer) = MemoryTransport::pair("ts940");
        let mut channel = Channel::new(Box::new(transport), ChannelConfig::default());

        peer.set_fail_open(true);
        assert!(channel.open().is_err());
        assert!(matches!(channel.ensure_open(), Ok(false)));

        peer.set_fail_open(false);
        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(matches!(channel.ensure_open(), Ok(false)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(channel.ensure_open(), Ok(true)));
        assert!(peer.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_reopens_lazily() {
        let (mut channel, peer) = channel();
        peer.set_fail_io(true);
        assert_eq!(channel.receive_byte(), None);
        assert!(!channel.is_open());

        peer.set_fail_io(false);
        peer.send(b"1");
        assert_eq!(channel.receive_byte(), None);

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(channel.receive_byte(), Some(b'1'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_edge_fires_once_per_silence() {
        let (mut channel, _peer) = channel();

        tokio::time::advance(Duration::from_secs(119)).await;
        channel.receive_byte();
        assert!(!channel.consume_dead_edge());

        tokio::time::advance(Duration::from_secs(2)).await;
        channel.receive_byte();
        assert!(channel.is_dead());
        assert!(channel.consume_dead_edge());
        assert!(!channel.consume_dead_edge());

        // Polling during the cooldown does not raise it again
        for _ in 0..10 {
            tokio::time::advance(Duration::from_secs(5)).await;
            channel.receive_byte();
            assert!(!channel.consume_dead_edge());
        }

        tokio::time::advance(Duration::from_secs(11)).await;
        channel.receive_byte();
        assert!(channel.consume_dead_edge());
        assert!(!channel.consume_dead_edge());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_extends_window() {
        let (mut channel, peer) = channel();

        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(100)).await;
            peer.send(b"x");
            assert_eq!(channel.receive_byte(), Some(b'x'));
        }
        assert!(!channel.consume_dead_edge());
        assert!(!channel.is_dead());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_link_closes_transport() {
        let (mut channel, peer) = channel();
        tokio::time::advance(Duration::from_secs(121)).await;

        channel.receive_byte();
        assert!(channel.is_dead());
        assert_eq!(peer.open_count(), 2, "closed on timeout then lazily reopened");

        channel.set_dead(false);
        assert!(!channel.is_dead());
        assert!(channel.consume_dead_edge());
    }
}
