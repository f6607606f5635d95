//! Server-side session state machine
//!
//! Every transaction starts with the control equipment announcing itself
//! and selecting the paging system:
//!
//! ```text
//! control:  <ControlAddr> <ENQ> <PagingAddr> <ENQ>
//! server:                                          <ACK>
//! control:  <SOH> ... <ETX> <BCC>
//! server:   <ACK> <EOT>            block decoded
//!         | <ControlAddr> <NAK> <EOT>   block rejected
//! ```
//!
//! Any unexpected byte or expired deadline sends `<EOT>` and returns to
//! [`SessionState::Idle`], which resets the channel and waits for the next
//! announcement.

use espa_core::config::SessionConfig;
use espa_protocol::frame::ENQ;
use espa_protocol::{BlockDecoder, BlockOutcome, Deadline, LinkName, Notification};

use crate::channel::Channel;

/// Position in the session handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Resetting the channel before the next transaction
    Idle,
    /// Waiting for the control equipment address
    AwaitControlAddress,
    /// Waiting for the first `<ENQ>`
    AwaitFirstEnq,
    /// Waiting for the paging system address
    AwaitPagingAddress,
    /// Waiting for the second `<ENQ>`
    AwaitSecondEnq,
    /// Receiving the message block
    Transaction,
}

/// Drives one channel through negotiation and block transactions
pub struct SessionStateMachine {
    config: SessionConfig,
    channel: Channel,
    state: SessionState,
    deadline: Deadline,
    decoder: Option<BlockDecoder>,
}

impl SessionStateMachine {
    /// Create a session machine that owns `channel`
    pub fn new(channel: Channel, config: SessionConfig) -> Self {
        Self {
            config,
            channel,
            state: SessionState::Idle,
            deadline: Deadline::none(),
            decoder: None,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Link name of the underlying channel
    pub fn name(&self) -> &LinkName {
        self.channel.name()
    }

    /// The underlying channel
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// The underlying channel, mutably
    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    fn advance(&mut self, state: SessionState) {
        tracing::debug!("server state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn advance_with_timeout(&mut self, state: SessionState, timeout: std::time::Duration) {
        self.advance(state);
        self.deadline.set(timeout);
    }

    /// Abort the current transaction
    fn reset_state(&mut self) {
        self.channel.eot();
        self.decoder = None;
        self.deadline.clear();
        self.advance(SessionState::Idle);
    }

    /// Check the next byte against `expected`; a mismatch resets the session
    ///
    /// Returns true only on a match.
    fn expect(&mut self, expected: u8) -> bool {
        let Some(byte) = self.channel.receive_byte() else {
            return false;
        };
        if byte == expected {
            return true;
        }
        tracing::debug!(
            "state {:?}: expected {:02X}, got {:02X}",
            self.state,
            expected,
            byte
        );
        self.reset_state();
        false
    }

    /// Run one non-blocking step
    ///
    /// Returns the notification completed by this step, if any.
    pub fn tick(&mut self) -> Option<Notification> {
        if self.state != SessionState::Idle && self.deadline.is_expired() {
            tracing::warn!("server state {:?} timeout", self.state);
            self.reset_state();
        }

        match self.state {
            SessionState::Idle => {
                self.channel.reset();
                self.decoder = None;
                self.advance_with_timeout(
                    SessionState::AwaitControlAddress,
                    self.config.idle_timeout,
                );
                None
            }
            SessionState::AwaitControlAddress => {
                if self.expect(self.config.control_address.as_u8()) {
                    self.advance_with_timeout(
                        SessionState::AwaitFirstEnq,
                        self.config.negotiation_timeout,
                    );
                }
                None
            }
            SessionState::AwaitFirstEnq => {
                if self.expect(ENQ) {
                    self.advance(SessionState::AwaitPagingAddress);
                }
                None
            }
            SessionState::AwaitPagingAddress => {
                if self.expect(self.config.paging_address.as_u8()) {
                    self.advance(SessionState::AwaitSecondEnq);
                }
                None
            }
            SessionState::AwaitSecondEnq => {
                if self.expect(ENQ) {
                    self.channel.ack();
                    self.channel.set_dead(false);
                    self.decoder = Some(BlockDecoder::new(
                        self.channel.name().clone(),
                        self.config.block_timeout,
                    ));
                    self.advance_with_timeout(
                        SessionState::Transaction,
                        self.config.message_timeout,
                    );
                }
                None
            }
            SessionState::Transaction => self.transact(),
        }
    }

    fn transact(&mut self) -> Option<Notification> {
        let Some(decoder) = self.decoder.as_mut() else {
            tracing::warn!("transaction without a block decoder");
            self.reset_state();
            return None;
        };

        match decoder.tick(&mut self.channel) {
            BlockOutcome::Pending => None,
            BlockOutcome::Complete(notification) => {
                tracing::info!("{}", notification);
                self.channel.ack();
                self.reset_state();
                Some(notification)
            }
            BlockOutcome::Ignored => {
                self.channel.ack();
                self.reset_state();
                None
            }
            BlockOutcome::Rejected => {
                tracing::warn!("block rejected, sending NAK");
                let reply = self.config.nak_reply();
                self.channel.send(&reply);
                self.reset_state();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espa_core::config::ChannelConfig;
    use espa_core::{MemoryPeer, MemoryTransport};
    use espa_protocol::frame::{ACK, EOT, NAK};
    use espa_protocol::{Block, CallToPager, FunctionCode};
    use std::time::Duration;

    const NEGOTIATION: &[u8] = b"1\x052\x05";

    fn machine_with(config: SessionConfig) -> (SessionStateMachine, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair("ts940");
        let mut channel = Channel::new(Box::new(transport), ChannelConfig::default());
        channel.open().unwrap();
        (SessionStateMachine::new(channel, config), peer)
    }

    fn machine() -> (SessionStateMachine, MemoryPeer) {
        machine_with(SessionConfig::default())
    }

    fn tick_n(machine: &mut SessionStateMachine, n: usize) -> Vec<Notification> {
        (0..n).filter_map(|_| machine.tick()).collect()
    }

    /// Bring a fresh machine into the transaction state
    fn negotiate(machine: &mut SessionStateMachine, peer: &MemoryPeer) {
        machine.tick();
        peer.send(NEGOTIATION);
        tick_n(machine, NEGOTIATION.len());
        assert_eq!(machine.state(), SessionState::Transaction);
        assert_eq!(peer.take_written(), vec![ACK]);
    }

    fn call_frame(address: &str, message: &str) -> Vec<u8> {
        CallToPager::new(LinkName::from("ts940"), address, message)
            .to_block()
            .encode()
            .unwrap()
            .to_vec()
    }

    #[tokio::test(start_paused = true)]
    async fn test_negotiation_byte_by_byte() {
        let (mut machine, peer) = machine();
        machine.tick();
        assert_eq!(machine.state(), SessionState::AwaitControlAddress);
        assert_eq!(peer.reset_count(), 1);

        let expected = [
            SessionState::AwaitFirstEnq,
            SessionState::AwaitPagingAddress,
            SessionState::AwaitSecondEnq,
            SessionState::Transaction,
        ];
        for (&byte, state) in NEGOTIATION.iter().zip(expected) {
            // Nothing arrives yet, the machine waits
            machine.tick();
            tokio::time::advance(Duration::from_millis(500)).await;
            peer.send(&[byte]);
            machine.tick();
            assert_eq!(machine.state(), state);
        }

        assert_eq!(peer.take_written(), vec![ACK]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_byte_at_any_position_resets() {
        for position in 0..NEGOTIATION.len() {
            let (mut machine, peer) = machine();
            machine.tick();

            let mut bytes = NEGOTIATION.to_vec();
            bytes[position] = b'X';
            peer.send(&bytes);
            tick_n(&mut machine, position + 1);

            assert_eq!(machine.state(), SessionState::Idle, "position {}", position);
            assert_eq!(peer.take_written(), vec![EOT]);

            machine.tick();
            assert_eq!(machine.state(), SessionState::AwaitControlAddress);
            assert_eq!(peer.reset_count(), 2);
            assert_eq!(machine.channel().buffered(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_addresses_follow_config() {
        let config = SessionConfig {
            control_address: 'A'.try_into().unwrap(),
            paging_address: 'B'.try_into().unwrap(),
            ..SessionConfig::default()
        };
        let (mut machine, peer) = machine_with(config);
        machine.tick();

        peer.send(NEGOTIATION);
        machine.tick();
        assert_eq!(machine.state(), SessionState::Idle);
        machine.tick();
        peer.take_written();

        peer.send(b"A\x05B\x05");
        tick_n(&mut machine, 4);
        assert_eq!(machine.state(), SessionState::Transaction);
        assert_eq!(peer.take_written(), vec![ACK]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_to_pager_transaction() {
        let (mut machine, peer) = machine();
        negotiate(&mut machine, &peer);

        peer.send(&call_frame("1234", "fire alarm level 2"));
        let notifications = tick_n(&mut machine, 6);

        assert_eq!(notifications.len(), 1);
        let call = notifications[0].as_call_to_pager().unwrap();
        assert_eq!(call.call_address(), Some("1234"));
        assert_eq!(call.message(), Some("fire alarm level 2"));
        assert_eq!(call.source().as_str(), "ts940");

        assert_eq!(peer.take_written(), vec![ACK, EOT]);
        assert_eq!(machine.state(), SessionState::AwaitControlAddress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_bcc_sends_nak() {
        let (mut machine, peer) = machine();
        negotiate(&mut machine, &peer);

        let mut frame = call_frame("1234", "hello");
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        peer.send(&frame);

        assert!(tick_n(&mut machine, 6).is_empty());
        assert_eq!(peer.take_written(), vec![b'1', NAK, EOT]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_function_is_acknowledged() {
        let (mut machine, peer) = machine();
        negotiate(&mut machine, &peer);

        let frame = Block::new(FunctionCode::StatusRequest)
            .with_field("2", "1234")
            .encode()
            .unwrap();
        peer.send(&frame);

        assert!(tick_n(&mut machine, 6).is_empty());
        assert_eq!(peer.take_written(), vec![ACK, EOT]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_message_phase_sends_eot() {
        let (mut machine, peer) = machine();
        negotiate(&mut machine, &peer);

        let mut notifications = Vec::new();
        for _ in 0..15 {
            tokio::time::advance(Duration::from_secs(1)).await;
            notifications.extend(machine.tick());
        }

        assert!(notifications.is_empty());
        let written = peer.take_written();
        assert_eq!(written.last(), Some(&EOT));
        assert_ne!(machine.state(), SessionState::Transaction);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_timeout_resets_session() {
        let config = SessionConfig {
            block_timeout: Duration::from_secs(20),
            ..SessionConfig::default()
        };
        let (mut machine, peer) = machine_with(config);
        negotiate(&mut machine, &peer);
        machine.tick();

        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(machine.tick().is_none());
        assert_eq!(machine.state(), SessionState::Transaction);
        assert!(peer.take_written().is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(machine.tick().is_none());
        assert_eq!(peer.take_written(), vec![EOT]);
        assert_eq!(machine.state(), SessionState::AwaitControlAddress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negotiation_window_expires() {
        let (mut machine, peer) = machine();
        machine.tick();
        peer.send(b"1");
        machine.tick();
        assert_eq!(machine.state(), SessionState::AwaitFirstEnq);

        tokio::time::advance(Duration::from_millis(2600)).await;
        peer.send(b"\x05");
        machine.tick();

        assert_eq!(machine.state(), SessionState::AwaitControlAddress);
        assert_eq!(peer.take_written(), vec![EOT]);
        assert_eq!(peer.reset_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_sends_eot() {
        let (mut machine, peer) = machine();
        machine.tick();

        tokio::time::advance(Duration::from_secs(59)).await;
        machine.tick();
        assert!(peer.take_written().is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        machine.tick();
        assert_eq!(peer.take_written(), vec![EOT]);
        assert_eq!(machine.state(), SessionState::AwaitControlAddress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negotiation_marks_link_alive() {
        let (mut machine, peer) = machine();
        machine.tick();

        tokio::time::advance(Duration::from_secs(121)).await;
        machine.tick();
        machine.tick();
        assert!(machine.channel().is_dead());

        peer.send(NEGOTIATION);
        tick_n(&mut machine, NEGOTIATION.len());
        assert_eq!(machine.state(), SessionState::Transaction);
        assert!(!machine.channel().is_dead());
        assert!(machine.channel_mut().consume_dead_edge());
    }
}
