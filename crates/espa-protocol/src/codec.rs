//! Message block decoder
//!
//! [`BlockDecoder`] assembles one framed block from a byte source, checks
//! its BCC and turns the body into a [`Notification`]. It is driven by
//! repeated, non-blocking [`BlockDecoder::tick`] calls and is created fresh
//! for every transaction.

use bytes::{BufMut, BytesMut};
use std::collections::VecDeque;
use std::time::Duration;

use crate::deadline::Deadline;
use crate::frame::{hex_dump, Bcc, Block, FunctionCode, ETX, SOH};
use crate::link::LinkName;
use crate::notification::{CallToPager, Notification};

/// Default per-state deadline of the decoder
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_millis(3000);

/// Non-blocking supplier of received bytes
pub trait ByteSource {
    /// Next byte if one is available right now
    fn receive_byte(&mut self) -> Option<u8>;
}

impl ByteSource for VecDeque<u8> {
    fn receive_byte(&mut self) -> Option<u8> {
        self.pop_front()
    }
}

/// Result of one decoder tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Still assembling, tick again later
    Pending,
    /// Block received and decoded into a notification
    Complete(Notification),
    /// Block received intact but carries nothing to report
    Ignored,
    /// Block is corrupt, out of sequence or late
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Init,
    AwaitSoh,
    Body,
    AwaitBcc,
    Finished,
}

/// Message-level state machine for one block transaction
#[derive(Debug)]
pub struct BlockDecoder {
    source: LinkName,
    state: DecoderState,
    deadline: Deadline,
    timeout: Duration,
    body: BytesMut,
    bcc: Bcc,
}

impl BlockDecoder {
    /// Create a decoder for blocks received on `source`
    pub fn new(source: LinkName, timeout: Duration) -> Self {
        Self {
            source,
            state: DecoderState::Init,
            deadline: Deadline::none(),
            timeout,
            body: BytesMut::new(),
            bcc: Bcc::new(),
        }
    }

    /// Whether the decoder has resolved and must be discarded
    pub fn is_finished(&self) -> bool {
        self.state == DecoderState::Finished
    }

    fn advance(&mut self, state: DecoderState, timeout: Option<Duration>) {
        tracing::trace!("message state {:?} -> {:?}", self.state, state);
        self.state = state;
        if let Some(timeout) = timeout {
            self.deadline.set(timeout);
        }
    }

    fn finish(&mut self) {
        self.state = DecoderState::Finished;
        self.deadline.clear();
    }

    /// Consume whatever bytes are available and report progress
    pub fn tick<S: ByteSource + ?Sized>(&mut self, src: &mut S) -> BlockOutcome {
        if !matches!(self.state, DecoderState::Init | DecoderState::Finished)
            && self.deadline.is_expired()
        {
            tracing::warn!("message state {:?} timeout", self.state);
            self.finish();
            return BlockOutcome::Rejected;
        }

        match self.state {
            DecoderState::Init => {
                self.advance(DecoderState::AwaitSoh, Some(self.timeout));
                tracing::debug!("waiting for <SOH>");
                BlockOutcome::Pending
            }
            DecoderState::AwaitSoh => match src.receive_byte() {
                None => BlockOutcome::Pending,
                Some(SOH) => {
                    self.body.clear();
                    self.bcc = Bcc::new();
                    self.advance(DecoderState::Body, Some(self.timeout));
                    tracing::debug!("<SOH> ok, waiting for block data and <ETX>");
                    BlockOutcome::Pending
                }
                Some(byte) => {
                    tracing::warn!("expected <SOH>, got {:02X}", byte);
                    self.finish();
                    BlockOutcome::Rejected
                }
            },
            DecoderState::Body => {
                while let Some(byte) = src.receive_byte() {
                    self.bcc.update(byte);
                    if byte == ETX {
                        self.advance(DecoderState::AwaitBcc, None);
                        tracing::debug!("<ETX> ok, waiting for <BCC>");
                        break;
                    }
                    self.body.put_u8(byte);
                }
                BlockOutcome::Pending
            }
            DecoderState::AwaitBcc => match src.receive_byte() {
                None => BlockOutcome::Pending,
                Some(byte) if byte == self.bcc.value() => {
                    tracing::debug!("<BCC> ok");
                    self.finish();
                    self.decode()
                }
                Some(byte) => {
                    tracing::error!(
                        "<BCC> invalid: expected {:02X}, got {:02X}",
                        self.bcc.value(),
                        byte
                    );
                    self.finish();
                    BlockOutcome::Rejected
                }
            },
            DecoderState::Finished => BlockOutcome::Rejected,
        }
    }

    fn decode(&self) -> BlockOutcome {
        let block = match Block::parse(&self.body) {
            Ok(block) => block,
            Err(e) => {
                tracing::error!("malformed block [{}]: {}", hex_dump(&self.body), e);
                return BlockOutcome::Rejected;
            }
        };

        match block.function {
            FunctionCode::CallToPager => {
                match CallToPager::from_fields(self.source.clone(), block.into_field_map()) {
                    Ok(request) => BlockOutcome::Complete(request.into()),
                    Err(e) => {
                        tracing::warn!("discarding call to pager: {}", e);
                        BlockOutcome::Ignored
                    }
                }
            }
            other if other.is_recognized() => {
                tracing::warn!(
                    "yet unsupported function [{}]",
                    char::from(other.as_u8())
                );
                BlockOutcome::Ignored
            }
            other => {
                tracing::warn!("unknown function code {:02X}", other.as_u8());
                BlockOutcome::Ignored
            }
        }
    }
}
