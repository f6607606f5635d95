//! espa-protocol: Wire protocol for ESPA 4.4.4 paging links
//!
//! This crate defines the character-framed block format exchanged between
//! control equipment and a paging system, the block check character, the
//! message-level decoder state machine, and the notifications it produces.

pub mod codec;
pub mod deadline;
pub mod error;
pub mod frame;
pub mod link;
pub mod notification;

pub use codec::{BlockDecoder, BlockOutcome, ByteSource, DEFAULT_BLOCK_TIMEOUT};
pub use deadline::Deadline;
pub use error::ProtocolError;
pub use frame::{Bcc, Block, FunctionCode};
pub use link::LinkName;
pub use notification::{CallToPager, LinkTimeout, Notification};
