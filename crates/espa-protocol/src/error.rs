//! Protocol error types

use thiserror::Error;

/// Errors that can occur while parsing or building ESPA blocks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Block body has no single STX separating header from data
    #[error("Block has no header/body separator")]
    MissingSeparator,

    /// Header is not exactly one function code character
    #[error("Invalid function code header: {0:02X?}")]
    InvalidHeader(Vec<u8>),

    /// A data record has no unit separator between id and value
    #[error("Malformed record: {0:02X?}")]
    MalformedRecord(Vec<u8>),

    /// A mandatory field for the notification kind is absent or empty
    #[error("Missing mandatory field {0}")]
    MissingField(&'static str),

    /// Character cannot be carried by the 8-bit framing
    #[error("Unencodable character {0:?}")]
    Unencodable(char),

    /// Field id is empty
    #[error("Empty field id")]
    EmptyFieldId,
}
