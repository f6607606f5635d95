//! Block framing and block check character
//!
//! A message block on the wire:
//!
//! ```text
//! <SOH> <function> <STX> <id> <US> <value> (<RS> <id> <US> <value>)* <ETX> <BCC>
//! ```
//!
//! - function: one ASCII digit selecting the kind of request
//! - id/value: field id and value, bytes mapped 1:1 to characters
//! - BCC: XOR of every byte after SOH up to and including ETX

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProtocolError;

/// Start of header
pub const SOH: u8 = 0x01;
/// Start of text (end of the function code header)
pub const STX: u8 = 0x02;
/// End of text (last byte covered by the BCC)
pub const ETX: u8 = 0x03;
/// End of transmission
pub const EOT: u8 = 0x04;
/// Enquiry
pub const ENQ: u8 = 0x05;
/// Acknowledge
pub const ACK: u8 = 0x06;
/// Negative acknowledge
pub const NAK: u8 = 0x15;
/// Record separator between fields
pub const RS: u8 = 0x1E;
/// Unit separator between field id and value
pub const US: u8 = 0x1F;

/// Format bytes as `01:02:1F` for trace output
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Running XOR block check character
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bcc(u8);

impl Bcc {
    /// Start a new checksum
    pub fn new() -> Self {
        Self(0)
    }

    /// Fold one byte into the checksum
    pub fn update(&mut self, byte: u8) {
        self.0 ^= byte;
    }

    /// Fold a run of bytes into the checksum
    pub fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// Current checksum value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Checksum of a complete run of bytes
    pub fn of(data: &[u8]) -> u8 {
        let mut bcc = Self::new();
        bcc.extend(data);
        bcc.value()
    }
}

/// Function code carried in the block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionCode {
    /// `'1'` call to pager
    CallToPager,
    /// `'2'` status information
    StatusInformation,
    /// `'3'` status request
    StatusRequest,
    /// `'4'` call subscriber line
    CallSubscriberLine,
    /// Any other header byte
    Unknown(u8),
}

impl FunctionCode {
    /// Convert to the header byte
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::CallToPager => b'1',
            Self::StatusInformation => b'2',
            Self::StatusRequest => b'3',
            Self::CallSubscriberLine => b'4',
            Self::Unknown(b) => *b,
        }
    }

    /// Convert from the header byte
    pub fn from_u8(value: u8) -> Self {
        match value {
            b'1' => Self::CallToPager,
            b'2' => Self::StatusInformation,
            b'3' => Self::StatusRequest,
            b'4' => Self::CallSubscriberLine,
            other => Self::Unknown(other),
        }
    }

    /// Whether the code is part of ESPA 4.4.4
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// A parsed block body: function code plus ordered data fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Function code from the header
    pub function: FunctionCode,
    /// Fields in wire order
    pub fields: Vec<(String, String)>,
}

impl Block {
    /// Create an empty block
    pub fn new(function: FunctionCode) -> Self {
        Self {
            function,
            fields: Vec::new(),
        }
    }

    /// Append a field
    pub fn with_field(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((id.into(), value.into()));
        self
    }

    /// Look up a field value; the last occurrence wins
    pub fn field(&self, id: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == id)
            .map(|(_, v)| v.as_str())
    }

    /// Collapse the fields into a map; later duplicates replace earlier ones
    pub fn into_field_map(self) -> BTreeMap<String, String> {
        self.fields.into_iter().collect()
    }

    /// Parse the bytes between SOH and ETX (exclusive of both)
    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut parts = body.split(|&b| b == STX);
        let header = parts.next().unwrap_or_default();
        let data = parts.next().ok_or(ProtocolError::MissingSeparator)?;
        if parts.next().is_some() {
            return Err(ProtocolError::MissingSeparator);
        }

        let function = match header {
            [code] => FunctionCode::from_u8(*code),
            _ => return Err(ProtocolError::InvalidHeader(header.to_vec())),
        };

        let mut fields = Vec::new();
        for record in data.split(|&b| b == RS).filter(|r| !r.is_empty()) {
            let mut units = record.split(|&b| b == US);
            match (units.next(), units.next(), units.next()) {
                (Some(id), Some(value), None) => fields.push((latin1(id), latin1(value))),
                _ => return Err(ProtocolError::MalformedRecord(record.to_vec())),
            }
        }

        Ok(Self { function, fields })
    }

    /// Encode the bytes between SOH and ETX
    pub fn encode_body(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.put_u8(self.function.as_u8());
        dst.put_u8(STX);
        for (i, (id, value)) in self.fields.iter().enumerate() {
            if id.is_empty() {
                return Err(ProtocolError::EmptyFieldId);
            }
            if i > 0 {
                dst.put_u8(RS);
            }
            put_latin1(dst, id)?;
            dst.put_u8(US);
            put_latin1(dst, value)?;
        }
        Ok(())
    }

    /// Encode the full block: SOH, body, ETX and BCC
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut body = BytesMut::new();
        self.encode_body(&mut body)?;
        body.put_u8(ETX);

        let bcc = Bcc::of(&body);
        let mut dst = BytesMut::with_capacity(body.len() + 2);
        dst.put_u8(SOH);
        dst.extend_from_slice(&body);
        dst.put_u8(bcc);
        Ok(dst.freeze())
    }
}

/// Map each byte to the character with the same code point
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn put_latin1(dst: &mut BytesMut, s: &str) -> Result<(), ProtocolError> {
    for c in s.chars() {
        match u8::try_from(c) {
            Ok(b) if b >= 0x20 => dst.put_u8(b),
            _ => return Err(ProtocolError::Unencodable(c)),
        }
    }
    Ok(())
}
