//! Notifications decoded from ESPA links
//!
//! A notification is an immutable record of something that happened on a
//! link: a decoded call-to-pager request, or the link going silent. Every
//! notification carries the name of the link it came from and exposes its
//! data through a uniform field lookup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ProtocolError;
use crate::frame::{Block, FunctionCode};
use crate::link::LinkName;

/// Field ids of a call-to-pager block
pub mod field {
    /// Message text
    pub const MESSAGE: &str = "1";
    /// Call (pager) address
    pub const CALL_ADDRESS: &str = "2";
    /// Beep coding
    pub const BEEP_CODING: &str = "3";
    /// Call type
    pub const CALL_TYPE: &str = "4";
    /// Priority
    pub const PRIORITY: &str = "6";
}

/// Event surfaced to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A page request from the control equipment
    CallToPager(CallToPager),
    /// The link produced no bytes for the activity window
    LinkTimeout(LinkTimeout),
}

impl Notification {
    /// Build a link timeout notification
    pub fn link_timeout(source: LinkName) -> Self {
        Self::LinkTimeout(LinkTimeout { source })
    }

    /// Short kind name (`calltopager`, `linktimeout`)
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallToPager(_) => CallToPager::NAME,
            Self::LinkTimeout(_) => LinkTimeout::NAME,
        }
    }

    /// Case-insensitive kind name comparison
    pub fn is_name(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
    }

    /// Link the notification came from
    pub fn source(&self) -> &LinkName {
        match self {
            Self::CallToPager(n) => &n.source,
            Self::LinkTimeout(n) => &n.source,
        }
    }

    /// Look up a decoded field by wire id
    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            Self::CallToPager(n) => n.field(key),
            Self::LinkTimeout(_) => None,
        }
    }

    /// Get the call-to-pager payload, if this is one
    pub fn as_call_to_pager(&self) -> Option<&CallToPager> {
        match self {
            Self::CallToPager(n) => Some(n),
            Self::LinkTimeout(_) => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallToPager(n) => write!(f, "{}", n),
            Self::LinkTimeout(n) => write!(f, "{}:{}", n.source, LinkTimeout::NAME),
        }
    }
}

impl From<CallToPager> for Notification {
    fn from(n: CallToPager) -> Self {
        Self::CallToPager(n)
    }
}

/// Call-to-pager request (function code `'1'`)
///
/// Message text and call address are mandatory; beep coding, call type
/// and priority are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CallToPagerRecord")]
pub struct CallToPager {
    source: LinkName,
    fields: BTreeMap<String, String>,
}

/// Unchecked wire shape of a [`CallToPager`]
#[derive(Deserialize)]
struct CallToPagerRecord {
    source: LinkName,
    fields: BTreeMap<String, String>,
}

impl TryFrom<CallToPagerRecord> for CallToPager {
    type Error = ProtocolError;

    fn try_from(record: CallToPagerRecord) -> Result<Self, Self::Error> {
        Self::from_fields(record.source, record.fields)
    }
}

impl CallToPager {
    /// Kind name
    pub const NAME: &'static str = "calltopager";

    /// Create a request with the mandatory fields
    pub fn new(
        source: LinkName,
        call_address: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field::CALL_ADDRESS.to_string(), call_address.into());
        fields.insert(field::MESSAGE.to_string(), message.into());
        Self { source, fields }
    }

    /// Build from a decoded field map, checking the mandatory fields
    pub fn from_fields(
        source: LinkName,
        fields: BTreeMap<String, String>,
    ) -> Result<Self, ProtocolError> {
        let request = Self { source, fields };
        request.validate()?;
        Ok(request)
    }

    /// Check that message text and call address are present and non-empty
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.call_address().map_or(true, str::is_empty) {
            return Err(ProtocolError::MissingField("call address"));
        }
        if self.message().map_or(true, str::is_empty) {
            return Err(ProtocolError::MissingField("message"));
        }
        Ok(())
    }

    /// Set the beep coding
    pub fn with_beep_coding(self, value: impl Into<String>) -> Self {
        self.with_field(field::BEEP_CODING, value)
    }

    /// Set the call type
    pub fn with_call_type(self, value: impl Into<String>) -> Self {
        self.with_field(field::CALL_TYPE, value)
    }

    /// Set the priority
    pub fn with_priority(self, value: impl Into<String>) -> Self {
        self.with_field(field::PRIORITY, value)
    }

    fn with_field(mut self, id: &str, value: impl Into<String>) -> Self {
        self.fields.insert(id.to_string(), value.into());
        self
    }

    /// Link the request came from
    pub fn source(&self) -> &LinkName {
        &self.source
    }

    /// Message text
    pub fn message(&self) -> Option<&str> {
        self.field(field::MESSAGE)
    }

    /// Destination pager address
    pub fn call_address(&self) -> Option<&str> {
        self.field(field::CALL_ADDRESS)
    }

    /// Beep coding
    pub fn beep_coding(&self) -> Option<&str> {
        self.field(field::BEEP_CODING)
    }

    /// Call type
    pub fn call_type(&self) -> Option<&str> {
        self.field(field::CALL_TYPE)
    }

    /// Priority
    pub fn priority(&self) -> Option<&str> {
        self.field(field::PRIORITY)
    }

    /// Any decoded field by wire id
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// All decoded fields
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Wire block carrying this request, fields in ascending id order
    pub fn to_block(&self) -> Block {
        self.fields
            .iter()
            .fold(Block::new(FunctionCode::CallToPager), |block, (id, value)| {
                block.with_field(id.as_str(), value.as_str())
            })
    }
}

impl fmt::Display for CallToPager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}({},{})",
            self.source,
            Self::NAME,
            self.call_address().unwrap_or_default(),
            self.message().unwrap_or_default()
        )
    }
}

/// Link went silent for the activity window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTimeout {
    /// Link that timed out
    pub source: LinkName,
}

impl LinkTimeout {
    /// Kind name
    pub const NAME: &'static str = "linktimeout";
}
