//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Single-character station address used during negotiation
///
/// Addresses are printable ASCII so they can never collide with the
/// protocol control characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct StationAddress(u8);

impl StationAddress {
    /// Default control equipment address
    pub const CONTROL_EQUIPMENT: Self = Self(b'1');

    /// Default paging system address
    pub const PAGING_SYSTEM: Self = Self(b'2');

    /// Create an address from a printable ASCII character
    pub fn new(c: char) -> Result<Self, ConfigError> {
        if c.is_ascii_graphic() {
            Ok(Self(c as u8))
        } else {
            Err(ConfigError::InvalidAddress(c))
        }
    }

    /// Wire byte
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Address as a character
    pub fn as_char(&self) -> char {
        char::from(self.0)
    }
}

impl TryFrom<char> for StationAddress {
    type Error = ConfigError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Self::new(c)
    }
}

impl From<StationAddress> for char {
    fn from(address: StationAddress) -> Self {
        address.as_char()
    }
}

impl fmt::Display for StationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
