//! Link identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of one serial link to one piece of control equipment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkName(String);

impl LinkName {
    /// Name used when a transport does not provide one
    pub const DEFAULT: &'static str = "espalink";

    /// Create a new link name, falling back to [`LinkName::DEFAULT`] when empty
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(name)
        }
    }

    /// Get the raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LinkName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
