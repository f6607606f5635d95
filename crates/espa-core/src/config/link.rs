//! Serial link configuration

use serde::{Deserialize, Serialize};

use super::SessionConfig;

/// Parity checking mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

/// One serial line to one piece of control equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Link name, used as notification source
    pub name: String,

    /// Serial port path (e.g. `/dev/ttyS0`, `COM1`)
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Parity
    #[serde(default)]
    pub parity: Parity,

    /// Data bits (5..=8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Stop bits (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,

    /// Flow control
    #[serde(default)]
    pub flow_control: FlowControl,

    /// Per-link override of the server-wide session settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

impl LinkConfig {
    /// 9600 8N1 link without flow control
    pub fn new(name: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            baud_rate: default_baud_rate(),
            parity: Parity::None,
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            flow_control: FlowControl::None,
            session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_link() {
        let link: LinkConfig = toml::from_str(
            r#"
            name = "espa2"
            port = "COM2"
            "#,
        )
        .unwrap();
        assert_eq!(link, LinkConfig::new("espa2", "COM2"));
    }

    #[test]
    fn test_full_link() {
        let link: LinkConfig = toml::from_str(
            r#"
            name = "ts940"
            port = "/dev/ttyUSB0"
            baud_rate = 19200
            parity = "even"
            data_bits = 7
            stop_bits = 2
            flow_control = "hardware"

            [session]
            control_address = "3"
            "#,
        )
        .unwrap();
        assert_eq!(link.baud_rate, 19200);
        assert_eq!(link.parity, Parity::Even);
        assert_eq!(link.data_bits, 7);
        assert_eq!(link.stop_bits, 2);
        assert_eq!(link.flow_control, FlowControl::Hardware);
        assert_eq!(link.session.unwrap().control_address.as_char(), '3');
    }
}
