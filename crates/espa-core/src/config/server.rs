//! Server configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use super::serde_utils::duration_secs;
use super::{ChannelConfig, LinkConfig, SessionConfig};
use crate::error::ConfigError;

/// Configuration for the multi-link server daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Aggregator outbox polling period
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Sleep between two link worker ticks
    #[serde(with = "duration_secs")]
    pub tick_interval: Duration,

    /// Session settings shared by every link without an override
    pub session: SessionConfig,

    /// Activity supervision shared by every link
    pub channel: ChannelConfig,

    /// Serial links to serve
    pub links: Vec<LinkConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            tick_interval: Duration::from_millis(100),
            session: SessionConfig::default(),
            channel: ChannelConfig::default(),
            links: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Session settings for a link, honouring its override
    pub fn session_for<'a>(&'a self, link: &'a LinkConfig) -> &'a SessionConfig {
        link.session.as_ref().unwrap_or(&self.session)
    }

    /// Check intervals, timeouts and addresses
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() || self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll and tick intervals must be positive".to_string(),
            ));
        }

        let channel = &self.channel;
        if channel.activity_timeout.is_zero() || channel.dead_cooldown.is_zero() {
            return Err(ConfigError::Invalid(
                "activity timeout and dead cooldown must be positive".to_string(),
            ));
        }

        validate_session("session", &self.session)?;

        let mut names = HashSet::new();
        for link in &self.links {
            if link.port.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "link {} has no port",
                    link.name
                )));
            }
            if !(5..=8).contains(&link.data_bits) {
                return Err(ConfigError::Invalid(format!(
                    "link {}: data bits must be 5..=8",
                    link.name
                )));
            }
            if !(1..=2).contains(&link.stop_bits) {
                return Err(ConfigError::Invalid(format!(
                    "link {}: stop bits must be 1 or 2",
                    link.name
                )));
            }
            if let Some(session) = &link.session {
                validate_session(&link.name, session)?;
            }
            if !names.insert(link.name.as_str()) {
                tracing::warn!("duplicate link name {}, the last definition wins", link.name);
            }
        }

        Ok(())
    }
}

fn validate_session(scope: &str, session: &SessionConfig) -> Result<(), ConfigError> {
    if session.control_address == session.paging_address {
        return Err(ConfigError::Invalid(format!(
            "{}: control and paging addresses must differ",
            scope
        )));
    }

    let timeouts = [
        session.idle_timeout,
        session.negotiation_timeout,
        session.message_timeout,
        session.block_timeout,
    ];
    if timeouts.iter().any(Duration::is_zero) {
        return Err(ConfigError::Invalid(format!(
            "{}: session timeouts must be positive",
            scope
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StationAddress;

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_equal_addresses() {
        let mut config = ServerConfig::default();
        config.session.paging_address = StationAddress::CONTROL_EQUIPMENT;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let mut config = ServerConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_serial_parameters() {
        let mut config = ServerConfig::default();
        let mut link = LinkConfig::new("ts940", "/dev/ttyS0");
        link.data_bits = 9;
        config.links.push(link);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_names_allowed() {
        let mut config = ServerConfig::default();
        config.links.push(LinkConfig::new("ts940", "/dev/ttyS0"));
        config.links.push(LinkConfig::new("ts940", "/dev/ttyS1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_override() {
        let mut config = ServerConfig::default();
        let mut link = LinkConfig::new("espa2", "COM2");
        assert_eq!(config.session_for(&link), &config.session);

        let mut session = SessionConfig::default();
        session.paging_address = StationAddress::new('9').unwrap();
        link.session = Some(session.clone());
        config.links.push(link.clone());
        assert_eq!(config.session_for(&link), &session);
    }

    #[test]
    fn test_parse_full_file() {
        let config: ServerConfig = toml::from_str(
            r#"
            poll_interval = 0.2

            [session]
            negotiation_timeout = 3.5

            [channel]
            activity_timeout = 240

            [[links]]
            name = "ts940"
            port = "COM1"

            [[links]]
            name = "espa2"
            port = "COM2"
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.session.negotiation_timeout, Duration::from_millis(3500));
        assert_eq!(config.channel.activity_timeout, Duration::from_secs(240));
        assert_eq!(config.links.len(), 2);
        assert!(config.validate().is_ok());
    }
}
