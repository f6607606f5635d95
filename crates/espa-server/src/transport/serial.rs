//! Serial port transport
//!
//! Reads only what the driver reports as already received, so a read never
//! waits for the line. Writes use a short timeout.

use bytes::Bytes;
use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use espa_core::config::{FlowControl, LinkConfig, Parity};
use espa_core::{Transport, TransportError};

/// Upper bound on the bytes taken from the driver in one read
const MAX_READ: usize = 4096;

/// Timeout applied to port writes
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Serial line to one piece of control equipment
pub struct SerialTransport {
    config: LinkConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Create a closed transport for `config`
    pub fn new(config: LinkConfig) -> Self {
        Self { config, port: None }
    }

    /// Link configuration
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Result<Vec<String>, TransportError> {
    let ports = serialport::available_ports().map_err(io::Error::from)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

fn data_bits(bits: u8) -> serialport::DataBits {
    match bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        _ => serialport::DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> serialport::StopBits {
    match bits {
        2 => serialport::StopBits::Two,
        _ => serialport::StopBits::One,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

fn flow_control(flow: FlowControl) -> serialport::FlowControl {
    match flow {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Software => serialport::FlowControl::Software,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.port.is_some() {
            return Ok(());
        }

        let config = &self.config;
        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(data_bits(config.data_bits))
            .stop_bits(stop_bits(config.stop_bits))
            .parity(parity(config.parity))
            .flow_control(flow_control(config.flow_control))
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Open {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            "opened {} at {} baud ({}{:?}{})",
            config.port,
            config.baud_rate,
            config.data_bits,
            config.parity,
            config.stop_bits
        );
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn read(&mut self) -> Result<Option<Bytes>, TransportError> {
        let port = self.port()?;
        let available = port.bytes_to_read().map_err(io::Error::from)? as usize;
        if available == 0 {
            return Ok(None);
        }

        let mut buf = vec![0u8; available.min(MAX_READ)];
        match port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(Bytes::from(buf)))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.port()?
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)?;
        Ok(())
    }
}
