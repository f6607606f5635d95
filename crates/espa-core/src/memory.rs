//! In-memory transport
//!
//! A [`MemoryTransport`] and its [`MemoryPeer`] share one simulated line.
//! The transport side is handed to a link worker; the peer plays the
//! control equipment, pushing bytes towards the server and collecting the
//! replies. Failures can be injected to exercise the reopen path.

use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TransportError;
use crate::traits::Transport;

#[derive(Debug, Default)]
struct Line {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    open: bool,
    opens: usize,
    resets: usize,
    fail_open: bool,
    fail_io: bool,
}

fn lock(line: &Mutex<Line>) -> MutexGuard<'_, Line> {
    line.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Server side of an in-memory line
#[derive(Debug)]
pub struct MemoryTransport {
    name: String,
    line: Arc<Mutex<Line>>,
}

/// Control-equipment side of an in-memory line
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    line: Arc<Mutex<Line>>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair
    pub fn pair(name: impl Into<String>) -> (MemoryTransport, MemoryPeer) {
        let line = Arc::new(Mutex::new(Line::default()));
        (
            MemoryTransport {
                name: name.into(),
                line: Arc::clone(&line),
            },
            MemoryPeer { line },
        )
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let mut line = lock(&self.line);
        if line.fail_open {
            return Err(TransportError::Open {
                port: self.name.clone(),
                reason: "injected failure".to_string(),
            });
        }
        if !line.open {
            line.open = true;
            line.opens += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        lock(&self.line).open = false;
    }

    fn read(&mut self) -> Result<Option<Bytes>, TransportError> {
        let mut line = lock(&self.line);
        if !line.open {
            return Err(TransportError::NotOpen);
        }
        if line.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected failure").into());
        }
        if line.inbound.is_empty() {
            return Ok(None);
        }
        let data: Vec<u8> = line.inbound.drain(..).collect();
        Ok(Some(Bytes::from(data)))
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut line = lock(&self.line);
        if !line.open {
            return Err(TransportError::NotOpen);
        }
        if line.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected failure").into());
        }
        line.outbound.extend_from_slice(data);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        let mut line = lock(&self.line);
        line.resets += 1;
        line.inbound.clear();
        Ok(())
    }
}

impl MemoryPeer {
    /// Queue bytes towards the server
    pub fn send(&self, data: &[u8]) {
        lock(&self.line).inbound.extend(data.iter().copied());
    }

    /// Bytes queued but not yet read by the server
    pub fn pending(&self) -> usize {
        lock(&self.line).inbound.len()
    }

    /// Take everything the server wrote so far
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.line).outbound)
    }

    /// Whether the server side currently has the line open
    pub fn is_open(&self) -> bool {
        lock(&self.line).open
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        lock(&self.line).opens
    }

    /// Number of resets requested by the server
    pub fn reset_count(&self) -> usize {
        lock(&self.line).resets
    }

    /// Make subsequent open attempts fail
    pub fn set_fail_open(&self, fail: bool) {
        lock(&self.line).fail_open = fail;
    }

    /// Make subsequent reads and writes fail
    pub fn set_fail_io(&self, fail: bool) {
        lock(&self.line).fail_io = fail;
    }
}
