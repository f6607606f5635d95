//! Byte transport trait

use bytes::Bytes;

use crate::error::TransportError;

/// Byte-oriented line to one piece of control equipment
///
/// Every operation must return promptly: `read` hands back whatever is
/// pending and never waits for more.
pub trait Transport: Send {
    /// Link name, used as the notification source
    fn name(&self) -> &str;

    /// Open the underlying port; a no-op when already open
    fn open(&mut self) -> Result<(), TransportError>;

    /// Close the underlying port; a no-op when already closed
    fn close(&mut self);

    /// Pending bytes, `Ok(None)` when nothing has arrived
    fn read(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// Write bytes to the line
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Discard bytes already received by the port
    fn reset(&mut self) -> Result<(), TransportError> {
        self.read().map(|_| ())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn read(&mut self) -> Result<Option<Bytes>, TransportError> {
        (**self).read()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}
