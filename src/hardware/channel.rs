//! Command channel trait and configuration

use crate::hardware::{ChannelError, ChannelResult};
use serde::{Deserialize, Serialize};

/// Byte-oriented duplex link to the modem
///
/// Reads never block: `bytes_available` reports what is buffered and `read`
/// returns at most that much. Only one transaction may drive a channel at a
/// time, which the `&mut self` receivers enforce for a single owner.
pub trait CommandChannel {
    /// Open the link, discarding anything left in the port buffers
    fn open(&mut self) -> ChannelResult<()>;

    /// Close the link. Closing an already-closed channel is a no-op
    fn close(&mut self);

    /// Check if the channel is currently open
    fn is_open(&self) -> bool;

    /// Write raw bytes to the modem
    fn write(&mut self, data: &[u8]) -> ChannelResult<()>;

    /// Number of bytes buffered and ready to read, without blocking
    fn bytes_available(&mut self) -> ChannelResult<usize>;

    /// Read up to `max_bytes` of whatever is currently buffered
    fn read(&mut self, max_bytes: usize) -> ChannelResult<Vec<u8>>;

    /// Get current channel status
    fn status(&self) -> ChannelStatus;
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn open(&mut self) -> ChannelResult<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, data: &[u8]) -> ChannelResult<()> {
        (**self).write(data)
    }

    fn bytes_available(&mut self) -> ChannelResult<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, max_bytes: usize) -> ChannelResult<Vec<u8>> {
        (**self).read(max_bytes)
    }

    fn status(&self) -> ChannelStatus {
        (**self).status()
    }
}

/// Channel status information
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStatus {
    pub port: String,
    pub open: bool,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub error_count: u32,
}

impl ChannelStatus {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            open: false,
            bytes_written: 0,
            bytes_read: 0,
            error_count: 0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.open && self.error_count < 10
    }
}

/// Serial link parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path of the modem's AT port
    pub port_name: String,
    /// Baud rate for serial communication
    pub baud_rate: u32,
    /// Largest single read issued while polling (bytes)
    pub read_chunk_size: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB2".to_string(),
            baud_rate: 115200,
            read_chunk_size: 256,
        }
    }
}

impl SerialConfig {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ChannelResult<()> {
        if self.port_name.trim().is_empty() {
            return Err(ChannelError::ConfigurationError {
                parameter: "port_name".to_string(),
                value: format!("{:?}", self.port_name),
            });
        }

        if self.baud_rate == 0 {
            return Err(ChannelError::ConfigurationError {
                parameter: "baud_rate".to_string(),
                value: self.baud_rate.to_string(),
            });
        }

        if self.read_chunk_size == 0 || self.read_chunk_size > 4096 {
            return Err(ChannelError::ConfigurationError {
                parameter: "read_chunk_size".to_string(),
                value: self.read_chunk_size.to_string(),
            });
        }

        Ok(())
    }
}
