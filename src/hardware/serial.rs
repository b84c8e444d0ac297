//! Serial/UART command channel backed by the `serialport` crate

use crate::hardware::{ChannelError, ChannelResult, ChannelStatus, CommandChannel, SerialConfig};
use log::{debug, info};
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;

/// Timeout for the underlying blocking read/write calls. Reads are only
/// issued for bytes already reported as buffered, so this rarely applies.
const PORT_IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Serial port channel to the modem's AT interface
pub struct SerialChannel {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    status: ChannelStatus,
}

impl SerialChannel {
    /// Create a new, not yet opened, serial channel
    pub fn new(config: SerialConfig) -> ChannelResult<Self> {
        config.validate()?;

        let status = ChannelStatus::new(config.port_name.clone());

        Ok(Self {
            config,
            port: None,
            status,
        })
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn port_mut(&mut self) -> ChannelResult<&mut Box<dyn SerialPort>> {
        match self.port.as_mut() {
            Some(port) => Ok(port),
            None => Err(ChannelError::NotOpen {
                port: self.config.port_name.clone(),
            }),
        }
    }
}

impl CommandChannel for SerialChannel {
    fn open(&mut self) -> ChannelResult<()> {
        if self.port.is_some() {
            debug!("Reopening {}", self.config.port_name);
            self.close();
        }

        let port = serialport::new(self.config.port_name.as_str(), self.config.baud_rate)
            .timeout(PORT_IO_TIMEOUT)
            .open()
            .map_err(|e| ChannelError::OpenFailed {
                port: self.config.port_name.clone(),
                details: e.to_string(),
            })?;

        port.clear(ClearBuffer::All).map_err(|e| ChannelError::OpenFailed {
            port: self.config.port_name.clone(),
            details: format!("failed to clear buffers: {}", e),
        })?;

        info!("Opened {} at {} baud", self.config.port_name, self.config.baud_rate);
        self.port = Some(port);
        self.status.open = true;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed {}", self.config.port_name);
        }
        self.status.open = false;
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, data: &[u8]) -> ChannelResult<()> {
        let port = self.port_mut()?;
        let result = port.write_all(data).and_then(|_| port.flush());

        match result {
            Ok(()) => {
                self.status.bytes_written += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.status.error_count += 1;
                Err(ChannelError::WriteFailed { details: e.to_string() })
            }
        }
    }

    fn bytes_available(&mut self) -> ChannelResult<usize> {
        let port = self.port_mut()?;
        match port.bytes_to_read() {
            Ok(count) => Ok(count as usize),
            Err(e) => {
                self.status.error_count += 1;
                Err(ChannelError::ReadFailed { details: e.to_string() })
            }
        }
    }

    fn read(&mut self, max_bytes: usize) -> ChannelResult<Vec<u8>> {
        let available = self.bytes_available()?;
        let wanted = available.min(max_bytes).min(self.config.read_chunk_size);
        if wanted == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; wanted];
        let port = self.port_mut()?;
        match port.read(&mut buffer) {
            Ok(count) => {
                buffer.truncate(count);
                self.status.bytes_read += count as u64;
                Ok(buffer)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => {
                self.status.error_count += 1;
                Err(ChannelError::ReadFailed { details: e.to_string() })
            }
        }
    }

    fn status(&self) -> ChannelStatus {
        self.status.clone()
    }
}
