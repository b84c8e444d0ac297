//! Mock modem channel for testing and development

use crate::hardware::{ChannelError, ChannelResult, ChannelStatus, CommandChannel};
use std::collections::{HashMap, VecDeque};

/// What the mock modem does when it receives a command
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Queue this text for reading
    Respond(String),
    /// Answer nothing, so the transaction times out
    Silence,
}

/// Scripted stand-in for a modem AT port
///
/// Replies are scripted per command (the command text without its CRLF
/// terminator) and consumed in order. A command with no script left gets
/// `MockReply::Silence`.
pub struct MockChannel {
    status: ChannelStatus,
    scripts: HashMap<String, VecDeque<MockReply>>,
    inbound: VecDeque<u8>,
    sent_commands: Vec<String>,
    chunk_size: Option<usize>,
    echo: bool,
    fail_writes: bool,
    fail_reads: bool,
}

impl MockChannel {
    /// Create a new mock channel, already open
    pub fn new() -> Self {
        let mut status = ChannelStatus::new("mock");
        status.open = true;

        Self {
            status,
            scripts: HashMap::new(),
            inbound: VecDeque::new(),
            sent_commands: Vec::new(),
            chunk_size: None,
            echo: false,
            fail_writes: false,
            fail_reads: false,
        }
    }

    /// Queue a reply for the next time `command` is written
    pub fn script(&mut self, command: &str, reply: MockReply) -> &mut Self {
        self.scripts
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Shorthand for scripting a text reply
    pub fn respond_to(&mut self, command: &str, response: &str) -> &mut Self {
        self.script(command, MockReply::Respond(response.to_string()))
    }

    /// Push bytes into the read buffer without any command
    pub fn inject(&mut self, data: &str) {
        self.inbound.extend(data.bytes());
    }

    /// Release at most `size` bytes per availability query, to simulate a slow link
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = Some(size.max(1));
    }

    /// Echo every command back before its reply, like `ATE1`
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// All commands written so far, without terminators
    pub fn sent_commands(&self) -> &[String] {
        &self.sent_commands
    }

    /// How many times `command` was written
    pub fn count_sent(&self, command: &str) -> usize {
        self.sent_commands.iter().filter(|c| c.as_str() == command).count()
    }

    /// Get the number of unread bytes
    pub fn pending_bytes(&self) -> usize {
        self.inbound.len()
    }

    fn ensure_open(&self) -> ChannelResult<()> {
        if self.status.open {
            Ok(())
        } else {
            Err(ChannelError::NotOpen { port: self.status.port.clone() })
        }
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for MockChannel {
    fn open(&mut self) -> ChannelResult<()> {
        self.inbound.clear();
        self.status.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.status.open = false;
    }

    fn is_open(&self) -> bool {
        self.status.open
    }

    fn write(&mut self, data: &[u8]) -> ChannelResult<()> {
        self.ensure_open()?;

        if self.fail_writes {
            self.status.error_count += 1;
            return Err(ChannelError::WriteFailed {
                details: "Simulated write failure".to_string(),
            });
        }

        let text = String::from_utf8_lossy(data);
        let command = text.trim_end_matches(['\r', '\n']).to_string();
        self.status.bytes_written += data.len() as u64;

        if self.echo {
            self.inbound.extend(data.iter().copied());
        }

        let reply = self
            .scripts
            .get_mut(&command)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(MockReply::Silence);

        if let MockReply::Respond(response) = reply {
            self.inbound.extend(response.bytes());
        }

        self.sent_commands.push(command);
        Ok(())
    }

    fn bytes_available(&mut self) -> ChannelResult<usize> {
        self.ensure_open()?;

        if self.fail_reads {
            self.status.error_count += 1;
            return Err(ChannelError::ReadFailed {
                details: "Simulated read failure".to_string(),
            });
        }

        let available = self.inbound.len();
        Ok(match self.chunk_size {
            Some(size) => available.min(size),
            None => available,
        })
    }

    fn read(&mut self, max_bytes: usize) -> ChannelResult<Vec<u8>> {
        let available = self.bytes_available()?;
        let count = available.min(max_bytes);
        let data: Vec<u8> = self.inbound.drain(..count).collect();
        self.status.bytes_read += data.len() as u64;
        Ok(data)
    }

    fn status(&self) -> ChannelStatus {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_channel_creation() {
        let channel = MockChannel::new();
        assert!(channel.is_open());
        assert_eq!(channel.pending_bytes(), 0);
        assert!(channel.sent_commands().is_empty());
    }

    #[test]
    fn test_scripted_replies_in_order() {
        let mut channel = MockChannel::new();
        channel.respond_to("AT", "\r\nOK\r\n").script("AT", MockReply::Silence);

        channel.write(b"AT\r\n").unwrap();
        assert_eq!(channel.bytes_available().unwrap(), 6);
        assert_eq!(channel.read(64).unwrap(), b"\r\nOK\r\n".to_vec());

        // second AT is silent, third has no script at all
        channel.write(b"AT\r\n").unwrap();
        assert_eq!(channel.bytes_available().unwrap(), 0);
        channel.write(b"AT\r\n").unwrap();
        assert_eq!(channel.bytes_available().unwrap(), 0);
        assert_eq!(channel.count_sent("AT"), 3);
    }

    #[test]
    fn test_chunked_delivery() {
        let mut channel = MockChannel::new();
        channel.set_chunk_size(4);
        channel.inject("+CLBS: 0,1,2,3\r\n");

        assert_eq!(channel.bytes_available().unwrap(), 4);
        assert_eq!(channel.read(100).unwrap(), b"+CLB".to_vec());
        assert_eq!(channel.pending_bytes(), 12);
    }

    #[test]
    fn test_echo() {
        let mut channel = MockChannel::new();
        channel.set_echo(true);
        channel.respond_to("AT", "\r\nOK\r\n");
        channel.write(b"AT\r\n").unwrap();
        assert_eq!(channel.read(64).unwrap(), b"AT\r\n\r\nOK\r\n".to_vec());
    }

    #[test]
    fn test_closed_channel() {
        let mut channel = MockChannel::new();
        channel.close();
        channel.close();
        assert!(!channel.is_open());

        let result = channel.write(b"AT\r\n");
        assert!(matches!(result, Err(ChannelError::NotOpen { .. })));

        channel.open().unwrap();
        assert!(channel.write(b"AT\r\n").is_ok());
    }

    #[test]
    fn test_failure_injection() {
        let mut channel = MockChannel::new();
        channel.fail_writes(true);
        assert!(matches!(channel.write(b"AT\r\n"), Err(ChannelError::WriteFailed { .. })));

        channel.fail_reads(true);
        assert!(matches!(channel.bytes_available(), Err(ChannelError::ReadFailed { .. })));
        assert_eq!(channel.status().error_count, 2);
    }
}
