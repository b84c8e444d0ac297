//! Request/response transactions over the command channel
//!
//! Unread input left by an earlier exchange is discarded, one command goes
//! out, then the channel is polled until the accumulated
//! answer contains the match pattern or the timeout expires. Polling stops
//! early once the line carrying the pattern is terminated; an unterminated
//! pattern still counts as a match when the deadline passes. Bytes already
//! buffered at the deadline are drained and checked, so a call returns
//! within `timeout` plus that drain.

use crate::core::constants::DEFAULT_COMMAND_TIMEOUT_MS;
use crate::hardware::{ChannelError, ChannelResult, CommandChannel};
use crate::processing::commands::ModemCommand;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_READ_CHUNK: usize = 256;

/// Timing parameters for a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Window each command has to produce its match pattern (milliseconds)
    pub command_timeout_ms: u64,
    /// Sleep between availability checks while nothing is buffered (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            poll_interval_ms: 10,
        }
    }
}

impl TransactionConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// How a transaction ended
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionStatus {
    /// The match pattern was seen
    Matched,
    /// The deadline passed without the match pattern
    TimedOut,
    /// Reading from the channel failed mid-transaction
    ReadFailed(ChannelError),
    /// The cancellation flag was raised between reads
    Cancelled,
}

/// Outcome of one command/response exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    pub matched: bool,
    /// Everything read during the transaction, possibly empty
    pub raw_response: String,
    pub status: TransactionStatus,
    pub elapsed: Duration,
}

/// Sends one command at a time and waits for its answer
///
/// The engine owns its channel exclusively; `&mut self` on `execute` keeps
/// transactions from overlapping.
pub struct TransactionEngine<C: CommandChannel> {
    channel: C,
    config: TransactionConfig,
    read_chunk: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<C: CommandChannel> TransactionEngine<C> {
    pub fn new(channel: C, config: TransactionConfig) -> Self {
        Self {
            channel,
            config,
            read_chunk: DEFAULT_READ_CHUNK,
            cancel: None,
        }
    }

    /// Check this flag between reads and stop early once it is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk = bytes.max(1);
        self
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Run a vocabulary command with the configured timeout
    pub fn send(&mut self, command: ModemCommand) -> ChannelResult<TransactionResult> {
        let timeout = self.config.command_timeout();
        self.execute(command.command(), command.response_token(), timeout)
    }

    /// Write `command` + CRLF and poll for `match_pattern`
    ///
    /// Write failures are returned as errors. Read failures end the
    /// transaction unmatched with `TransactionStatus::ReadFailed`. An empty
    /// pattern matches any non-empty answer.
    pub fn execute(
        &mut self,
        command: &str,
        match_pattern: &str,
        timeout: Duration,
    ) -> ChannelResult<TransactionResult> {
        self.discard_stale();

        debug!("-> {}", command);
        self.channel.write(format!("{}\r\n", command).as_bytes())?;

        let start = Instant::now();
        let deadline = start + timeout;
        let mut buffer: Vec<u8> = Vec::new();

        let status = loop {
            if self.is_cancelled() {
                break TransactionStatus::Cancelled;
            }

            let available = match self.channel.bytes_available() {
                Ok(count) => count,
                Err(e) => break TransactionStatus::ReadFailed(e),
            };

            let now = Instant::now();
            if available == 0 {
                if now >= deadline {
                    break timeout_status(&buffer, match_pattern);
                }
                std::thread::sleep(self.config.poll_interval().min(deadline - now));
                continue;
            }

            match self.channel.read(available.min(self.read_chunk)) {
                Ok(bytes) => buffer.extend_from_slice(&bytes),
                Err(e) => break TransactionStatus::ReadFailed(e),
            }

            if line_complete(&buffer, match_pattern) {
                break TransactionStatus::Matched;
            }

            if now >= deadline {
                // Past the deadline only what was buffered at expiry is drained.
                break match self.drain(&mut buffer, match_pattern) {
                    Ok(()) => timeout_status(&buffer, match_pattern),
                    Err(e) => TransactionStatus::ReadFailed(e),
                };
            }
        };

        let raw_response = String::from_utf8_lossy(&buffer).into_owned();
        debug!("<- {:?} ({:?})", raw_response, status);

        Ok(TransactionResult {
            matched: status == TransactionStatus::Matched,
            raw_response,
            status,
            elapsed: start.elapsed(),
        })
    }

    /// Drop whatever an earlier command left unread, such as the trailing
    /// result code after an early match. A read error here is left for the
    /// poll loop to report.
    fn discard_stale(&mut self) {
        let mut stale: Vec<u8> = Vec::new();
        loop {
            let available = match self.channel.bytes_available() {
                Ok(count) => count,
                Err(_) => break,
            };
            if available == 0 {
                break;
            }
            match self.channel.read(available.min(self.read_chunk)) {
                Ok(bytes) if !bytes.is_empty() => stale.extend_from_slice(&bytes),
                _ => break,
            }
        }
        if !stale.is_empty() {
            debug!("Discarded stale input: {:?}", String::from_utf8_lossy(&stale));
        }
    }

    fn drain(&mut self, buffer: &mut Vec<u8>, match_pattern: &str) -> ChannelResult<()> {
        let mut remaining = self.channel.bytes_available()?;
        while remaining > 0 {
            let bytes = self.channel.read(remaining.min(self.read_chunk))?;
            if bytes.is_empty() {
                break;
            }
            remaining = remaining.saturating_sub(bytes.len());
            buffer.extend_from_slice(&bytes);
            if line_complete(buffer, match_pattern) {
                break;
            }
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

fn contains_pattern(buffer: &[u8], pattern: &str) -> bool {
    if pattern.is_empty() {
        return !buffer.is_empty();
    }
    String::from_utf8_lossy(buffer).contains(pattern)
}

/// Pattern seen and the line carrying it terminated, so its payload is whole
fn line_complete(buffer: &[u8], pattern: &str) -> bool {
    if pattern.is_empty() {
        return !buffer.is_empty();
    }
    let text = String::from_utf8_lossy(buffer);
    match text.find(pattern) {
        Some(pos) => text[pos + pattern.len()..].contains('\n'),
        None => false,
    }
}

fn timeout_status(buffer: &[u8], pattern: &str) -> TransactionStatus {
    if contains_pattern(buffer, pattern) {
        TransactionStatus::Matched
    } else {
        TransactionStatus::TimedOut
    }
}
