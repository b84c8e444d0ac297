//! Channel error types and handling

use std::fmt;

/// Transport-level failures of the command channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Operation attempted on a channel that is not open
    NotOpen { port: String },
    /// The underlying port could not be opened
    OpenFailed { port: String, details: String },
    /// Writing a command to the port failed
    WriteFailed { details: String },
    /// Querying or reading buffered bytes failed
    ReadFailed { details: String },
    /// Channel configuration rejected
    ConfigurationError { parameter: String, value: String },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::NotOpen { port } => {
                write!(f, "Channel {} is not open", port)
            }
            ChannelError::OpenFailed { port, details } => {
                write!(f, "Failed to open {}: {}", port, details)
            }
            ChannelError::WriteFailed { details } => {
                write!(f, "Write failed: {}", details)
            }
            ChannelError::ReadFailed { details } => {
                write!(f, "Read failed: {}", details)
            }
            ChannelError::ConfigurationError { parameter, value } => {
                write!(f, "Configuration error: invalid {} = {}", parameter, value)
            }
        }
    }
}

impl std::error::Error for ChannelError {}

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// What a caller should do about a channel failure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Close the channel and open it again
    Reopen,
    /// Give up, the failure will not go away by itself
    Fail,
}

impl ChannelError {
    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ChannelError::NotOpen { .. } => RecoveryStrategy::Reopen,
            ChannelError::OpenFailed { .. } => RecoveryStrategy::Fail,
            ChannelError::WriteFailed { .. } => RecoveryStrategy::Reopen,
            ChannelError::ReadFailed { .. } => RecoveryStrategy::Reopen,
            ChannelError::ConfigurationError { .. } => RecoveryStrategy::Fail,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_strategy() {
        let err = ChannelError::WriteFailed { details: "broken pipe".to_string() };
        assert_eq!(err.recovery_strategy(), RecoveryStrategy::Reopen);
        assert!(err.is_recoverable());

        let err = ChannelError::OpenFailed {
            port: "/dev/ttyUSB2".to_string(),
            details: "No such file or directory".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = ChannelError::NotOpen { port: "/dev/ttyUSB2".to_string() };
        assert_eq!(err.to_string(), "Channel /dev/ttyUSB2 is not open");
    }
}
