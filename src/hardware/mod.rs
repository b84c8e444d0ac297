//! Hardware abstraction layer for the modem command channel
//!
//! The positioning core only needs a byte-oriented duplex link with
//! non-blocking reads. `SerialChannel` provides it over a tty, `MockChannel`
//! replays scripted modem answers for tests and demos.

pub mod channel;
pub mod serial;
pub mod mock;
pub mod error;

pub use channel::{CommandChannel, ChannelStatus, SerialConfig};
pub use serial::SerialChannel;
pub use mock::{MockChannel, MockReply};
pub use error::{ChannelError, ChannelResult, RecoveryStrategy};
