//! Positioning acquisition protocol

pub mod commands;
pub mod transaction;
pub mod parser;
pub mod fallback;

pub use commands::ModemCommand;
pub use transaction::{TransactionEngine, TransactionConfig, TransactionResult, TransactionStatus};
pub use parser::{PositionParser, ParseOutcome, ParseError, sentence_to_degrees};
pub use fallback::{FallbackController, FallbackConfig, FallbackState, PositionOutcome, Acquisition, AttemptFailure};
