//! Satellite-first positioning with cell-tower fallback
//!
//! Every request starts fresh at `AttemptingSatellite { attempt: 0 }`. The
//! satellite query is retried up to `max_satellite_attempts` times, then a
//! single cell-tower query decides between `Done` and `Failed`. The
//! sequence is finite, so a request issues at most
//! `max_satellite_attempts + 1` transactions.

use crate::core::constants::DEFAULT_MAX_SATELLITE_ATTEMPTS;
use crate::core::{Fix, FixSource};
use crate::hardware::{ChannelError, ChannelResult, CommandChannel};
use crate::processing::commands::ModemCommand;
use crate::processing::parser::{ParseError, ParseOutcome, PositionParser};
use crate::processing::transaction::{TransactionEngine, TransactionResult, TransactionStatus};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Retry policy for a positioning request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Satellite queries made before switching to the cell-tower fix
    pub max_satellite_attempts: u8,
    /// Spend remaining satellite attempts when the receiver reports no lock,
    /// instead of falling back right away
    pub retry_on_no_fix: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_satellite_attempts: DEFAULT_MAX_SATELLITE_ATTEMPTS,
            retry_on_no_fix: false,
        }
    }
}

/// Controller states
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackState {
    AttemptingSatellite { attempt: u8 },
    UsingCellTower,
    Done(Fix),
    Failed,
}

impl FallbackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FallbackState::Done(_) | FallbackState::Failed)
    }
}

/// Why a single positioning transaction did not produce a fix
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// No match pattern within the timeout
    Timeout,
    /// The channel failed while reading the answer
    ReadError(ChannelError),
    /// The transaction was cancelled
    Cancelled,
    /// The receiver answered with the empty placeholder
    NoFix,
    /// The answer matched but its payload did not parse
    Malformed(ParseError),
}

/// Terminal result of a positioning request
#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    Fix(Fix),
    NoFixAvailable,
}

impl PositionOutcome {
    pub fn fix(&self) -> Option<&Fix> {
        match self {
            PositionOutcome::Fix(fix) => Some(fix),
            PositionOutcome::NoFixAvailable => None,
        }
    }
}

/// Outcome plus the failed attempts that led to it
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    pub outcome: PositionOutcome,
    pub failures: Vec<(FixSource, AttemptFailure)>,
    pub satellite_attempts: u8,
    pub cell_tower_attempted: bool,
}

/// Drives the satellite/cell-tower state machine over a transaction engine
pub struct FallbackController {
    config: FallbackConfig,
    parser: PositionParser,
}

impl FallbackController {
    pub fn new(config: FallbackConfig, parser: PositionParser) -> Self {
        Self { config, parser }
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    pub fn parser(&self) -> &PositionParser {
        &self.parser
    }

    /// Run one full positioning request
    ///
    /// Only write failures surface as `Err`; every other failure is folded
    /// into the state machine.
    pub fn locate<C: CommandChannel>(&self, engine: &mut TransactionEngine<C>) -> ChannelResult<Acquisition> {
        let mut acquisition = Acquisition {
            outcome: PositionOutcome::NoFixAvailable,
            failures: Vec::new(),
            satellite_attempts: 0,
            cell_tower_attempted: false,
        };

        let mut state = FallbackState::AttemptingSatellite { attempt: 0 };
        while !state.is_terminal() {
            state = self.step(state, engine, &mut acquisition)?;
        }

        if let FallbackState::Done(fix) = state {
            info!("Position acquired: {}", fix);
            acquisition.outcome = PositionOutcome::Fix(fix);
        } else {
            warn!("No fix available after {} satellite attempt(s) and cell-tower fallback",
                acquisition.satellite_attempts);
        }

        Ok(acquisition)
    }

    /// Advance the state machine by one transaction
    pub fn step<C: CommandChannel>(
        &self,
        state: FallbackState,
        engine: &mut TransactionEngine<C>,
        acquisition: &mut Acquisition,
    ) -> ChannelResult<FallbackState> {
        match state {
            FallbackState::AttemptingSatellite { attempt } if attempt >= self.config.max_satellite_attempts => {
                Ok(FallbackState::UsingCellTower)
            }
            FallbackState::AttemptingSatellite { attempt } => {
                let result = engine.send(ModemCommand::SatelliteFix)?;
                acquisition.satellite_attempts += 1;

                let failure = match self.satellite_outcome(&result) {
                    Ok(fix) => return Ok(FallbackState::Done(fix)),
                    Err(failure) => failure,
                };
                log_failure(FixSource::Satellite, attempt + 1, &failure);

                let no_fix = failure == AttemptFailure::NoFix;
                acquisition.failures.push((FixSource::Satellite, failure));

                let next = attempt + 1;
                if (no_fix && !self.config.retry_on_no_fix) || next >= self.config.max_satellite_attempts {
                    info!("Falling back to cell-tower positioning");
                    Ok(FallbackState::UsingCellTower)
                } else {
                    Ok(FallbackState::AttemptingSatellite { attempt: next })
                }
            }
            FallbackState::UsingCellTower => {
                let result = engine.send(ModemCommand::CellTowerFix)?;
                acquisition.cell_tower_attempted = true;

                match self.cell_tower_outcome(&result) {
                    Ok(fix) => Ok(FallbackState::Done(fix)),
                    Err(failure) => {
                        log_failure(FixSource::CellTower, 1, &failure);
                        acquisition.failures.push((FixSource::CellTower, failure));
                        Ok(FallbackState::Failed)
                    }
                }
            }
            terminal => Ok(terminal),
        }
    }

    fn satellite_outcome(&self, result: &TransactionResult) -> Result<Fix, AttemptFailure> {
        unmatched_failure(result)?;
        match self.parser.parse_satellite_fix(&result.raw_response) {
            ParseOutcome::Fix(fix) => Ok(fix),
            ParseOutcome::NoFix => Err(AttemptFailure::NoFix),
            ParseOutcome::Malformed(e) => Err(AttemptFailure::Malformed(e)),
        }
    }

    fn cell_tower_outcome(&self, result: &TransactionResult) -> Result<Fix, AttemptFailure> {
        unmatched_failure(result)?;
        match self.parser.parse_cell_tower_fix(&result.raw_response) {
            ParseOutcome::Fix(fix) => Ok(fix),
            ParseOutcome::NoFix => Err(AttemptFailure::NoFix),
            ParseOutcome::Malformed(e) => Err(AttemptFailure::Malformed(e)),
        }
    }
}

impl Default for FallbackController {
    fn default() -> Self {
        Self::new(FallbackConfig::default(), PositionParser::new())
    }
}

fn unmatched_failure(result: &TransactionResult) -> Result<(), AttemptFailure> {
    match &result.status {
        TransactionStatus::Matched => Ok(()),
        TransactionStatus::TimedOut => Err(AttemptFailure::Timeout),
        TransactionStatus::ReadFailed(e) => Err(AttemptFailure::ReadError(e.clone())),
        TransactionStatus::Cancelled => Err(AttemptFailure::Cancelled),
    }
}

fn log_failure(source: FixSource, attempt: u8, failure: &AttemptFailure) {
    match failure {
        AttemptFailure::Timeout => warn!("{:?} attempt {} timed out", source, attempt),
        AttemptFailure::ReadError(e) => warn!("{:?} attempt {} read error: {}", source, attempt, e),
        AttemptFailure::Cancelled => warn!("{:?} attempt {} cancelled", source, attempt),
        AttemptFailure::NoFix => info!("{:?} attempt {}: no satellites locked", source, attempt),
        AttemptFailure::Malformed(e) => warn!("{:?} attempt {} malformed payload: {}", source, attempt, e),
    }
}
