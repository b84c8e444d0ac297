//! Fixed AT command vocabulary used by the positioning core

/// Commands the positioning core sends to the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemCommand {
    /// Liveness probe
    Ping,
    /// Turn on command echo
    EnableEcho,
    /// Restart the module. Fire-and-forget: any answer counts
    Reset,
    /// Query the GNSS receiver
    SatelliteFix,
    /// Query the base station location service
    CellTowerFix,
}

impl ModemCommand {
    /// Command text, without the CRLF terminator
    pub fn command(self) -> &'static str {
        match self {
            ModemCommand::Ping => "AT",
            ModemCommand::EnableEcho => "ATE1",
            ModemCommand::Reset => "AT+CRESET",
            ModemCommand::SatelliteFix => "AT+CGPSINFO",
            ModemCommand::CellTowerFix => "AT+CLBS=4",
        }
    }

    /// Token whose presence in the response completes the transaction
    pub fn response_token(self) -> &'static str {
        match self {
            ModemCommand::Ping | ModemCommand::EnableEcho => "OK",
            ModemCommand::Reset => "",
            ModemCommand::SatelliteFix => SATELLITE_MARKER,
            ModemCommand::CellTowerFix => CELL_TOWER_MARKER,
        }
    }
}

/// Prefix of a `AT+CGPSINFO` answer. The colon keeps an echoed command from matching
pub const SATELLITE_MARKER: &str = "+CGPSINFO:";

/// Prefix of a `AT+CLBS=4` answer
pub const CELL_TOWER_MARKER: &str = "+CLBS:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_does_not_contain_marker() {
        for cmd in [ModemCommand::SatelliteFix, ModemCommand::CellTowerFix] {
            assert!(!cmd.command().contains(cmd.response_token()));
        }
    }

    #[test]
    fn test_reset_is_fire_and_forget() {
        assert!(ModemCommand::Reset.response_token().is_empty());
    }
}
