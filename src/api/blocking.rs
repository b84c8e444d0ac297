//! Blocking API for modem positioning
//!
//! Wraps one command channel with the transaction engine and fallback
//! controller. Every call runs to completion on the caller's thread.

use crate::api::types::{ApiError, ApiResult, SystemState};
use crate::core::{Fix, FixSource};
use crate::geofence::{GeometryEngine, Zone};
use crate::hardware::{ChannelError, CommandChannel};
use crate::processing::{
    Acquisition, FallbackConfig, FallbackController, FallbackState, ModemCommand, PositionOutcome, PositionParser,
    TransactionConfig, TransactionEngine, TransactionResult, TransactionStatus,
};
use crate::utils::config::SystemConfig;
use log::{debug, info, warn};

/// Simple blocking API for modem positioning
pub struct PositioningApi<C: CommandChannel> {
    engine: TransactionEngine<C>,
    controller: FallbackController,
    echo_enabled: bool,
    state: SystemState,
}

impl<C: CommandChannel> PositioningApi<C> {
    /// Create an API over `channel` with default settings
    pub fn new(channel: C) -> Self {
        Self::with_parts(channel, TransactionConfig::default(), FallbackController::default())
    }

    /// Create an API configured from a full system configuration
    pub fn from_config(channel: C, config: &SystemConfig) -> Self {
        let parser = PositionParser::with_satellite_accuracy(config.accuracy.satellite_accuracy_m);
        let controller = FallbackController::new(config.fallback.clone(), parser);
        let mut api = Self::with_parts(channel, config.transaction.clone(), controller);
        api.engine = api.engine.with_read_chunk(config.serial.read_chunk_size);
        api
    }

    fn with_parts(channel: C, transaction: TransactionConfig, controller: FallbackController) -> Self {
        Self {
            engine: TransactionEngine::new(channel, transaction),
            controller,
            echo_enabled: false,
            state: SystemState::default(),
        }
    }

    /// Open the channel, reopening it if it is already open
    pub fn open(&mut self) -> ApiResult<()> {
        let channel = self.engine.channel_mut();
        if channel.is_open() {
            channel.close();
        }
        channel.open()?;
        self.echo_enabled = false;
        Ok(())
    }

    /// Close the channel; closing twice is harmless
    pub fn close(&mut self) {
        self.engine.channel_mut().close();
    }

    pub fn is_open(&self) -> bool {
        self.engine.channel().is_open()
    }

    /// Check that the modem answers `AT` with `OK`
    pub fn ping(&mut self) -> ApiResult<bool> {
        let answered = self.send_tracked(ModemCommand::Ping)?.matched;
        debug!("Ping {}", if answered { "answered" } else { "unanswered" });
        Ok(answered)
    }

    /// Turn command echo on, unless it was already enabled on this channel
    pub fn enable_echo(&mut self) -> ApiResult<()> {
        if self.echo_enabled {
            debug!("Echo already enabled");
            return Ok(());
        }

        let result = self.send_tracked(ModemCommand::EnableEcho)?;
        if result.matched {
            self.echo_enabled = true;
            Ok(())
        } else {
            Err(ApiError::CommandRejected {
                command: ModemCommand::EnableEcho.command().to_string(),
                response: result.raw_response.trim().to_string(),
            })
        }
    }

    pub fn echo_enabled(&self) -> bool {
        self.echo_enabled
    }

    /// Restart the module without waiting for any particular answer
    pub fn reset_module(&mut self) -> ApiResult<()> {
        self.send_tracked(ModemCommand::Reset)?;
        self.echo_enabled = false;
        warn!("Module reset requested");
        Ok(())
    }

    /// Acquire a position, satellite first with cell-tower fallback
    pub fn locate(&mut self) -> ApiResult<Acquisition> {
        self.state.requests += 1;
        let acquisition = self
            .controller
            .locate(&mut self.engine)
            .map_err(|e| self.record_error(e))?;
        self.record_outcome(&acquisition.outcome);
        Ok(acquisition)
    }

    /// Acquire a position from the cell-tower location service only
    pub fn locate_cell_tower(&mut self) -> ApiResult<Acquisition> {
        self.state.requests += 1;
        let mut acquisition = Acquisition {
            outcome: PositionOutcome::NoFixAvailable,
            failures: Vec::new(),
            satellite_attempts: 0,
            cell_tower_attempted: false,
        };

        let state = self
            .controller
            .step(FallbackState::UsingCellTower, &mut self.engine, &mut acquisition)
            .map_err(|e| self.record_error(e))?;
        if let FallbackState::Done(fix) = state {
            acquisition.outcome = PositionOutcome::Fix(fix);
        }

        self.record_outcome(&acquisition.outcome);
        Ok(acquisition)
    }

    /// Test whether a fix's uncertainty disc touches the zone
    ///
    /// The disc is built in WGS84 and reprojected into the zone's CRS
    /// before the intersection test.
    pub fn check_zone(&self, zone: &Zone, fix: &Fix) -> ApiResult<bool> {
        let engine = zone.engine();
        let disc = fix.to_buffered_geometry(engine);
        let candidate = engine.reproject(&disc, zone.crs())?;
        let inside = zone.intersects(&candidate);
        debug!("Fix {} {} zone", fix, if inside { "inside" } else { "outside" });
        Ok(inside)
    }

    pub fn get_system_state(&self) -> &SystemState {
        &self.state
    }

    pub fn fallback_config(&self) -> &FallbackConfig {
        self.controller.config()
    }

    pub fn channel(&self) -> &C {
        self.engine.channel()
    }

    pub fn channel_mut(&mut self) -> &mut C {
        self.engine.channel_mut()
    }

    /// Release the channel
    pub fn into_inner(self) -> C {
        self.engine.into_inner()
    }

    fn send_tracked(&mut self, command: ModemCommand) -> ApiResult<TransactionResult> {
        let result = self.engine.send(command).map_err(|e| self.record_error(e))?;
        if let TransactionStatus::ReadFailed(e) = &result.status {
            return Err(self.record_error(e.clone()));
        }
        Ok(result)
    }

    fn record_error(&mut self, error: ChannelError) -> ApiError {
        self.state.error_count += 1;
        ApiError::Channel(error)
    }

    fn record_outcome(&mut self, outcome: &PositionOutcome) {
        match outcome.fix() {
            Some(fix) => {
                match fix.source() {
                    FixSource::Satellite => self.state.satellite_fixes += 1,
                    FixSource::CellTower => self.state.cell_tower_fixes += 1,
                }
                self.state.last_fix = Some(fix.clone());
            }
            None => {
                self.state.no_fix_count += 1;
                info!("Request {} ended without a fix", self.state.requests);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::Crs;
    use crate::hardware::{MockChannel, MockReply};

    const GPS_ANSWER: &str =
        "AT+CGPSINFO\r\n+CGPSINFO: 2508.474658,N,11328.272145,E,170625,071340.0,79.3,0.0,\r\n\r\nOK\r\n";
    const LBS_ANSWER: &str = "\r\n+CLBS: 0,25.141220,113.471210,550,2025/06/17,07:13:40\r\n\r\nOK\r\n";

    fn fast_api(channel: MockChannel) -> PositioningApi<MockChannel> {
        let mut config = SystemConfig::default();
        config.transaction = TransactionConfig {
            command_timeout_ms: 50,
            poll_interval_ms: 1,
        };
        PositioningApi::from_config(channel, &config)
    }

    #[test]
    fn test_ping() {
        let mut channel = MockChannel::new();
        channel.respond_to("AT", "\r\nOK\r\n");
        let mut api = fast_api(channel);

        assert!(api.ping().unwrap());
        assert!(!api.ping().unwrap());
    }

    #[test]
    fn test_enable_echo_only_once() {
        let mut channel = MockChannel::new();
        channel.respond_to("ATE1", "\r\nOK\r\n");
        let mut api = fast_api(channel);

        api.enable_echo().unwrap();
        api.enable_echo().unwrap();
        assert!(api.echo_enabled());
        assert_eq!(api.channel().count_sent("ATE1"), 1);

        api.open().unwrap();
        assert!(!api.echo_enabled());
        assert!(matches!(api.enable_echo(), Err(ApiError::CommandRejected { .. })));
    }

    #[test]
    fn test_echo_rejection_reports_modem_answer() {
        let mut channel = MockChannel::new();
        channel.respond_to("ATE1", "\r\nERROR\r\n");
        let mut api = fast_api(channel);

        match api.enable_echo() {
            Err(ApiError::CommandRejected { command, response }) => {
                assert_eq!(command, "ATE1");
                assert_eq!(response, "ERROR");
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(!api.echo_enabled());
    }

    #[test]
    fn test_ping_after_locate_ignores_leftover_ok() {
        let mut channel = MockChannel::new();
        channel.set_chunk_size(7);
        channel
            .respond_to("AT+CGPSINFO", GPS_ANSWER)
            .script("AT", MockReply::Silence);
        let mut api = fast_api(channel);

        assert!(api.locate().unwrap().outcome.fix().is_some());
        assert!(!api.ping().unwrap());
    }

    #[test]
    fn test_reset_is_fire_and_forget() {
        let mut api = fast_api(MockChannel::new());
        api.reset_module().unwrap();
        assert_eq!(api.channel().sent_commands(), ["AT+CRESET"]);
    }

    #[test]
    fn test_locate_satellite() {
        let mut channel = MockChannel::new();
        channel.respond_to("AT+CGPSINFO", GPS_ANSWER);
        let mut api = fast_api(channel);

        let acquisition = api.locate().unwrap();
        let fix = acquisition.outcome.fix().unwrap();
        assert_eq!(fix.source(), FixSource::Satellite);
        assert!((fix.latitude() - 25.141244).abs() < 1e-5);
        assert!((fix.longitude() - 113.471202).abs() < 1e-5);
        assert_eq!(api.get_system_state().satellite_fixes, 1);
        assert_eq!(api.channel().count_sent("AT+CLBS=4"), 0);
    }

    #[test]
    fn test_locate_cell_tower_only() {
        let mut channel = MockChannel::new();
        channel.respond_to("AT+CLBS=4", LBS_ANSWER);
        let mut api = fast_api(channel);

        let acquisition = api.locate_cell_tower().unwrap();
        let fix = acquisition.outcome.fix().unwrap();
        assert_eq!(fix.source(), FixSource::CellTower);
        assert_eq!(fix.accuracy_radius_m(), 550);
        assert_eq!(fix.timestamp(), "2025_06_17_07:13:40");
        assert!(acquisition.cell_tower_attempted);
        assert_eq!(api.channel().count_sent("AT+CGPSINFO"), 0);
        assert_eq!(api.get_system_state().cell_tower_fixes, 1);
    }

    #[test]
    fn test_locate_without_any_fix() {
        let mut api = fast_api(MockChannel::new());
        let acquisition = api.locate().unwrap();

        assert_eq!(acquisition.outcome, PositionOutcome::NoFixAvailable);
        assert_eq!(api.get_system_state().no_fix_count, 1);
        assert_eq!(api.get_system_state().last_fix, None);
    }

    #[test]
    fn test_closed_channel_surfaces_error() {
        let mut api = fast_api(MockChannel::new());
        api.close();
        api.close();
        assert!(!api.is_open());

        assert!(matches!(api.locate(), Err(ApiError::Channel(ChannelError::NotOpen { .. }))));
        assert_eq!(api.get_system_state().error_count, 1);

        api.open().unwrap();
        assert!(api.is_open());
    }

    #[test]
    fn test_check_zone() {
        let doc = r#"{"features": [{"type": "Polygon", "coordinates":
            [[[113.46, 25.13], [113.48, 25.13], [113.48, 25.15], [113.46, 25.15], [113.46, 25.13]]]}]}"#;
        let zone = Zone::from_json_str(doc, 50.0).unwrap();
        assert_eq!(zone.crs(), Crs::Wgs84);
        let api = fast_api(MockChannel::new());

        let inside = Fix::new("t", 25.14, 113.47, 10, FixSource::Satellite).unwrap();
        assert!(api.check_zone(&zone, &inside).unwrap());

        // ~0.01 deg of latitude north of the zone edge is about 1.1 km
        let outside = Fix::new("t", 25.16, 113.47, 10, FixSource::Satellite).unwrap();
        assert!(!api.check_zone(&zone, &outside).unwrap());

        let coarse = Fix::new("t", 25.16, 113.47, 1500, FixSource::CellTower).unwrap();
        assert!(api.check_zone(&zone, &coarse).unwrap());
    }
}
