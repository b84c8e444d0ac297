use env_logger::Env;
use log::{error, info, warn};
use modem_geofence::{
    Acquisition, ApiError, CommandChannel, ConfigurationManager, PositioningApi, RecoveryStrategy, SerialChannel,
    Zone,
};
use std::thread;
use std::time::Duration;

fn print_usage(program: &str) {
    eprintln!("Usage: {} [CONFIG] [--once]", program);
    eprintln!("   CONFIG   JSON configuration file (defaults when omitted)");
    eprintln!("   --once   take a single position and exit");
}

fn report<C: CommandChannel>(api: &PositioningApi<C>, zone: Option<&Zone>, acquisition: &Acquisition) {
    let fix = match acquisition.outcome.fix() {
        Some(fix) => fix,
        None => {
            println!("No fix available");
            return;
        }
    };

    match zone {
        None => println!("{}", fix),
        Some(zone) => match api.check_zone(zone, fix) {
            Ok(inside) => println!("{} [{}]", fix, if inside { "in zone" } else { "out of zone" }),
            Err(e) => {
                warn!("Zone check failed: {}", e);
                println!("{}", fix);
            }
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("modem-geofence", |s| s.as_str());

    let mut config_path: Option<&str> = None;
    let mut once = false;
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            "-h" | "--help" => {
                print_usage(program);
                return Ok(());
            }
            path if !path.starts_with('-') && config_path.is_none() => config_path = Some(path),
            _ => {
                print_usage(program);
                return Err("Invalid arguments".into());
            }
        }
    }

    let manager = match config_path {
        Some(path) => ConfigurationManager::from_file(path)?,
        None => ConfigurationManager::new(),
    };
    let config = manager.get_system_config().clone();

    let zone = match &config.zone.path {
        Some(path) => Some(Zone::load(path, config.zone.margin_m)?),
        None => None,
    };

    let channel = SerialChannel::new(config.serial.clone())?;
    let mut api = PositioningApi::from_config(channel, &config);
    api.open()?;
    info!("Opened {} at {} baud", config.serial.port_name, config.serial.baud_rate);

    if !api.ping()? {
        warn!("Modem on {} did not answer AT", config.serial.port_name);
    }

    loop {
        match api.locate() {
            Ok(acquisition) => report(&api, zone.as_ref(), &acquisition),
            Err(ApiError::Channel(e)) if e.recovery_strategy() == RecoveryStrategy::Reopen => {
                warn!("{}, reopening {}", e, config.serial.port_name);
                api.close();
                if let Err(e) = api.open() {
                    error!("Reopen failed: {}", e);
                    return Err(e.into());
                }
            }
            Err(e) => {
                error!("{}", e);
                api.close();
                return Err(e.into());
            }
        }

        if once {
            break;
        }
        thread::sleep(Duration::from_millis(config.poll_interval_ms));
    }

    api.close();
    Ok(())
}
