use std::io;
use std::process::ExitCode;
use std::time::Duration;
use clap::Parser;
use log::{error, info};
use battery_monitor::cli::{monitor, MonitorEnd};
use battery_monitor::config::io::ConfigIO;
use battery_monitor::device::btle::BtleHost;
use battery_monitor::device::chooser::{FirstMatch, PromptChooser};
use battery_monitor::error::ConfigError;
use battery_monitor::init_logging;

#[cfg(target_os = "macos")]
embed_plist::embed_info_plist!(concat!(env!("OUT_DIR"), "/Info.plist"));

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Connects to a Bluetooth device advertising the battery service and prints its battery level until it disconnects.", long_about = None)]
struct Args {
    /// Connect to the first device found instead of asking
    #[arg(long)]
    first: bool,

    /// How long to scan for devices, in milliseconds. Defaults to the value in the config file
    #[arg(long)]
    scan_ms: Option<u64>,
}

async fn run(args: Args) -> Result<MonitorEnd, ConfigError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let mut config = config_io.read().await?;
    if let Some(scan_ms) = args.scan_ms {
        config.scan_duration_ms = scan_ms;
    }
    let scan_duration: Duration = config.scan_duration();
    info!("Scanning for {}", humantime::format_duration(scan_duration));

    let mut stdout = io::stdout();
    let end = if args.first {
        let host = BtleHost::new(scan_duration, true, FirstMatch).await;
        monitor(host, &mut stdout).await?
    } else {
        let host = BtleHost::new(scan_duration, config.auto_select_single, PromptChooser).await;
        monitor(host, &mut stdout).await?
    };

    Ok(end)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();
    info!(concat!("Battery Monitor CLI ", env!("CARGO_PKG_VERSION")));

    let args = Args::parse();

    match run(args).await {
        Ok(MonitorEnd::Unsupported) => ExitCode::from(2),
        Ok(MonitorEnd::Failed) => ExitCode::FAILURE,
        Ok(MonitorEnd::Disconnected) => ExitCode::SUCCESS,
        Err(ConfigError::CanNotLock { .. }) => {
            eprintln!("Battery Monitor is already running");
            ExitCode::FAILURE
        },
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        },
    }
}
