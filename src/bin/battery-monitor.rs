use log::info;
use msgbox::IconType;
use battery_monitor::{init_logging, run};
use battery_monitor::error::{error_msgbox, AppRunError, ConfigError};

// This embedded Info.plist is used when launching the binary directly, instead of an app bundle.
// Without it CoreBluetooth terminates the process on the first scan.
#[cfg(target_os = "macos")]
embed_plist::embed_info_plist!(concat!(env!("OUT_DIR"), "/Info.plist"));

fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")));

    match run() {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            msgbox::create(
                concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")),
                "This application has already been started",
                IconType::Error,
            ).expect("Could not create msgbox");
            Ok(())
        },
        Err(err) => {
            error_msgbox("Unexpected error", &err);
            Err(err)
        }
        Ok(_) => Ok(())
    }
}
