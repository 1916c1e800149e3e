use log::{info, warn};

use crate::device::platform::BluetoothHost;

pub fn probe<H: BluetoothHost>(host: &H) -> bool {
    let available = host.is_available();

    if available {
        info!("Bluetooth is available");
    } else {
        warn!("Bluetooth is not available on this system");
    }

    available
}
