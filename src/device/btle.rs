use std::time::Duration;
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, Service};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{future, StreamExt};
use log::{debug, info, warn};
use tokio::time::sleep;
use uuid::Uuid;

use crate::device::platform::{BluetoothHost, DeviceChooser, EventStream, GattCharacteristic, GattDevice, GattService};
use crate::device::types::{DeviceCandidate, DeviceFilter};
use crate::error::DeviceError;

pub struct BtleHost<C: DeviceChooser> {
    // kept alive for as long as the adapters are in use
    _manager: Option<Manager>,
    adapters: Vec<Adapter>,
    scan_duration: Duration,
    auto_select_single: bool,
    chooser: C,
}

impl<C: DeviceChooser> BtleHost<C> {
    // without a bluetooth stack the host reports itself as unavailable
    pub async fn new(scan_duration: Duration, auto_select_single: bool, chooser: C) -> Self {
        let (manager, adapters) = match Manager::new().await {
            Ok(manager) => {
                let adapters = match manager.adapters().await {
                    Ok(adapters) => adapters,
                    Err(err) => {
                        warn!("Failed to query bluetooth adapters: {}", err);
                        Vec::new()
                    },
                };
                (Some(manager), adapters)
            },
            Err(err) => {
                warn!("Failed to open the bluetooth stack: {}", err);
                (None, Vec::new())
            },
        };

        BtleHost {
            _manager: manager,
            adapters,
            scan_duration,
            auto_select_single,
            chooser,
        }
    }
}

// the part of an adapter needed to start and stop a scan
#[async_trait]
trait ScanControl: Sync {
    async fn start(&self, filter: ScanFilter) -> Result<(), DeviceError>;

    async fn stop(&self) -> Result<(), DeviceError>;
}

#[async_trait]
impl ScanControl for Adapter {
    async fn start(&self, filter: ScanFilter) -> Result<(), DeviceError> {
        info!("Scanning using adapter {}...", self.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        self.start_scan(filter).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        self.stop_scan().await?;
        Ok(())
    }
}

// if one adapter fails to start, the ones already scanning are stopped again
async fn start_scanning<A: ScanControl>(adapters: &[A], filter: &DeviceFilter) -> Result<(), DeviceError> {
    let scan_filter = ScanFilter {
        services: filter.services.clone(),
    };

    for (index, adapter) in adapters.iter().enumerate() {
        if let Err(err) = adapter.start(scan_filter.clone()).await {
            stop_scanning(&adapters[..index]).await;
            return Err(err);
        }
    }

    Ok(())
}

async fn stop_scanning<A: ScanControl>(adapters: &[A]) {
    for adapter in adapters {
        if let Err(err) = adapter.stop().await {
            warn!("Failed to stop scanning: {}", err);
        }
    }
}

async fn find_peripherals(adapters: &[Adapter], filter: &DeviceFilter) -> Vec<BtleDevice> {
    let mut found = Vec::new();

    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            },
        };

        for peripheral in peripherals {
            match peripheral.properties().await {
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                },
                Ok(None) => {
                    debug!("Peripheral has no properties");
                },
                Ok(Some(properties)) => {
                    // Some environments ignore the filter, so make sure to check the service uuid again
                    if !filter.matches(&properties.services) {
                        continue;
                    }

                    let candidate = DeviceCandidate {
                        name: properties.local_name.unwrap_or(String::from("Unknown device")),
                        address: properties.address.to_string(),
                    };
                    info!("Found peripheral {} {:?} {:?}", candidate, properties.address_type, properties.services);

                    found.push(BtleDevice {
                        adapter: adapter.clone(),
                        peripheral,
                        candidate,
                    });
                },
            }
        }
    }

    found
}

#[async_trait]
impl<C: DeviceChooser> BluetoothHost for BtleHost<C> {
    type Device = BtleDevice;

    fn is_available(&self) -> bool {
        !self.adapters.is_empty()
    }

    async fn request_device(&self, filter: &DeviceFilter) -> Result<BtleDevice, DeviceError> {
        if self.adapters.is_empty() {
            return Err(DeviceError::NoAdapter);
        }

        start_scanning(&self.adapters, filter).await?;
        sleep(self.scan_duration).await;
        let mut found = find_peripherals(&self.adapters, filter).await;
        stop_scanning(&self.adapters).await;

        if found.is_empty() {
            return Err(DeviceError::NoMatchingDevice);
        }

        let index = if self.auto_select_single && found.len() == 1 {
            Some(0)
        } else {
            let candidates: Vec<DeviceCandidate> = found.iter().map(|device| device.candidate.clone()).collect();
            self.chooser.choose(&candidates).await
        };

        match index {
            Some(index) if index < found.len() => Ok(found.swap_remove(index)),
            _ => Err(DeviceError::ChooserCancelled),
        }
    }
}

pub struct BtleDevice {
    adapter: Adapter,
    peripheral: Peripheral,
    candidate: DeviceCandidate,
}

#[async_trait]
impl GattDevice for BtleDevice {
    type Service = BtleService;
    type Characteristic = BtleCharacteristic;

    fn candidate(&self) -> DeviceCandidate {
        self.candidate.clone()
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        if !self.peripheral.is_connected().await? {
            self.peripheral.connect().await?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn disconnections(&self) -> Result<EventStream<()>, DeviceError> {
        let id = self.peripheral.id();
        let events = self.adapter.events().await?;

        Ok(events
            .filter_map(move |event| {
                let disconnected = matches!(event, CentralEvent::DeviceDisconnected(ref peripheral_id) if *peripheral_id == id);
                future::ready(if disconnected { Some(()) } else { None })
            })
            .boxed())
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<BtleService, DeviceError> {
        info!("Discovering services...");
        self.peripheral.discover_services().await?;

        let service = self.peripheral.services()
            .into_iter()
            .find(|service| service.uuid == uuid && service.primary)
            .ok_or(DeviceError::MissingService(uuid))?;

        Ok(BtleService {
            peripheral: self.peripheral.clone(),
            service,
        })
    }
}

pub struct BtleService {
    peripheral: Peripheral,
    service: Service,
}

#[async_trait]
impl GattService for BtleService {
    type Characteristic = BtleCharacteristic;

    async fn characteristic(&self, uuid: Uuid) -> Result<BtleCharacteristic, DeviceError> {
        let characteristic = self.service.characteristics
            .iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .cloned()
            .ok_or(DeviceError::MissingCharacteristic(uuid))?;

        Ok(BtleCharacteristic {
            peripheral: self.peripheral.clone(),
            characteristic,
        })
    }
}

pub struct BtleCharacteristic {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

#[async_trait]
impl GattCharacteristic for BtleCharacteristic {
    async fn start_notifications(&self) -> Result<(), DeviceError> {
        info!("Subscribing to characteristic {:?} {:?}", self.characteristic.service_uuid, self.characteristic.uuid);
        self.peripheral.subscribe(&self.characteristic).await?;
        Ok(())
    }

    async fn value_changes(&self) -> Result<EventStream<Vec<u8>>, DeviceError> {
        let uuid = self.characteristic.uuid;
        let notifications = self.peripheral.notifications().await?;

        Ok(notifications
            .filter_map(move |notification| {
                future::ready(if notification.uuid == uuid { Some(notification.value) } else { None })
            })
            .boxed())
    }

    async fn read_value(&self) -> Result<Vec<u8>, DeviceError> {
        Ok(self.peripheral.read(&self.characteristic).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use super::*;

    #[derive(Default)]
    struct FakeAdapter {
        refuse: bool,
        scanning: AtomicBool,
    }

    impl FakeAdapter {
        fn refusing() -> Self {
            FakeAdapter { refuse: true, ..FakeAdapter::default() }
        }

        fn is_scanning(&self) -> bool {
            self.scanning.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScanControl for FakeAdapter {
        async fn start(&self, _filter: ScanFilter) -> Result<(), DeviceError> {
            if self.refuse {
                return Err(DeviceError::Btle { source: btleplug::Error::PermissionDenied });
            }
            self.scanning.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<(), DeviceError> {
            self.scanning.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_start_scanning_starts_every_adapter() {
        let adapters = vec![FakeAdapter::default(), FakeAdapter::default()];

        start_scanning(&adapters, &DeviceFilter::battery()).await.unwrap();

        assert!(adapters.iter().all(FakeAdapter::is_scanning));
    }

    #[tokio::test]
    async fn test_failed_start_stops_adapters_already_scanning() {
        let adapters = vec![FakeAdapter::default(), FakeAdapter::refusing(), FakeAdapter::default()];

        let result = start_scanning(&adapters, &DeviceFilter::battery()).await;

        assert!(matches!(result, Err(DeviceError::Btle { .. })));
        assert!(adapters.iter().all(|adapter| !adapter.is_scanning()));
    }
}
