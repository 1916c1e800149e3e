use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use futures::{future, StreamExt};
use futures::channel::mpsc::{unbounded, UnboundedSender};
use uuid::Uuid;

use crate::device::constants::{BATTERY_LEVEL_CHARACTERISTIC, BATTERY_SERVICE};
use crate::device::platform::{AlertSink, BluetoothHost, EventStream, GattCharacteristic, GattDevice, GattService};
use crate::device::types::{DeviceCandidate, DeviceFilter};
use crate::error::DeviceError;

#[derive(Debug, Clone)]
pub struct FakeScript {
    pub cancel_chooser: bool,
    pub no_device: bool,
    pub refuse_connection: bool,
    pub missing_service: bool,
    pub missing_characteristic: bool,
    pub reject_notifications: bool,
    pub disconnect_while_resolving: bool,
    // the link drops and the pending service lookup fails because of it
    pub drop_link_while_resolving: bool,
    pub initial_value: Vec<u8>,
}

impl FakeScript {
    pub fn reading(value: u8) -> Self {
        FakeScript {
            initial_value: vec![value],
            ..FakeScript::default()
        }
    }
}

impl Default for FakeScript {
    fn default() -> Self {
        FakeScript {
            cancel_chooser: false,
            no_device: false,
            refuse_connection: false,
            missing_service: false,
            missing_characteristic: false,
            reject_notifications: false,
            disconnect_while_resolving: false,
            drop_link_while_resolving: false,
            initial_value: vec![100],
        }
    }
}

#[derive(Default)]
pub struct FakeRemote {
    script: Mutex<FakeScript>,
    disconnect_senders: Mutex<Vec<UnboundedSender<()>>>,
    value_senders: Mutex<Vec<UnboundedSender<Vec<u8>>>>,
    requests: AtomicUsize,
    connects: AtomicUsize,
    local_disconnects: AtomicUsize,
    disconnection_observers: AtomicUsize,
    value_observers: AtomicUsize,
}

impl FakeRemote {
    fn script(&self) -> FakeScript {
        self.script.lock().unwrap().clone()
    }

    pub fn set_script(&self, script: FakeScript) {
        *self.script.lock().unwrap() = script;
    }

    pub fn disconnect(&self) {
        for sender in self.disconnect_senders.lock().unwrap().iter() {
            let _ = sender.unbounded_send(());
        }
    }

    pub fn notify(&self, value: &[u8]) {
        for sender in self.value_senders.lock().unwrap().iter() {
            let _ = sender.unbounded_send(value.to_vec());
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn local_disconnects(&self) -> usize {
        self.local_disconnects.load(Ordering::SeqCst)
    }

    pub fn disconnection_observers(&self) -> usize {
        self.disconnection_observers.load(Ordering::SeqCst)
    }

    pub fn value_observers(&self) -> usize {
        self.value_observers.load(Ordering::SeqCst)
    }
}

pub struct FakeHost {
    available: bool,
    remote: Arc<FakeRemote>,
}

impl FakeHost {
    pub fn new(script: FakeScript) -> Self {
        let remote = FakeRemote::default();
        remote.set_script(script);

        FakeHost {
            available: true,
            remote: Arc::new(remote),
        }
    }

    pub fn unavailable() -> Self {
        FakeHost {
            available: false,
            remote: Arc::new(FakeRemote::default()),
        }
    }

    pub fn remote(&self) -> Arc<FakeRemote> {
        self.remote.clone()
    }
}

#[async_trait]
impl BluetoothHost for FakeHost {
    type Device = FakeDevice;

    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_device(&self, filter: &DeviceFilter) -> Result<FakeDevice, DeviceError> {
        self.remote.requests.fetch_add(1, Ordering::SeqCst);
        let script = self.remote.script();
        assert_eq!(filter, &DeviceFilter::battery());

        if script.no_device {
            return Err(DeviceError::NoMatchingDevice);
        }
        if script.cancel_chooser {
            return Err(DeviceError::ChooserCancelled);
        }

        Ok(FakeDevice { remote: self.remote.clone() })
    }
}

pub struct FakeDevice {
    remote: Arc<FakeRemote>,
}

#[async_trait]
impl GattDevice for FakeDevice {
    type Service = FakeService;
    type Characteristic = FakeCharacteristic;

    fn candidate(&self) -> DeviceCandidate {
        DeviceCandidate {
            name: String::from("Fake Headset"),
            address: String::from("00:11:22:33:44:55"),
        }
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.remote.connects.fetch_add(1, Ordering::SeqCst);

        if self.remote.script().refuse_connection {
            return Err(DeviceError::Btle { source: btleplug::Error::NotConnected });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.remote.local_disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnections(&self) -> Result<EventStream<()>, DeviceError> {
        let (tx, rx) = unbounded();
        self.remote.disconnect_senders.lock().unwrap().push(tx);
        self.remote.disconnection_observers.fetch_add(1, Ordering::SeqCst);
        Ok(rx.boxed())
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<FakeService, DeviceError> {
        let script = self.remote.script();

        if script.disconnect_while_resolving {
            self.remote.disconnect();
            return future::pending().await;
        }
        if script.drop_link_while_resolving {
            self.remote.disconnect();
            return Err(DeviceError::Btle { source: btleplug::Error::NotConnected });
        }
        if script.missing_service || uuid != BATTERY_SERVICE {
            return Err(DeviceError::MissingService(uuid));
        }

        Ok(FakeService { remote: self.remote.clone() })
    }
}

pub struct FakeService {
    remote: Arc<FakeRemote>,
}

#[async_trait]
impl GattService for FakeService {
    type Characteristic = FakeCharacteristic;

    async fn characteristic(&self, uuid: Uuid) -> Result<FakeCharacteristic, DeviceError> {
        if self.remote.script().missing_characteristic || uuid != BATTERY_LEVEL_CHARACTERISTIC {
            return Err(DeviceError::MissingCharacteristic(uuid));
        }

        Ok(FakeCharacteristic { remote: self.remote.clone() })
    }
}

pub struct FakeCharacteristic {
    remote: Arc<FakeRemote>,
}

#[async_trait]
impl GattCharacteristic for FakeCharacteristic {
    async fn start_notifications(&self) -> Result<(), DeviceError> {
        if self.remote.script().reject_notifications {
            return Err(DeviceError::Btle { source: btleplug::Error::NotSupported(String::from("notify")) });
        }
        Ok(())
    }

    async fn value_changes(&self) -> Result<EventStream<Vec<u8>>, DeviceError> {
        let (tx, rx) = unbounded();
        self.remote.value_senders.lock().unwrap().push(tx);
        self.remote.value_observers.fetch_add(1, Ordering::SeqCst);
        Ok(rx.boxed())
    }

    async fn read_value(&self) -> Result<Vec<u8>, DeviceError> {
        Ok(self.remote.script().initial_value)
    }
}

#[derive(Clone, Default)]
pub struct RecordingAlert {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingAlert {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingAlert {
    fn alert(&mut self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
