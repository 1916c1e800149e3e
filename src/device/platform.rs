use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use log::warn;
use futures::channel::mpsc::Sender;
use uuid::Uuid;

use crate::device::types::{DeviceCandidate, DeviceEvent, DeviceFilter};
use crate::error::DeviceError;

pub type EventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

#[async_trait]
pub trait BluetoothHost: Send + Sync {
    type Device: GattDevice;

    // must not change after startup
    fn is_available(&self) -> bool;

    async fn request_device(&self, filter: &DeviceFilter) -> Result<Self::Device, DeviceError>;
}

#[async_trait]
pub trait GattDevice: Send + Sync {
    type Service: GattService<Characteristic = Self::Characteristic>;
    type Characteristic: GattCharacteristic;

    fn candidate(&self) -> DeviceCandidate;

    async fn connect(&self) -> Result<(), DeviceError>;

    async fn disconnect(&self) -> Result<(), DeviceError>;

    // yields once every time the transport session to this device is dropped
    async fn disconnections(&self) -> Result<EventStream<()>, DeviceError>;

    async fn primary_service(&self, uuid: Uuid) -> Result<Self::Service, DeviceError>;
}

#[async_trait]
pub trait GattService: Send + Sync {
    type Characteristic: GattCharacteristic;

    async fn characteristic(&self, uuid: Uuid) -> Result<Self::Characteristic, DeviceError>;
}

#[async_trait]
pub trait GattCharacteristic: Send + Sync + 'static {
    async fn start_notifications(&self) -> Result<(), DeviceError>;

    async fn value_changes(&self) -> Result<EventStream<Vec<u8>>, DeviceError>;

    async fn read_value(&self) -> Result<Vec<u8>, DeviceError>;
}

// None if the user cancelled
#[async_trait]
pub trait DeviceChooser: Send + Sync {
    async fn choose(&self, candidates: &[DeviceCandidate]) -> Option<usize>;
}

pub trait AlertSink: Send {
    fn alert(&mut self, message: &str);
}

pub struct EventAlert {
    sender: Sender<DeviceEvent>,
}

impl EventAlert {
    pub fn new(sender: Sender<DeviceEvent>) -> Self {
        EventAlert { sender }
    }
}

impl AlertSink for EventAlert {
    fn alert(&mut self, message: &str) {
        if let Err(err) = self.sender.try_send(DeviceEvent::Alert(message.to_string())) {
            warn!("Failed to deliver alert \"{}\": {}", message, err);
        }
    }
}
