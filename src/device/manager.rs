use futures::{future, FutureExt, SinkExt, StreamExt};
use futures::channel::mpsc::{Receiver, Sender};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::device::capability::probe;
use crate::device::constants::{BATTERY_LEVEL_CHARACTERISTIC, BATTERY_SERVICE};
use crate::device::platform::{AlertSink, BluetoothHost, EventStream, GattCharacteristic, GattDevice, GattService};
use crate::device::session::{DeviceSession, Outcome, SessionEvent};
use crate::device::types::{BatteryLevel, DeviceEvent, DeviceFilter, SessionCommand, SessionSnapshot};
use crate::error::ConnectError;

pub type CharacteristicOf<H> = <<H as BluetoothHost>::Device as GattDevice>::Characteristic;

// observers registered on the remote device, dropped together with the session
struct Observers {
    disconnections: EventStream<()>,
    values: EventStream<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Disconnected,
    Value(Vec<u8>),
}

async fn next_observed(observers: &mut Option<Observers>) -> Observed {
    match observers {
        None => future::pending().await,
        Some(observers) => {
            tokio::select! {
                biased;
                // a closed disconnection stream means the adapter went away, which is a disconnect too
                _ = observers.disconnections.next() => Observed::Disconnected,
                Some(value) = observers.values.next() => Observed::Value(value),
            }
        },
    }
}

async fn subscribe<D: GattDevice>(device: &D) -> Result<(D::Characteristic, EventStream<Vec<u8>>, BatteryLevel), ConnectError> {
    let service = device.primary_service(BATTERY_SERVICE).await
        .map_err(|source| ConnectError::ResolutionFailed { source })?;
    let characteristic = service.characteristic(BATTERY_LEVEL_CHARACTERISTIC).await
        .map_err(|source| ConnectError::ResolutionFailed { source })?;

    info!("Enabling battery level notifications");
    characteristic.start_notifications().await
        .map_err(|source| ConnectError::SubscriptionFailed { source })?;
    let values = characteristic.value_changes().await
        .map_err(|source| ConnectError::SubscriptionFailed { source })?;

    // notifications are only sent on change, so fetch the current value explicitly
    let value = characteristic.read_value().await
        .map_err(|source| ConnectError::SubscriptionFailed { source })?;
    let initial = BatteryLevel::decode(&value)
        .map_err(|source| ConnectError::SubscriptionFailed { source })?;

    Ok((characteristic, values, initial))
}

async fn release<D: GattDevice>(device: &D) {
    if let Err(err) = device.disconnect().await {
        warn!("Failed to disconnect from {}: {}", device.candidate(), err);
    }
}

pub struct SessionManager<H: BluetoothHost> {
    host: H,
    supports_bluetooth: bool,
    filter: DeviceFilter,
    session: DeviceSession<CharacteristicOf<H>>,
    observers: Option<Observers>,
    senders: Vec<Sender<DeviceEvent>>,
    alert: Box<dyn AlertSink>,
    published: Option<SessionSnapshot>,
}

impl<H: BluetoothHost> SessionManager<H> {
    pub fn new(host: H, senders: Vec<Sender<DeviceEvent>>, alert: Box<dyn AlertSink>) -> Self {
        let supports_bluetooth = probe(&host);

        SessionManager {
            host,
            supports_bluetooth,
            filter: DeviceFilter::battery(),
            session: DeviceSession::default(),
            observers: None,
            senders,
            alert,
            published: None,
        }
    }

    pub fn supports_bluetooth(&self) -> bool {
        self.supports_bluetooth
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            supports_bluetooth: self.supports_bluetooth,
            state: self.session.state(),
            reading: self.session.reading(),
        }
    }

    #[cfg(test)]
    pub(crate) fn subscription(&self) -> Option<&CharacteristicOf<H>> {
        self.session.subscription()
    }

    #[cfg(test)]
    pub(crate) fn is_observing(&self) -> bool {
        self.observers.is_some()
    }

    // every failure leaves the session Failed (or Disconnected), from which it can be retried
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        if !self.supports_bluetooth {
            warn!("Ignoring connection request, bluetooth is not available");
            return Err(ConnectError::CapabilityUnavailable);
        }

        if let Err(err) = self.session.apply(SessionEvent::ConnectRequested) {
            warn!("Ignoring connection request: {}", err);
            return Err(ConnectError::Busy(self.session.state()));
        }
        self.observers = None;
        self.publish().await;

        match self.establish().await {
            Ok(()) => Ok(()),
            Err(ConnectError::RemoteDisconnected) => Err(ConnectError::RemoteDisconnected),
            Err(err) => {
                match (&err, self.session.device()) {
                    (ConnectError::DiscoveryCancelled, _) => info!("Device selection was cancelled"),
                    (_, Some(device)) => warn!("Connecting to {} failed: {}", device, err),
                    (_, None) => warn!("Connecting to device failed: {}", err),
                }

                self.observers = None;
                self.advance(SessionEvent::StepFailed).await;
                Err(err)
            },
        }
    }

    async fn establish(&mut self) -> Result<(), ConnectError> {
        info!("Requesting a device advertising the battery service...");
        let device = self.host.request_device(&self.filter).await
            .map_err(ConnectError::discovery)?;

        let candidate = device.candidate();
        info!("Using device {}", candidate);
        self.advance(SessionEvent::DeviceSelected(candidate)).await;

        info!("Connecting to device...");
        device.connect().await
            .map_err(|source| ConnectError::ConnectionFailed { source })?;

        let mut disconnections = match device.disconnections().await {
            Ok(stream) => stream,
            Err(source) => {
                release(&device).await;
                return Err(ConnectError::ConnectionFailed { source });
            },
        };
        self.advance(SessionEvent::TransportEstablished).await;

        info!("Connected; Resolving battery level characteristic...");
        let resolved = tokio::select! {
            result = subscribe(&device) => result,
            Some(()) = disconnections.next() => {
                warn!("Device disconnected before the subscription completed");
                self.on_disconnected().await;
                return Err(ConnectError::RemoteDisconnected);
            },
        };

        let (characteristic, values, initial) = match resolved {
            Ok(resolved) => resolved,
            // a lost link usually fails the pending request before the disconnect event is seen
            Err(_) if disconnections.next().now_or_never().is_some() => {
                warn!("Device disconnected before the subscription completed");
                self.on_disconnected().await;
                return Err(ConnectError::RemoteDisconnected);
            },
            Err(err) => {
                release(&device).await;
                return Err(err);
            },
        };

        info!("Subscribed; Battery level is {}", initial);
        self.observers = Some(Observers { disconnections, values });
        self.advance(SessionEvent::Subscribed { characteristic, initial }).await;
        Ok(())
    }

    // only the first call for a session has an effect
    pub async fn on_disconnected(&mut self) {
        match self.session.apply(SessionEvent::RemoteDisconnected) {
            Ok(Outcome::Disconnected { device }) => {
                info!("Device {} disconnected", device);
                self.observers = None;
                self.alert.alert(&format!("The device {} is disconnected", device.name));
                self.publish().await;
            },
            Ok(_) => debug!("Ignoring disconnection, no device is connected"),
            Err(err) => warn!("Failed to handle disconnection: {}", err),
        }
    }

    pub async fn on_value_changed(&mut self, value: &[u8]) {
        let level = match BatteryLevel::decode(value) {
            Ok(level) => level,
            Err(err) => {
                warn!("Failed to decode battery level {:?}: {}", value, err);
                return;
            },
        };

        debug!("Battery level notification: {}", level);
        match self.session.apply(SessionEvent::ValueChanged(level)) {
            Ok(Outcome::ReadingChanged) => self.publish().await,
            Ok(_) => {},
            Err(err) => warn!("Failed to handle battery level notification: {}", err),
        }
    }

    // returns false immediately when no device is being observed
    #[cfg(test)]
    pub(crate) async fn process_observed(&mut self) -> bool {
        if self.observers.is_none() {
            return false;
        }

        let observed = next_observed(&mut self.observers).await;
        self.handle_observed(observed).await;
        true
    }

    async fn handle_observed(&mut self, observed: Observed) {
        match observed {
            Observed::Disconnected => self.on_disconnected().await,
            Observed::Value(value) => self.on_value_changed(&value).await,
        }
    }

    async fn advance(&mut self, event: SessionEvent<CharacteristicOf<H>>) {
        match self.session.apply(event) {
            Ok(_) => self.publish().await,
            Err(err) => warn!("Rejected session event: {}", err),
        }
    }

    async fn publish(&mut self) {
        let snapshot = self.snapshot();
        let previous = self.published.replace(snapshot);
        let mut events = Vec::new();

        if previous.map(|previous| previous.state) != Some(snapshot.state) {
            events.push(DeviceEvent::StateChange(snapshot.state));
        }
        if previous.map(|previous| previous.reading) != Some(snapshot.reading) {
            events.push(DeviceEvent::Reading(snapshot.reading));
        }

        for event in events {
            for sender in &mut self.senders {
                if let Err(err) = sender.send(event.clone()).await {
                    warn!("Failed to send DeviceEvent {:?}: {}", event, err);
                }
            }
        }
    }

    pub async fn run(mut self, mut commands: Receiver<SessionCommand>, cancel: CancellationToken) {
        self.publish().await;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                command = commands.next() => match command {
                    Some(SessionCommand::Connect) => {
                        // failures are logged and reflected in the session state
                        let _ = self.connect().await;
                    },
                    None => break 'mainloop,
                },
                observed = next_observed(&mut self.observers) => {
                    self.handle_observed(observed).await;
                },
            }
        }

        info!("Session manager stopped in state {}", self.session.state());
    }
}
