use std::io::{self, Write};
use futures::{SinkExt, StreamExt};
use futures::channel::mpsc::{channel, Receiver};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::device::constants::CHANNEL_CAPACITY;
use crate::device::manager::SessionManager;
use crate::device::platform::{BluetoothHost, EventAlert};
use crate::device::types::{DeviceEvent, DeviceState, SessionCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEnd {
    Unsupported,
    Failed,
    Disconnected,
}

async fn print_until_end<W: Write>(events: &mut Receiver<DeviceEvent>, out: &mut W) -> io::Result<MonitorEnd> {
    while let Some(event) = events.next().await {
        match event {
            DeviceEvent::StateChange(DeviceState::Failed) => {
                writeln!(out, "Not connected, try again.")?;
                return Ok(MonitorEnd::Failed);
            },
            DeviceEvent::StateChange(DeviceState::Disconnected) => {
                return Ok(MonitorEnd::Disconnected);
            },
            DeviceEvent::StateChange(state) => info!("Session is {}", state),
            DeviceEvent::Reading(Some(level)) => writeln!(out, "Battery level: {}", level)?,
            DeviceEvent::Reading(None) => {},
            // only sent by the gui chooser
            DeviceEvent::ChooseDevice(_) => {},
            DeviceEvent::Alert(message) => writeln!(out, "{}", message)?,
        }
        out.flush()?;
    }

    Ok(MonitorEnd::Failed)
}

async fn print_events<W: Write>(mut events: Receiver<DeviceEvent>, out: &mut W, cancel: CancellationToken) -> io::Result<MonitorEnd> {
    let result = print_until_end(&mut events, out).await;
    cancel.cancel();
    result
}

// runs a single session, returns once it has failed or the device disconnected
pub async fn monitor<H: BluetoothHost, W: Write>(host: H, out: &mut W) -> io::Result<MonitorEnd> {
    let (event_sender, event_receiver) = channel(CHANNEL_CAPACITY);
    let alert = EventAlert::new(event_sender.clone());
    let manager = SessionManager::new(host, vec![event_sender], Box::new(alert));

    if !manager.supports_bluetooth() {
        writeln!(out, "Bluetooth is not available on this system.")?;
        return Ok(MonitorEnd::Unsupported);
    }

    // the sender must outlive the session, the manager stops when the command channel closes
    let (mut command_sender, command_receiver) = channel(1);
    if let Err(err) = command_sender.send(SessionCommand::Connect).await {
        warn!("Failed to request a connection: {}", err);
        return Ok(MonitorEnd::Failed);
    }

    let cancel = CancellationToken::new();
    let (_, end) = tokio::join!(
        manager.run(command_receiver, cancel.clone()),
        print_events(event_receiver, out, cancel),
    );

    drop(command_sender);
    end
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::device::fake::{FakeHost, FakeRemote, FakeScript};

    // disconnects the fake device as soon as the first reading has been printed
    struct DisconnectAfterReading {
        written: Vec<u8>,
        remote: Arc<FakeRemote>,
        disconnected: bool,
    }

    impl Write for DisconnectAfterReading {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            if !self.disconnected && String::from_utf8_lossy(&self.written).contains("Battery level") {
                self.disconnected = true;
                self.remote.disconnect();
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unsupported() {
        let mut out = Vec::new();
        let end = monitor(FakeHost::unavailable(), &mut out).await.unwrap();

        assert_eq!(end, MonitorEnd::Unsupported);
        assert_eq!(String::from_utf8(out).unwrap(), "Bluetooth is not available on this system.\n");
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let host = FakeHost::new(FakeScript { refuse_connection: true, ..FakeScript::default() });
        let mut out = Vec::new();
        let end = monitor(host, &mut out).await.unwrap();

        assert_eq!(end, MonitorEnd::Failed);
        assert_eq!(String::from_utf8(out).unwrap(), "Not connected, try again.\n");
    }

    #[tokio::test]
    async fn test_prints_reading_until_disconnected() {
        let host = FakeHost::new(FakeScript::reading(64));
        let mut out = DisconnectAfterReading { written: Vec::new(), remote: host.remote(), disconnected: false };
        let end = monitor(host, &mut out).await.unwrap();

        assert_eq!(end, MonitorEnd::Disconnected);
        assert_eq!(
            String::from_utf8(out.written).unwrap(),
            "Battery level: 64%\nThe device Fake Headset is disconnected\n",
        );
    }

    #[tokio::test]
    async fn test_disconnect_while_resolving() {
        let host = FakeHost::new(FakeScript { disconnect_while_resolving: true, ..FakeScript::default() });
        let mut out = Vec::new();
        let end = monitor(host, &mut out).await.unwrap();

        assert_eq!(end, MonitorEnd::Disconnected);
        assert_eq!(String::from_utf8(out).unwrap(), "The device Fake Headset is disconnected\n");
    }

    #[tokio::test]
    async fn test_write_failure_stops_the_session() {
        let host = FakeHost::new(FakeScript::reading(64));
        let remote = host.remote();
        let result = monitor(host, &mut BrokenPipe).await;

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(remote.connects(), 1);
    }
}
