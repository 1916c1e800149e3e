use std::any::TypeId;
use std::convert::Infallible;
use futures::{future, SinkExt, StreamExt};
use futures::channel::mpsc::{channel, Receiver, Sender};
use iced::subscription::{self, Subscription};
use log::warn;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::device::btle::BtleHost;
use crate::device::chooser::ChannelChooser;
use crate::device::constants::CHANNEL_CAPACITY;
use crate::device::manager::SessionManager;
use crate::device::platform::EventAlert;
use crate::device::types::{DeviceEvent, SessionCommand};
use crate::gui::types::{Message, SessionHandle};

async fn forward_events(mut receiver: Receiver<DeviceEvent>, mut output: Sender<Message>) {
    while let Some(event) = receiver.next().await {
        if let Err(err) = output.send(Message::DeviceEvent(event)).await {
            warn!("Failed to forward DeviceEvent to the application: {}", err);
            break;
        }
    }
}

async fn run_session(cancel: CancellationToken, config: Config, mut output: Sender<Message>) -> Infallible {
    let (event_sender, event_receiver) = channel::<DeviceEvent>(CHANNEL_CAPACITY);
    let (command_sender, command_receiver) = channel::<SessionCommand>(CHANNEL_CAPACITY);
    let (choice_sender, choice_receiver) = channel::<Option<usize>>(1);

    let chooser = ChannelChooser::new(event_sender.clone(), choice_receiver);
    let host = BtleHost::new(config.scan_duration(), config.auto_select_single, chooser).await;
    let alert = EventAlert::new(event_sender.clone());
    let manager = SessionManager::new(host, vec![event_sender], Box::new(alert));

    let handle = SessionHandle {
        supports_bluetooth: manager.supports_bluetooth(),
        commands: command_sender,
        choices: choice_sender,
    };

    if let Err(err) = output.send(Message::SessionReady(handle)).await {
        warn!("Failed to send SessionReady to the application: {}", err);
    }

    tokio::join!(
        manager.run(command_receiver, cancel),
        forward_events(event_receiver, output),
    );

    // note: subscription::channel expects the future to never resolve (Infallible)
    future::pending().await
}

// the first message is SessionReady, after that every DeviceEvent is forwarded
pub fn session_subscription(cancel: CancellationToken, config: Config) -> Subscription<Message> {
    struct Session;

    subscription::channel(
        TypeId::of::<Session>(),
        CHANNEL_CAPACITY,
        move |output| {
            async move {
                run_session(cancel, config, output).await
            }
        },
    )
}
