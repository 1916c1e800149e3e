use futures::channel::mpsc::Sender;
use iced::Event;

use crate::config::types::Config;
use crate::device::types::{DeviceEvent, SessionCommand};

#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub supports_bluetooth: bool,
    pub commands: Sender<SessionCommand>,
    // answers to DeviceEvent::ChooseDevice, None if the user cancelled
    pub choices: Sender<Option<usize>>,
}

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ConfigLoadComplete((Config, Option<String>)), // error message if loading failed
    SessionReady(SessionHandle),
    DeviceEvent(DeviceEvent),
    ConnectPress,
    DeviceChosen(Option<usize>),
    NoticeConfirmed,
    SendComplete(()),
}
