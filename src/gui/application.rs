use futures::SinkExt;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, executor, window};
use iced::event::{self, Event};
use iced::theme::{self, Theme};
use iced::widget::{Button, Column, button, column, container, text};
use log::{error, info, warn};
use tokio_util::sync::{CancellationToken};

use crate::config::io::{ConfigIO};
use crate::config::types::{Config};
use crate::device::types::{BatteryLevel, DeviceCandidate, DeviceEvent, DeviceState, DisplayMode, SessionCommand, SessionSnapshot};
use crate::error::AppRunError;
use crate::gui::session::session_subscription;
use crate::gui::types::{Message, SessionHandle};

pub struct ApplicationFlags {
    config_io: ConfigIO,
}

pub struct MyApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away, such as the disconnect alert
    notices: Vec<String>,

    config_io: ConfigIO,
    // the session is started once the config is known
    config: Option<Config>,

    session: Option<SessionHandle>,
    // devices the user is asked to choose from
    choices: Option<Vec<DeviceCandidate>>,

    // latest state from the session manager
    latest_device_state: DeviceState,
    latest_reading: Option<BatteryLevel>,
}

impl MyApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.read().await {
                Ok(config) => (config, None),
                Err(err) => {
                    error!("Failed to load config: {:?}", &err);
                    (Config::default(), Some(format!("Failed to load config: {}", &err)))
                }
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn send_command(&self, command: SessionCommand) -> Command<Message> {
        let Some(session) = &self.session else {
            warn!("Ignoring {:?}, the session is not ready", command);
            return Command::none();
        };
        let mut sender = session.commands.clone();

        let fut = async move {
            if let Err(err) = sender.send(command).await {
                error!("Failed to send {:?} to the session: {}", command, err);
            }
        };

        Command::perform(fut, Message::SendComplete)
    }

    fn send_choice(&self, choice: Option<usize>) -> Command<Message> {
        let Some(session) = &self.session else {
            return Command::none();
        };
        let mut sender = session.choices.clone();

        let fut = async move {
            if let Err(err) = sender.send(choice).await {
                error!("Failed to send device choice to the session: {}", err);
            }
        };

        Command::perform(fut, Message::SendComplete)
    }

    fn device_chooser(&self, choices: &[DeviceCandidate]) -> Element<Message> {
        let mut list = Column::new()
            .push(text("Select a device"))
            .align_items(Alignment::Center)
            .spacing(10);

        for (index, candidate) in choices.iter().enumerate() {
            list = list.push(
                button(text(candidate.to_string()))
                    .on_press(Message::DeviceChosen(Some(index)))
            );
        }

        list.push(
            button(text("Cancel"))
                .style(theme::Button::Secondary)
                .on_press(Message::DeviceChosen(None))
        ).into()
    }

    fn session_view(&self, supports_bluetooth: bool) -> Element<Message> {
        let snapshot = SessionSnapshot {
            supports_bluetooth,
            state: self.latest_device_state,
            reading: self.latest_reading,
        };

        match snapshot.display_mode() {
            DisplayMode::Unsupported => {
                text("This system doesn't expose a usable Bluetooth adapter").into()
            },
            DisplayMode::ConnectButton => {
                let mut connect_button: Button<Message> = button(text("Connect to a Bluetooth device"));
                if self.latest_device_state.accepts_connect() {
                    connect_button = connect_button.on_press(Message::ConnectPress);
                }

                let status = match self.latest_device_state {
                    DeviceState::Discovering => "Scanning…",
                    DeviceState::Failed => "Not connected, try again.",
                    DeviceState::Disconnected => "The device is disconnected.",
                    _ => "",
                };

                column![connect_button, text(status)]
                    .align_items(Alignment::Center)
                    .spacing(10)
                    .into()
            },
            DisplayMode::BatteryLevel(reading) => {
                let reading = match reading {
                    Some(level) => level.to_string(),
                    None => "…".to_string(),
                };
                text(format!("Battery level: {}", reading)).size(20).into()
            },
        }
    }
}

impl Application for MyApplication {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (MyApplication, Command<Self::Message>) {
        let app = MyApplication {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            config_io: flags.config_io,
            config: None,
            session: None,
            choices: None,
            latest_device_state: DeviceState::Idle,
            latest_reading: None,
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete");
                self.config = Some(config);
                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }
            },
            Message::SessionReady(handle) => {
                info!("Session ready (bluetooth supported: {})", handle.supports_bluetooth);
                self.session = Some(handle);
            },
            Message::DeviceEvent(DeviceEvent::StateChange(state)) => {
                self.latest_device_state = state;
                if state != DeviceState::Discovering {
                    self.choices = None;
                }
            },
            Message::DeviceEvent(DeviceEvent::Reading(reading)) => {
                self.latest_reading = reading;
            },
            Message::DeviceEvent(DeviceEvent::ChooseDevice(candidates)) => {
                self.choices = Some(candidates);
            },
            Message::DeviceEvent(DeviceEvent::Alert(message)) => {
                self.notices.push(message);
            },
            Message::ConnectPress => {
                return self.send_command(SessionCommand::Connect);
            },
            Message::DeviceChosen(choice) => {
                self.choices = None;
                return self.send_choice(choice);
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();
                return window::close(id);
            },

            _ => {}
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            event::listen().map(Message::EventOccurred),
        ];

        if let Some(config) = &self.config {
            subscriptions.push(session_subscription(self.app_cancel.clone(), config.clone()));
        }

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let content = match (&self.choices, &self.session) {
            (Some(choices), _) => self.device_chooser(choices),
            (None, Some(session)) => self.session_view(session.supports_bluetooth),
            (None, None) => text("Checking for Bluetooth…").into(),
        };

        container(
            column![
                text("Get Device Battery Info Over Bluetooth").size(24),
                content,
            ]
            .align_items(Alignment::Center)
            .spacing(30),
        )
        .width(Length::Fill)
        .padding(20)
        .into()
    }
}

pub fn run_application() -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("battery-monitor".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(480.0, 360.0);
    settings.window.resizable = false;

    // this function will call process::exit() unless there was a startup error
    MyApplication::run(settings)?;
    Ok(())
}
