use std::io;
use thiserror::Error;
use msgbox::IconType;
use std::fmt::Display;
use std::str::Utf8Error;
use btleplug;
use iced;
use serde_json;
use uuid::Uuid;

use crate::device::types::DeviceState;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (iced): {source}")]
    Iced { #[from] source: iced::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (io): {source}")]
    Io { #[from] source: io::Error },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("No device advertising the battery service was found")]
    NoMatchingDevice,

    #[error("The device chooser was cancelled")]
    ChooserCancelled,

    #[error("The device does not provide the service {0}")]
    MissingService(Uuid),

    #[error("The device does not provide the characteristic {0}")]
    MissingCharacteristic(Uuid),

    #[error("The characteristic value is empty")]
    EmptyValue,
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Bluetooth is not available on this system")]
    CapabilityUnavailable,

    #[error("A connection attempt is already in progress (state {0})")]
    Busy(DeviceState),

    #[error("Device selection was cancelled")]
    DiscoveryCancelled,

    #[error("Failed to discover a device: {source}")]
    DiscoveryFailed { source: DeviceError },

    #[error("Failed to connect to the device: {source}")]
    ConnectionFailed { source: DeviceError },

    #[error("Failed to resolve the battery level characteristic: {source}")]
    ResolutionFailed { source: DeviceError },

    #[error("Failed to subscribe to battery level notifications: {source}")]
    SubscriptionFailed { source: DeviceError },

    #[error("The device disconnected while the connection was being set up")]
    RemoteDisconnected,
}

impl ConnectError {
    pub fn discovery(source: DeviceError) -> Self {
        match source {
            DeviceError::ChooserCancelled => ConnectError::DiscoveryCancelled,
            source => ConnectError::DiscoveryFailed { source },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot start a new session while in state {0}")]
    Busy(DeviceState),

    #[error("Event {event} is not valid in state {state}")]
    Unexpected { state: DeviceState, event: &'static str },
}

pub fn error_msgbox<T: Display>(message: &'static str, error: &T) {
    let message = format!("{}: {}", message, error);
    eprintln!("{}", &message);
    if let Err(err) = msgbox::create(concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")), &message, IconType::Error) {
        eprintln!("Failed to create msgbox: {:?}", err);
    }
}
