use std::fmt;
use uuid::Uuid;

use crate::device::constants::BATTERY_SERVICE;
use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Discovering,
    Connecting,
    // transport session established, looking up the battery service
    Resolving,
    Subscribed,
    Disconnected,
    Failed,
}

impl DeviceState {
    pub fn accepts_connect(&self) -> bool {
        matches!(self, DeviceState::Idle | DeviceState::Failed | DeviceState::Disconnected)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            DeviceState::Idle => "Idle",
            DeviceState::Discovering => "Discovering",
            DeviceState::Connecting => "Connecting",
            DeviceState::Resolving => "Resolving",
            DeviceState::Subscribed => "Subscribed",
            DeviceState::Disconnected => "Disconnected",
            DeviceState::Failed => "Failed",
        };

        write!(f, "{}", result)
    }
}

// nominally [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryLevel(pub u8);

impl BatteryLevel {
    // the device is trusted, values above 100 are passed through as is
    pub fn decode(value: &[u8]) -> Result<BatteryLevel, DeviceError> {
        match value.first() {
            Some(byte) => Ok(BatteryLevel(*byte)),
            None => Err(DeviceError::EmptyValue),
        }
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub name: String,
    pub address: String,
}

impl fmt::Display for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub services: Vec<Uuid>,
}

impl DeviceFilter {
    pub fn battery() -> Self {
        DeviceFilter {
            services: vec![BATTERY_SERVICE],
        }
    }

    pub fn matches(&self, advertised: &[Uuid]) -> bool {
        self.services.iter().all(|uuid| advertised.contains(uuid))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    StateChange(DeviceState),
    Reading(Option<BatteryLevel>),
    // the device chooser wants the user to pick one of these
    ChooseDevice(Vec<DeviceCandidate>),
    Alert(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Connect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub supports_bluetooth: bool,
    pub state: DeviceState,
    pub reading: Option<BatteryLevel>,
}

impl SessionSnapshot {
    pub fn display_mode(&self) -> DisplayMode {
        DisplayMode::derive(self.supports_bluetooth, self.state, self.reading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Unsupported,
    ConnectButton,
    BatteryLevel(Option<BatteryLevel>),
}

impl DisplayMode {
    pub fn derive(supports_bluetooth: bool, state: DeviceState, reading: Option<BatteryLevel>) -> DisplayMode {
        if !supports_bluetooth {
            return DisplayMode::Unsupported;
        }

        match state {
            DeviceState::Idle
            | DeviceState::Discovering
            | DeviceState::Failed
            | DeviceState::Disconnected => DisplayMode::ConnectButton,
            DeviceState::Connecting
            | DeviceState::Resolving
            | DeviceState::Subscribed => DisplayMode::BatteryLevel(reading),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::constants::BATTERY_LEVEL_CHARACTERISTIC;

    const ALL_STATES: [DeviceState; 7] = [
        DeviceState::Idle,
        DeviceState::Discovering,
        DeviceState::Connecting,
        DeviceState::Resolving,
        DeviceState::Subscribed,
        DeviceState::Disconnected,
        DeviceState::Failed,
    ];

    #[test]
    fn decode_uses_first_byte() {
        assert_eq!(BatteryLevel::decode(&[87]).unwrap(), BatteryLevel(87));
        assert_eq!(BatteryLevel::decode(&[42, 0, 13]).unwrap(), BatteryLevel(42));
    }

    #[test]
    fn decode_passes_out_of_range_values_through() {
        assert_eq!(BatteryLevel::decode(&[255]).unwrap(), BatteryLevel(255));
    }

    #[test]
    fn decode_rejects_empty_value() {
        assert!(matches!(BatteryLevel::decode(&[]), Err(DeviceError::EmptyValue)));
    }

    #[test]
    fn battery_level_is_shown_as_percentage() {
        assert_eq!(BatteryLevel(87).to_string(), "87%");
    }

    #[test]
    fn unsupported_wins_over_every_state() {
        for state in ALL_STATES {
            assert_eq!(DisplayMode::derive(false, state, Some(BatteryLevel(50))), DisplayMode::Unsupported);
        }
    }

    #[test]
    fn connect_button_only_when_a_session_can_start() {
        for state in ALL_STATES {
            let mode = DisplayMode::derive(true, state, None);
            assert_eq!(mode == DisplayMode::ConnectButton, state.accepts_connect() || state == DeviceState::Discovering);
        }
    }

    #[test]
    fn subscribed_shows_reading() {
        let snapshot = SessionSnapshot {
            supports_bluetooth: true,
            state: DeviceState::Subscribed,
            reading: Some(BatteryLevel(87)),
        };
        assert_eq!(snapshot.display_mode(), DisplayMode::BatteryLevel(Some(BatteryLevel(87))));
    }

    #[test]
    fn battery_filter_requires_battery_service() {
        let filter = DeviceFilter::battery();
        assert!(filter.matches(&[BATTERY_LEVEL_CHARACTERISTIC, BATTERY_SERVICE]));
        assert!(!filter.matches(&[BATTERY_LEVEL_CHARACTERISTIC]));
        assert!(!filter.matches(&[]));
    }
}
