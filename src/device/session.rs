use crate::device::types::{BatteryLevel, DeviceCandidate, DeviceState};
use crate::error::TransitionError;

// C is the characteristic handle of the platform in use
#[derive(Debug)]
pub enum SessionState<C> {
    Idle,
    Discovering,
    Connecting { device: DeviceCandidate },
    Resolving { device: DeviceCandidate },
    Subscribed { device: DeviceCandidate, characteristic: C },
    Disconnected,
    Failed,
}

impl<C> SessionState<C> {
    pub fn phase(&self) -> DeviceState {
        match self {
            SessionState::Idle => DeviceState::Idle,
            SessionState::Discovering => DeviceState::Discovering,
            SessionState::Connecting { .. } => DeviceState::Connecting,
            SessionState::Resolving { .. } => DeviceState::Resolving,
            SessionState::Subscribed { .. } => DeviceState::Subscribed,
            SessionState::Disconnected => DeviceState::Disconnected,
            SessionState::Failed => DeviceState::Failed,
        }
    }
}

#[derive(Debug)]
pub enum SessionEvent<C> {
    ConnectRequested,
    DeviceSelected(DeviceCandidate),
    TransportEstablished,
    Subscribed { characteristic: C, initial: BatteryLevel },
    ValueChanged(BatteryLevel),
    StepFailed,
    RemoteDisconnected,
}

impl<C> SessionEvent<C> {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::ConnectRequested => "ConnectRequested",
            SessionEvent::DeviceSelected(_) => "DeviceSelected",
            SessionEvent::TransportEstablished => "TransportEstablished",
            SessionEvent::Subscribed { .. } => "Subscribed",
            SessionEvent::ValueChanged(_) => "ValueChanged",
            SessionEvent::StepFailed => "StepFailed",
            SessionEvent::RemoteDisconnected => "RemoteDisconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    StateChanged,
    ReadingChanged,
    // the remote device dropped the session; the user should be told
    Disconnected { device: DeviceCandidate },
    // the event does not apply to the current state (e.g. a late notification)
    Ignored,
}

#[derive(Debug)]
pub struct DeviceSession<C> {
    state: SessionState<C>,
    reading: Option<BatteryLevel>,
}

impl<C> Default for DeviceSession<C> {
    fn default() -> Self {
        DeviceSession {
            state: SessionState::Idle,
            reading: None,
        }
    }
}

impl<C> DeviceSession<C> {
    pub fn state(&self) -> DeviceState {
        self.state.phase()
    }

    pub fn reading(&self) -> Option<BatteryLevel> {
        self.reading
    }

    pub fn device(&self) -> Option<&DeviceCandidate> {
        match &self.state {
            SessionState::Connecting { device }
            | SessionState::Resolving { device }
            | SessionState::Subscribed { device, .. } => Some(device),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn subscription(&self) -> Option<&C> {
        match &self.state {
            SessionState::Subscribed { characteristic, .. } => Some(characteristic),
            _ => None,
        }
    }

    // a rejected event leaves the session untouched
    pub fn apply(&mut self, event: SessionEvent<C>) -> Result<Outcome, TransitionError> {
        let (session, result) = transition(std::mem::take(self), event);
        *self = session;
        result
    }
}

fn with_state<C>(state: SessionState<C>, reading: Option<BatteryLevel>) -> DeviceSession<C> {
    DeviceSession { state, reading }
}

pub fn transition<C>(session: DeviceSession<C>, event: SessionEvent<C>) -> (DeviceSession<C>, Result<Outcome, TransitionError>) {
    let DeviceSession { state, reading } = session;

    match (state, event) {
        // a fresh session never inherits the reading of the previous one
        (SessionState::Idle | SessionState::Failed | SessionState::Disconnected, SessionEvent::ConnectRequested) => {
            (with_state(SessionState::Discovering, None), Ok(Outcome::StateChanged))
        },
        (state, SessionEvent::ConnectRequested) => {
            let phase = state.phase();
            (with_state(state, reading), Err(TransitionError::Busy(phase)))
        },

        (SessionState::Discovering, SessionEvent::DeviceSelected(device)) => {
            (with_state(SessionState::Connecting { device }, None), Ok(Outcome::StateChanged))
        },
        (SessionState::Connecting { device }, SessionEvent::TransportEstablished) => {
            (with_state(SessionState::Resolving { device }, None), Ok(Outcome::StateChanged))
        },
        (SessionState::Resolving { device }, SessionEvent::Subscribed { characteristic, initial }) => {
            (with_state(SessionState::Subscribed { device, characteristic }, Some(initial)), Ok(Outcome::StateChanged))
        },

        (SessionState::Subscribed { device, characteristic }, SessionEvent::ValueChanged(level)) => {
            let outcome = if reading == Some(level) { Outcome::Ignored } else { Outcome::ReadingChanged };
            (with_state(SessionState::Subscribed { device, characteristic }, Some(level)), Ok(outcome))
        },
        (state, SessionEvent::ValueChanged(_)) => {
            (with_state(state, reading), Ok(Outcome::Ignored))
        },

        (SessionState::Discovering | SessionState::Connecting { .. } | SessionState::Resolving { .. }, SessionEvent::StepFailed) => {
            (with_state(SessionState::Failed, None), Ok(Outcome::StateChanged))
        },

        // the disconnection observer exists from the Resolving state onwards
        (SessionState::Resolving { device } | SessionState::Subscribed { device, .. }, SessionEvent::RemoteDisconnected) => {
            (with_state(SessionState::Disconnected, None), Ok(Outcome::Disconnected { device }))
        },
        (state, SessionEvent::RemoteDisconnected) => {
            (with_state(state, reading), Ok(Outcome::Ignored))
        },

        (state, event) => {
            let error = TransitionError::Unexpected { state: state.phase(), event: event.name() };
            (with_state(state, reading), Err(error))
        },
    }
}
