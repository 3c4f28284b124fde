use crate::{
    controls::DeviceIntent,
    participant::Participant,
    session::ParticipantId,
};
use derive_more::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

/// User-visible errors. Everything else is resolved locally and logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// Fatal to the session; the user has to re-trigger the connect.
    #[error("failed to join voice: {0}")]
    Connect(String),
    /// Local-control-specific, the rest of the session is unaffected.
    #[error("{device} access denied")]
    Permission { device: &'static str },
}

/// Snapshot of the derived call model, published through the watch
/// channel on every worker iteration.
#[derive(Debug, Clone, Default)]
pub struct CallState {
    pub connection: ConnectionState,
    pub participants: Vec<Participant>,
    /// The participant occupying the stage, if any.
    pub focused: Option<ParticipantId>,
    pub intent: DeviceIntent,
    pub error: Option<CallError>,
}

impl CallState {
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn local_participant(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_local)
    }
}
