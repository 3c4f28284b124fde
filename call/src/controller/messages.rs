use crate::session::ParticipantId;
use campfire_config::Resolution;
use derive_more::Display;

/// Commands accepted by the call worker. All of them are fire-and-forget;
/// results surface through the state watch channel.
#[derive(Clone, Debug, Display)]
pub enum CallCommand {
    ToggleMute,
    ToggleDeafen,
    ToggleVideo,
    ToggleScreenShare,
    ChangeResolution(Resolution),
    ToggleNoiseSuppression,
    SetOutputVolume(u8),
    FocusParticipant(ParticipantId),
    /// The user interacted with the page, blocked playback may retry.
    UserInteraction,
    DismissError,
    Disconnect,
}
