use crate::session::{
    ConnectionQuality,
    ParticipantId,
    TrackHandle,
};
use chrono::{
    DateTime,
    Utc,
};

pub mod focus;
pub mod store;

pub use focus::select_focus;
pub use store::ParticipantStateStore;

/// Derived view of one session member, rebuilt wholesale on every
/// recompute. Track references are weak back-references into
/// session-owned publications.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub avatar: Option<String>,
    pub is_local: bool,
    pub is_speaking: bool,
    pub is_muted: bool,
    pub is_video_enabled: bool,
    pub is_screen_sharing: bool,
    pub has_screen_share_audio: bool,
    pub connection_quality: ConnectionQuality,
    /// The publication to render: screen share wins over camera when both
    /// exist.
    pub video_track: Option<TrackHandle>,
    pub joined_at: DateTime<Utc>,
}
