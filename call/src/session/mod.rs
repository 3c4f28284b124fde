//! Boundary to the media session collaborator.
//!
//! The transport itself (connecting, codec negotiation, simulcast) lives
//! behind [`MediaSession`]; the controller only consumes its event feed,
//! per-participant accessors and device commands. Track handles are weak
//! references into session-owned publications, the controller never owns
//! track lifetime.

use campfire_config::Resolution;
use derive_more::Display;
use std::{
    future::Future,
    sync::Arc,
};
use tokio::sync::mpsc::UnboundedReceiver;

pub mod fake;

/// Stable session identity, unique per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct ParticipantId(pub String);

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct TrackId(pub String);

/// Source discriminator of a publication, as declared by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TrackSource {
    Camera,
    ScreenShare,
    Microphone,
    ScreenShareAudio,
}

impl TrackSource {
    pub fn is_audio(&self) -> bool {
        matches!(self, TrackSource::Microphone | TrackSource::ScreenShareAudio)
    }

    pub fn is_video(&self) -> bool {
        matches!(self, TrackSource::Camera | TrackSource::ScreenShare)
    }
}

/// Ordered connection quality as reported per participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum ConnectionQuality {
    #[default]
    Unknown,
    Lost,
    Poor,
    Good,
    Excellent,
}

#[derive(Debug)]
pub struct TrackInfo {
    pub id: TrackId,
    pub participant: ParticipantId,
    pub source: TrackSource,
    pub dimensions: Option<(u32, u32)>,
}

/// Cheap clone of a session-owned publication. Two handles refer to the
/// same live publication iff [`TrackHandle::ptr_eq`] holds; equality by
/// value compares track ids only.
#[derive(Debug, Clone)]
pub struct TrackHandle(Arc<TrackInfo>);

impl TrackHandle {
    pub fn new(info: TrackInfo) -> Self {
        Self(Arc::new(info))
    }

    pub fn id(&self) -> &TrackId {
        &self.0.id
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.0.participant
    }

    pub fn source(&self) -> TrackSource {
        self.0.source
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.0.dimensions
    }

    /// Identity of the underlying publication, not just the id.
    pub fn ptr_eq(&self, other: &TrackHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for TrackHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// Raw event feed from the session collaborator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ParticipantConnected(ParticipantInfo),
    ParticipantDisconnected(ParticipantId),
    TrackSubscribed {
        participant: ParticipantId,
        track: TrackHandle,
    },
    TrackUnsubscribed {
        participant: ParticipantId,
        track: TrackHandle,
    },
    /// Echo of a local publication appearing, including ones this client
    /// caused itself.
    LocalTrackPublished(TrackHandle),
    LocalTrackUnpublished(TrackHandle),
    ConnectionQualityChanged {
        participant: ParticipantId,
        quality: ConnectionQuality,
    },
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaSessionError {
    #[error("failed to connect to the session: {0}")]
    Connect(String),
    #[error("{device} permission denied")]
    PermissionDenied { device: &'static str },
    /// The user dismissed the capture picker. An expected revert, not an
    /// error to surface.
    #[error("screen share cancelled")]
    ScreenShareCancelled,
    #[error("session command failed: {0}")]
    Command(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenShareOptions {
    /// Capture system audio alongside the screen video where supported.
    pub capture_audio: bool,
}

/// The media session collaborator.
///
/// All commands are asynchronous and may reject; callers update optimistic
/// state first and reconcile on rejection (see `controls`). Accessors are
/// point-in-time reads, the speaking flag in particular has no event stream
/// and must be polled.
pub trait MediaSession: Send + Sync + 'static {
    /// Subscribe to the raw event feed. May be called more than once, each
    /// receiver observes every event from the point of subscription.
    fn events(&self) -> UnboundedReceiver<SessionEvent>;

    fn connect(&self, endpoint: &str, token: &str) -> impl Future<Output = Result<(), MediaSessionError>> + Send;

    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    fn local_participant(&self) -> ParticipantInfo;

    fn remote_participants(&self) -> Vec<ParticipantInfo>;

    /// Publications currently live for the given participant (local one
    /// included), with their source discriminator.
    fn publications(&self, participant: &ParticipantId) -> Vec<TrackHandle>;

    /// Point-in-time audio-level flag, polled rather than evented.
    fn is_speaking(&self, participant: &ParticipantId) -> bool;

    fn connection_quality(&self, participant: &ParticipantId) -> ConnectionQuality;

    fn set_microphone_enabled(&self, enabled: bool) -> impl Future<Output = Result<(), MediaSessionError>> + Send;

    fn set_camera_enabled(
        &self,
        enabled: bool,
        resolution: Resolution,
    ) -> impl Future<Output = Result<(), MediaSessionError>> + Send;

    fn set_screen_share_enabled(
        &self,
        enabled: bool,
        options: ScreenShareOptions,
    ) -> impl Future<Output = Result<(), MediaSessionError>> + Send;

    /// Attach or detach the noise-suppression processor on the live
    /// microphone track.
    fn set_noise_filter(&self, enabled: bool) -> impl Future<Output = Result<(), MediaSessionError>> + Send;
}
