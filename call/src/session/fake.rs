//! In-memory media session used by the simulation harness and the tests.
//!
//! Fully scriptable: remote joins/leaves, publication churn, speaking and
//! quality flips, plus injectable command failures and a configurable
//! command delay to exercise in-flight races.

use super::{
    ConnectionQuality,
    MediaSession,
    MediaSessionError,
    ParticipantId,
    ParticipantInfo,
    ScreenShareOptions,
    SessionEvent,
    TrackHandle,
    TrackId,
    TrackInfo,
    TrackSource,
};
use crate::presence::{
    PresenceChannel,
    PresenceDescriptor,
};
use campfire_config::Resolution;
use std::{
    future::Future,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc::{
    unbounded_channel,
    UnboundedReceiver,
    UnboundedSender,
};

#[derive(Clone)]
pub struct FakeMediaSession {
    inner: Arc<Mutex<Inner>>,
}

struct RemoteEntry {
    info: ParticipantInfo,
    speaking: bool,
    quality: ConnectionQuality,
    tracks: Vec<TrackHandle>,
}

struct Inner {
    local: ParticipantInfo,
    local_speaking: bool,
    local_quality: ConnectionQuality,
    connected: bool,
    local_tracks: Vec<TrackHandle>,
    remotes: Vec<RemoteEntry>,
    noise_filter: bool,
    subscribers: Vec<UnboundedSender<SessionEvent>>,
    next_track: u64,
    command_delay: Duration,
    fail_connect: bool,
    next_microphone_error: Option<MediaSessionError>,
    next_camera_error: Option<MediaSessionError>,
    next_screen_share_error: Option<MediaSessionError>,
    next_noise_filter_error: Option<MediaSessionError>,
}

impl Inner {
    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn mint_track(&mut self, participant: ParticipantId, source: TrackSource, dimensions: Option<(u32, u32)>) -> TrackHandle {
        self.next_track += 1;
        TrackHandle::new(TrackInfo {
            id: TrackId(format!("TR_{}", self.next_track)),
            participant,
            source,
            dimensions,
        })
    }

    fn publish_local(&mut self, source: TrackSource, dimensions: Option<(u32, u32)>) -> TrackHandle {
        let track = self.mint_track(self.local.id.clone(), source, dimensions);
        self.local_tracks.push(track.clone());
        self.emit(SessionEvent::LocalTrackPublished(track.clone()));
        track
    }

    fn unpublish_local(&mut self, source: TrackSource) {
        let removed: Vec<_> = self
            .local_tracks
            .iter()
            .filter(|t| t.source() == source)
            .cloned()
            .collect();
        self.local_tracks.retain(|t| t.source() != source);
        for track in removed {
            self.emit(SessionEvent::LocalTrackUnpublished(track));
        }
    }

    fn has_local(&self, source: TrackSource) -> bool {
        self.local_tracks.iter().any(|t| t.source() == source)
    }

    fn remote_mut(&mut self, id: &ParticipantId) -> Option<&mut RemoteEntry> {
        self.remotes.iter_mut().find(|r| &r.info.id == id)
    }
}

impl FakeMediaSession {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                local: ParticipantInfo {
                    id: ParticipantId(id.into()),
                    display_name: display_name.into(),
                    avatar: None,
                },
                local_speaking: false,
                local_quality: ConnectionQuality::Excellent,
                connected: false,
                local_tracks: Vec::new(),
                remotes: Vec::new(),
                noise_filter: false,
                subscribers: Vec::new(),
                next_track: 0,
                command_delay: Duration::ZERO,
                fail_connect: false,
                next_microphone_error: None,
                next_camera_error: None,
                next_screen_share_error: None,
                next_noise_filter_error: None,
            })),
        }
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
    // Scripting surface for the harness and tests.

    pub fn join_remote(&self, id: &str, display_name: &str) -> ParticipantId {
        let mut inner = self.inner.lock().unwrap();
        let info = ParticipantInfo {
            id: ParticipantId(id.to_string()),
            display_name: display_name.to_string(),
            avatar: None,
        };
        inner.remotes.push(RemoteEntry {
            info: info.clone(),
            speaking: false,
            quality: ConnectionQuality::Unknown,
            tracks: Vec::new(),
        });
        inner.emit(SessionEvent::ParticipantConnected(info.clone()));
        info.id
    }

    pub fn leave_remote(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        let id = ParticipantId(id.to_string());
        let Some(index) = inner.remotes.iter().position(|r| r.info.id == id) else {
            return;
        };
        let entry = inner.remotes.remove(index);
        for track in entry.tracks {
            inner.emit(SessionEvent::TrackUnsubscribed {
                participant: id.clone(),
                track,
            });
        }
        inner.emit(SessionEvent::ParticipantDisconnected(id));
    }

    pub fn publish_remote(&self, id: &str, source: TrackSource) -> Option<TrackHandle> {
        let mut inner = self.inner.lock().unwrap();
        let participant = ParticipantId(id.to_string());
        let track = inner.mint_track(participant.clone(), source, None);
        let entry = inner.remote_mut(&participant)?;
        entry.tracks.push(track.clone());
        inner.emit(SessionEvent::TrackSubscribed {
            participant,
            track: track.clone(),
        });
        Some(track)
    }

    pub fn unpublish_remote(&self, track: &TrackHandle) {
        let mut inner = self.inner.lock().unwrap();
        let participant = track.participant().clone();
        if let Some(entry) = inner.remote_mut(&participant) {
            entry.tracks.retain(|t| !t.ptr_eq(track));
        }
        inner.emit(SessionEvent::TrackUnsubscribed {
            participant,
            track: track.clone(),
        });
    }

    pub fn set_speaking(&self, id: &str, speaking: bool) {
        // Point-in-time flag only, surfaced by the controller's poll.
        let mut inner = self.inner.lock().unwrap();
        let id = ParticipantId(id.to_string());
        if inner.local.id == id {
            inner.local_speaking = speaking;
        } else if let Some(entry) = inner.remote_mut(&id) {
            entry.speaking = speaking;
        }
    }

    pub fn set_quality(&self, id: &str, quality: ConnectionQuality) {
        let mut inner = self.inner.lock().unwrap();
        let id = ParticipantId(id.to_string());
        if inner.local.id == id {
            inner.local_quality = quality;
        } else if let Some(entry) = inner.remote_mut(&id) {
            entry.quality = quality;
        }
        inner.emit(SessionEvent::ConnectionQualityChanged {
            participant: id,
            quality,
        });
    }

    pub fn set_command_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().command_delay = delay;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.inner.lock().unwrap().fail_connect = fail;
    }

    pub fn fail_next_microphone(&self, error: MediaSessionError) {
        self.inner.lock().unwrap().next_microphone_error = Some(error);
    }

    pub fn fail_next_camera(&self, error: MediaSessionError) {
        self.inner.lock().unwrap().next_camera_error = Some(error);
    }

    pub fn fail_next_screen_share(&self, error: MediaSessionError) {
        self.inner.lock().unwrap().next_screen_share_error = Some(error);
    }

    pub fn fail_next_noise_filter(&self, error: MediaSessionError) {
        self.inner.lock().unwrap().next_noise_filter_error = Some(error);
    }

    pub fn local_publications(&self) -> Vec<TrackHandle> {
        self.inner.lock().unwrap().local_tracks.clone()
    }

    pub fn noise_filter_enabled(&self) -> bool {
        self.inner.lock().unwrap().noise_filter
    }

    async fn command_gate(&self) {
        let delay = self.inner.lock().unwrap().command_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl MediaSession for FakeMediaSession {
    fn events(&self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = unbounded_channel();
        self.inner.lock().unwrap().subscribers.push(tx);
        rx
    }

    fn connect(&self, _endpoint: &str, _token: &str) -> impl Future<Output = Result<(), MediaSessionError>> + Send {
        let this = self.clone();
        async move {
            this.command_gate().await;
            let mut inner = this.inner.lock().unwrap();
            if inner.fail_connect {
                return Err(MediaSessionError::Connect("token rejected".to_string()));
            }
            inner.connected = true;
            // Connecting implies an audio capability, the microphone
            // publication comes up with the session.
            if !inner.has_local(TrackSource::Microphone) {
                inner.publish_local(TrackSource::Microphone, None);
            }
            Ok(())
        }
    }

    fn disconnect(&self) -> impl Future<Output = ()> + Send {
        let this = self.clone();
        async move {
            let mut inner = this.inner.lock().unwrap();
            inner.connected = false;
            inner.local_tracks.clear();
            inner.emit(SessionEvent::Disconnected);
        }
    }

    fn local_participant(&self) -> ParticipantInfo {
        self.inner.lock().unwrap().local.clone()
    }

    fn remote_participants(&self) -> Vec<ParticipantInfo> {
        self.inner.lock().unwrap().remotes.iter().map(|r| r.info.clone()).collect()
    }

    fn publications(&self, participant: &ParticipantId) -> Vec<TrackHandle> {
        let inner = self.inner.lock().unwrap();
        if &inner.local.id == participant {
            return inner.local_tracks.clone();
        }
        inner
            .remotes
            .iter()
            .find(|r| &r.info.id == participant)
            .map(|r| r.tracks.clone())
            .unwrap_or_default()
    }

    fn is_speaking(&self, participant: &ParticipantId) -> bool {
        let inner = self.inner.lock().unwrap();
        if &inner.local.id == participant {
            return inner.local_speaking;
        }
        inner
            .remotes
            .iter()
            .find(|r| &r.info.id == participant)
            .is_some_and(|r| r.speaking)
    }

    fn connection_quality(&self, participant: &ParticipantId) -> ConnectionQuality {
        let inner = self.inner.lock().unwrap();
        if &inner.local.id == participant {
            return inner.local_quality;
        }
        inner
            .remotes
            .iter()
            .find(|r| &r.info.id == participant)
            .map(|r| r.quality)
            .unwrap_or_default()
    }

    fn set_microphone_enabled(&self, enabled: bool) -> impl Future<Output = Result<(), MediaSessionError>> + Send {
        let this = self.clone();
        async move {
            this.command_gate().await;
            let mut inner = this.inner.lock().unwrap();
            if let Some(err) = inner.next_microphone_error.take() {
                return Err(err);
            }
            if enabled && !inner.has_local(TrackSource::Microphone) {
                inner.publish_local(TrackSource::Microphone, None);
            } else if !enabled {
                inner.unpublish_local(TrackSource::Microphone);
            }
            Ok(())
        }
    }

    fn set_camera_enabled(
        &self,
        enabled: bool,
        resolution: Resolution,
    ) -> impl Future<Output = Result<(), MediaSessionError>> + Send {
        let this = self.clone();
        async move {
            this.command_gate().await;
            let mut inner = this.inner.lock().unwrap();
            if let Some(err) = inner.next_camera_error.take() {
                return Err(err);
            }
            if enabled {
                // Re-enabling replaces the camera publication wholesale.
                inner.unpublish_local(TrackSource::Camera);
                inner.publish_local(TrackSource::Camera, Some(resolution.dimensions()));
            } else {
                inner.unpublish_local(TrackSource::Camera);
            }
            Ok(())
        }
    }

    fn set_screen_share_enabled(
        &self,
        enabled: bool,
        options: ScreenShareOptions,
    ) -> impl Future<Output = Result<(), MediaSessionError>> + Send {
        let this = self.clone();
        async move {
            this.command_gate().await;
            let mut inner = this.inner.lock().unwrap();
            if let Some(err) = inner.next_screen_share_error.take() {
                return Err(err);
            }
            if enabled {
                inner.publish_local(TrackSource::ScreenShare, None);
                if options.capture_audio {
                    inner.publish_local(TrackSource::ScreenShareAudio, None);
                }
            } else {
                // One operation from the caller's perspective, video and
                // share audio go down together.
                inner.unpublish_local(TrackSource::ScreenShare);
                inner.unpublish_local(TrackSource::ScreenShareAudio);
            }
            Ok(())
        }
    }

    fn set_noise_filter(&self, enabled: bool) -> impl Future<Output = Result<(), MediaSessionError>> + Send {
        let this = self.clone();
        async move {
            this.command_gate().await;
            let mut inner = this.inner.lock().unwrap();
            if let Some(err) = inner.next_noise_filter_error.take() {
                return Err(err);
            }
            inner.noise_filter = enabled;
            Ok(())
        }
    }
}

/// Presence collaborator double that records channel membership.
#[derive(Clone, Default)]
pub struct FakePresence {
    entries: Arc<Mutex<Vec<(String, PresenceDescriptor)>>>,
}

impl FakePresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self, channel: &str) -> Vec<PresenceDescriptor> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

impl PresenceChannel for FakePresence {
    fn enter(&self, channel: &str, descriptor: PresenceDescriptor) -> impl Future<Output = eyre::Result<()>> + Send {
        let entries = self.entries.clone();
        let channel = channel.to_string();
        async move {
            entries.lock().unwrap().push((channel, descriptor));
            Ok(())
        }
    }

    fn leave(&self, channel: &str, participant: &ParticipantId) -> impl Future<Output = ()> + Send {
        let entries = self.entries.clone();
        let channel = channel.to_string();
        let participant = participant.clone();
        async move {
            entries
                .lock()
                .unwrap()
                .retain(|(c, d)| !(c == &channel && d.id == participant));
        }
    }
}
