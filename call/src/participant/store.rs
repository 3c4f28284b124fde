//! Normalized view of who is in the session and what they publish.

use super::Participant;
use crate::{
    controls::DeviceIntent,
    session::{
        MediaSession,
        ParticipantId,
        TrackSource,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use std::collections::{
    HashMap,
    HashSet,
};

/// Rebuilds the participant list from the session's live publication
/// state. `recompute` is idempotent and side-effect-free, it only derives
/// a fresh array; all side effects (playback handles etc.) live in the
/// audio router.
#[derive(Debug, Default)]
pub struct ParticipantStateStore {
    participants: Vec<Participant>,
    first_seen: HashMap<ParticipantId, DateTime<Utc>>,
}

impl ParticipantStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.get(id).is_some()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
        self.first_seen.clear();
    }

    /// Walk the session's local and remote participants and rebuild the
    /// list wholesale. No filtering: members with zero publications still
    /// appear. Local flags come from device intent, the source of truth
    /// for what the local tile displays.
    pub fn recompute<S: MediaSession>(&mut self, session: &S, intent: &DeviceIntent) {
        let now = Utc::now();
        let local = session.local_participant();
        let remotes = session.remote_participants();

        let mut live = HashSet::with_capacity(remotes.len() + 1);
        live.insert(local.id.clone());
        for info in &remotes {
            live.insert(info.id.clone());
        }
        self.first_seen.retain(|id, _| live.contains(id));

        let mut next = Vec::with_capacity(remotes.len() + 1);
        for (info, is_local) in std::iter::once((local, true)).chain(remotes.into_iter().map(|r| (r, false))) {
            let joined_at = *self.first_seen.entry(info.id.clone()).or_insert(now);
            let publications = session.publications(&info.id);

            let camera = publications.iter().find(|t| t.source() == TrackSource::Camera);
            let screen = publications.iter().find(|t| t.source() == TrackSource::ScreenShare);
            let microphone = publications.iter().find(|t| t.source() == TrackSource::Microphone);
            let share_audio = publications.iter().any(|t| t.source() == TrackSource::ScreenShareAudio);

            next.push(Participant {
                is_speaking: session.is_speaking(&info.id),
                is_muted: if is_local { intent.muted } else { microphone.is_none() },
                is_video_enabled: if is_local { intent.video_enabled } else { camera.is_some() },
                is_screen_sharing: if is_local { intent.screen_sharing } else { screen.is_some() },
                has_screen_share_audio: share_audio,
                connection_quality: session.connection_quality(&info.id),
                video_track: screen.or(camera).cloned(),
                joined_at,
                id: info.id,
                display_name: info.display_name,
                avatar: info.avatar,
                is_local,
            });
        }

        // Stable display order: by join time, local participant winning
        // ties from the initial recompute.
        next.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then(b.is_local.cmp(&a.is_local))
                .then(a.id.0.cmp(&b.id.0))
        });

        self.participants = next;
    }
}
