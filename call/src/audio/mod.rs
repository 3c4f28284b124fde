//! Playback routing for remote audio publications.
//!
//! One playback handle per subscribed audio publication, created on
//! subscribe and destroyed on unsubscribe. Microphone audio and
//! screen-share audio are classified apart: share audio is a broadcast
//! (game/video/music for the whole channel), it is never gated by who is
//! watching the stream visually, only deafening silences it. Output
//! elements live behind [`AudioOutputs`], an explicit bind/unbind seam
//! independent of any UI framework lifecycle.

use crate::session::{
    TrackHandle,
    TrackId,
    TrackSource,
};
use std::collections::HashMap;

pub mod fake;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSourceKind {
    Microphone,
    ScreenShareAudio,
}

impl AudioSourceKind {
    pub fn classify(source: TrackSource) -> Option<Self> {
        match source {
            TrackSource::Microphone => Some(AudioSourceKind::Microphone),
            TrackSource::ScreenShareAudio => Some(AudioSourceKind::ScreenShareAudio),
            TrackSource::Camera | TrackSource::ScreenShare => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The output backend refused to start unattended playback. Expected
    /// and non-fatal, playback is retried on the next user interaction.
    #[error("autoplay blocked by the output backend")]
    AutoplayBlocked,
    #[error("audio backend failure: {0}")]
    Backend(String),
}

/// A single bound playback element.
pub trait AudioOutputHandle: Send + 'static {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn set_muted(&mut self, muted: bool);
    fn set_volume(&mut self, volume: u8);
    fn unbind(&mut self);
}

/// Factory binding session tracks to playback elements.
pub trait AudioOutputs: Send + 'static {
    type Handle: AudioOutputHandle;

    fn bind(&mut self, track: &TrackHandle) -> Self::Handle;
}

struct Playback<H> {
    track: TrackHandle,
    source: AudioSourceKind,
    handle: H,
    awaiting_interaction: bool,
}

pub struct AudioRouter<O: AudioOutputs> {
    outputs: O,
    playbacks: HashMap<TrackId, Playback<O::Handle>>,
    deafened: bool,
    volume: u8,
}

impl<O: AudioOutputs> AudioRouter<O> {
    pub fn new(outputs: O, volume: u8) -> Self {
        Self {
            outputs,
            playbacks: HashMap::new(),
            deafened: false,
            volume: volume.min(100),
        }
    }

    /// Bind and autoplay a handle for a newly subscribed audio publication.
    /// Non-audio sources are ignored.
    pub fn on_track_subscribed(&mut self, track: &TrackHandle) {
        let Some(source) = AudioSourceKind::classify(track.source()) else {
            return;
        };
        if self.playbacks.contains_key(track.id()) {
            debug!(track = %track.id(), "Already routing this publication");
            return;
        }

        let mut handle = self.outputs.bind(track);
        handle.set_volume(self.volume);
        handle.set_muted(self.deafened);

        let awaiting_interaction = match handle.play() {
            Ok(()) => false,
            Err(PlaybackError::AutoplayBlocked) => {
                debug!(track = %track.id(), "Autoplay blocked, retrying on next interaction");
                true
            }
            Err(err) => {
                warn!(track = %track.id(), "Failed to start playback: {err}");
                false
            }
        };

        self.playbacks.insert(
            track.id().clone(),
            Playback {
                track: track.clone(),
                source,
                handle,
                awaiting_interaction,
            },
        );
    }

    /// Unbind and drop the handle for a publication that ended.
    pub fn on_track_unsubscribed(&mut self, track: &TrackHandle) {
        if let Some(mut playback) = self.playbacks.remove(track.id()) {
            playback.handle.unbind();
            debug!(track = %track.id(), "Dropped playback handle");
        }
    }

    /// A click or keypress happened somewhere in the document; retry every
    /// handle that was blocked on autoplay. One retry per handle, then the
    /// listener is dropped regardless of the outcome.
    pub fn notify_user_interaction(&mut self) {
        for playback in self.playbacks.values_mut() {
            if !playback.awaiting_interaction {
                continue;
            }
            playback.awaiting_interaction = false;
            if let Err(err) = playback.handle.play() {
                warn!(track = %playback.track.id(), "Playback retry failed: {err}");
            }
        }
    }

    /// Applied to every live handle immediately; handles bound later honor
    /// the latest value as well.
    pub fn set_output_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        for playback in self.playbacks.values_mut() {
            playback.handle.set_volume(self.volume);
        }
    }

    /// Mutes or unmutes every live handle in one pass. Handles are kept so
    /// un-deafening resumes all streams without renegotiation.
    pub fn set_deafened(&mut self, deafened: bool) {
        self.deafened = deafened;
        for playback in self.playbacks.values_mut() {
            playback.handle.set_muted(deafened);
        }
    }

    /// Session ended, unbind everything.
    pub fn clear(&mut self) {
        for (_, mut playback) in self.playbacks.drain() {
            playback.handle.unbind();
        }
    }

    pub fn live_count(&self) -> usize {
        self.playbacks.len()
    }

    pub fn is_routing(&self, track: &TrackHandle) -> bool {
        self.playbacks.contains_key(track.id())
    }

    pub fn source_of(&self, track: &TrackHandle) -> Option<AudioSourceKind> {
        self.playbacks.get(track.id()).map(|p| p.source)
    }
}
