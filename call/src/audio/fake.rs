//! Recording audio output backend for the harness and tests.

use super::{
    AudioOutputHandle,
    AudioOutputs,
    PlaybackError,
};
use crate::session::{
    TrackHandle,
    TrackId,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

#[derive(Debug, Default)]
struct ElementState {
    playing: bool,
    muted: bool,
    volume: u8,
}

#[derive(Debug, Default)]
struct Shared {
    block_autoplay: bool,
    elements: HashMap<TrackId, ElementState>,
}

/// Output factory whose bound "elements" can be inspected after the
/// router has consumed it.
#[derive(Clone, Debug, Default)]
pub struct FakeAudioOutputs {
    shared: Arc<Mutex<Shared>>,
}

impl FakeAudioOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the browser autoplay policy for subsequent `play` calls.
    pub fn block_autoplay(&self, blocked: bool) {
        self.shared.lock().unwrap().block_autoplay = blocked;
    }

    pub fn bound_count(&self) -> usize {
        self.shared.lock().unwrap().elements.len()
    }

    pub fn is_playing(&self, track: &TrackId) -> bool {
        self.shared
            .lock()
            .unwrap()
            .elements
            .get(track)
            .is_some_and(|e| e.playing)
    }

    pub fn is_muted(&self, track: &TrackId) -> bool {
        self.shared
            .lock()
            .unwrap()
            .elements
            .get(track)
            .is_some_and(|e| e.muted)
    }

    pub fn volume_of(&self, track: &TrackId) -> Option<u8> {
        self.shared.lock().unwrap().elements.get(track).map(|e| e.volume)
    }
}

impl AudioOutputs for FakeAudioOutputs {
    type Handle = FakeAudioHandle;

    fn bind(&mut self, track: &TrackHandle) -> Self::Handle {
        self.shared
            .lock()
            .unwrap()
            .elements
            .insert(track.id().clone(), ElementState::default());
        FakeAudioHandle {
            shared: self.shared.clone(),
            track: track.id().clone(),
        }
    }
}

pub struct FakeAudioHandle {
    shared: Arc<Mutex<Shared>>,
    track: TrackId,
}

impl AudioOutputHandle for FakeAudioHandle {
    fn play(&mut self) -> Result<(), PlaybackError> {
        let mut shared = self.shared.lock().unwrap();
        if shared.block_autoplay {
            return Err(PlaybackError::AutoplayBlocked);
        }
        if let Some(element) = shared.elements.get_mut(&self.track) {
            element.playing = true;
        }
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        if let Some(element) = self.shared.lock().unwrap().elements.get_mut(&self.track) {
            element.muted = muted;
        }
    }

    fn set_volume(&mut self, volume: u8) {
        if let Some(element) = self.shared.lock().unwrap().elements.get_mut(&self.track) {
            element.volume = volume;
        }
    }

    fn unbind(&mut self) {
        self.shared.lock().unwrap().elements.remove(&self.track);
    }
}
