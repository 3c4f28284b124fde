//! Local device intent and the optimistic command state machine.
//!
//! Intent is the source of truth for the local participant's displayed
//! flags. Every control follows the same pattern: flip the intent
//! immediately so the UI responds without latency, issue the session
//! command on a spawned task, and reconcile when its outcome arrives.
//! Rejections are matched against the *current* intent, never against the
//! specific call that failed, so a stale rejection arriving after a newer
//! toggle cannot overwrite the newer state.

use crate::{
    controller::CallError,
    session::{
        MediaSession,
        MediaSessionError,
        ScreenShareOptions,
        TrackHandle,
        TrackSource,
    },
    sync_guard::SyncGuard,
};
use campfire_config::{
    Config,
    Resolution,
};
use std::{
    future::Future,
    time::Duration,
};
use tokio::sync::mpsc::UnboundedSender;

/// The local user's desired control state, independent of what the remote
/// session currently reports.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIntent {
    pub muted: bool,
    pub deafened: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
    pub resolution: Resolution,
    pub krisp_enabled: bool,
    pub output_volume: u8,
}

impl Default for DeviceIntent {
    fn default() -> Self {
        Self {
            muted: false,
            deafened: false,
            video_enabled: false,
            screen_sharing: false,
            resolution: Resolution::default(),
            krisp_enabled: false,
            output_volume: 100,
        }
    }
}

impl DeviceIntent {
    pub fn from_config(config: &Config) -> Self {
        Self {
            muted: !config.audio_enabled,
            deafened: false,
            video_enabled: config.video_enabled,
            screen_sharing: false,
            resolution: config.resolution,
            krisp_enabled: config.krisp,
            output_volume: config.output_volume.min(100),
        }
    }
}

/// The intent value a spawned session command tried to establish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attempted {
    MicrophoneEnabled(bool),
    CameraEnabled(bool),
    ScreenShareEnabled(bool),
    Resolution { from: Resolution, to: Resolution },
    NoiseFilter(bool),
}

/// Completion of a spawned session command, reported back to the worker
/// loop for reconciliation.
#[derive(Debug)]
pub struct CommandOutcome {
    pub attempted: Attempted,
    pub result: Result<(), MediaSessionError>,
}

pub struct DeviceControls<S: MediaSession + Clone> {
    intent: DeviceIntent,
    session: S,
    outcome_tx: UnboundedSender<CommandOutcome>,
    guard: SyncGuard,
}

impl<S: MediaSession + Clone> DeviceControls<S> {
    pub fn new(intent: DeviceIntent, session: S, outcome_tx: UnboundedSender<CommandOutcome>, guard_hold: Duration) -> Self {
        Self {
            intent,
            session,
            outcome_tx,
            guard: SyncGuard::new(guard_hold),
        }
    }

    pub fn intent(&self) -> &DeviceIntent {
        &self.intent
    }

    /// Push the configured intent into a freshly connected session. The
    /// microphone publication comes up with the session, so only
    /// deviations from that baseline need commands.
    pub fn apply_initial(&mut self) {
        if self.intent.muted {
            self.guard.raise();
            let session = self.session.clone();
            self.spawn(Attempted::MicrophoneEnabled(false), async move {
                session.set_microphone_enabled(false).await
            });
        }
        if self.intent.video_enabled {
            self.guard.raise();
            let session = self.session.clone();
            let resolution = self.intent.resolution;
            self.spawn(Attempted::CameraEnabled(true), async move {
                session.set_camera_enabled(true, resolution).await
            });
        }
        if self.intent.krisp_enabled {
            let session = self.session.clone();
            self.spawn(Attempted::NoiseFilter(true), async move {
                session.set_noise_filter(true).await
            });
        }
    }

    pub fn toggle_mute(&mut self) {
        let muted = !self.intent.muted;
        self.intent.muted = muted;
        self.guard.raise();
        let session = self.session.clone();
        self.spawn(Attempted::MicrophoneEnabled(!muted), async move {
            session.set_microphone_enabled(!muted).await
        });
    }

    /// Deafening forces `muted = true` in the same transaction.
    /// Un-deafening leaves mute at whatever it was.
    pub fn toggle_deafen(&mut self) {
        let deafened = !self.intent.deafened;
        self.intent.deafened = deafened;
        if deafened && !self.intent.muted {
            self.intent.muted = true;
            self.guard.raise();
            let session = self.session.clone();
            self.spawn(Attempted::MicrophoneEnabled(false), async move {
                session.set_microphone_enabled(false).await
            });
        }
    }

    pub fn toggle_video(&mut self) {
        let enabled = !self.intent.video_enabled;
        self.intent.video_enabled = enabled;
        self.guard.raise();
        let session = self.session.clone();
        let resolution = self.intent.resolution;
        self.spawn(Attempted::CameraEnabled(enabled), async move {
            session.set_camera_enabled(enabled, resolution).await
        });
    }

    pub fn toggle_screen_share(&mut self) {
        let enabled = !self.intent.screen_sharing;
        self.intent.screen_sharing = enabled;
        self.guard.raise();
        let session = self.session.clone();
        self.spawn(Attempted::ScreenShareEnabled(enabled), async move {
            session
                .set_screen_share_enabled(enabled, ScreenShareOptions { capture_audio: true })
                .await
        });
    }

    /// Bounces the camera publication at the new resolution. Only the
    /// local publication is touched, other participants' tracks are not
    /// involved at all.
    pub fn change_resolution(&mut self, resolution: Resolution) {
        let from = self.intent.resolution;
        if from == resolution {
            return;
        }
        self.intent.resolution = resolution;
        if !self.intent.video_enabled {
            return;
        }
        self.guard.raise();
        let session = self.session.clone();
        self.spawn(Attempted::Resolution { from, to: resolution }, async move {
            session.set_camera_enabled(false, from).await?;
            session.set_camera_enabled(true, resolution).await
        });
    }

    pub fn toggle_noise_suppression(&mut self) {
        let enabled = !self.intent.krisp_enabled;
        self.intent.krisp_enabled = enabled;
        let session = self.session.clone();
        self.spawn(Attempted::NoiseFilter(enabled), async move {
            session.set_noise_filter(enabled).await
        });
    }

    pub fn set_output_volume(&mut self, volume: u8) {
        self.intent.output_volume = volume.min(100);
    }

    /// Reconcile a command completion. Returns an error to surface to the
    /// user, if any.
    pub fn apply_outcome(&mut self, outcome: CommandOutcome) -> Option<CallError> {
        let err = match outcome.result {
            Ok(()) => return None,
            Err(err) => err,
        };

        match outcome.attempted {
            Attempted::MicrophoneEnabled(enabled) => {
                let attempted_muted = !enabled;
                if self.intent.muted == attempted_muted {
                    if self.intent.deafened && attempted_muted {
                        // Deafened implies muted; the mute stays forced no
                        // matter what happened to the mic command.
                        debug!("Keeping the mute while deafened: {err}");
                        return None;
                    }
                    self.intent.muted = !attempted_muted;
                } else {
                    debug!("Ignoring stale microphone rejection: {err}");
                    return None;
                }
                if matches!(err, MediaSessionError::PermissionDenied { .. }) {
                    return Some(CallError::Permission { device: "microphone" });
                }
                warn!("Microphone command failed: {err}");
            }
            Attempted::CameraEnabled(enabled) => {
                if self.intent.video_enabled == enabled {
                    self.intent.video_enabled = !enabled;
                } else {
                    debug!("Ignoring stale camera rejection: {err}");
                    return None;
                }
                if matches!(err, MediaSessionError::PermissionDenied { .. }) {
                    return Some(CallError::Permission { device: "camera" });
                }
                warn!("Camera command failed: {err}");
            }
            Attempted::ScreenShareEnabled(enabled) => {
                if self.intent.screen_sharing == enabled {
                    self.intent.screen_sharing = !enabled;
                } else {
                    debug!("Ignoring stale screen share rejection: {err}");
                    return None;
                }
                if matches!(err, MediaSessionError::ScreenShareCancelled) {
                    // User dismissed the picker: an expected revert.
                    debug!("Screen share cancelled by the user");
                } else {
                    warn!("Screen share command failed: {err}");
                }
            }
            Attempted::Resolution { from, to } => {
                if self.intent.resolution == to {
                    self.intent.resolution = from;
                }
                // The disable half of the bounce may have landed before the
                // failure; if the camera publication is gone, intent must
                // not keep claiming video.
                let local = self.session.local_participant();
                let camera_up = self
                    .session
                    .publications(&local.id)
                    .iter()
                    .any(|track| track.source() == TrackSource::Camera);
                if self.intent.video_enabled && !camera_up {
                    self.intent.video_enabled = false;
                }
                warn!("Resolution change to {to} failed: {err}");
            }
            Attempted::NoiseFilter(enabled) => {
                // Non-fatal: fall back to unprocessed audio. Never touches
                // mute or video state.
                if self.intent.krisp_enabled == enabled {
                    self.intent.krisp_enabled = !enabled;
                }
                warn!("Noise filter command failed: {err}");
            }
        }
        None
    }

    /// Fold a local publish/unpublish echo back into intent, unless we
    /// caused it ourselves within the suppression window.
    pub fn reconcile_local_echo(&mut self, track: &TrackHandle, published: bool) {
        if self.guard.is_raised() {
            debug!(track = %track.id(), "Skipping echo reconciliation, guard raised");
            return;
        }
        match track.source() {
            TrackSource::Microphone => self.intent.muted = !published,
            TrackSource::Camera => self.intent.video_enabled = published,
            TrackSource::ScreenShare => self.intent.screen_sharing = published,
            TrackSource::ScreenShareAudio => {}
        }
    }

    fn spawn<F>(&self, attempted: Attempted, command: F)
    where
        F: Future<Output = Result<(), MediaSessionError>> + Send + 'static,
    {
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = command.await;
            let _ = outcome_tx.send(CommandOutcome { attempted, result });
        });
    }
}

#[cfg(test)]
mod test {
    use super::{
        Attempted,
        CommandOutcome,
        DeviceControls,
        DeviceIntent,
    };
    use crate::session::{
        fake::FakeMediaSession,
        MediaSessionError,
        TrackSource,
    };
    use campfire_config::Resolution;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn controls(
        session: &FakeMediaSession,
    ) -> (
        DeviceControls<FakeMediaSession>,
        tokio::sync::mpsc::UnboundedReceiver<CommandOutcome>,
    ) {
        let (tx, rx) = unbounded_channel();
        (
            DeviceControls::new(DeviceIntent::default(), session.clone(), tx, Duration::from_millis(150)),
            rx,
        )
    }

    #[tokio::test]
    async fn deafen_forces_mute_in_the_same_transaction() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        controls.toggle_deafen();
        assert!(controls.intent().deafened);
        assert!(controls.intent().muted);

        // Un-deafening does not touch mute.
        controls.toggle_deafen();
        assert!(!controls.intent().deafened);
        assert!(controls.intent().muted);
    }

    #[tokio::test]
    async fn deafen_preserves_prior_mute_state() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        controls.toggle_mute();
        assert!(controls.intent().muted);

        controls.toggle_deafen();
        controls.toggle_deafen();
        assert!(controls.intent().muted);
    }

    #[tokio::test]
    async fn stale_camera_rejection_does_not_revive_video() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        // User turned video on, then off again before the enable command
        // resolved.
        controls.toggle_video();
        controls.toggle_video();
        assert!(!controls.intent().video_enabled);

        // The rejection of the first enable arrives late. Current intent
        // is `false`, the attempted value was `true`: stale, ignored.
        let surfaced = controls.apply_outcome(CommandOutcome {
            attempted: Attempted::CameraEnabled(true),
            result: Err(MediaSessionError::PermissionDenied { device: "camera" }),
        });
        assert_eq!(surfaced, None);
        assert!(!controls.intent().video_enabled);
    }

    #[tokio::test]
    async fn current_camera_rejection_reverts_and_surfaces() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        controls.toggle_video();
        let surfaced = controls.apply_outcome(CommandOutcome {
            attempted: Attempted::CameraEnabled(true),
            result: Err(MediaSessionError::PermissionDenied { device: "camera" }),
        });
        assert!(surfaced.is_some());
        assert!(!controls.intent().video_enabled);
    }

    #[tokio::test]
    async fn screen_share_cancel_is_a_silent_revert() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        controls.toggle_screen_share();
        let surfaced = controls.apply_outcome(CommandOutcome {
            attempted: Attempted::ScreenShareEnabled(true),
            result: Err(MediaSessionError::ScreenShareCancelled),
        });
        assert_eq!(surfaced, None);
        assert!(!controls.intent().screen_sharing);
    }

    #[tokio::test]
    async fn noise_filter_failure_only_reverts_krisp() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        controls.toggle_mute();
        controls.toggle_noise_suppression();
        let muted_before = controls.intent().muted;
        let video_before = controls.intent().video_enabled;

        let surfaced = controls.apply_outcome(CommandOutcome {
            attempted: Attempted::NoiseFilter(true),
            result: Err(MediaSessionError::Command("krisp attach failed".to_string())),
        });
        assert_eq!(surfaced, None);
        assert!(!controls.intent().krisp_enabled);
        assert_eq!(controls.intent().muted, muted_before);
        assert_eq!(controls.intent().video_enabled, video_before);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_resolution_bounce_does_not_claim_a_dead_camera() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, mut outcomes) = controls(&session);

        controls.toggle_video();
        assert!(controls.apply_outcome(outcomes.recv().await.unwrap()).is_none());
        assert!(controls.intent().video_enabled);

        // The disable half of the bounce goes through, then the re-enable
        // is rejected mid-flight.
        session.set_command_delay(Duration::from_millis(50));
        controls.change_resolution(Resolution::P1080);
        tokio::time::sleep(Duration::from_millis(60)).await;
        session.fail_next_camera(MediaSessionError::Command("camera wedged".to_string()));

        let outcome = outcomes.recv().await.unwrap();
        assert!(matches!(outcome.attempted, Attempted::Resolution { .. }));
        let surfaced = controls.apply_outcome(outcome);
        assert_eq!(surfaced, None);

        // No camera publication is left, so intent must not claim video.
        assert!(session
            .local_publications()
            .iter()
            .all(|track| track.source() != TrackSource::Camera));
        assert_eq!(controls.intent().resolution, Resolution::P720);
        assert!(!controls.intent().video_enabled);
    }

    #[tokio::test]
    async fn deafen_keeps_the_mute_when_the_mic_command_fails() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        controls.toggle_deafen();
        let surfaced = controls.apply_outcome(CommandOutcome {
            attempted: Attempted::MicrophoneEnabled(false),
            result: Err(MediaSessionError::Command("mic wedged".to_string())),
        });
        assert_eq!(surfaced, None);
        assert!(controls.intent().deafened);
        assert!(controls.intent().muted);
    }

    #[tokio::test]
    async fn resolution_change_noops_when_unchanged() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        controls.change_resolution(Resolution::P720);
        assert_eq!(controls.intent().resolution, Resolution::P720);

        controls.change_resolution(Resolution::P1080);
        assert_eq!(controls.intent().resolution, Resolution::P1080);
    }

    #[tokio::test(start_paused = true)]
    async fn echo_reconciliation_respects_the_guard() {
        let session = FakeMediaSession::new("local", "Local");
        let (mut controls, _outcomes) = controls(&session);

        // Our own mute command raises the guard, the unpublish echo must
        // not flip intent back.
        controls.toggle_mute();
        let mic = crate::session::TrackHandle::new(crate::session::TrackInfo {
            id: crate::session::TrackId("mic".to_string()),
            participant: crate::session::ParticipantId("local".to_string()),
            source: crate::session::TrackSource::Microphone,
            dimensions: None,
        });
        controls.reconcile_local_echo(&mic, false);
        assert!(controls.intent().muted);

        // Outside the window, an external unpublish does correct intent.
        tokio::time::advance(Duration::from_millis(300)).await;
        controls.toggle_mute();
        tokio::time::advance(Duration::from_millis(300)).await;
        controls.reconcile_local_echo(&mic, false);
        assert!(controls.intent().muted);
    }
}
