//! Call orchestration.
//!
//! `CallController` is the cloneable handle the UI talks to; the actual
//! work happens in a spawned `CallWorker` task that owns the media
//! session and publishes `CallState` snapshots through a watch channel.

mod messages;
mod state;
mod worker;

pub use messages::CallCommand;
pub use state::{CallError, CallState, ConnectionState};

use crate::{
    audio::AudioOutputs,
    presence::PresenceChannel,
    session::{MediaSession, ParticipantId},
};
use campfire_config::{Config, Resolution};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedSender},
    watch,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use worker::CallWorker;

#[derive(Clone)]
pub struct CallController {
    /// Watch this to render. Holds the latest `CallState` snapshot.
    pub state: watch::Receiver<CallState>,
    sender: UnboundedSender<CallCommand>,
    /// Cancels the worker task when the last handle is dropped.
    _worker_task_guard: Arc<DropGuard>,
}

impl CallController {
    /// Spawns the call worker and starts connecting immediately. The
    /// returned handle is ready for commands right away; they queue
    /// until the connection is established.
    pub fn connect<S, P, O>(config: &Config, session: S, presence: P, outputs: O) -> Self
    where
        S: MediaSession + Clone,
        P: PresenceChannel,
        O: AudioOutputs,
    {
        let (sender, receiver) = unbounded_channel();
        let (state_sender, state_receiver) = watch::channel(CallState::default());
        let task_cancellation_token = CancellationToken::new();
        let task_cancellation_guard = task_cancellation_token.clone().drop_guard();

        tokio::task::spawn({
            let config = config.clone();
            async move {
                tokio::select! {
                    biased;

                    _ = task_cancellation_token.cancelled() => {
                        state_sender.send_modify(|state| {
                            state.connection = ConnectionState::Disconnected;
                        });
                    },
                    result = CallWorker::run(
                        config,
                        session,
                        presence,
                        outputs,
                        receiver,
                        state_sender.clone(),
                    ) => {
                        if let Err(err) = result {
                            error!("Call worker failed: {err}");
                        }
                    },
                };
                debug!("Call task finished");
            }
        });

        Self {
            state: state_receiver,
            sender,
            _worker_task_guard: Arc::new(task_cancellation_guard),
        }
    }

    pub fn toggle_mute(&self) {
        self.send(CallCommand::ToggleMute);
    }

    pub fn toggle_deafen(&self) {
        self.send(CallCommand::ToggleDeafen);
    }

    pub fn toggle_video(&self) {
        self.send(CallCommand::ToggleVideo);
    }

    pub fn toggle_screen_share(&self) {
        self.send(CallCommand::ToggleScreenShare);
    }

    pub fn change_resolution(&self, resolution: Resolution) {
        self.send(CallCommand::ChangeResolution(resolution));
    }

    pub fn toggle_noise_suppression(&self) {
        self.send(CallCommand::ToggleNoiseSuppression);
    }

    pub fn set_output_volume(&self, volume: u8) {
        self.send(CallCommand::SetOutputVolume(volume));
    }

    pub fn focus_participant(&self, id: ParticipantId) {
        self.send(CallCommand::FocusParticipant(id));
    }

    pub fn notify_user_interaction(&self) {
        self.send(CallCommand::UserInteraction);
    }

    pub fn dismiss_error(&self) {
        self.send(CallCommand::DismissError);
    }

    /// Graceful teardown; resolves once the worker has published the
    /// final `Disconnected` state.
    pub async fn disconnect(mut self) {
        if self.sender.send(CallCommand::Disconnect).is_ok() {
            let disconnected = self
                .state
                .wait_for(|state| state.connection == ConnectionState::Disconnected)
                .await;
            if let Err(err) = disconnected {
                error!("Failed to wait for the call to end: {err}");
            }
        }
    }

    fn send(&self, command: CallCommand) {
        if self.state.borrow().connection == ConnectionState::Disconnected {
            debug!("Ignoring {command}, the call is over");
            return;
        }
        if self.sender.send(command.clone()).is_err() {
            error!("Was not able to send command: {command}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        audio::fake::FakeAudioOutputs,
        session::{
            fake::{FakeMediaSession, FakePresence},
            TrackSource,
        },
    };
    use campfire_config::Config;
    use pretty_assertions::assert_eq;

    fn config() -> Config {
        let mut config = Config::default();
        config.channel = "lounge".to_string();
        config
    }

    async fn connected(controller: &CallController) {
        controller
            .state
            .clone()
            .wait_for(|state| state.connection == ConnectionState::Connected)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn connecting_builds_the_roster_and_announces_presence() {
        let session = FakeMediaSession::new("me", "Me");
        let presence = FakePresence::new();
        let controller = CallController::connect(
            &config(),
            session.clone(),
            presence.clone(),
            FakeAudioOutputs::new(),
        );
        connected(&controller).await;

        session.join_remote("alice", "Alice");
        session.join_remote("bob", "Bob");
        let state = controller
            .state
            .clone()
            .wait_for(|state| state.participants.len() == 3)
            .await
            .unwrap()
            .clone();

        let local = state.local_participant().unwrap();
        assert_eq!(local.id, ParticipantId::from("me"));
        assert!(!local.is_muted);
        assert!(!local.is_video_enabled);
        assert_eq!(presence.members("lounge").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_surfaces_the_error() {
        let session = FakeMediaSession::new("me", "Me");
        session.fail_connect(true);
        let controller = CallController::connect(
            &config(),
            session,
            FakePresence::new(),
            FakeAudioOutputs::new(),
        );

        let state = controller
            .state
            .clone()
            .wait_for(|state| state.connection == ConnectionState::Disconnected)
            .await
            .unwrap()
            .clone();
        assert_eq!(
            state.error,
            Some(CallError::Connect("token rejected".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn screen_share_round_trip_leaves_no_stray_publications() {
        let session = FakeMediaSession::new("me", "Me");
        let controller = CallController::connect(
            &config(),
            session.clone(),
            FakePresence::new(),
            FakeAudioOutputs::new(),
        );
        connected(&controller).await;

        controller.toggle_screen_share();
        controller
            .state
            .clone()
            .wait_for(|state| {
                state.local_participant().is_some_and(|local| {
                    local
                        .video_track
                        .as_ref()
                        .is_some_and(|track| track.source() == TrackSource::ScreenShare)
                })
            })
            .await
            .unwrap();
        let sources: Vec<_> = session
            .local_publications()
            .iter()
            .map(|track| track.source())
            .collect();
        assert!(sources.contains(&TrackSource::ScreenShareAudio));

        controller.toggle_screen_share();
        controller
            .state
            .clone()
            .wait_for(|state| {
                state
                    .local_participant()
                    .is_some_and(|local| local.video_track.is_none())
            })
            .await
            .unwrap();
        let sources: Vec<_> = session
            .local_publications()
            .iter()
            .map(|track| track.source())
            .collect();
        assert_eq!(sources, vec![TrackSource::Microphone]);
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_change_keeps_remote_tracks_intact() {
        let session = FakeMediaSession::new("me", "Me");
        let controller = CallController::connect(
            &config(),
            session.clone(),
            FakePresence::new(),
            FakeAudioOutputs::new(),
        );
        connected(&controller).await;

        session.join_remote("alice", "Alice");
        let remote_track = session.publish_remote("alice", TrackSource::Camera).unwrap();

        controller.toggle_video();
        controller
            .state
            .clone()
            .wait_for(|state| {
                state
                    .local_participant()
                    .is_some_and(|local| local.video_track.is_some())
            })
            .await
            .unwrap();

        controller.change_resolution(Resolution::P1080);
        let state = controller
            .state
            .clone()
            .wait_for(|state| {
                state.local_participant().is_some_and(|local| {
                    local
                        .video_track
                        .as_ref()
                        .and_then(|track| track.dimensions())
                        == Some((1920, 1080))
                })
            })
            .await
            .unwrap()
            .clone();

        // Only the local camera bounced, the remote feed kept its track.
        let alice = state.participant(&ParticipantId::from("alice")).unwrap();
        assert!(alice.video_track.as_ref().unwrap().ptr_eq(&remote_track));
    }

    #[tokio::test(start_paused = true)]
    async fn deafen_mutes_in_one_step_and_undeafen_keeps_the_mute() {
        let session = FakeMediaSession::new("me", "Me");
        let outputs = FakeAudioOutputs::new();
        let controller = CallController::connect(
            &config(),
            session.clone(),
            FakePresence::new(),
            outputs.clone(),
        );
        connected(&controller).await;

        session.join_remote("alice", "Alice");
        let voice = session
            .publish_remote("alice", TrackSource::Microphone)
            .unwrap();
        controller
            .state
            .clone()
            .wait_for(|state| state.participants.len() == 2)
            .await
            .unwrap();

        controller.toggle_deafen();
        let state = controller
            .state
            .clone()
            .wait_for(|state| state.intent.deafened)
            .await
            .unwrap()
            .clone();
        assert!(state.intent.muted);
        assert!(outputs.is_muted(voice.id()));

        controller.toggle_deafen();
        let state = controller
            .state
            .clone()
            .wait_for(|state| !state.intent.deafened)
            .await
            .unwrap()
            .clone();
        assert!(state.intent.muted);
        assert!(!outputs.is_muted(voice.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn a_screen_sharer_takes_the_stage_from_manual_focus() {
        let session = FakeMediaSession::new("me", "Me");
        let controller = CallController::connect(
            &config(),
            session.clone(),
            FakePresence::new(),
            FakeAudioOutputs::new(),
        );
        connected(&controller).await;

        session.join_remote("alice", "Alice");
        session.join_remote("bob", "Bob");
        controller
            .state
            .clone()
            .wait_for(|state| state.participants.len() == 3)
            .await
            .unwrap();

        controller.focus_participant(ParticipantId::from("alice"));
        controller
            .state
            .clone()
            .wait_for(|state| state.focused == Some(ParticipantId::from("alice")))
            .await
            .unwrap();

        let share = session
            .publish_remote("bob", TrackSource::ScreenShare)
            .unwrap();
        controller
            .state
            .clone()
            .wait_for(|state| state.focused == Some(ParticipantId::from("bob")))
            .await
            .unwrap();

        // The manual pick survives the takeover and returns afterwards.
        session.unpublish_remote(&share);
        controller
            .state
            .clone()
            .wait_for(|state| state.focused == Some(ParticipantId::from("alice")))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn a_leaving_participant_releases_their_audio_outputs() {
        let session = FakeMediaSession::new("me", "Me");
        let outputs = FakeAudioOutputs::new();
        let controller = CallController::connect(
            &config(),
            session.clone(),
            FakePresence::new(),
            outputs.clone(),
        );
        connected(&controller).await;

        session.join_remote("alice", "Alice");
        session
            .publish_remote("alice", TrackSource::Microphone)
            .unwrap();
        session
            .publish_remote("alice", TrackSource::ScreenShareAudio)
            .unwrap();
        controller
            .state
            .clone()
            .wait_for(|state| {
                state
                    .participant(&ParticipantId::from("alice"))
                    .is_some_and(|p| p.has_screen_share_audio)
            })
            .await
            .unwrap();
        assert_eq!(outputs.bound_count(), 2);

        session.leave_remote("alice");
        controller
            .state
            .clone()
            .wait_for(|state| state.participants.len() == 1)
            .await
            .unwrap();
        assert_eq!(outputs.bound_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn speaking_flags_follow_the_poll() {
        let session = FakeMediaSession::new("me", "Me");
        let controller = CallController::connect(
            &config(),
            session.clone(),
            FakePresence::new(),
            FakeAudioOutputs::new(),
        );
        connected(&controller).await;

        session.join_remote("alice", "Alice");
        controller
            .state
            .clone()
            .wait_for(|state| state.participants.len() == 2)
            .await
            .unwrap();

        session.set_speaking("alice", true);
        controller
            .state
            .clone()
            .wait_for(|state| {
                state
                    .participant(&ParticipantId::from("alice"))
                    .is_some_and(|p| p.is_speaking)
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnecting_clears_the_channel() {
        let session = FakeMediaSession::new("me", "Me");
        let presence = FakePresence::new();
        let controller = CallController::connect(
            &config(),
            session,
            presence.clone(),
            FakeAudioOutputs::new(),
        );
        connected(&controller).await;
        assert_eq!(presence.members("lounge").len(), 1);

        let handle = controller.clone();
        controller.disconnect().await;

        assert_eq!(
            handle.state.borrow().connection,
            ConnectionState::Disconnected
        );
        assert!(presence.members("lounge").is_empty());
    }
}
