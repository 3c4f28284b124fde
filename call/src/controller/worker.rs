use crate::{
    audio::{AudioOutputs, AudioRouter},
    controller::{
        messages::CallCommand,
        state::{CallState, ConnectionState},
    },
    controls::{CommandOutcome, DeviceControls, DeviceIntent},
    participant::{select_focus, ParticipantStateStore},
    presence::{PresenceChannel, PresenceDescriptor},
    session::{MediaSession, ParticipantId, SessionEvent},
};
use campfire_config::Config;
use eyre::Result;
use std::time::Duration;
use tokio::{
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver},
        watch,
    },
    time::MissedTickBehavior,
};

use super::state::CallError;

/// Owns the session, the device controls and the audio router, and turns
/// their combined activity into `CallState` snapshots. Runs until the
/// session drops or a `Disconnect` command arrives.
pub(super) struct CallWorker<S, P, O>
where
    S: MediaSession + Clone,
    P: PresenceChannel,
    O: AudioOutputs,
{
    config: Config,
    session: S,
    presence: P,
    store: ParticipantStateStore,
    controls: DeviceControls<S>,
    router: AudioRouter<O>,
    manual_focus: Option<ParticipantId>,
    state: watch::Sender<CallState>,
}

impl<S, P, O> CallWorker<S, P, O>
where
    S: MediaSession + Clone,
    P: PresenceChannel,
    O: AudioOutputs,
{
    #[instrument(level = "debug", skip_all, fields(channel = %config.channel))]
    pub(super) async fn run(
        config: Config,
        session: S,
        presence: P,
        outputs: O,
        commands: UnboundedReceiver<CallCommand>,
        state: watch::Sender<CallState>,
    ) -> Result<()> {
        let (outcome_sender, outcome_receiver) = unbounded_channel();
        let intent = DeviceIntent::from_config(&config);
        let guard_hold = Duration::from_millis(config.sync_guard_ms.max(1));
        let worker = Self {
            controls: DeviceControls::new(
                intent.clone(),
                session.clone(),
                outcome_sender,
                guard_hold,
            ),
            router: AudioRouter::new(outputs, intent.output_volume),
            store: ParticipantStateStore::new(),
            manual_focus: None,
            config,
            session,
            presence,
            state,
        };
        worker.connect_and_drive(commands, outcome_receiver).await
    }

    async fn connect_and_drive(
        mut self,
        mut commands: UnboundedReceiver<CallCommand>,
        mut outcomes: UnboundedReceiver<CommandOutcome>,
    ) -> Result<()> {
        // Subscribe before connecting so the publish echoes of the
        // initial device setup are not missed.
        let mut events = self.session.events();

        let endpoint = self
            .config
            .endpoint
            .as_ref()
            .map(|url| url.to_string())
            .unwrap_or_default();
        let token = self.config.token.clone().unwrap_or_default();
        if let Err(err) = self.session.connect(&endpoint, &token).await {
            error!("Failed to connect to the media session: {err}");
            self.state.send_modify(|state| {
                state.connection = ConnectionState::Disconnected;
                state.error = Some(CallError::Connect(err.to_string()));
            });
            return Ok(());
        }

        let local = self.session.local_participant();
        let descriptor = PresenceDescriptor {
            id: local.id.clone(),
            display_name: local.display_name.clone(),
            avatar: local.avatar.clone(),
        };
        if let Err(err) = self.presence.enter(&self.config.channel, descriptor).await {
            // Presence is cosmetic, the call itself is unaffected.
            warn!("Failed to announce channel membership: {err}");
        }

        self.controls.apply_initial();
        self.state
            .send_modify(|state| state.connection = ConnectionState::Connected);
        self.refresh();

        let mut speaking_poll =
            tokio::time::interval(Duration::from_millis(self.config.speaking_poll_ms.max(10)));
        speaking_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let disconnect = tokio::select! {
                biased;

                Some(event) = events.recv() => self.handle_event(event),
                Some(command) = commands.recv() => self.handle_command(command),
                Some(outcome) = outcomes.recv() => {
                    if let Some(error) = self.controls.apply_outcome(outcome) {
                        self.state.send_modify(|state| state.error = Some(error));
                    }
                    false
                },
                _ = speaking_poll.tick() => false,
                else => true,
            };

            if disconnect {
                break;
            }
            self.refresh();
        }

        self.shutdown().await;
        Ok(())
    }

    /// Returns true when the worker should shut down.
    fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::ParticipantConnected(info) => {
                info!(participant = %info.id, "Participant joined");
            },
            SessionEvent::ParticipantDisconnected(id) => {
                info!(participant = %id, "Participant left");
            },
            SessionEvent::TrackSubscribed { track, .. } => {
                self.router.on_track_subscribed(&track);
            },
            SessionEvent::TrackUnsubscribed { track, .. } => {
                self.router.on_track_unsubscribed(&track);
            },
            SessionEvent::LocalTrackPublished(track) => {
                self.controls.reconcile_local_echo(&track, true);
            },
            SessionEvent::LocalTrackUnpublished(track) => {
                self.controls.reconcile_local_echo(&track, false);
            },
            SessionEvent::ConnectionQualityChanged {
                participant,
                quality,
            } => {
                debug!(%participant, %quality, "Connection quality changed");
            },
            SessionEvent::Disconnected => {
                warn!("Session disconnected");
                return true;
            },
        }
        false
    }

    fn handle_command(&mut self, command: CallCommand) -> bool {
        debug!("Handling command {command}");
        match command {
            CallCommand::ToggleMute => self.controls.toggle_mute(),
            CallCommand::ToggleDeafen => {
                self.controls.toggle_deafen();
                self.router.set_deafened(self.controls.intent().deafened);
            },
            CallCommand::ToggleVideo => self.controls.toggle_video(),
            CallCommand::ToggleScreenShare => self.controls.toggle_screen_share(),
            CallCommand::ChangeResolution(resolution) => {
                self.controls.change_resolution(resolution);
            },
            CallCommand::ToggleNoiseSuppression => self.controls.toggle_noise_suppression(),
            CallCommand::SetOutputVolume(volume) => {
                self.controls.set_output_volume(volume);
                self.router.set_output_volume(volume);
            },
            CallCommand::FocusParticipant(id) => self.manual_focus = Some(id),
            CallCommand::UserInteraction => self.router.notify_user_interaction(),
            CallCommand::DismissError => {
                self.state.send_modify(|state| state.error = None);
            },
            CallCommand::Disconnect => return true,
        }
        false
    }

    /// Recomputes the participant roster and focus wholesale from the
    /// session and publishes the snapshot.
    fn refresh(&mut self) {
        self.store.recompute(&self.session, self.controls.intent());
        if let Some(id) = &self.manual_focus {
            if !self.store.contains(id) {
                self.manual_focus = None;
            }
        }
        let focused = select_focus(self.store.participants(), self.manual_focus.as_ref())
            .map(|participant| participant.id.clone());
        let participants = self.store.participants().to_vec();
        let intent = self.controls.intent().clone();
        self.state.send_modify(|state| {
            state.participants = participants;
            state.focused = focused;
            state.intent = intent;
        });
    }

    async fn shutdown(mut self) {
        let local = self.session.local_participant();
        self.presence.leave(&self.config.channel, &local.id).await;
        self.session.disconnect().await;
        self.router.clear();
        self.store.clear();
        self.state.send_modify(|state| {
            state.connection = ConnectionState::Disconnected;
            state.participants = Vec::new();
            state.focused = None;
        });
        info!("Left the voice channel");
    }
}
