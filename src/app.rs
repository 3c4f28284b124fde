use campfire_call::{
    audio::fake::FakeAudioOutputs,
    session::{
        fake::{
            FakeMediaSession,
            FakePresence,
        },
        ConnectionQuality,
        ParticipantId,
        TrackSource,
    },
    CallController,
    ConnectionState,
};
use campfire_config::{
    Args,
    Config,
    Resolution,
};
use color_eyre::Result;
use std::time::Duration;
use tokio::time::sleep;

/// Drives a scripted call against the in-memory media session: staggered
/// joins, publication churn, a screen-share takeover and local device
/// toggles, while reporting every state transition.
pub struct App {
    config: Config,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args)?;
        Ok(Self { config })
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting the call simulation in #{}", self.config.channel);

        let session = FakeMediaSession::new("local", self.config.username.as_str());
        let presence = FakePresence::new();
        let outputs = FakeAudioOutputs::new();
        let controller = CallController::connect(
            &self.config,
            session.clone(),
            presence.clone(),
            outputs.clone(),
        );

        let mut watcher = controller.state.clone();
        let reporter = tokio::spawn(async move {
            while watcher.changed().await.is_ok() {
                let state = watcher.borrow_and_update().clone();
                let focused = state
                    .focused
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "nobody".to_string());
                debug!(
                    connection = %state.connection,
                    participants = state.participants.len(),
                    %focused,
                    "State changed"
                );
                if let Some(error) = &state.error {
                    warn!("Call error: {error}");
                }
            }
        });

        controller
            .state
            .clone()
            .wait_for(|state| state.connection != ConnectionState::Connecting)
            .await?;
        if controller.state.borrow().connection == ConnectionState::Disconnected {
            warn!("Connection failed, nothing to simulate");
            reporter.abort();
            return Ok(());
        }

        self.script(&session, &controller, &outputs).await;

        sleep(Duration::from_secs(self.config.duration)).await;
        controller.disconnect().await;
        reporter.abort();
        info!("Simulation finished");
        Ok(())
    }

    async fn script(
        &self,
        session: &FakeMediaSession,
        controller: &CallController,
        outputs: &FakeAudioOutputs,
    ) {
        session.join_remote("ada", "Ada");
        session.publish_remote("ada", TrackSource::Microphone);
        sleep(Duration::from_millis(400)).await;

        session.join_remote("grace", "Grace");
        session.publish_remote("grace", TrackSource::Microphone);
        session.publish_remote("grace", TrackSource::Camera);
        sleep(Duration::from_millis(400)).await;

        session.set_speaking("ada", true);
        sleep(Duration::from_millis(600)).await;
        session.set_speaking("ada", false);

        controller.focus_participant(ParticipantId::from("grace"));
        controller.toggle_video();
        sleep(Duration::from_millis(300)).await;
        controller.change_resolution(Resolution::P1080);

        // Simulated autoplay policy: the share audio stays silent until
        // the user interacts with the page.
        outputs.block_autoplay(true);
        let share = session.publish_remote("ada", TrackSource::ScreenShare);
        session.publish_remote("ada", TrackSource::ScreenShareAudio);
        sleep(Duration::from_millis(500)).await;
        outputs.block_autoplay(false);
        controller.notify_user_interaction();

        controller.toggle_mute();
        controller.toggle_deafen();
        sleep(Duration::from_millis(500)).await;
        controller.toggle_deafen();

        session.set_quality("grace", ConnectionQuality::Poor);
        sleep(Duration::from_millis(400)).await;

        if let Some(share) = share {
            session.unpublish_remote(&share);
        }
        session.leave_remote("grace");
    }
}
