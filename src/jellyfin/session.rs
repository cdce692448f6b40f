//! Capability announcements for the remote-control session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::jellyfin::api::JellyfinApiContract;
use crate::jellyfin::models_playback::CapabilitiesReport;
use crate::jellyfin::websocket::ChannelState;

const SESSION_LOG_TARGET: &str = "r_jellyshim::jellyfin::session";

/// Commands the device tells the server it understands.
pub const SUPPORTED_COMMANDS: &[&str] = &[
    "Play",
    "Playstate",
    "PlayNext",
    "PlayMediaSource",
    "SetVolume",
    "VolumeUp",
    "VolumeDown",
    "Mute",
    "Unmute",
    "ToggleMute",
    "SetAudioStreamIndex",
    "SetSubtitleStreamIndex",
    "SetFullscreen",
    "ToggleFullscreen",
];

/// Announces capabilities after every (re)connect and on a fixed period.
#[derive(Clone)]
pub struct SessionManager {
    jellyfin_client: Arc<dyn JellyfinApiContract>,
    interval: Duration,
}

impl SessionManager {
    pub fn new(jellyfin_client: Arc<dyn JellyfinApiContract>, interval: Duration) -> Self {
        SessionManager { jellyfin_client, interval }
    }

    pub fn capabilities() -> CapabilitiesReport {
        CapabilitiesReport {
            playable_media_types: vec!["Video".to_string(), "Audio".to_string()],
            supported_commands: SUPPORTED_COMMANDS.iter().map(|c| c.to_string()).collect(),
            supports_media_control: true,
            supports_persistent_identifier: true,
        }
    }

    /// Sends one announcement. Failures are logged; returns whether it went through.
    pub async fn announce(&self) -> bool {
        match self.jellyfin_client.report_capabilities(&Self::capabilities()).await {
            Ok(()) => {
                info!(target: SESSION_LOG_TARGET, "Capabilities reported");
                true
            }
            Err(e) => {
                warn!(target: SESSION_LOG_TARGET, "Failed to report capabilities: {}", e);
                false
            }
        }
    }

    /// Runs until `cancel` fires or the channel state sender goes away.
    #[instrument(skip_all)]
    pub async fn run(self, mut channel_state: watch::Receiver<ChannelState>, cancel: CancellationToken) {
        let mut announced_for: u64 = 0;
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let connections = channel_state.borrow_and_update().connections;
            if connections > announced_for {
                debug!(target: SESSION_LOG_TARGET, connection = connections, "Announcing after connect");
                announced_for = connections;
                self.announce().await;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = channel_state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if announced_for > 0 {
                        self.announce().await;
                    }
                }
            }
        }
        debug!(target: SESSION_LOG_TARGET, "Capability announcer stopped");
    }
}
