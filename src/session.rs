//! Wires the event channel, the orchestrator and the capability announcer into one session.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::jellyfin::{
    ChannelConfig, ChannelError, ChannelEvent, EventChannel, JellyfinApiContract, JellyfinClient, JellyfinError,
    SessionManager,
};
use crate::mpv::{MediaPlayerControl, MpvConfig, MpvController};
use crate::player::{Player, PlayerCommand, PlayerOptions};

const SESSION_LOG_TARGET: &str = "r_jellyshim::session";

#[derive(Debug, Error)]
pub enum ShimError {
    #[error("event channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("jellyfin error: {0}")]
    Jellyfin(#[from] JellyfinError),
    #[error("player task stopped unexpectedly")]
    PlayerGone,
}

/// Tunables for one session, usually derived from [`crate::config::Settings`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mpv: MpvConfig,
    pub player: PlayerOptions,
    pub capabilities_interval: Duration,
    pub reconnect_max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            mpv: MpvConfig::default(),
            player: PlayerOptions::default(),
            capabilities_interval: Duration::from_secs(300),
            reconnect_max_attempts: 10,
        }
    }
}

/// A running relay between one Jellyfin session and a local mpv.
pub struct ShimSession {
    config: SessionConfig,
    jellyfin_client: Arc<JellyfinClient>,
    cancel: CancellationToken,
}

impl ShimSession {
    pub fn new(config: SessionConfig, jellyfin_client: Arc<JellyfinClient>) -> Self {
        ShimSession {
            config,
            jellyfin_client,
            cancel: CancellationToken::new(),
        }
    }

    /// Requests shutdown. Safe to call more than once and before `run`.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!(target: SESSION_LOG_TARGET, "Shutdown requested");
        }
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs until [`shutdown`](Self::shutdown) is called or the event channel gives up.
    ///
    /// On return mpv has been stopped, the stop reported, and the socket closed.
    #[instrument(skip(self), fields(server = %self.jellyfin_client.get_server_url()))]
    pub async fn run(&self) -> Result<(), ShimError> {
        let socket_url = self.jellyfin_client.socket_url()?;
        let client: Arc<dyn JellyfinApiContract> = self.jellyfin_client.clone();

        let (controller, player_events) = MpvController::new(self.config.mpv.clone());
        let controller: Arc<dyn MediaPlayerControl> = Arc::new(controller);
        let (mut player, command_tx) =
            Player::new(client.clone(), controller, player_events, self.config.player.clone());

        let player_cancel = self.cancel.child_token();
        let player_task = tokio::spawn({
            let cancel = player_cancel.clone();
            async move { player.run(cancel).await }
        });

        let channel_config = ChannelConfig::new(socket_url).with_max_attempts(self.config.reconnect_max_attempts);
        let (channel, mut channel_events) = EventChannel::start(channel_config);

        let announcer_cancel = self.cancel.child_token();
        let announcer = SessionManager::new(client, self.config.capabilities_interval);
        let announcer_task = tokio::spawn(announcer.run(channel.state(), announcer_cancel.clone()));

        info!(target: SESSION_LOG_TARGET, "Session started");
        let result = self.forward_events(&mut channel_events, &command_tx).await;
        if let Err(e) = &result {
            error!(target: SESSION_LOG_TARGET, "Session ending: {}", e);
        }

        // The player goes first so its stop report still has a live server session behind it.
        player_cancel.cancel();
        if let Err(e) = player_task.await {
            warn!(target: SESSION_LOG_TARGET, "Player task ended abnormally: {}", e);
        }
        announcer_cancel.cancel();
        channel.close().await;
        if let Err(e) = announcer_task.await {
            warn!(target: SESSION_LOG_TARGET, "Announcer task ended abnormally: {}", e);
        }
        info!(target: SESSION_LOG_TARGET, "Session stopped");
        result
    }

    async fn forward_events(
        &self,
        channel_events: &mut mpsc::UnboundedReceiver<ChannelEvent>,
        command_tx: &mpsc::Sender<PlayerCommand>,
    ) -> Result<(), ShimError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                event = channel_events.recv() => event,
            };

            match event {
                Some(ChannelEvent::Connected { connection }) => {
                    info!(target: SESSION_LOG_TARGET, connection, "Event channel connected");
                }
                Some(ChannelEvent::KeepAlive) => trace!(target: SESSION_LOG_TARGET, "KeepAlive"),
                Some(ChannelEvent::Directive(command)) => {
                    debug!(target: SESSION_LOG_TARGET, "Forwarding {:?}", command);
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Ok(()),
                        sent = command_tx.send(command) => {
                            if sent.is_err() {
                                return Err(ShimError::PlayerGone);
                            }
                        }
                    }
                }
                Some(ChannelEvent::Failed(e)) => return Err(e.into()),
                None => return Err(ChannelError::Closed.into()),
            }
        }
    }
}
