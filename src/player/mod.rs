//! Playback orchestration: playlist, directive dispatch, auto-advance and progress reporting.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::jellyfin::api::JellyfinApiContract;
use crate::jellyfin::reporter::{JellyfinReporter, PlaybackStateSnapshot};
use crate::mpv::{MediaPlayerControl, PlayerEvent};

mod command_handler;
mod event_handler;
mod item_fetcher;
mod playback_starter;
mod run_loop;
mod state;
mod throttle;
mod track_map;

pub use state::{
    ActivePlayback, EnqueuePosition, PlayRequest, PlayerCommand, PlayerState, PlayerStatus, Playlist, ResumePoint,
};
pub use throttle::ReportThrottle;
pub use track_map::TrackIndexMap;

pub(crate) const PLAYER_LOG_TARGET: &str = "r_jellyshim::player";

pub const TICKS_PER_SECOND: i64 = 10_000_000;

pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

pub fn seconds_to_ticks(seconds: f64) -> i64 {
    (seconds * TICKS_PER_SECOND as f64).round() as i64
}

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub progress_interval: Duration,
    /// Minimum spacing of property-driven progress reports.
    pub report_window: Duration,
    pub volume_step: i64,
    pub fullscreen: bool,
    pub command_buffer_size: usize,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PlayerOptions {
            progress_interval: Duration::from_secs(5),
            report_window: Duration::from_secs(2),
            volume_step: 5,
            fullscreen: false,
            command_buffer_size: 32,
        }
    }
}

/// Owns the playlist and the active playback context. Runs as a single task via [`Player::run`].
pub struct Player {
    // --- Collaborators ---
    jellyfin_client: Arc<dyn JellyfinApiContract>,
    controller: Arc<dyn MediaPlayerControl>,
    reporter: JellyfinReporter,
    options: PlayerOptions,

    // --- State ---
    state: PlayerState,
    playlist: Playlist,
    active: Option<ActivePlayback>,
    resume: Option<ResumePoint>,
    // Carried into the next launch.
    volume: i64,
    muted: bool,
    throttle: ReportThrottle,
    progress_timer: Option<Interval>,

    // --- Communication ---
    command_rx: mpsc::Receiver<PlayerCommand>,
    player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    status_tx: watch::Sender<PlayerStatus>,
}

impl Player {
    /// Creates the orchestrator and the sender its directives arrive on.
    pub fn new(
        jellyfin_client: Arc<dyn JellyfinApiContract>,
        controller: Arc<dyn MediaPlayerControl>,
        player_events: mpsc::UnboundedReceiver<PlayerEvent>,
        options: PlayerOptions,
    ) -> (Self, mpsc::Sender<PlayerCommand>) {
        let (command_tx, command_rx) = mpsc::channel(options.command_buffer_size.max(1));
        let (status_tx, _) = watch::channel(PlayerStatus {
            state: PlayerState::Idle,
            item_id: None,
            playlist_index: None,
            playlist_len: 0,
        });

        let player = Player {
            reporter: JellyfinReporter::new(jellyfin_client.clone()),
            jellyfin_client,
            controller,
            throttle: ReportThrottle::new(options.report_window),
            options,
            state: PlayerState::Idle,
            playlist: Playlist::default(),
            active: None,
            resume: None,
            volume: 100,
            muted: false,
            progress_timer: None,
            command_rx,
            player_events,
            status_tx,
        };
        (player, command_tx)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlayerStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn active(&self) -> Option<&ActivePlayback> {
        self.active.as_ref()
    }

    /// Processes directives and player events until `cancel` fires or the directive sender is dropped.
    /// Stops the player and reports the stop before returning.
    #[instrument(skip_all)]
    pub async fn run(&mut self, cancel: CancellationToken) {
        run_loop::run_player_loop(self, cancel).await;
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state != state {
            trace!(target: PLAYER_LOG_TARGET, "State {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn publish_status(&self) {
        let status = PlayerStatus {
            state: self.state,
            item_id: self.active.as_ref().map(|active| active.item_id.clone()),
            playlist_index: self.playlist.index(),
            playlist_len: self.playlist.len(),
        };
        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }

    /// Report payload from the context alone, without querying mpv.
    fn snapshot_of(&self, active: &ActivePlayback) -> PlaybackStateSnapshot {
        PlaybackStateSnapshot {
            item_id: active.item_id.clone(),
            media_source_id: active.media_source.id.clone(),
            play_session_id: active.play_session_id.clone(),
            position_ticks: active.position_ticks,
            is_paused: active.is_paused,
            is_muted: active.is_muted,
            volume: active.volume,
            audio_stream_index: active.audio_stream_index,
            subtitle_stream_index: active.subtitle_stream_index,
            run_time_ticks: active.run_time_ticks,
            queue: self.playlist.items().to_vec(),
            queue_index: self.playlist.index().unwrap_or(0),
        }
    }
}
