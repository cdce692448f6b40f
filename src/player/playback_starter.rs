// src/player/playback_starter.rs
use crate::mpv::LaunchRequest;
use crate::player::{
    item_fetcher, seconds_to_ticks, ticks_to_seconds, ActivePlayback, Player, PlayerState, ResumePoint, TrackIndexMap,
    PLAYER_LOG_TARGET,
};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Per-start choices carried over from a Play directive.
#[derive(Debug, Clone, Default)]
pub(crate) struct StartOptions {
    pub start_position_ticks: Option<i64>,
    pub media_source_id: Option<String>,
    pub audio_stream_index: Option<i64>,
    pub subtitle_stream_index: Option<i64>,
}

impl StartOptions {
    pub fn at_position(position_ticks: i64) -> Self {
        StartOptions {
            start_position_ticks: Some(position_ticks),
            ..Default::default()
        }
    }
}

/// Subtitle launch argument for a server index. -1 disables subtitles.
fn subtitle_launch_track(track_map: &TrackIndexMap, index: Option<i64>, item_id: &str) -> Option<Option<i64>> {
    match index? {
        i if i < 0 => Some(None),
        i => match track_map.subtitle_to_player(i) {
            Some(sid) => Some(Some(sid)),
            None => {
                warn!(target: PLAYER_LOG_TARGET, item_id, "Subtitle index {} is not a subtitle stream, using mpv default", i);
                None
            }
        },
    }
}

/// Starts the current playlist entry. On any failure the player is left `Idle` with no context.
#[instrument(skip(player, options), fields(playlist_index = ?player.playlist.index()))]
pub(crate) async fn start_current(player: &mut Player, options: StartOptions) -> bool {
    let item_id = match player.playlist.current() {
        Some(id) => id.to_string(),
        None => {
            warn!(target: PLAYER_LOG_TARGET, "Nothing to start: playlist is empty.");
            player.set_state(PlayerState::Idle);
            return false;
        }
    };
    player.set_state(PlayerState::Starting);
    player.publish_status();

    let prepared = match item_fetcher::prepare_item(
        player.jellyfin_client.as_ref(),
        &item_id,
        options.media_source_id.as_deref(),
    )
    .await
    {
        Ok(prepared) => prepared,
        Err(e) => {
            error!(target: PLAYER_LOG_TARGET, item_id = %item_id, "Play aborted, item lookup failed: {}", e);
            player.set_state(PlayerState::Idle);
            return false;
        }
    };

    let subtitle_track = subtitle_launch_track(&prepared.track_map, options.subtitle_stream_index, &item_id);
    let start_ticks = options.start_position_ticks.filter(|ticks| *ticks > 0);
    let request = LaunchRequest {
        url: prepared.stream_url.clone(),
        title: Some(prepared.item.display_title()),
        start_seconds: start_ticks.map(ticks_to_seconds),
        audio_track: options.audio_stream_index,
        subtitle_track,
        volume: Some(player.volume),
        muted: player.muted,
        fullscreen: player.options.fullscreen,
    };

    let run_id = match player.controller.play(request).await {
        Ok(run_id) => run_id,
        Err(e) => {
            error!(target: PLAYER_LOG_TARGET, item_id = %item_id, "Play aborted, mpv failed to start: {}", e);
            player.set_state(PlayerState::Idle);
            return false;
        }
    };

    let subtitle_stream_index = match subtitle_track {
        Some(None) => Some(-1),
        Some(Some(_)) => options.subtitle_stream_index,
        None => None,
    };
    player.active = Some(ActivePlayback {
        run_id,
        item_id: item_id.clone(),
        play_session_id: Uuid::new_v4().simple().to_string(),
        run_time_ticks: prepared.item.run_time_ticks,
        media_source: prepared.source,
        track_map: prepared.track_map,
        position_ticks: start_ticks.unwrap_or(0),
        is_paused: false,
        is_muted: player.muted,
        volume: player.volume,
        audio_stream_index: options.audio_stream_index,
        subtitle_stream_index,
    });
    player.resume = None;
    player.set_state(PlayerState::Playing);
    info!(target: PLAYER_LOG_TARGET, item_id = %item_id, run_id, "Playback started: {}", prepared.item.display_title());

    if let Some(active) = player.active.as_ref() {
        let snapshot = player.snapshot_of(active);
        player.reporter.report_playback_start(&snapshot).await;
    }
    player.throttle.record(Instant::now());

    let period = player.options.progress_interval;
    let mut timer = interval_at(Instant::now(), period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    player.progress_timer = Some(timer);
    player.publish_status();
    true
}

/// Stops mpv, reports the stop and keeps a resume point. No-op apart from the stop call when idle.
///
/// The context is taken before mpv is stopped, so the exit event of this run finds no
/// matching context and never triggers auto-advance.
#[instrument(skip(player))]
pub(crate) async fn stop_player(player: &mut Player) {
    player.progress_timer = None;

    if let Some(active) = player.active.as_mut() {
        if let Ok(seconds) = player.controller.query_position().await {
            active.position_ticks = seconds_to_ticks(seconds);
        }
    }

    let active = player.active.take();
    player.controller.stop().await;

    if let Some(active) = active {
        debug!(target: PLAYER_LOG_TARGET, item_id = %active.item_id, run_id = active.run_id, "Player stopped");
        let snapshot = player.snapshot_of(&active);
        player.reporter.report_playback_stop(&snapshot).await;
        player.resume = Some(ResumePoint {
            item_id: active.item_id,
            position_ticks: active.position_ticks,
        });
    }
}
