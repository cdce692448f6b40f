// src/player/event_handler.rs
use crate::mpv::PlayerEvent;
use crate::player::{command_handler, playback_starter, seconds_to_ticks, Player, PlayerState, PLAYER_LOG_TARGET};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

pub(crate) async fn handle_player_event(player: &mut Player, event: PlayerEvent) {
    match event {
        PlayerEvent::PropertyChanged { run_id, name, value } => {
            handle_property_change(player, run_id, &name, value).await
        }
        PlayerEvent::Exited { run_id, exit_code } => handle_exit(player, run_id, exit_code).await,
    }
    player.publish_status();
}

async fn handle_property_change(player: &mut Player, run_id: u64, name: &str, value: Value) {
    let active = match player.active.as_mut() {
        Some(active) if active.run_id == run_id => active,
        _ => {
            trace!(target: PLAYER_LOG_TARGET, run_id, name, "Ignoring property change from a stale run");
            return;
        }
    };

    let event_name = match name {
        "time-pos" => {
            if let Some(seconds) = value.as_f64() {
                active.position_ticks = seconds_to_ticks(seconds.max(0.0));
            }
            None
        }
        "pause" => value.as_bool().map(|paused| {
            active.is_paused = paused;
            if paused {
                "Pause"
            } else {
                "Unpause"
            }
        }),
        "volume" => value.as_f64().map(|volume| {
            let volume = volume.round() as i64;
            active.volume = volume;
            player.volume = volume;
            "VolumeChange"
        }),
        "mute" => value.as_bool().map(|muted| {
            active.is_muted = muted;
            player.muted = muted;
            "VolumeChange"
        }),
        other => {
            trace!(target: PLAYER_LOG_TARGET, "Unobserved property change: {}", other);
            None
        }
    };

    if let Some(event_name) = event_name {
        if player.throttle.try_acquire(Instant::now()) {
            command_handler::report_progress(player, Some(event_name)).await;
        } else {
            trace!(target: PLAYER_LOG_TARGET, name, "Progress report throttled");
        }
    }
}

/// Exit of the run that owns the context: report the stop and move on along the playlist,
/// including after an item mpv could not play.
/// Runs stopped by the orchestrator itself have already lost their context and land in the stale branch.
#[instrument(skip(player))]
async fn handle_exit(player: &mut Player, run_id: u64, exit_code: Option<i32>) {
    match player.active.as_ref() {
        Some(active) if active.run_id == run_id => {}
        _ => {
            debug!(target: PLAYER_LOG_TARGET, "Ignoring exit of a stale run");
            return;
        }
    }

    match exit_code {
        Some(0) => info!(target: PLAYER_LOG_TARGET, "mpv reached the end of the item"),
        Some(code) => warn!(target: PLAYER_LOG_TARGET, "mpv gave up on the item with exit code {}", code),
        None => warn!(target: PLAYER_LOG_TARGET, "mpv was terminated by a signal"),
    }
    playback_starter::stop_player(player).await;

    // A signal from outside the shim parks the playlist; any exit code moves on.
    if exit_code.is_some() && player.playlist.advance() {
        info!(target: PLAYER_LOG_TARGET, "Auto-advancing to playlist index {:?}", player.playlist.index());
        playback_starter::start_current(player, Default::default()).await;
    } else {
        player.set_state(PlayerState::Idle);
    }
}
