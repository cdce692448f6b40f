use super::playback_starter::{self, StartOptions};
use super::{
    seconds_to_ticks, ticks_to_seconds, EnqueuePosition, PlayRequest, Player, PlayerCommand, PlayerState,
    PLAYER_LOG_TARGET,
};
use crate::mpv::PlayerError;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

/// Entry point for every directive, in arrival order.
#[instrument(skip(player), fields(state = ?player.state))]
pub(crate) async fn handle_command(player: &mut Player, command: PlayerCommand) {
    debug!(target: PLAYER_LOG_TARGET, "Handling command: {:?}", command);

    match command {
        PlayerCommand::Play(request) => handle_play(player, request).await,
        PlayerCommand::Enqueue { item_ids, position } => handle_enqueue(player, item_ids, position).await,
        PlayerCommand::Stop => handle_stop(player).await,
        command => {
            if is_running(player).await {
                match command {
                    PlayerCommand::NextTrack => handle_next(player).await,
                    PlayerCommand::PreviousTrack => handle_previous(player).await,
                    command => handle_control(player, command).await,
                }
            } else if command.can_resume_playback() && !player.playlist.is_empty() {
                resume_from_playlist(player, command).await;
            } else {
                warn!(target: PLAYER_LOG_TARGET, "Dropping {:?}: player is not running.", command);
            }
        }
    }

    player.publish_status();
}

async fn is_running(player: &Player) -> bool {
    player.active.is_some() && player.controller.is_running().await
}

#[instrument(skip(player, request), fields(item_count = request.item_ids.len(), start_index = ?request.start_index))]
async fn handle_play(player: &mut Player, request: PlayRequest) {
    if request.item_ids.is_empty() {
        warn!(target: PLAYER_LOG_TARGET, "Ignoring Play with no items.");
        return;
    }
    info!(target: PLAYER_LOG_TARGET, "Handling Play with {} items.", request.item_ids.len());

    // The previous run is fully torn down before anything else changes.
    playback_starter::stop_player(player).await;

    let options = StartOptions {
        start_position_ticks: request.start_position_ticks,
        media_source_id: request.media_source_id,
        audio_stream_index: request.audio_stream_index,
        subtitle_stream_index: request.subtitle_stream_index,
    };
    player.playlist.replace(request.item_ids, request.start_index);
    player.resume = None;
    playback_starter::start_current(player, options).await;
}

#[instrument(skip(player, item_ids), fields(item_count = item_ids.len()))]
async fn handle_enqueue(player: &mut Player, item_ids: Vec<String>, position: EnqueuePosition) {
    if player.active.is_none() {
        info!(target: PLAYER_LOG_TARGET, "Nothing loaded, treating {:?} enqueue as Play.", position);
        let request = PlayRequest {
            item_ids,
            ..Default::default()
        };
        handle_play(player, request).await;
        return;
    }

    player.playlist.enqueue(item_ids, position);
    info!(target: PLAYER_LOG_TARGET, "Playlist now holds {} items.", player.playlist.len());
    report_progress_now(player, None).await;
}

async fn handle_stop(player: &mut Player) {
    if player.active.is_none() {
        warn!(target: PLAYER_LOG_TARGET, "Dropping Stop: player is not running.");
        return;
    }
    info!(target: PLAYER_LOG_TARGET, "Stopping playback.");
    playback_starter::stop_player(player).await;
    player.set_state(PlayerState::Idle);
}

async fn handle_next(player: &mut Player) {
    playback_starter::stop_player(player).await;
    if player.playlist.advance() {
        playback_starter::start_current(player, StartOptions::default()).await;
    } else {
        info!(target: PLAYER_LOG_TARGET, "NextTrack at the end of the playlist, stopping.");
        player.set_state(PlayerState::Idle);
    }
}

async fn handle_previous(player: &mut Player) {
    playback_starter::stop_player(player).await;
    player.playlist.retreat();
    playback_starter::start_current(player, StartOptions::default()).await;
}

/// Restarts the current playlist entry for Unpause/PlayPause/Seek arriving while nothing runs.
async fn resume_from_playlist(player: &mut Player, command: PlayerCommand) {
    // A context whose process died is cleared before restarting.
    if player.active.is_some() {
        playback_starter::stop_player(player).await;
    }

    let position_ticks = match command {
        PlayerCommand::Seek { position_ticks } => position_ticks.max(0),
        _ => match (&player.resume, player.playlist.current()) {
            (Some(resume), Some(current)) if resume.item_id == current => resume.position_ticks,
            _ => 0,
        },
    };
    info!(target: PLAYER_LOG_TARGET, "Restarting playlist entry at {} ticks for {:?}.", position_ticks, command);
    playback_starter::start_current(player, StartOptions::at_position(position_ticks)).await;
}

async fn handle_control(player: &mut Player, command: PlayerCommand) {
    let item_id = player.active.as_ref().map(|active| active.item_id.clone()).unwrap_or_default();
    match apply_control(player, &command).await {
        Ok(true) => report_progress_now(player, progress_event_name(&command)).await,
        Ok(false) => {}
        Err(e) => {
            warn!(target: PLAYER_LOG_TARGET, item_id = %item_id, "{:?} failed: {}", command, e);
        }
    }
}

/// Applies one control command to mpv and mirrors it into the context.
/// `Ok(false)` means nothing changed and no report is due.
async fn apply_control(player: &mut Player, command: &PlayerCommand) -> Result<bool, PlayerError> {
    let controller = player.controller.clone();
    match command {
        PlayerCommand::Pause | PlayerCommand::Unpause | PlayerCommand::PlayPause => {
            let paused = match command {
                PlayerCommand::Pause => true,
                PlayerCommand::Unpause => false,
                _ => !current_paused(player).await,
            };
            controller.set_pause(paused).await?;
            if let Some(active) = player.active.as_mut() {
                active.is_paused = paused;
            }
        }
        PlayerCommand::Seek { position_ticks } => {
            let position_ticks = (*position_ticks).max(0);
            controller.seek(ticks_to_seconds(position_ticks)).await?;
            if let Some(active) = player.active.as_mut() {
                active.position_ticks = position_ticks;
            }
        }
        PlayerCommand::SetVolume(volume) => set_volume(player, *volume).await?,
        PlayerCommand::VolumeUp => {
            let volume = current_volume(player).await + player.options.volume_step;
            set_volume(player, volume).await?
        }
        PlayerCommand::VolumeDown => {
            let volume = current_volume(player).await - player.options.volume_step;
            set_volume(player, volume).await?
        }
        PlayerCommand::Mute => set_mute(player, true).await?,
        PlayerCommand::Unmute => set_mute(player, false).await?,
        PlayerCommand::ToggleMute => {
            let muted = current_muted(player).await;
            set_mute(player, !muted).await?
        }
        PlayerCommand::SetAudioStreamIndex(index) => {
            controller.set_audio_track(Some(*index)).await?;
            if let Some(active) = player.active.as_mut() {
                active.audio_stream_index = Some(*index);
            }
        }
        PlayerCommand::SetSubtitleStreamIndex(index) => {
            let track = if *index < 0 {
                None
            } else {
                let mapped = player
                    .active
                    .as_ref()
                    .and_then(|active| active.track_map.subtitle_to_player(*index));
                match mapped {
                    Some(sid) => Some(sid),
                    None => {
                        warn!(target: PLAYER_LOG_TARGET, "Subtitle index {} is not a subtitle stream of the loaded item.", index);
                        return Ok(false);
                    }
                }
            };
            controller.set_subtitle_track(track).await?;
            if let Some(active) = player.active.as_mut() {
                active.subtitle_stream_index = Some(if track.is_some() { *index } else { -1 });
            }
        }
        PlayerCommand::SetFullscreen(fullscreen) => controller.set_fullscreen(*fullscreen).await?,
        PlayerCommand::ToggleFullscreen => controller.toggle_fullscreen().await?,
        PlayerCommand::Play(_)
        | PlayerCommand::Enqueue { .. }
        | PlayerCommand::Stop
        | PlayerCommand::NextTrack
        | PlayerCommand::PreviousTrack => return Ok(false),
    }
    Ok(true)
}

async fn set_volume(player: &mut Player, volume: i64) -> Result<(), PlayerError> {
    let volume = volume.clamp(0, 100);
    player.controller.set_volume(volume).await?;
    player.volume = volume;
    if let Some(active) = player.active.as_mut() {
        active.volume = volume;
    }
    Ok(())
}

async fn set_mute(player: &mut Player, muted: bool) -> Result<(), PlayerError> {
    player.controller.set_mute(muted).await?;
    player.muted = muted;
    if let Some(active) = player.active.as_mut() {
        active.is_muted = muted;
    }
    Ok(())
}

async fn current_volume(player: &Player) -> i64 {
    match player.controller.query_volume().await {
        Ok(volume) => volume.round() as i64,
        Err(e) => {
            debug!(target: PLAYER_LOG_TARGET, "Volume query failed, using last known value: {}", e);
            player.active.as_ref().map_or(player.volume, |active| active.volume)
        }
    }
}

async fn current_paused(player: &Player) -> bool {
    match player.controller.query_paused().await {
        Ok(paused) => paused,
        Err(_) => player.active.as_ref().map_or(false, |active| active.is_paused),
    }
}

async fn current_muted(player: &Player) -> bool {
    match player.controller.query_muted().await {
        Ok(muted) => muted,
        Err(_) => player.active.as_ref().map_or(player.muted, |active| active.is_muted),
    }
}

fn progress_event_name(command: &PlayerCommand) -> Option<&'static str> {
    match command {
        PlayerCommand::Pause => Some("Pause"),
        PlayerCommand::Unpause => Some("Unpause"),
        PlayerCommand::Seek { .. } => Some("TimeUpdate"),
        PlayerCommand::SetVolume(_)
        | PlayerCommand::VolumeUp
        | PlayerCommand::VolumeDown
        | PlayerCommand::Mute
        | PlayerCommand::Unmute
        | PlayerCommand::ToggleMute => Some("VolumeChange"),
        PlayerCommand::SetAudioStreamIndex(_) => Some("AudioTrackChange"),
        PlayerCommand::SetSubtitleStreamIndex(_) => Some("SubtitleTrackChange"),
        _ => None,
    }
}

/// Out-of-band report after a command; closes the throttle window so mpv's echo is not reported twice.
async fn report_progress_now(player: &mut Player, event_name: Option<&str>) {
    report_progress(player, event_name).await;
    player.throttle.record(Instant::now());
}

/// Queries mpv for position and tracks, then sends one progress report for the active context.
pub(crate) async fn report_progress(player: &mut Player, event_name: Option<&str>) {
    if player.active.is_none() {
        trace!(target: PLAYER_LOG_TARGET, "No active playback, skipping progress report.");
        return;
    }
    let controller = player.controller.clone();

    let position = controller.query_position().await.ok();
    // Track queries that fail leave the index out of the report.
    let audio = controller.query_audio_track().await.ok();
    let subtitle = controller.query_subtitle_track().await.ok();

    let Some(active) = player.active.as_mut() else {
        return;
    };
    if let Some(seconds) = position {
        active.position_ticks = seconds_to_ticks(seconds.max(0.0));
    }
    let audio_stream_index = audio.flatten();
    let subtitle_stream_index = subtitle.map(|sid| match sid {
        None => -1,
        Some(sid) => active.track_map.subtitle_from_player(sid).unwrap_or(sid),
    });
    if audio_stream_index.is_some() {
        active.audio_stream_index = audio_stream_index;
    }
    if subtitle_stream_index.is_some() {
        active.subtitle_stream_index = subtitle_stream_index;
    }

    let Some(active) = player.active.as_ref() else {
        return;
    };
    let mut snapshot = player.snapshot_of(active);
    snapshot.audio_stream_index = audio_stream_index;
    snapshot.subtitle_stream_index = subtitle_stream_index;
    player.reporter.report_playback_progress(&snapshot, event_name).await;
}
