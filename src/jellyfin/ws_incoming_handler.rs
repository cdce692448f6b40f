//! Decodes incoming WebSocket messages from the Jellyfin server into player directives.

use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use super::models_playback::{GeneralCommand, PlayCommand, PlayStateCommand, WebSocketMessage};
use super::websocket::WS_LOG_TARGET;
use crate::player::{EnqueuePosition, PlayRequest, PlayerCommand};

/// What one inbound text frame amounts to.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Directive(PlayerCommand),
    /// Server heartbeat; `timeout_secs` is set for `ForceKeepAlive`.
    KeepAlive { timeout_secs: Option<u64> },
    Ignored,
}

/// Parses one text frame. Malformed frames and frames without `MessageType` are dropped.
pub fn parse_message(text: &str) -> InboundMessage {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(target: WS_LOG_TARGET, "Dropping non-JSON message: {}", e);
            return InboundMessage::Ignored;
        }
    };
    if value.get("MessageType").and_then(Value::as_str).is_none() {
        warn!(target: WS_LOG_TARGET, "Dropping message without MessageType");
        return InboundMessage::Ignored;
    }
    let message: WebSocketMessage = match serde_json::from_value(value) {
        Ok(message) => message,
        Err(e) => {
            warn!(target: WS_LOG_TARGET, "Dropping malformed envelope: {}", e);
            return InboundMessage::Ignored;
        }
    };

    match message.message_type.as_str() {
        "ForceKeepAlive" => InboundMessage::KeepAlive {
            timeout_secs: message.data.as_ref().and_then(Value::as_u64),
        },
        "KeepAlive" => InboundMessage::KeepAlive { timeout_secs: None },
        "Play" => decode::<PlayCommand>(message.data, "Play")
            .and_then(handle_play_command)
            .map_or(InboundMessage::Ignored, InboundMessage::Directive),
        "Playstate" | "PlayState" => decode::<PlayStateCommand>(message.data, "Playstate")
            .and_then(handle_playstate_command)
            .map_or(InboundMessage::Ignored, InboundMessage::Directive),
        "GeneralCommand" => decode::<GeneralCommand>(message.data, "GeneralCommand")
            .and_then(handle_general_command)
            .map_or(InboundMessage::Ignored, InboundMessage::Directive),
        other => {
            trace!(target: WS_LOG_TARGET, "Ignoring message type: {}", other);
            InboundMessage::Ignored
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: Option<Value>, kind: &str) -> Option<T> {
    let data = match data {
        Some(data) => data,
        None => {
            warn!(target: WS_LOG_TARGET, "{} message without Data", kind);
            return None;
        }
    };
    match serde_json::from_value(data) {
        Ok(command) => Some(command),
        Err(e) => {
            warn!(target: WS_LOG_TARGET, "Failed to decode {} payload: {}", kind, e);
            None
        }
    }
}

/// Handles "GeneralCommand" messages like SetVolume, SetSubtitleStreamIndex.
#[instrument(skip_all, fields(command_name = %command.name))]
pub(super) fn handle_general_command(command: GeneralCommand) -> Option<PlayerCommand> {
    debug!(target: WS_LOG_TARGET, "Handling GeneralCommand: {}", command.name);

    let player_command = match command.name.as_str() {
        "SetVolume" => command.argument_i64("Volume").map(PlayerCommand::SetVolume),
        "VolumeUp" => Some(PlayerCommand::VolumeUp),
        "VolumeDown" => Some(PlayerCommand::VolumeDown),
        "Mute" => Some(PlayerCommand::Mute),
        "Unmute" => Some(PlayerCommand::Unmute),
        "ToggleMute" => Some(PlayerCommand::ToggleMute),
        "SetAudioStreamIndex" => command.argument_i64("Index").map(PlayerCommand::SetAudioStreamIndex),
        "SetSubtitleStreamIndex" => command.argument_i64("Index").map(PlayerCommand::SetSubtitleStreamIndex),
        "ToggleFullscreen" => Some(PlayerCommand::ToggleFullscreen),
        "SetFullscreen" => command
            .argument_bool("Fullscreen")
            .or_else(|| command.argument_bool("Enabled"))
            .map(PlayerCommand::SetFullscreen),
        _ => {
            debug!(target: WS_LOG_TARGET, "Unhandled GeneralCommand name: {}", command.name);
            return None;
        }
    };

    if player_command.is_none() {
        warn!(target: WS_LOG_TARGET, "GeneralCommand {} is missing a usable argument", command.name);
    }
    player_command
}

/// Handles "Playstate" messages like PlayPause, NextTrack, Stop, Seek.
#[instrument(skip_all, fields(command_name = %command.command))]
pub(super) fn handle_playstate_command(command: PlayStateCommand) -> Option<PlayerCommand> {
    debug!(target: WS_LOG_TARGET, "Handling Playstate command: {}", command.command);

    match command.command.as_str() {
        "Pause" => Some(PlayerCommand::Pause),
        "Unpause" | "Play" => Some(PlayerCommand::Unpause),
        "PlayPause" => Some(PlayerCommand::PlayPause),
        "Stop" | "StopMedia" => Some(PlayerCommand::Stop),
        "NextTrack" | "PlayNext" => Some(PlayerCommand::NextTrack),
        "PreviousTrack" => Some(PlayerCommand::PreviousTrack),
        "Seek" => match command.seek_position_ticks {
            Some(position_ticks) => Some(PlayerCommand::Seek { position_ticks }),
            None => {
                warn!(target: WS_LOG_TARGET, "Seek without SeekPositionTicks");
                None
            }
        },
        _ => {
            debug!(target: WS_LOG_TARGET, "Unhandled Playstate command: {}", command.command);
            None
        }
    }
}

/// Handles "Play" messages to start or queue playback.
#[instrument(skip_all, fields(item_count = command.item_ids.len()))]
pub(super) fn handle_play_command(command: PlayCommand) -> Option<PlayerCommand> {
    if command.item_ids.is_empty() {
        warn!(target: WS_LOG_TARGET, "Received Play command with empty ItemIds list.");
        return None;
    }

    match command.play_command.as_deref().unwrap_or("PlayNow") {
        "PlayNow" | "PlayInstantMix" | "PlayShuffle" => Some(PlayerCommand::Play(PlayRequest {
            item_ids: command.item_ids,
            start_index: command.start_index,
            start_position_ticks: command.start_position_ticks,
            media_source_id: command.media_source_id,
            audio_stream_index: command.audio_stream_index,
            subtitle_stream_index: command.subtitle_stream_index,
        })),
        "PlayNext" => Some(PlayerCommand::Enqueue {
            item_ids: command.item_ids,
            position: EnqueuePosition::Next,
        }),
        "PlayLast" => Some(PlayerCommand::Enqueue {
            item_ids: command.item_ids,
            position: EnqueuePosition::Last,
        }),
        other => {
            warn!(target: WS_LOG_TARGET, "Unhandled Play command type: {}", other);
            None
        }
    }
}
