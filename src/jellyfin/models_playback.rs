//! Playback-related data models for Jellyfin API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::collections::HashMap;

// --- Outgoing Playback Reporting Structures (for HTTP POST) ---

/// Represents an item in the NowPlayingQueue.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct QueueItem {
    pub id: String,
    pub playlist_item_id: String,
}

/// Fields shared by the start, progress and stop reports.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackReportBase {
    pub queueable_media_types: Vec<String>,
    pub can_seek: bool,
    pub item_id: String,
    pub media_source_id: String,
    pub position_ticks: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_time_ticks: Option<i64>,
    pub volume_level: i64,
    pub is_paused: bool,
    pub is_muted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_stream_index: Option<i64>,
    pub play_method: String, // e.g., "DirectStream"
    pub play_session_id: String,
    pub playlist_index: Option<i64>,
    pub playlist_length: i64,
    pub repeat_mode: String,
    pub now_playing_queue: Vec<QueueItem>,
}

/// Full payload for reporting playback stopped via POST /Sessions/Playing/Stopped.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStopReport {
    #[serde(flatten)]
    pub base: PlaybackReportBase,
    pub failed: bool,
}

/// Full payload for reporting playback progress via POST /Sessions/Playing/Progress.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackProgressReport {
    #[serde(flatten)]
    pub base: PlaybackReportBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

/// Full payload for reporting playback start via POST /Sessions/Playing.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStartReport {
    #[serde(flatten)]
    pub base: PlaybackReportBase,
}

/// POST /Sessions/Capabilities/Full
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesReport {
    pub playable_media_types: Vec<String>,
    pub supported_commands: Vec<String>,
    pub supports_media_control: bool,
    pub supports_persistent_identifier: bool,
}

// --- Incoming WebSocket Command Structures ---

/// Outer envelope of every socket message.
#[derive(Deserialize, Debug, Clone)]
pub struct WebSocketMessage {
    #[serde(rename = "MessageType")]
    pub message_type: String,
    #[serde(rename = "Data", default)]
    pub data: Option<Value>,
}

/// Represents a general command received via WebSocket (e.g., SetVolume).
/// Argument values arrive as strings even when numeric.
#[derive(Deserialize, Debug, Clone)]
pub struct GeneralCommand {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Arguments", default)]
    pub arguments: HashMap<String, Value>,
}

impl GeneralCommand {
    pub fn argument_i64(&self, key: &str) -> Option<i64> {
        match self.arguments.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        }
    }

    pub fn argument_bool(&self, key: &str) -> Option<bool> {
        match self.arguments.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse::<bool>().ok().or_else(|| match s.trim() {
                "True" => Some(true),
                "False" => Some(false),
                _ => None,
            }),
            _ => None,
        }
    }
}

/// Represents a playback state command received via WebSocket (e.g., PlayPause, Stop, Seek).
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct PlayStateCommand {
    #[serde(rename = "Command")]
    pub command: String,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(rename = "SeekPositionTicks")]
    pub seek_position_ticks: Option<i64>,
}

/// Represents a command to initiate playback received via WebSocket (e.g., PlayNow).
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct PlayCommand {
    #[serde(rename = "PlayCommand", default)]
    pub play_command: Option<String>,
    #[serde(rename = "ItemIds", default)]
    pub item_ids: Vec<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(rename = "StartIndex")]
    pub start_index: Option<i64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(rename = "StartPositionTicks")]
    pub start_position_ticks: Option<i64>,
    #[serde(rename = "MediaSourceId", default)]
    pub media_source_id: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(rename = "AudioStreamIndex")]
    pub audio_stream_index: Option<i64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(rename = "SubtitleStreamIndex")]
    pub subtitle_stream_index: Option<i64>,
}
