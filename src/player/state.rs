use crate::jellyfin::models::MediaSource;

use super::track_map::TrackIndexMap;

/// Directives the orchestrator accepts, decoded from the server's socket messages.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play(PlayRequest),
    Enqueue { item_ids: Vec<String>, position: EnqueuePosition },
    Pause,
    Unpause,
    PlayPause,
    Stop,
    Seek { position_ticks: i64 },
    NextTrack,
    PreviousTrack,
    SetVolume(i64),
    VolumeUp,
    VolumeDown,
    Mute,
    Unmute,
    ToggleMute,
    SetAudioStreamIndex(i64),
    SetSubtitleStreamIndex(i64),
    SetFullscreen(bool),
    ToggleFullscreen,
}

impl PlayerCommand {
    /// Commands that may restart playback from the playlist when nothing is running.
    pub fn can_resume_playback(&self) -> bool {
        matches!(self, PlayerCommand::Unpause | PlayerCommand::PlayPause | PlayerCommand::Seek { .. })
    }
}

/// Payload of a PlayNow directive. Stream indices are the server's absolute positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayRequest {
    pub item_ids: Vec<String>,
    pub start_index: Option<i64>,
    pub start_position_ticks: Option<i64>,
    pub media_source_id: Option<String>,
    pub audio_stream_index: Option<i64>,
    pub subtitle_stream_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePosition {
    Next,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Starting,
    Playing,
}

/// Published after every directive and player event.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub item_id: Option<String>,
    pub playlist_index: Option<usize>,
    pub playlist_len: usize,
}

/// Ordered item ids plus the current position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    items: Vec<String>,
    index: usize,
}

impl Playlist {
    /// Replaces the playlist. An out-of-range start falls back to the first item.
    pub fn replace(&mut self, items: Vec<String>, start_index: Option<i64>) {
        let index = start_index
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < items.len())
            .unwrap_or(0);
        self.items = items;
        self.index = index;
    }

    pub fn enqueue(&mut self, mut ids: Vec<String>, position: EnqueuePosition) {
        match position {
            EnqueuePosition::Last => self.items.append(&mut ids),
            EnqueuePosition::Next => {
                let at = if self.items.is_empty() { 0 } else { self.index + 1 };
                self.items.splice(at..at, ids);
            }
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.items.get(self.index).map(String::as_str)
    }

    pub fn index(&self) -> Option<usize> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.index)
        }
    }

    pub fn has_next(&self) -> bool {
        !self.items.is_empty() && self.index + 1 < self.items.len()
    }

    /// Moves forward one entry. Returns false at the end, leaving the index unchanged.
    pub fn advance(&mut self) -> bool {
        if self.has_next() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Moves back one entry, stopping at the first item.
    pub fn retreat(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }
}

/// Everything known about the item currently loaded in mpv.
#[derive(Debug, Clone)]
pub struct ActivePlayback {
    pub run_id: u64,
    pub item_id: String,
    pub media_source: MediaSource,
    pub play_session_id: String,
    pub run_time_ticks: Option<i64>,
    pub track_map: TrackIndexMap,
    pub position_ticks: i64,
    pub is_paused: bool,
    pub is_muted: bool,
    pub volume: i64,
    pub audio_stream_index: Option<i64>,
    pub subtitle_stream_index: Option<i64>,
}

/// Where the last context ended, so a later Unpause can pick up from there.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    pub item_id: String,
    pub position_ticks: i64,
}
