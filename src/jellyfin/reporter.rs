use std::sync::Arc;
use tracing::{error, info, instrument, trace, warn};

use crate::jellyfin::api::{JellyfinApiContract, JellyfinError};
use crate::jellyfin::models_playback::{
    PlaybackProgressReport, PlaybackReportBase, PlaybackStartReport, PlaybackStopReport, QueueItem,
};

const REPORTER_LOG_TARGET: &str = "r_jellyshim::jellyfin::reporter";

/// Represents the state needed to build playback reports.
/// Built by the orchestrator so reporting never touches its internal state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStateSnapshot {
    pub item_id: String,
    pub media_source_id: String,
    pub play_session_id: String,
    pub position_ticks: i64,
    pub is_paused: bool,
    pub is_muted: bool,
    pub volume: i64,
    pub audio_stream_index: Option<i64>,
    pub subtitle_stream_index: Option<i64>,
    pub run_time_ticks: Option<i64>,
    pub queue: Vec<String>,
    pub queue_index: usize,
}

/// Handles reporting playback status updates to the Jellyfin server.
/// Every call is best effort: failures are logged and swallowed.
pub struct JellyfinReporter {
    jellyfin_client: Arc<dyn JellyfinApiContract>,
}

impl JellyfinReporter {
    pub fn new(jellyfin_client: Arc<dyn JellyfinApiContract>) -> Self {
        Self { jellyfin_client }
    }

    fn build_report_base(state: &PlaybackStateSnapshot) -> PlaybackReportBase {
        let now_playing_queue = state
            .queue
            .iter()
            .enumerate()
            .map(|(idx, id)| QueueItem {
                id: id.clone(),
                playlist_item_id: format!("playlistItem{}", idx),
            })
            .collect();

        PlaybackReportBase {
            queueable_media_types: vec!["Video".to_string(), "Audio".to_string()],
            can_seek: true,
            item_id: state.item_id.clone(),
            media_source_id: state.media_source_id.clone(),
            position_ticks: state.position_ticks,
            run_time_ticks: state.run_time_ticks,
            volume_level: state.volume,
            is_paused: state.is_paused,
            is_muted: state.is_muted,
            audio_stream_index: state.audio_stream_index,
            subtitle_stream_index: state.subtitle_stream_index,
            play_method: "DirectStream".to_string(),
            play_session_id: state.play_session_id.clone(),
            playlist_index: Some(state.queue_index as i64),
            playlist_length: state.queue.len() as i64,
            repeat_mode: "RepeatNone".to_string(),
            now_playing_queue,
        }
    }

    /// Reports playback start via HTTP POST.
    #[instrument(skip(self, state), fields(item_id = %state.item_id))]
    pub async fn report_playback_start(&self, state: &PlaybackStateSnapshot) {
        let start_report = PlaybackStartReport {
            base: Self::build_report_base(state),
        };

        match self.jellyfin_client.report_playback_start(&start_report).await {
            Ok(_) => info!(target: REPORTER_LOG_TARGET, "Reported playback start successfully."),
            Err(e) => error!(target: REPORTER_LOG_TARGET, "Failed to report playback start: {}", e),
        }
    }

    /// Reports playback stop via HTTP POST.
    #[instrument(skip(self, state), fields(item_id = %state.item_id, position_ticks = state.position_ticks))]
    pub async fn report_playback_stop(&self, state: &PlaybackStateSnapshot) {
        let mut base = Self::build_report_base(state);
        base.is_paused = false;
        let stop_report = PlaybackStopReport { base, failed: false };

        match self.jellyfin_client.report_playback_stopped(&stop_report).await {
            Ok(_) => info!(target: REPORTER_LOG_TARGET, "Reported playback stop successfully."),
            Err(e) => error!(target: REPORTER_LOG_TARGET, "Failed to report playback stop: {}", e),
        }
    }

    /// Reports playback progress via HTTP POST.
    #[instrument(skip(self, state, event_name), fields(item_id = %state.item_id))]
    pub async fn report_playback_progress(&self, state: &PlaybackStateSnapshot, event_name: Option<&str>) {
        let progress_report = PlaybackProgressReport {
            base: Self::build_report_base(state),
            event_name: event_name.map(str::to_string),
        };

        match self.jellyfin_client.report_playback_progress(&progress_report).await {
            Ok(_) => trace!(target: REPORTER_LOG_TARGET, "Reported playback progress successfully."),
            Err(JellyfinError::Network(e)) if e.is_timeout() => {
                warn!(target: REPORTER_LOG_TARGET, "Timeout reporting progress: {}", e);
            }
            Err(e) => {
                error!(target: REPORTER_LOG_TARGET, "Failed to report playback progress: {}", e);
            }
        }
    }
}
