//! Supervised local mpv instance controlled over its JSON IPC socket.

mod controller;
mod error;
mod ipc;
mod process;
mod protocol;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub use controller::MpvController;
pub use error::PlayerError;
pub use ipc::IpcConnection;
pub use protocol::{track_id_from_value, MpvMessage, MpvRequest};

pub(crate) const MPV_LOG_TARGET: &str = "r_jellyshim::mpv";

/// Properties observed on every run; changes arrive as [`PlayerEvent::PropertyChanged`].
pub const OBSERVED_PROPERTIES: [&str; 4] = ["time-pos", "pause", "volume", "mute"];

/// Notifications pushed by the controller. `run_id` identifies the mpv launch they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    PropertyChanged { run_id: u64, name: String, value: Value },
    Exited { run_id: u64, exit_code: Option<i32> },
}

/// Everything needed to start one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchRequest {
    pub url: String,
    pub title: Option<String>,
    pub start_seconds: Option<f64>,
    /// mpv `aid`.
    pub audio_track: Option<i64>,
    /// mpv `sid`; `Some(None)` disables subtitles, `None` leaves mpv's default.
    pub subtitle_track: Option<Option<i64>>,
    pub volume: Option<i64>,
    pub muted: bool,
    pub fullscreen: bool,
}

/// Timeouts and launch options for the controller.
#[derive(Debug, Clone)]
pub struct MpvConfig {
    pub binary: String,
    pub extra_args: Vec<String>,
    pub socket_timeout: Duration,
    pub socket_poll_interval: Duration,
    pub command_timeout: Duration,
    pub quit_grace: Duration,
    pub term_grace: Duration,
    pub kill_grace: Duration,
}

impl Default for MpvConfig {
    fn default() -> Self {
        MpvConfig {
            binary: "mpv".to_string(),
            extra_args: Vec::new(),
            socket_timeout: Duration::from_secs(5),
            socket_poll_interval: Duration::from_millis(100),
            command_timeout: Duration::from_secs(5),
            quit_grace: Duration::from_secs(3),
            term_grace: Duration::from_secs(2),
            kill_grace: Duration::from_secs(2),
        }
    }
}

/// Control surface the orchestrator drives. Track ids are mpv-native and passed through untouched.
#[async_trait]
pub trait MediaPlayerControl: Send + Sync {
    /// Stops any running instance, launches a new one and returns its run id.
    async fn play(&self, request: LaunchRequest) -> Result<u64, PlayerError>;
    /// Stops the running instance if any. Idempotent.
    async fn stop(&self);
    async fn is_running(&self) -> bool;

    async fn set_pause(&self, paused: bool) -> Result<(), PlayerError>;
    async fn seek(&self, seconds: f64) -> Result<(), PlayerError>;
    async fn set_volume(&self, volume: i64) -> Result<(), PlayerError>;
    async fn set_mute(&self, muted: bool) -> Result<(), PlayerError>;
    async fn set_audio_track(&self, track: Option<i64>) -> Result<(), PlayerError>;
    async fn set_subtitle_track(&self, track: Option<i64>) -> Result<(), PlayerError>;
    async fn set_fullscreen(&self, fullscreen: bool) -> Result<(), PlayerError>;
    async fn toggle_fullscreen(&self) -> Result<(), PlayerError>;

    async fn query_position(&self) -> Result<f64, PlayerError>;
    async fn query_paused(&self) -> Result<bool, PlayerError>;
    async fn query_muted(&self) -> Result<bool, PlayerError>;
    async fn query_volume(&self) -> Result<f64, PlayerError>;
    async fn query_audio_track(&self) -> Result<Option<i64>, PlayerError>;
    async fn query_subtitle_track(&self) -> Result<Option<i64>, PlayerError>;
}
