use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument};

use super::error::PlayerError;
use super::ipc::IpcConnection;
use super::process::PlayerRun;
use super::protocol::track_id_from_value;
use super::{LaunchRequest, MediaPlayerControl, MpvConfig, PlayerEvent, MPV_LOG_TARGET};

/// Owns at most one mpv process at a time.
pub struct MpvController {
    config: MpvConfig,
    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    current: Mutex<Option<PlayerRun>>,
    next_run_id: AtomicU64,
}

impl MpvController {
    /// Creates the controller and the receiving end of its event stream.
    pub fn new(config: MpvConfig) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = MpvController {
            config,
            events_tx,
            current: Mutex::new(None),
            next_run_id: AtomicU64::new(1),
        };
        (controller, events_rx)
    }

    /// Connection of the live run, or `NotRunning` once the process or its socket is gone.
    async fn live_ipc(&self) -> Result<Arc<IpcConnection>, PlayerError> {
        let current = self.current.lock().await;
        match current.as_ref() {
            Some(run) if !run.has_exited() => {
                let ipc = run.ipc();
                if ipc.is_closed() {
                    Err(PlayerError::NotRunning)
                } else {
                    Ok(ipc)
                }
            }
            _ => Err(PlayerError::NotRunning),
        }
    }

    async fn set(&self, name: &str, value: Value) -> Result<(), PlayerError> {
        self.live_ipc().await?.set_property(name, value).await
    }

    async fn get(&self, name: &str) -> Result<Value, PlayerError> {
        self.live_ipc().await?.get_property(name).await
    }

    async fn get_f64(&self, name: &str) -> Result<f64, PlayerError> {
        let value = self.get(name).await?;
        value
            .as_f64()
            .ok_or_else(|| PlayerError::Protocol(format!("'{}' is not a number: {}", name, value)))
    }

    async fn get_bool(&self, name: &str) -> Result<bool, PlayerError> {
        let value = self.get(name).await?;
        value
            .as_bool()
            .ok_or_else(|| PlayerError::Protocol(format!("'{}' is not a boolean: {}", name, value)))
    }
}

#[async_trait]
impl MediaPlayerControl for MpvController {
    #[instrument(skip(self, request), fields(title = ?request.title))]
    async fn play(&self, request: LaunchRequest) -> Result<u64, PlayerError> {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            debug!(target: MPV_LOG_TARGET, run_id = previous.run_id(), "Stopping previous mpv before launch");
            previous.stop(&self.config).await;
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let run = PlayerRun::launch(&self.config, &request, run_id, self.events_tx.clone()).await?;
        *current = Some(run);
        Ok(run_id)
    }

    async fn stop(&self) {
        let run = self.current.lock().await.take();
        if let Some(run) = run {
            info!(target: MPV_LOG_TARGET, run_id = run.run_id(), "Stopping mpv");
            run.stop(&self.config).await;
        }
    }

    async fn is_running(&self) -> bool {
        self.live_ipc().await.is_ok()
    }

    async fn set_pause(&self, paused: bool) -> Result<(), PlayerError> {
        self.set("pause", json!(paused)).await
    }

    async fn seek(&self, seconds: f64) -> Result<(), PlayerError> {
        self.live_ipc()
            .await?
            .command(vec![json!("seek"), json!(seconds), json!("absolute")])
            .await
            .map(|_| ())
    }

    async fn set_volume(&self, volume: i64) -> Result<(), PlayerError> {
        self.set("volume", json!(volume)).await
    }

    async fn set_mute(&self, muted: bool) -> Result<(), PlayerError> {
        self.set("mute", json!(muted)).await
    }

    async fn set_audio_track(&self, track: Option<i64>) -> Result<(), PlayerError> {
        self.set("aid", track.map_or(json!("no"), |id| json!(id))).await
    }

    async fn set_subtitle_track(&self, track: Option<i64>) -> Result<(), PlayerError> {
        self.set("sid", track.map_or(json!("no"), |id| json!(id))).await
    }

    async fn set_fullscreen(&self, fullscreen: bool) -> Result<(), PlayerError> {
        self.set("fullscreen", json!(fullscreen)).await
    }

    async fn toggle_fullscreen(&self) -> Result<(), PlayerError> {
        self.live_ipc()
            .await?
            .command(vec![json!("cycle"), json!("fullscreen")])
            .await
            .map(|_| ())
    }

    async fn query_position(&self) -> Result<f64, PlayerError> {
        self.get_f64("time-pos").await
    }

    async fn query_paused(&self) -> Result<bool, PlayerError> {
        self.get_bool("pause").await
    }

    async fn query_muted(&self) -> Result<bool, PlayerError> {
        self.get_bool("mute").await
    }

    async fn query_volume(&self) -> Result<f64, PlayerError> {
        self.get_f64("volume").await
    }

    async fn query_audio_track(&self) -> Result<Option<i64>, PlayerError> {
        Ok(track_id_from_value(&self.get("aid").await?))
    }

    async fn query_subtitle_track(&self) -> Result<Option<i64>, PlayerError> {
        Ok(track_id_from_value(&self.get("sid").await?))
    }
}
