//! Spawning and supervising one mpv process together with its control socket.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::PlayerError;
use super::ipc::IpcConnection;
use super::{LaunchRequest, MpvConfig, PlayerEvent, MPV_LOG_TARGET, OBSERVED_PROPERTIES};

/// Exit state published by the supervisor: `None` while running, `Some(code)` once exited.
type ExitState = Option<Option<i32>>;

/// Escalation steps delivered to the supervisor, which alone holds the unreaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Terminate,
    Kill,
}

/// One launched mpv process, its socket, and the task waiting on it.
pub struct PlayerRun {
    run_id: u64,
    socket_path: PathBuf,
    ipc: Arc<IpcConnection>,
    exit_rx: watch::Receiver<ExitState>,
    signal_tx: mpsc::UnboundedSender<Signal>,
}

impl PlayerRun {
    /// Spawns mpv, waits for its socket and starts observing properties.
    #[instrument(skip(config, request, events))]
    pub async fn launch(
        config: &MpvConfig,
        request: &LaunchRequest,
        run_id: u64,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<Self, PlayerError> {
        let socket_path = std::env::temp_dir().join(format!("jellyshim-{}.sock", Uuid::new_v4()));
        let args = build_args(config, request, &socket_path);
        debug!(target: MPV_LOG_TARGET, run_id, "Spawning {} with {} arguments", config.binary, args.len());

        let mut child = Command::new(&config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::PlayerUnavailable(format!("failed to spawn '{}': {}", config.binary, e)))?;
        let pid = child.id();

        let stream = match wait_for_socket(&mut child, &socket_path, config).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                remove_socket(&socket_path);
                return Err(e);
            }
        };

        let ipc = Arc::new(IpcConnection::from_stream(stream, run_id, events.clone(), config.command_timeout));
        let (exit_tx, exit_rx) = watch::channel(None);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        tokio::spawn(supervise(child, run_id, ipc.clone(), exit_tx, signal_rx, events));

        let run = PlayerRun {
            run_id,
            socket_path,
            ipc,
            exit_rx,
            signal_tx,
        };

        for (observer_id, name) in OBSERVED_PROPERTIES.iter().enumerate() {
            if let Err(e) = run.ipc.observe_property(observer_id as u64 + 1, name).await {
                warn!(target: MPV_LOG_TARGET, run_id, "Failed to observe '{}': {}", name, e);
            }
        }

        info!(target: MPV_LOG_TARGET, run_id, pid = ?pid, "mpv started");
        Ok(run)
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn ipc(&self) -> Arc<IpcConnection> {
        self.ipc.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    async fn wait_exit(&mut self, limit: Duration) -> bool {
        let exit_rx = &mut self.exit_rx;
        let waited = tokio::time::timeout(limit, async {
            loop {
                if exit_rx.borrow_and_update().is_some() {
                    return true;
                }
                if exit_rx.changed().await.is_err() {
                    return exit_rx.borrow().is_some();
                }
            }
        })
        .await;
        matches!(waited, Ok(true))
    }

    /// Asks mpv to quit, escalating to SIGTERM and then a hard kill. Always tears down.
    #[instrument(skip(self, config), fields(run_id = self.run_id))]
    pub async fn stop(mut self, config: &MpvConfig) {
        if !self.has_exited() {
            if let Err(e) = self.ipc.command(vec![json!("quit")]).await {
                debug!(target: MPV_LOG_TARGET, "quit not acknowledged: {}", e);
            }

            if !self.wait_exit(config.quit_grace).await {
                warn!(target: MPV_LOG_TARGET, "mpv ignored quit, sending SIGTERM");
                let _ = self.signal_tx.send(Signal::Terminate);

                if !self.wait_exit(config.term_grace).await {
                    warn!(target: MPV_LOG_TARGET, "mpv ignored SIGTERM, killing");
                    let _ = self.signal_tx.send(Signal::Kill);
                    if !self.wait_exit(config.kill_grace).await {
                        warn!(target: MPV_LOG_TARGET, "mpv still running after kill");
                    }
                }
            }
        }
        self.teardown();
    }

    /// Releases the socket connection and the socket file.
    pub fn teardown(self) {
        self.ipc.close();
        remove_socket(&self.socket_path);
        debug!(target: MPV_LOG_TARGET, run_id = self.run_id, "mpv run torn down");
    }
}

fn build_args(config: &MpvConfig, request: &LaunchRequest, socket_path: &std::path::Path) -> Vec<String> {
    let mut args = vec![
        "--no-terminal".to_string(),
        "--idle=no".to_string(),
        format!("--input-ipc-server={}", socket_path.display()),
    ];
    if let Some(title) = &request.title {
        args.push(format!("--force-media-title={}", title));
    }
    if let Some(start) = request.start_seconds {
        if start > 0.0 {
            args.push(format!("--start={:.3}", start));
        }
    }
    if let Some(aid) = request.audio_track {
        args.push(format!("--aid={}", aid));
    }
    match request.subtitle_track {
        Some(Some(sid)) => args.push(format!("--sid={}", sid)),
        Some(None) => args.push("--sid=no".to_string()),
        None => {}
    }
    if let Some(volume) = request.volume {
        args.push(format!("--volume={}", volume));
    }
    if request.muted {
        args.push("--mute=yes".to_string());
    }
    if request.fullscreen {
        args.push("--fullscreen".to_string());
    }
    args.extend(config.extra_args.iter().cloned());
    args.push("--".to_string());
    args.push(request.url.clone());
    args
}

async fn wait_for_socket(
    child: &mut Child,
    socket_path: &std::path::Path,
    config: &MpvConfig,
) -> Result<UnixStream, PlayerError> {
    let deadline = Instant::now() + config.socket_timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(PlayerError::PlayerUnavailable(format!(
                "mpv exited during startup ({})",
                status
            )));
        }
        if let Ok(stream) = UnixStream::connect(socket_path).await {
            return Ok(stream);
        }
        if Instant::now() >= deadline {
            return Err(PlayerError::PlayerUnavailable(format!(
                "control socket not ready after {:?}",
                config.socket_timeout
            )));
        }
        tokio::time::sleep(config.socket_poll_interval).await;
    }
}

async fn supervise(
    mut child: Child,
    run_id: u64,
    ipc: Arc<IpcConnection>,
    exit_tx: watch::Sender<ExitState>,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    events: mpsc::UnboundedSender<PlayerEvent>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(signal) = signals.recv() => match signal {
                Signal::Terminate => terminate(&child, run_id),
                Signal::Kill => {
                    if let Err(e) = child.start_kill() {
                        warn!(target: MPV_LOG_TARGET, run_id, "Failed to kill mpv: {}", e);
                    }
                }
            },
        }
    };

    let exit_code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(target: MPV_LOG_TARGET, run_id, "Failed waiting on mpv: {}", e);
            None
        }
    };
    info!(target: MPV_LOG_TARGET, run_id, exit_code = ?exit_code, "mpv exited");

    ipc.fail_pending();
    let _ = exit_tx.send(Some(exit_code));
    let _ = events.send(PlayerEvent::Exited { run_id, exit_code });
}

/// Sends SIGTERM while the child is still unreaped; `Child::id` is `None` once it has been waited on.
fn terminate(child: &Child, run_id: u64) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: the pid comes from a child owned by this task that has not been reaped.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        warn!(target: MPV_LOG_TARGET, run_id, "SIGTERM failed: {}", std::io::Error::last_os_error());
    }
}

fn remove_socket(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(target: MPV_LOG_TARGET, "Could not remove {}: {}", path.display(), e);
        }
    }
}
