//! Request/response correlation over the mpv control socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::error::PlayerError;
use super::protocol::{describe_command, MpvMessage, MpvRequest};
use super::{PlayerEvent, MPV_LOG_TARGET};

type ReplySlot = oneshot::Sender<Result<Value, PlayerError>>;

/// Outstanding requests keyed by request id. Once closed, no new entries are accepted.
#[derive(Default)]
struct PendingTable {
    slots: HashMap<u64, ReplySlot>,
    closed: bool,
}

impl PendingTable {
    fn fail_all(&mut self) {
        self.closed = true;
        for (_, slot) in std::mem::take(&mut self.slots) {
            let _ = slot.send(Err(PlayerError::PlayerStopped));
        }
    }
}

/// A live connection to one mpv instance.
pub struct IpcConnection {
    writer: Mutex<OwnedWriteHalf>,
    pending: Arc<StdMutex<PendingTable>>,
    next_request_id: AtomicU64,
    command_timeout: Duration,
    reader: JoinHandle<()>,
}

impl IpcConnection {
    /// Wraps an already connected socket and spawns its reader task.
    pub fn from_stream(
        stream: UnixStream,
        run_id: u64,
        events: mpsc::UnboundedSender<PlayerEvent>,
        command_timeout: Duration,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let pending = Arc::new(StdMutex::new(PendingTable::default()));
        let reader = tokio::spawn(read_loop(read_half, pending.clone(), run_id, events));

        IpcConnection {
            writer: Mutex::new(write_half),
            pending,
            next_request_id: AtomicU64::new(1),
            command_timeout,
            reader,
        }
    }

    /// Sends one command and waits for its reply.
    pub async fn command(&self, command: Vec<Value>) -> Result<Value, PlayerError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = MpvRequest { command, request_id };
        let description = request.describe();
        let line = request.to_line()?;

        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.lock_pending();
            if table.closed {
                return Err(PlayerError::PlayerStopped);
            }
            table.slots.insert(request_id, tx);
        }

        trace!(target: MPV_LOG_TARGET, request_id, "-> {}", line.trim_end());
        let write_result = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = write_result {
            self.lock_pending().slots.remove(&request_id);
            debug!(target: MPV_LOG_TARGET, request_id, "Write of '{}' failed: {}", description, e);
            return Err(PlayerError::PlayerStopped);
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => result.map_err(|e| match e {
                PlayerError::CommandFailed { reason, .. } => PlayerError::CommandFailed {
                    command: description.clone(),
                    reason,
                },
                other => other,
            }),
            Ok(Err(_)) => Err(PlayerError::PlayerStopped),
            Err(_) => {
                self.lock_pending().slots.remove(&request_id);
                warn!(target: MPV_LOG_TARGET, request_id, "Timed out waiting for '{}'", description);
                Err(PlayerError::CommandTimeout { command: description })
            }
        }
    }

    pub async fn get_property(&self, name: &str) -> Result<Value, PlayerError> {
        self.command(vec![json!("get_property"), json!(name)]).await
    }

    pub async fn set_property(&self, name: &str, value: Value) -> Result<(), PlayerError> {
        self.command(vec![json!("set_property"), json!(name), value])
            .await
            .map(|_| ())
    }

    pub async fn observe_property(&self, observer_id: u64, name: &str) -> Result<(), PlayerError> {
        self.command(vec![json!("observe_property"), json!(observer_id), json!(name)])
            .await
            .map(|_| ())
    }

    /// Fails every outstanding request with `PlayerStopped` and refuses new ones.
    pub fn fail_pending(&self) {
        self.lock_pending().fail_all();
    }

    /// True once the socket hung up or the pending table was drained.
    pub fn is_closed(&self) -> bool {
        self.lock_pending().closed
    }

    /// Stops the reader and drains the pending table. Safe to call more than once.
    pub fn close(&self) {
        self.reader.abort();
        self.fail_pending();
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for IpcConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    pending: Arc<StdMutex<PendingTable>>,
    run_id: u64,
    events: mpsc::UnboundedSender<PlayerEvent>,
) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                trace!(target: MPV_LOG_TARGET, run_id, "<- {}", line);
                dispatch_line(&line, &pending, run_id, &events);
            }
            Ok(None) => {
                debug!(target: MPV_LOG_TARGET, run_id, "mpv closed the control socket");
                break;
            }
            Err(e) => {
                warn!(target: MPV_LOG_TARGET, run_id, "Error reading from mpv socket: {}", e);
                break;
            }
        }
    }

    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .fail_all();
}

fn dispatch_line(
    line: &str,
    pending: &StdMutex<PendingTable>,
    run_id: u64,
    events: &mpsc::UnboundedSender<PlayerEvent>,
) {
    let message = match MpvMessage::parse(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(target: MPV_LOG_TARGET, run_id, "Ignoring mpv line: {}", e);
            return;
        }
    };

    match message {
        MpvMessage::Reply { request_id, result } => {
            let slot = pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .slots
                .remove(&request_id);
            match slot {
                Some(slot) => {
                    let result = result.map_err(|reason| PlayerError::CommandFailed {
                        command: describe_command(&[]),
                        reason,
                    });
                    let _ = slot.send(result);
                }
                None => debug!(target: MPV_LOG_TARGET, run_id, request_id, "Reply for unknown or expired request"),
            }
        }
        MpvMessage::PropertyChange { name, value } => {
            let _ = events.send(PlayerEvent::PropertyChanged { run_id, name, value });
        }
        MpvMessage::Event { event } => {
            trace!(target: MPV_LOG_TARGET, run_id, "mpv event: {}", event);
        }
    }
}
