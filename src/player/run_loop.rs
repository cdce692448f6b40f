// src/player/run_loop.rs
use super::{command_handler, event_handler, playback_starter, Player, PlayerState, PLAYER_LOG_TARGET};
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Runs the player's command processing loop.
pub async fn run_player_loop(player: &mut Player, cancel: CancellationToken) {
    info!(target: PLAYER_LOG_TARGET, "Player run loop started.");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(target: PLAYER_LOG_TARGET, "Shutdown requested. Exiting run loop.");
                break;
            }

            // --- Player events (exit, property changes) ---
            Some(event) = player.player_events.recv() => {
                trace!(target: PLAYER_LOG_TARGET, "Received player event: {:?}", event);
                event_handler::handle_player_event(player, event).await;
            }

            // --- Directive processing ---
            command = player.command_rx.recv() => match command {
                Some(command) => command_handler::handle_command(player, command).await,
                None => {
                    info!(target: PLAYER_LOG_TARGET, "Command channel closed. Exiting run loop.");
                    break;
                }
            },

            // --- Periodic progress reporting ---
            _ = next_tick(&mut player.progress_timer) => {
                trace!(target: PLAYER_LOG_TARGET, "Progress report interval ticked.");
                command_handler::report_progress(player, Some("TimeUpdate")).await;
            }
        }
    }

    info!(target: PLAYER_LOG_TARGET, "Player run loop finished. Performing final cleanup.");
    playback_starter::stop_player(player).await;
    player.set_state(PlayerState::Idle);
    player.publish_status();
    debug!(target: PLAYER_LOG_TARGET, "Player task cleanup complete.");
}

/// Next tick of the progress timer; never resolves while no timer is armed.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
