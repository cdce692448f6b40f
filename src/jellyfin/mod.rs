//! Jellyfin API client module for interacting with Jellyfin media server

pub mod api;
mod auth;
pub mod models;
pub mod models_playback;
pub mod reporter;
pub mod session;
pub mod websocket;
mod ws_incoming_handler;
#[cfg(test)]
mod tests;

pub use api::*;
pub use auth::*;
pub use models::*;
pub use models_playback::*;
pub use session::SessionManager;
pub use websocket::{ChannelConfig, ChannelError, ChannelEvent, ChannelState, EventChannel};
pub use ws_incoming_handler::{parse_message, InboundMessage};
