// src/player/item_fetcher.rs
use crate::jellyfin::api::{redact_url, JellyfinApiContract, JellyfinError};
use crate::jellyfin::models::{MediaItem, MediaSource};
use crate::player::{TrackIndexMap, PLAYER_LOG_TARGET};
use tracing::{debug, error, info, instrument};

/// An item resolved far enough to hand to mpv.
pub(crate) struct PreparedItem {
    pub item: MediaItem,
    pub source: MediaSource,
    pub track_map: TrackIndexMap,
    pub stream_url: String,
}

/// Looks the item up, picks its media source and builds the stream URL.
/// Errors are returned to the caller, which abandons the start.
#[instrument(skip(jellyfin_client))]
pub(crate) async fn prepare_item(
    jellyfin_client: &dyn JellyfinApiContract,
    item_id: &str,
    media_source_id: Option<&str>,
) -> Result<PreparedItem, JellyfinError> {
    let item = jellyfin_client.get_item(item_id).await.map_err(|e| {
        error!(target: PLAYER_LOG_TARGET, "Failed to fetch item {}: {}", item_id, e);
        e
    })?;
    info!(target: PLAYER_LOG_TARGET, "Fetched item: {} ({})", item.name, item.id);

    let source = item
        .select_source(media_source_id)
        .cloned()
        .ok_or_else(|| JellyfinError::InvalidResponse(format!("Item {} has no media sources", item_id)))?;
    if let Some(requested) = media_source_id {
        if requested != source.id {
            debug!(target: PLAYER_LOG_TARGET, "Media source {} not found, using {}", requested, source.id);
        }
    }

    let track_map = TrackIndexMap::from_streams(&source.media_streams);
    let stream_url = jellyfin_client.stream_url(&item.id, &source.id)?;
    debug!(target: PLAYER_LOG_TARGET, "Got stream URL: {}", redact_url(&stream_url));

    Ok(PreparedItem {
        item,
        source,
        track_map,
        stream_url,
    })
}
