//! Translation between the server's absolute stream positions and mpv's per-kind track ids.
//!
//! The server addresses a stream by its position in the media source's full stream list.
//! mpv numbers tracks of each kind separately, starting at 1 in container order.

use crate::jellyfin::models::{MediaStream, StreamKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackIndexMap {
    /// (absolute index, kind) ordered by index.
    streams: Vec<(i64, StreamKind)>,
}

impl TrackIndexMap {
    pub fn from_streams(streams: &[MediaStream]) -> Self {
        let mut streams: Vec<(i64, StreamKind)> = streams.iter().map(|s| (s.index, s.kind)).collect();
        streams.sort_by_key(|(index, _)| *index);
        TrackIndexMap { streams }
    }

    /// Builds a map whose absolute indices are the positions in `kinds`.
    pub fn from_kinds(kinds: Vec<StreamKind>) -> Self {
        TrackIndexMap {
            streams: kinds.into_iter().enumerate().map(|(i, kind)| (i as i64, kind)).collect(),
        }
    }

    /// Subtitle index to mpv `sid`. `None` when the index is unknown or not a subtitle.
    pub fn subtitle_to_player(&self, index: i64) -> Option<i64> {
        let mut sid = 0;
        for (stream_index, kind) in &self.streams {
            if *kind == StreamKind::Subtitle {
                sid += 1;
            }
            if *stream_index == index {
                return (*kind == StreamKind::Subtitle).then_some(sid);
            }
        }
        None
    }

    /// mpv `sid` back to the absolute index. `None` when there are fewer subtitle streams.
    pub fn subtitle_from_player(&self, sid: i64) -> Option<i64> {
        if sid < 1 {
            return None;
        }
        self.streams
            .iter()
            .filter(|(_, kind)| *kind == StreamKind::Subtitle)
            .nth((sid - 1) as usize)
            .map(|(index, _)| *index)
    }

    pub fn subtitle_count(&self) -> usize {
        self.streams.iter().filter(|(_, kind)| *kind == StreamKind::Subtitle).count()
    }
}
