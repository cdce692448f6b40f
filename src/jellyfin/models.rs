//! Data models for Jellyfin API responses

use serde::{Deserialize, Serialize};

/// Represents a media item as returned by `/Users/{userId}/Items/{itemId}`
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct MediaItem {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub media_type: String,
    #[serde(rename = "SeriesName", default)]
    pub series_name: Option<String>,
    #[serde(rename = "RunTimeTicks", default)]
    pub run_time_ticks: Option<i64>, // Duration in 100-nanosecond units
    #[serde(rename = "MediaSources", default)]
    pub media_sources: Vec<MediaSource>,
}

impl MediaItem {
    /// Title shown by the player window.
    pub fn display_title(&self) -> String {
        match &self.series_name {
            Some(series) if !series.is_empty() => format!("{} - {}", series, self.name),
            _ => self.name.clone(),
        }
    }

    /// The requested media source, or the first one when absent or unknown.
    pub fn select_source(&self, requested: Option<&str>) -> Option<&MediaSource> {
        requested
            .and_then(|id| self.media_sources.iter().find(|source| source.id == id))
            .or_else(|| self.media_sources.first())
    }
}

/// One concrete encoded representation of an item.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct MediaSource {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "MediaStreams", default)]
    pub media_streams: Vec<MediaStream>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
    Subtitle,
    #[serde(other)]
    Other,
}

/// One track inside a media source, addressed by its absolute `Index`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MediaStream {
    #[serde(rename = "Index")]
    pub index: i64,
    #[serde(rename = "Type")]
    pub kind: StreamKind,
    #[serde(rename = "Codec", default)]
    pub codec: Option<String>,
    #[serde(rename = "Language", default)]
    pub language: Option<String>,
    #[serde(rename = "DisplayTitle", default)]
    pub display_title: Option<String>,
}

/// Represents authentication request for Jellyfin
#[derive(Deserialize, Serialize, Debug)]
pub struct AuthRequest {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Pw")]
    pub pw: String,
}

/// Represents authentication response from Jellyfin
#[derive(Deserialize, Serialize, Debug)]
pub struct AuthResponse {
    #[serde(rename = "User")]
    pub user: User,
    #[serde(rename = "AccessToken")]
    pub access_token: String,
    #[serde(rename = "ServerId", default)]
    pub server_id: Option<String>,
}

/// Represents a user in Jellyfin
#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
}

/// How this device presents itself to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub client_name: String,
    pub client_version: String,
    pub device_id: String,
    pub device_name: String,
}

impl DeviceIdentity {
    pub fn new(device_id: &str, device_name: &str) -> Self {
        DeviceIdentity {
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
        }
    }

    /// Value for the `X-Emby-Authorization` header, optionally carrying the access token.
    /// Identity fields are percent-encoded so any device name yields a valid header value.
    pub fn authorization_header(&self, token: Option<&str>) -> String {
        let mut header = format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\"",
            urlencoding::encode(&self.client_name),
            urlencoding::encode(&self.device_name),
            urlencoding::encode(&self.device_id),
            urlencoding::encode(&self.client_version)
        );
        if let Some(token) = token {
            header.push_str(&format!(", Token=\"{}\"", token));
        }
        header
    }
}
