//! Jellyfin API client implementation

use crate::jellyfin::models::{AuthResponse, DeviceIdentity, MediaItem};
use crate::jellyfin::models_playback::{
    CapabilitiesReport, PlaybackProgressReport, PlaybackStartReport, PlaybackStopReport,
};
use async_trait::async_trait;
use reqwest::{Client, Error as ReqwestError, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};
use url::Url;

const API_LOG_TARGET: &str = "r_jellyshim::jellyfin::api";

/// Error types for Jellyfin API operations
#[derive(Error, Debug)]
pub enum JellyfinError {
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Server operations the playback core depends on.
#[async_trait]
pub trait JellyfinApiContract: Send + Sync {
    /// Fetches one item including its media sources and stream lists.
    async fn get_item(&self, item_id: &str) -> Result<MediaItem, JellyfinError>;
    /// Direct-stream URL for one media source of an item.
    fn stream_url(&self, item_id: &str, media_source_id: &str) -> Result<String, JellyfinError>;
    async fn report_capabilities(&self, report: &CapabilitiesReport) -> Result<(), JellyfinError>;
    async fn report_playback_start(&self, report: &PlaybackStartReport) -> Result<(), JellyfinError>;
    async fn report_playback_progress(&self, report: &PlaybackProgressReport) -> Result<(), JellyfinError>;
    async fn report_playback_stopped(&self, report: &PlaybackStopReport) -> Result<(), JellyfinError>;
}

/// Client for interacting with Jellyfin API
#[derive(Clone)]
pub struct JellyfinClient {
    client: Client,
    server_url: String,
    api_key: Option<String>,
    user_id: Option<String>,
    identity: DeviceIdentity,
}

impl JellyfinClient {
    /// Create a new Jellyfin client with the server URL
    pub fn new(server_url: &str, identity: DeviceIdentity) -> Self {
        let client = match Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(target: API_LOG_TARGET, "Error creating HTTP client with timeout: {:?}. Falling back to default.", e);
                Client::new()
            }
        };

        let normalized_url = server_url.trim_end_matches('/').to_string();
        debug!(target: API_LOG_TARGET, "Created JellyfinClient for {}", normalized_url);

        JellyfinClient {
            client,
            server_url: normalized_url,
            api_key: None,
            user_id: None,
            identity,
        }
    }

    /// Set API key for authentication
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Set user ID for requests
    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn get_server_url(&self) -> &str {
        &self.server_url
    }

    pub fn get_api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn get_user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    // --- Private Helper Methods ---

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    fn ensure_authenticated(&self) -> Result<(&str, &str), JellyfinError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| JellyfinError::Authentication("API key not set".to_string()))?;
        let user_id = self
            .user_id
            .as_deref()
            .ok_or_else(|| JellyfinError::Authentication("User ID not set".to_string()))?;
        Ok((api_key, user_id))
    }

    /// Sends a GET request and deserializes the JSON response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<T, JellyfinError> {
        let (api_key, _) = self.ensure_authenticated()?;
        let url = self.build_url(path);
        debug!(target: API_LOG_TARGET, "GET {}", url);

        let mut request_builder = self
            .client
            .get(&url)
            .header("X-Emby-Token", api_key)
            .header("X-Emby-Authorization", self.identity.authorization_header(Some(api_key)));
        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        let response = request_builder.send().await?;
        Self::handle_response(response).await
    }

    /// Sends a POST request with a JSON body and expects a 2xx without a body on success.
    async fn post_json_no_content<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), JellyfinError> {
        let (api_key, _) = self.ensure_authenticated()?;
        let url = self.build_url(path);
        trace!(target: API_LOG_TARGET, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("X-Emby-Token", api_key)
            .header("X-Emby-Authorization", self.identity.authorization_header(Some(api_key)))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            trace!(target: API_LOG_TARGET, "POST {} succeeded with {}", path, status);
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(target: API_LOG_TARGET, "POST {} failed. Status: {}, Body: {}", path, status, error_text);
            Err(Self::status_error(status, error_text))
        }
    }

    fn status_error(status: StatusCode, body: String) -> JellyfinError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                JellyfinError::Authentication(format!("Authentication failed ({}): {}", status, body))
            }
            StatusCode::NOT_FOUND => JellyfinError::NotFound(format!("Resource not found ({}): {}", status, body)),
            _ => JellyfinError::InvalidResponse(format!("Request failed with status {}: {}", status, body)),
        }
    }

    /// Handles response status checking and JSON deserialization.
    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, JellyfinError> {
        let status = response.status();
        trace!(target: API_LOG_TARGET, "Response status: {}", status);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(target: API_LOG_TARGET, "Request failed. Status: {}, Body: {}", status, error_text);
            return Err(Self::status_error(status, error_text));
        }

        let response_text = response.text().await?;
        if response_text.is_empty() {
            return Err(JellyfinError::InvalidResponse("Empty response body received".to_string()));
        }
        serde_json::from_str::<T>(&response_text).map_err(|e| {
            error!(target: API_LOG_TARGET, "JSON parsing error: {}", e);
            JellyfinError::InvalidResponse(format!("Failed to parse JSON response: {}", e))
        })
    }

    // --- Public API Methods ---

    /// Authenticate with Jellyfin using username and password
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthResponse, JellyfinError> {
        info!(target: API_LOG_TARGET, "Authenticating user: {}", username);
        let auth_response =
            crate::jellyfin::authenticate(&self.client, &self.server_url, &self.identity, username, password)
                .await?;
        info!(target: API_LOG_TARGET, "Authentication successful for user ID: {}", auth_response.user.id);
        self.api_key = Some(auth_response.access_token.clone());
        self.user_id = Some(auth_response.user.id.clone());
        Ok(auth_response)
    }

    /// URL of the server's event socket for this device.
    pub fn socket_url(&self) -> Result<Url, JellyfinError> {
        let (api_key, _) = self.ensure_authenticated()?;
        let parsed = Url::parse(&self.server_url)
            .map_err(|e| JellyfinError::InvalidResponse(format!("Invalid server URL '{}': {}", self.server_url, e)))?;
        let scheme = if parsed.scheme() == "https" { "wss" } else { "ws" };
        let host = parsed.host_str().unwrap_or("localhost");
        let port = parsed
            .port()
            .unwrap_or(if scheme == "wss" { 443 } else { 80 });
        let path = parsed.path().trim_end_matches('/');

        let ws_url = format!(
            "{}://{}:{}{}/socket?api_key={}&deviceId={}",
            scheme,
            host,
            port,
            path,
            urlencoding::encode(api_key),
            urlencoding::encode(&self.identity.device_id)
        );
        Url::parse(&ws_url).map_err(|e| JellyfinError::InvalidResponse(format!("Invalid socket URL: {}", e)))
    }
}

#[async_trait]
impl JellyfinApiContract for JellyfinClient {
    async fn get_item(&self, item_id: &str) -> Result<MediaItem, JellyfinError> {
        let (_, user_id) = self.ensure_authenticated()?;
        let path = format!("/Users/{}/Items/{}", user_id, item_id);
        let params = [("Fields", "MediaSources,MediaStreams")];
        let item: MediaItem = self.get_json(&path, Some(&params)).await?;
        debug!(target: API_LOG_TARGET, item_id, sources = item.media_sources.len(), "Fetched item");
        Ok(item)
    }

    fn stream_url(&self, item_id: &str, media_source_id: &str) -> Result<String, JellyfinError> {
        let (api_key, _) = self.ensure_authenticated()?;
        Ok(format!(
            "{}/Videos/{}/stream?static=true&MediaSourceId={}&api_key={}",
            self.server_url,
            urlencoding::encode(item_id),
            urlencoding::encode(media_source_id),
            urlencoding::encode(api_key)
        ))
    }

    async fn report_capabilities(&self, report: &CapabilitiesReport) -> Result<(), JellyfinError> {
        debug!(target: API_LOG_TARGET, "Reporting capabilities");
        self.post_json_no_content("/Sessions/Capabilities/Full", report).await
    }

    async fn report_playback_start(&self, report: &PlaybackStartReport) -> Result<(), JellyfinError> {
        info!(target: API_LOG_TARGET, "Reporting playback start for item_id: {}", report.base.item_id);
        self.post_json_no_content("/Sessions/Playing", report).await
    }

    async fn report_playback_progress(&self, report: &PlaybackProgressReport) -> Result<(), JellyfinError> {
        trace!(
            target: API_LOG_TARGET,
            "Reporting playback progress for item_id: {}, PositionTicks: {}",
            report.base.item_id,
            report.base.position_ticks
        );
        self.post_json_no_content("/Sessions/Playing/Progress", report).await
    }

    async fn report_playback_stopped(&self, report: &PlaybackStopReport) -> Result<(), JellyfinError> {
        info!(target: API_LOG_TARGET, "Reporting playback stopped for item_id: {}", report.base.item_id);
        self.post_json_no_content("/Sessions/Playing/Stopped", report).await
    }
}

/// Replaces the value of an `api_key` query parameter so URLs can be logged.
pub fn redact_url(url: &str) -> String {
    match url.find("api_key=") {
        Some(idx) => {
            let start = idx + "api_key=".len();
            let end = url[start..].find('&').map(|i| start + i).unwrap_or(url.len());
            format!("{}[REDACTED]{}", &url[..start], &url[end..])
        }
        None => url.to_string(),
    }
}
