//! Jellyfin authentication implementation

use reqwest::{header, Client, StatusCode};

use crate::jellyfin::api::JellyfinError;
use crate::jellyfin::models::{AuthRequest, AuthResponse, DeviceIdentity};

/// Handles authentication with a Jellyfin server
pub async fn authenticate(
    client: &Client,
    server_url: &str,
    identity: &DeviceIdentity,
    username: &str,
    password: &str,
) -> Result<AuthResponse, JellyfinError> {
    let server_url = server_url.trim_end_matches('/');
    let auth_url = format!("{}/Users/AuthenticateByName", server_url);

    let auth_request = AuthRequest {
        username: username.to_string(),
        pw: password.to_string(),
    };

    let authorization = header::HeaderValue::from_str(&identity.authorization_header(None))
        .map_err(|e| JellyfinError::Authentication(format!("Invalid device identity: {}", e)))?;
    let mut headers = header::HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
    headers.insert("X-Emby-Authorization", authorization);

    let response = client
        .post(&auth_url)
        .headers(headers)
        .json(&auth_request)
        .send()
        .await?;

    match response.status() {
        StatusCode::OK => {
            let response_text = response.text().await?;
            serde_json::from_str::<AuthResponse>(&response_text)
                .map_err(|e| JellyfinError::InvalidResponse(format!("Failed to parse auth response: {}", e)))
        }
        status => {
            let error_text = response.text().await.unwrap_or_default();
            Err(JellyfinError::Authentication(format!("Login failed ({}): {}", status, error_text)))
        }
    }
}
