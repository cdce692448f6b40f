//! Integration tests for Jellyfin client functionality
//!
//! These tests verify that the Jellyfin client components work together correctly.

use crate::test_utils::{authenticated_client, constants};
use r_jellyshim::config::Settings;
use r_jellyshim::jellyfin::{JellyfinApiContract, JellyfinClient, JellyfinError};

#[cfg(test)]
mod jellyfin_integration_tests {
    use super::*;

    #[test]
    fn test_client_init_with_settings() {
        let mut settings = Settings {
            server_url: "https://test-server.com/".to_string(),
            api_key: Some("test-api-key".to_string()),
            user_id: Some("test-user-id".to_string()),
            device_name: "den".to_string(),
            ..Settings::default()
        };
        settings.ensure_device_id();

        let client = JellyfinClient::new(&settings.server_url, settings.device_identity())
            .with_api_key("test-api-key")
            .with_user_id("test-user-id");

        assert_eq!(client.get_server_url(), "https://test-server.com");
        assert_eq!(client.get_api_key(), Some("test-api-key"));
        assert_eq!(client.get_user_id(), Some("test-user-id"));
        assert_eq!(client.identity().device_name, "den");
        assert_eq!(client.identity().device_id, settings.device_id.unwrap());
    }

    #[test]
    fn test_stream_and_socket_urls_share_credentials() {
        let client = authenticated_client("https://test-server.com/jf");

        let stream = client.stream_url("item123", "source1").unwrap();
        assert!(stream.starts_with("https://test-server.com/jf/Videos/item123/stream?static=true"));
        assert!(stream.contains(&format!("api_key={}", constants::TEST_API_KEY)));

        let socket = client.socket_url().unwrap();
        assert_eq!(socket.scheme(), "wss");
        assert_eq!(socket.path(), "/jf/socket");
        let query = socket.query().unwrap_or_default();
        assert!(query.contains(&format!("deviceId={}", constants::TEST_DEVICE_ID)));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_network_error() {
        let addr = crate::test_utils::closed_local_addr().await;
        let client = authenticated_client(&format!("http://{}", addr));

        let result = client.get_item("item123").await;
        assert!(matches!(result, Err(JellyfinError::Network(_))), "got {:?}", result.err());
    }
}
