//! Integration tests for Jellyfin API client
//!
//! These tests require a running Jellyfin server and are marked with #[ignore]
//! To run these tests: cargo test --test jellyfin_api_integration -- --ignored
//!
//! Requires (from the environment or a `.env` file):
//! - JELLYFIN_TEST_URL: URL of the Jellyfin server
//! - JELLYFIN_TEST_USERNAME: Username for authentication
//! - JELLYFIN_TEST_PASSWORD: Password for authentication
//! - JELLYFIN_TEST_ITEM_ID: (optional) an item to look up

use r_jellyshim::jellyfin::{
    ChannelConfig, ChannelEvent, DeviceIdentity, EventChannel, JellyfinApiContract, JellyfinClient, SessionManager,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;

struct LiveConfig {
    server_url: String,
    username: String,
    password: String,
}

fn live_config() -> Option<LiveConfig> {
    dotenv::dotenv().ok();
    match (
        env::var("JELLYFIN_TEST_URL"),
        env::var("JELLYFIN_TEST_USERNAME"),
        env::var("JELLYFIN_TEST_PASSWORD"),
    ) {
        (Ok(server_url), Ok(username), Ok(password)) => Some(LiveConfig {
            server_url,
            username,
            password,
        }),
        _ => {
            eprintln!("Skipping integration test: environment variables not set");
            None
        }
    }
}

async fn login(config: &LiveConfig) -> JellyfinClient {
    let mut client = JellyfinClient::new(&config.server_url, DeviceIdentity::new("r-jellyshim-test", "test-host"));
    let auth_response = client
        .authenticate(&config.username, &config.password)
        .await
        .expect("authentication failed");
    assert!(!auth_response.access_token.is_empty(), "Access token should not be empty");
    assert!(!auth_response.user.id.is_empty(), "User ID should not be empty");
    client
}

#[tokio::test]
#[ignore] // Integration test requiring a running server
async fn test_authentication_and_capabilities() {
    let Some(config) = live_config() else { return };
    let client = login(&config).await;

    client
        .report_capabilities(&SessionManager::capabilities())
        .await
        .expect("capabilities report failed");
}

#[tokio::test]
#[ignore] // Integration test requiring a running server
async fn test_item_lookup() {
    let Some(config) = live_config() else { return };
    let Ok(item_id) = env::var("JELLYFIN_TEST_ITEM_ID") else {
        eprintln!("Skipping item lookup: JELLYFIN_TEST_ITEM_ID not set");
        return;
    };
    let client = login(&config).await;

    let item = client.get_item(&item_id).await.expect("item lookup failed");
    assert_eq!(item.id, item_id);
    let source = item.select_source(None).expect("item has no media source");
    let url = client.stream_url(&item.id, &source.id).expect("stream url");
    assert!(url.contains(&item.id));
}

#[tokio::test]
#[ignore] // Integration test requiring a running server
async fn test_event_channel_connects() {
    let Some(config) = live_config() else { return };
    let client = Arc::new(login(&config).await);

    let url = client.socket_url().expect("socket url");
    let (channel, mut events) = EventChannel::start(ChannelConfig::new(url).with_max_attempts(2));
    tokio::time::timeout(Duration::from_secs(15), channel.ready())
        .await
        .expect("timed out connecting")
        .expect("event channel failed");

    let first = events.recv().await;
    assert_eq!(first, Some(ChannelEvent::Connected { connection: 1 }));
    channel.close().await;
}
