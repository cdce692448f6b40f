//! Session wiring without a live server.

use crate::test_utils::{authenticated_client, closed_local_addr};
use r_jellyshim::jellyfin::{ChannelError, DeviceIdentity, JellyfinClient};
use r_jellyshim::session::{SessionConfig, ShimError, ShimSession};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn config_with_attempts(reconnect_max_attempts: u32) -> SessionConfig {
    SessionConfig {
        reconnect_max_attempts,
        ..SessionConfig::default()
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_fails_when_server_is_unreachable() {
        let addr = closed_local_addr().await;
        let client = Arc::new(authenticated_client(&format!("http://{}", addr)));
        let session = ShimSession::new(config_with_attempts(1), client);

        let result = timeout(Duration::from_secs(10), session.run()).await.unwrap();
        assert!(matches!(
            result,
            Err(ShimError::Channel(ChannelError::ConnectionExhausted { attempts: 1 }))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_cleanly() {
        let addr = closed_local_addr().await;
        let client = Arc::new(authenticated_client(&format!("http://{}", addr)));
        let session = ShimSession::new(config_with_attempts(5), client);

        session.shutdown();
        session.shutdown();
        assert!(session.is_shutdown());

        let result = timeout(Duration::from_secs(10), session.run()).await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_without_credentials_is_rejected() {
        let client = Arc::new(JellyfinClient::new("http://localhost:8096", DeviceIdentity::new("dev", "host")));
        let session = ShimSession::new(SessionConfig::default(), client);

        let result = session.run().await;
        assert!(matches!(result, Err(ShimError::Jellyfin(_))));
    }
}
