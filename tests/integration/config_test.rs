//! Integration tests for configuration management
//!
//! These tests verify that the configuration system works correctly
//! across module boundaries.

use r_jellyshim::config::Settings;
use r_jellyshim::ui::Args;
use std::error::Error;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Load, override from the command line, persist the login, load again.
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        let mut settings = Settings::load(&config_path)?;
        let args = Args {
            server_url: Some("https://jellyfin-server.example.com".to_string()),
            username: Some("integration-test-user".to_string()),
            mpv_path: Some("/usr/bin/mpv".to_string()),
            ..Args::default()
        };
        assert!(args.apply_to(&mut settings));
        assert!(settings.ensure_device_id());
        settings.validate()?;

        // What main stores after a password login.
        settings.api_key = Some("integration-test-token".to_string());
        settings.user_id = Some("integration-test-user-id".to_string());
        settings.save(&config_path)?;

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded.server_url, "https://jellyfin-server.example.com");
        assert_eq!(loaded.api_key.as_deref(), Some("integration-test-token"));
        assert_eq!(loaded.user_id.as_deref(), Some("integration-test-user-id"));
        assert_eq!(loaded.mpv_path, "/usr/bin/mpv");
        assert_eq!(loaded.device_id, settings.device_id);

        // A restart keeps the same device id.
        let mut restarted = loaded.clone();
        assert!(!restarted.ensure_device_id());
        assert_eq!(restarted.device_id, settings.device_id);

        Ok(())
    }

    /// Test invalid configuration handling
    #[test]
    fn test_invalid_config_validation() {
        let invalid_settings = Settings {
            server_url: "".to_string(),
            api_key: Some("test-key".to_string()),
            ..Settings::default()
        };

        let result = invalid_settings.validate();
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("URL cannot be empty"));
        }

        let no_auth_settings = Settings {
            server_url: "https://example.com".to_string(),
            api_key: None,
            username: None,
            ..Settings::default()
        };
        assert!(no_auth_settings.validate().is_err());
    }

    #[test]
    fn test_settings_feed_session_config() {
        let settings = Settings {
            api_key: Some("test-key".to_string()),
            fullscreen: true,
            reconnect_max_attempts: 3,
            ..Settings::default()
        };
        let config = settings.session_config();
        assert!(config.player.fullscreen);
        assert_eq!(config.reconnect_max_attempts, 3);
        assert_eq!(config.mpv.binary, "mpv");
    }
}
