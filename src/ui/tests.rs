//! Tests for the command-line interface

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::Settings;
    use clap::Parser;

    #[test]
    fn test_args_parsing() {
        use clap::CommandFactory;
        let app = Args::command();
        app.debug_assert();
    }

    #[test]
    fn test_args_from_flags() {
        let args = Args::try_parse_from([
            "r-jellyshim",
            "--server-url",
            "http://media:8096",
            "--device-name",
            "den",
            "--mpv-path",
            "/usr/local/bin/mpv",
            "-v",
            "--log-json",
        ])
        .unwrap();

        assert_eq!(args.server_url.as_deref(), Some("http://media:8096"));
        assert_eq!(args.device_name.as_deref(), Some("den"));
        assert_eq!(args.mpv_path.as_deref(), Some("/usr/local/bin/mpv"));
        assert!(args.verbose);
        assert!(args.log_json);
        assert_eq!(args.log_level(), "debug");
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::default();
        assert!(args.server_url.is_none());
        assert!(args.api_key.is_none());
        assert!(args.password.is_none());
        assert!(args.config.is_none());
        assert!(!args.verbose);
        assert_eq!(args.log_level(), "info");
    }

    #[test]
    fn test_apply_overrides_settings() {
        let mut settings = Settings {
            server_url: "http://old:8096".to_string(),
            device_name: "old-name".to_string(),
            ..Settings::default()
        };
        let args = Args {
            server_url: Some("http://new:8096".to_string()),
            api_key: Some("token".to_string()),
            ..Args::default()
        };

        assert!(args.apply_to(&mut settings));
        assert_eq!(settings.server_url, "http://new:8096");
        assert_eq!(settings.api_key.as_deref(), Some("token"));
        assert_eq!(settings.device_name, "old-name");

        // Applying the same values again changes nothing.
        assert!(!args.apply_to(&mut settings));
    }

    #[test]
    fn test_get_password_from_args() {
        let cli = Cli {
            args: Args {
                password: Some("secret".to_string()),
                ..Args::default()
            },
        };
        assert_eq!(cli.get_password("alice").unwrap(), "secret");
    }

    #[test]
    fn test_display_error() {
        let cli = Cli { args: Args::default() };
        let error = std::io::Error::new(std::io::ErrorKind::Other, "Test error");
        cli.display_error(&error);
    }
}
