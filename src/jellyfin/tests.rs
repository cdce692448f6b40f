//! Unit tests for Jellyfin API client

#[cfg(test)]
mod tests {
    use crate::jellyfin::{
        parse_message, redact_url, DeviceIdentity, InboundMessage, JellyfinApiContract, JellyfinClient, MediaItem,
        SessionManager, StreamKind,
    };
    use crate::player::{EnqueuePosition, PlayRequest, PlayerCommand};

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("device-1", "living-room")
    }

    #[test]
    fn test_client_creation() {
        let client = JellyfinClient::new("http://localhost:8096/", identity());
        assert_eq!(client.get_server_url(), "http://localhost:8096");
        assert!(client.get_api_key().is_none());
        assert!(client.get_user_id().is_none());
    }

    #[test]
    fn test_client_with_credentials() {
        let client = JellyfinClient::new("http://localhost:8096", identity())
            .with_api_key("test_api_key")
            .with_user_id("test_user_id");
        assert_eq!(client.get_api_key(), Some("test_api_key"));
        assert_eq!(client.get_user_id(), Some("test_user_id"));
    }

    #[test]
    fn test_stream_url() {
        let client = JellyfinClient::new("http://localhost:8096", identity())
            .with_api_key("test_api_key")
            .with_user_id("u");
        let url = client.stream_url("item123", "source9").unwrap();
        assert_eq!(
            url,
            "http://localhost:8096/Videos/item123/stream?static=true&MediaSourceId=source9&api_key=test_api_key"
        );
    }

    #[test]
    fn test_stream_url_requires_credentials() {
        let client = JellyfinClient::new("http://localhost:8096", identity());
        assert!(client.stream_url("item123", "source9").is_err());
    }

    #[test]
    fn test_socket_url_plain_http() {
        let client = JellyfinClient::new("http://localhost:8096", identity())
            .with_api_key("key")
            .with_user_id("u");
        let url = client.socket_url().unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8096/socket?api_key=key&deviceId=device-1");
    }

    #[test]
    fn test_socket_url_https_with_base_path() {
        let client = JellyfinClient::new("https://media.example.com/jellyfin/", identity())
            .with_api_key("key")
            .with_user_id("u");
        let url = client.socket_url().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.port_or_known_default(), Some(443));
        assert_eq!(url.path(), "/jellyfin/socket");
        assert_eq!(url.query(), Some("api_key=key&deviceId=device-1"));
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("http://h/Videos/1/stream?static=true&api_key=secret&x=1"),
            "http://h/Videos/1/stream?static=true&api_key=[REDACTED]&x=1"
        );
        assert_eq!(redact_url("ws://h/socket?api_key=secret"), "ws://h/socket?api_key=[REDACTED]");
        assert_eq!(redact_url("http://h/Items"), "http://h/Items");
    }

    #[test]
    fn test_authorization_header() {
        let header = identity().authorization_header(Some("tok"));
        assert!(header.starts_with("MediaBrowser Client=\""));
        assert!(header.contains("Device=\"living-room\""));
        assert!(header.contains("DeviceId=\"device-1\""));
        assert!(header.ends_with("Token=\"tok\""));
        assert!(!identity().authorization_header(None).contains("Token"));
    }

    #[test]
    fn test_authorization_header_encodes_device_name() {
        let identity = DeviceIdentity::new("device-1", "Living Room \"TV\" \u{e9}");
        let header = identity.authorization_header(Some("tok"));
        assert!(header.contains("Device=\"Living%20Room%20%22TV%22%20%C3%A9\""), "{}", header);
        assert!(reqwest::header::HeaderValue::from_str(&header).is_ok());
    }

    #[test]
    fn test_media_item_deserializes_streams() {
        let json = r#"{
            "Id": "abc",
            "Name": "Pilot",
            "SeriesName": "Show",
            "RunTimeTicks": 600000000,
            "MediaSources": [{
                "Id": "src1",
                "MediaStreams": [
                    {"Index": 0, "Type": "Video", "Codec": "h264"},
                    {"Index": 1, "Type": "Audio", "Language": "eng"},
                    {"Index": 2, "Type": "Subtitle", "DisplayTitle": "English"},
                    {"Index": 3, "Type": "EmbeddedImage"}
                ]
            }]
        }"#;
        let item: MediaItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.display_title(), "Show - Pilot");
        let source = item.select_source(Some("missing")).unwrap();
        assert_eq!(source.id, "src1");
        let kinds: Vec<StreamKind> = source.media_streams.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StreamKind::Video, StreamKind::Audio, StreamKind::Subtitle, StreamKind::Other]
        );
    }

    #[test]
    fn test_envelope_without_message_type_is_dropped() {
        assert_eq!(parse_message(r#"{"Data":{"Name":"SetVolume"}}"#), InboundMessage::Ignored);
        assert_eq!(parse_message("not json"), InboundMessage::Ignored);
    }

    #[test]
    fn test_unknown_message_types_are_ignored() {
        assert_eq!(
            parse_message(r#"{"MessageType":"UserDataChanged","Data":{}}"#),
            InboundMessage::Ignored
        );
    }

    #[test]
    fn test_general_command_accepts_string_and_numeric_arguments() {
        let as_string = r#"{"MessageType":"GeneralCommand","Data":{"Name":"SetVolume","Arguments":{"Volume":"55"}}}"#;
        assert_eq!(parse_message(as_string), InboundMessage::Directive(PlayerCommand::SetVolume(55)));

        let as_number = r#"{"MessageType":"GeneralCommand","Data":{"Name":"SetVolume","Arguments":{"Volume":40}}}"#;
        assert_eq!(parse_message(as_number), InboundMessage::Directive(PlayerCommand::SetVolume(40)));

        let subtitle =
            r#"{"MessageType":"GeneralCommand","Data":{"Name":"SetSubtitleStreamIndex","Arguments":{"Index":"-1"}}}"#;
        assert_eq!(
            parse_message(subtitle),
            InboundMessage::Directive(PlayerCommand::SetSubtitleStreamIndex(-1))
        );
    }

    #[test]
    fn test_general_command_missing_argument_is_ignored() {
        let json = r#"{"MessageType":"GeneralCommand","Data":{"Name":"SetAudioStreamIndex","Arguments":{}}}"#;
        assert_eq!(parse_message(json), InboundMessage::Ignored);
    }

    #[test]
    fn test_play_now_decodes_optional_fields() {
        let json = r#"{"MessageType":"Play","Data":{
            "PlayCommand":"PlayNow",
            "ItemIds":["a","b","c"],
            "StartIndex":"1",
            "StartPositionTicks":50000000,
            "MediaSourceId":"src",
            "SubtitleStreamIndex":3
        }}"#;
        let expected = PlayerCommand::Play(PlayRequest {
            item_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            start_index: Some(1),
            start_position_ticks: Some(50_000_000),
            media_source_id: Some("src".to_string()),
            audio_stream_index: None,
            subtitle_stream_index: Some(3),
        });
        assert_eq!(parse_message(json), InboundMessage::Directive(expected));
    }

    #[test]
    fn test_play_next_and_last_enqueue() {
        let next = r#"{"MessageType":"Play","Data":{"PlayCommand":"PlayNext","ItemIds":["x"]}}"#;
        assert_eq!(
            parse_message(next),
            InboundMessage::Directive(PlayerCommand::Enqueue {
                item_ids: vec!["x".to_string()],
                position: EnqueuePosition::Next,
            })
        );
        let last = r#"{"MessageType":"Play","Data":{"PlayCommand":"PlayLast","ItemIds":["y"]}}"#;
        assert_eq!(
            parse_message(last),
            InboundMessage::Directive(PlayerCommand::Enqueue {
                item_ids: vec!["y".to_string()],
                position: EnqueuePosition::Last,
            })
        );
    }

    #[test]
    fn test_play_with_no_items_is_ignored() {
        let json = r#"{"MessageType":"Play","Data":{"PlayCommand":"PlayNow","ItemIds":[]}}"#;
        assert_eq!(parse_message(json), InboundMessage::Ignored);
    }

    #[test]
    fn test_playstate_commands() {
        let seek = r#"{"MessageType":"Playstate","Data":{"Command":"Seek","SeekPositionTicks":"1200000000"}}"#;
        assert_eq!(
            parse_message(seek),
            InboundMessage::Directive(PlayerCommand::Seek { position_ticks: 1_200_000_000 })
        );
        let next = r#"{"MessageType":"Playstate","Data":{"Command":"PlayNext"}}"#;
        assert_eq!(parse_message(next), InboundMessage::Directive(PlayerCommand::NextTrack));
        let play = r#"{"MessageType":"Playstate","Data":{"Command":"Play"}}"#;
        assert_eq!(parse_message(play), InboundMessage::Directive(PlayerCommand::Unpause));
        let seek_without_position = r#"{"MessageType":"Playstate","Data":{"Command":"Seek"}}"#;
        assert_eq!(parse_message(seek_without_position), InboundMessage::Ignored);
    }

    #[test]
    fn test_keepalive_messages() {
        assert_eq!(
            parse_message(r#"{"MessageType":"ForceKeepAlive","Data":60}"#),
            InboundMessage::KeepAlive { timeout_secs: Some(60) }
        );
        assert_eq!(
            parse_message(r#"{"MessageType":"KeepAlive"}"#),
            InboundMessage::KeepAlive { timeout_secs: None }
        );
    }

    #[test]
    fn test_capabilities_cover_remote_commands() {
        let report = SessionManager::capabilities();
        assert!(report.supports_media_control);
        assert_eq!(report.playable_media_types, vec!["Video".to_string(), "Audio".to_string()]);
        for command in ["SetVolume", "SetSubtitleStreamIndex", "SetAudioStreamIndex", "ToggleFullscreen"] {
            assert!(report.supported_commands.iter().any(|c| c == command), "missing {}", command);
        }
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("SupportedCommands").is_some());
    }

    #[tokio::test]
    async fn test_item_lookup_without_credentials_fails() {
        let client = JellyfinClient::new("http://localhost:8096", identity());
        let err = client.get_item("abc").await.unwrap_err();
        assert!(err.to_string().contains("Authentication"));
    }
}
