//! Event channel against a local websocket server.

use crate::test_utils::{closed_local_addr, fast_channel_config};
use futures_util::{SinkExt, StreamExt};
use r_jellyshim::jellyfin::{ChannelError, ChannelEvent, EventChannel};
use r_jellyshim::player::PlayerCommand;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::error::UrlError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_async, connect_async};
use url::Url;

const KEEPALIVE: &str = r#"{"MessageType":"KeepAlive"}"#;

async fn next_event(events: &mut UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a channel event")
        .expect("channel event stream ended")
}

fn socket_url(addr: std::net::SocketAddr) -> Url {
    Url::parse(&format!("ws://{}/socket?api_key=test&deviceId=dev", addr)).unwrap()
}

#[cfg(test)]
mod event_channel_tests {
    use super::*;

    #[tokio::test]
    async fn test_directives_arrive_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let first = ws.next().await.unwrap().unwrap();

            let frames = [
                r#"{"MessageType":"ForceKeepAlive","Data":60}"#,
                r#"{"MessageType":"Play","Data":{"PlayCommand":"PlayNow","ItemIds":["a","b"],"StartIndex":1}}"#,
                "this is not json",
                r#"{"MessageType":"Playstate","Data":{"Command":"Pause"}}"#,
            ];
            for frame in frames {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }
            // Stay up until the client closes.
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
            }
            first
        });

        let (channel, mut events) = EventChannel::start(fast_channel_config(socket_url(addr), 3));
        channel.ready().await.unwrap();

        assert_eq!(next_event(&mut events).await, ChannelEvent::Connected { connection: 1 });
        assert_eq!(next_event(&mut events).await, ChannelEvent::KeepAlive);
        match next_event(&mut events).await {
            ChannelEvent::Directive(PlayerCommand::Play(request)) => {
                assert_eq!(request.item_ids, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(request.start_index, Some(1));
            }
            other => panic!("expected Play, got {:?}", other),
        }
        // The malformed frame is dropped without ending the connection.
        assert_eq!(next_event(&mut events).await, ChannelEvent::Directive(PlayerCommand::Pause));

        channel.close().await;
        channel.close().await;

        let first = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert_eq!(first, Message::Text(KEEPALIVE.to_string()));
        assert!(channel.state().borrow().closed);
    }

    #[tokio::test]
    async fn test_reconnects_after_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = ws.next().await;
            ws.close(None).await.unwrap();

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"MessageType":"GeneralCommand","Data":{"Name":"SetVolume","Arguments":{"Volume":"40"}}}"#.to_string(),
            ))
            .await
            .unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
            }
        });

        let (channel, mut events) = EventChannel::start(fast_channel_config(socket_url(addr), 3));

        assert_eq!(next_event(&mut events).await, ChannelEvent::Connected { connection: 1 });
        assert_eq!(next_event(&mut events).await, ChannelEvent::Connected { connection: 2 });
        assert_eq!(
            next_event(&mut events).await,
            ChannelEvent::Directive(PlayerCommand::SetVolume(40))
        );
        assert_eq!(channel.state().borrow().connections, 2);

        channel.close().await;
        timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let addr = closed_local_addr().await;
        let (channel, mut events) = EventChannel::start(fast_channel_config(socket_url(addr), 2));

        assert_eq!(
            channel.ready().await,
            Err(ChannelError::ConnectionExhausted { attempts: 2 })
        );
        assert_eq!(
            next_event(&mut events).await,
            ChannelEvent::Failed(ChannelError::ConnectionExhausted { attempts: 2 })
        );

        channel.close().await;
        let state = channel.state().borrow().clone();
        assert_eq!(state.connections, 0);
        assert_eq!(state.exhausted, Some(2));
        assert!(state.closed);
    }

    #[tokio::test]
    async fn test_wss_url_opens_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Reads the first record the client sends, then hangs up.
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut first = [0u8; 1];
            stream.read_exact(&mut first).await.unwrap();
            first[0]
        });

        let url = Url::parse(&format!("wss://127.0.0.1:{}/socket?api_key=test&deviceId=dev", addr.port())).unwrap();
        let (channel, mut events) = EventChannel::start(fast_channel_config(url, 1));

        // 0x16 opens a TLS handshake record.
        let record_type = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert_eq!(record_type, 0x16);

        assert_eq!(
            next_event(&mut events).await,
            ChannelEvent::Failed(ChannelError::ConnectionExhausted { attempts: 1 })
        );
        channel.close().await;
    }

    #[tokio::test]
    async fn test_wss_connect_error_is_not_a_missing_tls_feature() {
        let addr = closed_local_addr().await;
        let url = format!("wss://127.0.0.1:{}/socket", addr.port());

        let err = connect_async(url.as_str()).await.unwrap_err();
        assert!(
            !matches!(err, WsError::Url(UrlError::TlsFeatureNotEnabled)),
            "wss support is not compiled in: {:?}",
            err
        );
    }
}
