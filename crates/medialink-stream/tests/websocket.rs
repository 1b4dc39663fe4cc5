use std::time::Duration;

use futures_util::SinkExt;
use medialink_stream::{ConnectionState, EventStreamClient, StreamConfig, WILDCARD};
use medialink_test_support::fixtures::Recorder;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn websocket_connector_streams_text_frames() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let mut socket = accept_async(stream).await?;
        socket
            .send(Message::text(
                r#"{"type":"progress","data":{"pct":50}}"#.to_string(),
            ))
            .await?;
        socket.send(Message::binary(vec![1_u8, 2, 3])).await?;
        socket
            .send(Message::text(r#"{"type":"done"}"#.to_string()))
            .await?;
        socket.close(None).await?;
        anyhow::Ok(())
    });

    let config = StreamConfig::new(&format!("http://{addr}"))?
        .with_reconnect_delay(Duration::from_secs(60));
    let client = EventStreamClient::new(config);
    let seen = Recorder::new();
    let _sub = client.subscribe(WILDCARD, seen.handler());
    let mut latest = client.watch_last_message();
    let mut states = client.watch_connection_state();

    client.connect();
    timeout(
        WAIT,
        latest.wait_for(|message| message.as_ref().is_some_and(|m| m.kind == "done")),
    )
    .await??;
    timeout(
        WAIT,
        states.wait_for(|state| *state == ConnectionState::Disconnected),
    )
    .await??;
    timeout(WAIT, server).await???;

    assert_eq!(
        seen.values(),
        vec![
            json!({"type": "progress", "data": {"pct": 50}}),
            json!({"type": "done"}),
        ]
    );
    client.disconnect();
    Ok(())
}

#[tokio::test]
async fn refused_websocket_connection_reports_disconnected() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let config = StreamConfig::new(&format!("http://{addr}"))?
        .with_reconnect_delay(Duration::from_secs(60));
    let client = EventStreamClient::new(config);
    let mut states = client.watch_connection_state();

    client.connect();
    assert_eq!(client.connection_state(), ConnectionState::Connecting);
    timeout(
        WAIT,
        states.wait_for(|state| *state == ConnectionState::Disconnected),
    )
    .await??;
    assert!(client.last_message().is_none());
    client.disconnect();
    Ok(())
}
