use std::collections::BTreeSet;
use std::future;
use std::io::Write;

use anyhow::anyhow;
use medialink_stream::{EventStreamClient, InboundMessage, StreamConfig, Subscription, WILDCARD};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cli::TailArgs;
use crate::client::{CliError, CliResult};
use crate::output::{TailFormat, render_message};

pub(crate) async fn handle_tail(
    config: StreamConfig,
    args: TailArgs,
    out: impl Write,
) -> CliResult<()> {
    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c; tail runs until killed");
            future::pending::<()>().await;
        }
    };
    stream_events(EventStreamClient::new(config), &args, out, interrupted).await
}

/// Print messages until `interrupted` resolves or the limit is reached.
pub(crate) async fn stream_events<W: Write>(
    client: EventStreamClient,
    args: &TailArgs,
    mut out: W,
    interrupted: impl Future<Output = ()>,
) -> CliResult<()> {
    let (sender, mut messages) = mpsc::unbounded_channel();
    let subscriptions = subscribe_all(&client, &args.event, &sender);
    drop(sender);

    let mut states = client.watch_connection_state();
    client.connect();
    let format = args.format();
    let mut printed = 0_usize;
    tokio::pin!(interrupted);

    let result = 'tail: loop {
        if args.limit.is_some_and(|limit| printed >= limit) {
            break Ok(());
        }
        tokio::select! {
            () = &mut interrupted => break 'tail Ok(()),
            changed = states.changed() => {
                if changed.is_err() {
                    break 'tail Ok(());
                }
                let state = *states.borrow_and_update();
                eprintln!("stream {state}: {}", client.endpoint());
            }
            message = messages.recv() => {
                let Some(message) = message else {
                    break 'tail Ok(());
                };
                if let Err(err) = write_message(&mut out, &message, format) {
                    break 'tail Err(err);
                }
                printed += 1;
            }
        }
    };

    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    client.disconnect();
    result
}

fn write_message(
    out: &mut impl Write,
    message: &InboundMessage,
    format: TailFormat,
) -> CliResult<()> {
    let text = render_message(message, format)?;
    writeln!(out, "{text}")
        .and_then(|()| out.flush())
        .map_err(|err| CliError::failure(anyhow!("failed to write event: {err}")))
}

/// Kinds to subscribe to; `None` means every kind through the wildcard.
fn normalized_kinds(kinds: &[String]) -> Option<BTreeSet<String>> {
    let kinds: BTreeSet<String> = kinds
        .iter()
        .map(|kind| kind.trim().to_string())
        .filter(|kind| !kind.is_empty())
        .collect();
    if kinds.is_empty() || kinds.contains(WILDCARD) {
        None
    } else {
        Some(kinds)
    }
}

fn subscribe_all(
    client: &EventStreamClient,
    kinds: &[String],
    sender: &mpsc::UnboundedSender<InboundMessage>,
) -> Vec<Subscription> {
    let Some(kinds) = normalized_kinds(kinds) else {
        let sender = sender.clone();
        return vec![client.subscribe(WILDCARD, move |envelope: &Value| {
            match serde_json::from_value::<InboundMessage>(envelope.clone()) {
                Ok(message) => {
                    let _ = sender.send(message);
                }
                Err(err) => debug!(error = %err, "skipping envelope that does not decode"),
            }
        })];
    };

    kinds
        .into_iter()
        .map(|kind| {
            let sender = sender.clone();
            let label = kind.clone();
            client.subscribe(kind, move |data: &Value| {
                let data = (!data.is_null()).then(|| data.clone());
                let _ = sender.send(InboundMessage::new(label.clone(), data));
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    async fn serve(frames: Vec<&'static str>) -> anyhow::Result<(StreamConfig, JoinHandle<()>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut socket) = accept_async(stream).await else {
                return;
            };
            for frame in frames {
                if socket.send(Message::text(frame.to_string())).await.is_err() {
                    return;
                }
            }
            // Hold the connection open until the client goes away.
            while let Some(Ok(_)) = socket.next().await {}
        });
        let config = StreamConfig::new(&format!("http://{addr}"))?;
        Ok((config, server))
    }

    #[test]
    fn wildcard_or_empty_filters_follow_everything() {
        assert!(normalized_kinds(&[]).is_none());
        assert!(normalized_kinds(&["rss_match".into(), "*".into()]).is_none());
        assert!(normalized_kinds(&[" ".into()]).is_none());
        let kinds = normalized_kinds(&[
            "rss_match".into(),
            "rss_match".into(),
            "link:complete".into(),
        ])
        .expect("explicit kinds");
        assert_eq!(
            kinds.into_iter().collect::<Vec<_>>(),
            vec!["link:complete".to_string(), "rss_match".to_string()]
        );
    }

    #[tokio::test]
    async fn tail_prints_filtered_events_as_json_lines() -> anyhow::Result<()> {
        let (config, server) = serve(vec![
            r#"{"type":"progress","data":{"pct":10}}"#,
            r#"{"type":"rss_match","data":{"ruleName":"shows"}}"#,
            r#"{"type":"progress"}"#,
        ])
        .await?;
        let args = TailArgs {
            event: vec!["progress".into()],
            limit: Some(2),
            ..TailArgs::default()
        };
        let mut out = Vec::new();
        let client = EventStreamClient::new(config);
        timeout(
            Duration::from_secs(5),
            stream_events(client.clone(), &args, &mut out, future::pending()),
        )
        .await?
        .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(
            String::from_utf8(out)?,
            "{\"type\":\"progress\",\"data\":{\"pct\":10}}\n{\"type\":\"progress\"}\n"
        );
        assert_eq!(client.listener_count("progress"), 0);
        server.abort();
        Ok(())
    }

    #[tokio::test]
    async fn tail_without_filters_prints_every_envelope() -> anyhow::Result<()> {
        let (config, server) = serve(vec![
            "not json",
            r#"{"type":"rss_match","data":{"ruleName":"shows","title":"Show","status":"linked"}}"#,
        ])
        .await?;
        let args = TailArgs {
            summary: true,
            limit: Some(1),
            ..TailArgs::default()
        };
        let mut out = Vec::new();
        timeout(
            Duration::from_secs(5),
            stream_events(EventStreamClient::new(config), &args, &mut out, future::pending()),
        )
        .await?
        .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(String::from_utf8(out)?, "rss_match shows: Show (linked)\n");
        server.abort();
        Ok(())
    }

    #[tokio::test]
    async fn interrupt_stops_tail_and_disconnects() -> anyhow::Result<()> {
        let (config, server) = serve(Vec::new()).await?;
        let client = EventStreamClient::new(config);
        let mut out = Vec::new();
        stream_events(client.clone(), &TailArgs::default(), &mut out, async {})
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        assert!(out.is_empty());
        assert_eq!(
            client.connection_state(),
            medialink_stream::ConnectionState::Disconnected
        );
        assert_eq!(client.listener_count(WILDCARD), 0);
        server.abort();
        Ok(())
    }
}
