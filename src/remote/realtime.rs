//! Change notifications over the realtime websocket (Phoenix channel framing).

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{CHANGE_BUFFER, ChangeKind, ChangeStream, RemoteError, RowChange};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Websocket endpoint for an http(s) base URL
pub fn websocket_url(base_url: &str, api_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", ws_base, api_key)
}

fn join_message(table: &str, api_key: &str) -> String {
    json!({
        "topic": format!("realtime:public:{}", table),
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": api_key
        },
        "ref": "1"
    })
    .to_string()
}

fn heartbeat_message(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string()
    })
    .to_string()
}

/// Extract a row change from one realtime frame; other frames yield `None`
pub fn parse_change(frame: &str) -> Option<RowChange> {
    let value: Value = serde_json::from_str(frame).ok()?;
    if value.get("event")?.as_str()? != "postgres_changes" {
        return None;
    }

    let data = value.get("payload")?.get("data")?;
    let kind = match data.get("type")?.as_str()? {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        _ => return None,
    };

    let date = ["record", "old_record"]
        .iter()
        .filter_map(|field| data.get(*field)?.get("date")?.as_str())
        .next()
        .map(str::to_string);

    Some(RowChange { kind, date })
}

/// Open the socket, join the table's change channel and forward changes
/// until either side goes away. There is no reconnect.
pub async fn subscribe(url: &str, api_key: &str, table: &str) -> Result<ChangeStream, RemoteError> {
    let (socket, _) = connect_async(url)
        .await
        .map_err(|e| RemoteError::WebSocketError(e.to_string()))?;
    let (mut sink, mut stream) = socket.split();

    sink.send(Message::text(join_message(table, api_key)))
        .await
        .map_err(|e| RemoteError::WebSocketError(e.to_string()))?;
    tracing::info!(table, "joined realtime channel");

    let (tx, rx) = mpsc::channel(CHANGE_BUFFER);

    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut next_ref: u64 = 2;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = sink.send(Message::text(heartbeat_message(next_ref))).await {
                        tracing::warn!("realtime heartbeat failed: {e}");
                        break;
                    }
                    next_ref += 1;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(change) = parse_change(&text) {
                            if tx.send(change).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("realtime socket error: {e}");
                        break;
                    }
                },
                _ = tx.closed() => break,
            }
        }

        let _ = sink.close().await;
        tracing::debug!("realtime subscription closed");
    });

    Ok(rx)
}
