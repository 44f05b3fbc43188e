use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tracing::debug;

use warden_relay::BroadcastMessage;

use crate::state::AppState;

// ── WebSocket Messages ──────────────────────────────────────────

#[derive(Serialize)]
struct WsMessage<T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    data: T,
    timestamp: DateTime<Utc>,
}

pub(crate) fn ws_json<T: Serialize>(msg_type: &'static str, data: T) -> String {
    serde_json::to_string(&WsMessage {
        msg_type,
        data,
        timestamp: Utc::now(),
    })
    .unwrap_or_default()
}

pub(crate) fn broadcast_frame(message: &BroadcastMessage) -> String {
    match message {
        BroadcastMessage::NewVerdict(verdict) => ws_json(message.kind(), verdict),
        BroadcastMessage::InitialBatch(verdicts) => ws_json(message.kind(), verdicts),
    }
}

fn is_client_ping(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v["type"] == "ping")
        .unwrap_or(false)
}

// ── WebSocket Handler ───────────────────────────────────────────

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut outbound) = state.sessions.register(&state.store).await;
    let keepalive = state.config.sessions.keepalive();

    // Sole writer: snapshot, broadcasts, pongs and keepalive pings all queue here.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let sessions = Arc::clone(&state.sessions);
    let mut recv_task = tokio::spawn(async move {
        loop {
            match tokio::time::timeout(keepalive, receiver.next()).await {
                Ok(Some(Ok(msg))) => {
                    sessions.touch(id);
                    match msg {
                        Message::Text(text) if is_client_ping(text.as_str()) => {
                            sessions.send_to(id, ws_json("pong", serde_json::Value::Null));
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                Ok(Some(Err(_))) | Ok(None) => break,
                Err(_) => {
                    if !sessions.send_to(id, ws_json("ping", serde_json::Value::Null)) {
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    state.sessions.unregister(id);
    debug!(session = %id, "websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_type_data_and_timestamp() {
        let frame: serde_json::Value =
            serde_json::from_str(&broadcast_frame(&BroadcastMessage::InitialBatch(Vec::new()))).unwrap();
        assert_eq!(frame["type"], "initial_batch");
        assert_eq!(frame["data"], serde_json::json!([]));
        assert!(frame["timestamp"].is_string());
    }

    #[test]
    fn recognises_client_ping() {
        assert!(is_client_ping(r#"{"type":"ping"}"#));
        assert!(!is_client_ping(r#"{"type":"pong"}"#));
        assert!(!is_client_ping("ping"));
    }
}
