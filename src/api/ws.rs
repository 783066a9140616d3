use crate::api::AppState;
use crate::terminal::{OutputSink, Outcome, ServerEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest inbound frame accepted from the browser.
const MAX_FRAME_SIZE: usize = 64 * 1024;

/// How long the writer may take to flush the final events after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: String,
}

/// Extract the input line from a client text frame.
///
/// `{"event":"terminal_input","data":"..."}` yields `data`; other events are
/// ignored. A frame that is not such an object is taken as the line itself.
pub fn parse_input(text: &str) -> Option<String> {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) if frame.event == "terminal_input" => Some(frame.data),
        Ok(frame) => {
            debug!(event = %frame.event, "Ignoring client event");
            None
        }
        Err(_) => Some(text.to_string()),
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| handle_ws(socket, state, peer))
        .into_response()
}

async fn handle_ws(socket: WebSocket, state: AppState, peer: SocketAddr) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (sink, mut events) = OutputSink::channel();
    let manager = state.sessions.clone();
    let id = manager.connect(sink, Some(peer));

    // The channel closes when the session is dropped, which ends this task.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let closing = matches!(event, ServerEvent::SessionClosed { .. });
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to encode terminal event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            if closing {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Some(line) = parse_input(text.as_str()) else {
                        continue;
                    };
                    match manager.handle_line(&id, &line).await {
                        Some(Outcome::Prompt(_)) => {}
                        Some(Outcome::Close(_)) | None => break,
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(session_id = %id, error = %e, "WebSocket receive failed");
                    break;
                }
                _ => {}
            },
            _ = &mut send_task => {
                writer_done = true;
                break;
            }
        }
    }

    manager.disconnect(&id).await;
    if !writer_done && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
    debug!(session_id = %id, peer = %peer, "WebSocket client disconnected");
}
