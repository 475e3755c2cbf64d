//! Live storm feed over WebSocket.
//!
//! Each socket is bound to one storm. It receives a `welcome` message with the
//! current storm view, then every [`StormEvent`] for that storm. The feed is
//! read-only; inbound text is ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::api::ApiError;
use crate::protocol::{StormEvent, StormView};
use crate::state::AppState;
use crate::types::StormId;

/// WebSocket upgrade handler. Unknown storms get a 404 instead of a socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(storm_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    // Subscribe before describing so nothing between welcome and the first event is lost
    let events = state.events.subscribe();
    let description = state.describe_storm(&storm_id).await?;
    let welcome = StormEvent::Welcome {
        storm: StormView::from(&description),
    };

    tracing::info!(storm_id = %storm_id, "WebSocket connection request");
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, storm_id, welcome, events))
        .into_response())
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &StormEvent,
) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize event: {}", e);
            true
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    storm_id: StormId,
    welcome: StormEvent,
    mut events: tokio::sync::broadcast::Receiver<StormEvent>,
) {
    let (mut sender, mut receiver) = socket.split();

    if !send_event(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) if event.storm_id() == storm_id => {
                        if !send_event(&mut sender, &event).await {
                            break;
                        }
                        if matches!(event, StormEvent::StormDeleted { .. }) {
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(storm_id = %storm_id, skipped, "WebSocket subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Ignoring client message: {}", text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(storm_id = %storm_id, "WebSocket connection closed");
}
