//! Axum WebSocket handler
//!
//! This module contains the WebSocket upgrade handler and the per-connection
//! receive loop.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

use super::{
    error::WebSocketError,
    messages::{IncomingMessage, MessageRoute, OutgoingMessage},
    processor::{
        BinaryFrame, SessionContext, classify_binary_frame, handle_audio_message,
        handle_incoming_message, relay_session_speech_event,
    },
    state::{ConnectionState, SessionPhase, SessionSpeechEvent},
};

/// Outgoing buffer shared by control events, replies and synthesized audio
const CHANNEL_BUFFER_SIZE: usize = 1024;

pub const HELLO_MESSAGE: &str = "ws_connected";

/// WebSocket voice conversation handler
pub async fn ws_voice_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("WebSocket voice connection upgrade requested");
    ws.on_upgrade(move |socket| handle_voice_socket(socket, state))
}

/// Run one client connection until it closes
async fn handle_voice_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("WebSocket voice connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);
    let (speech_tx, mut speech_rx) = mpsc::unbounded_channel::<SessionSpeechEvent>();

    // Single writer, so concurrent producers never interleave a frame
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Binary(data) => sender.send(Message::Binary(data)).await,
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let ctx = SessionContext {
        app_state,
        message_tx,
        speech_events: speech_tx,
    };
    let mut state = ConnectionState::new();

    ctx.send(OutgoingMessage::Hello {
        message: HELLO_MESSAGE.to_string(),
    })
    .await;

    loop {
        select! {
            msg_result = receiver.next() => {
                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_message(msg, &mut state, &ctx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("WebSocket connection closed by client");
                        break;
                    }
                }
            }
            Some(event) = speech_rx.recv() => {
                relay_session_speech_event(event, &mut state, &ctx).await;
            }
        }
    }

    // Clean up on every exit path
    state.phase = SessionPhase::Closed;
    state.release_speech().await;
    if let Some(queue) = &state.queue {
        queue.close();
    }
    sender_task.abort();

    info!(
        "WebSocket voice connection terminated (session {})",
        state.session_id.as_deref().unwrap_or("<unbound>")
    );
}

/// Process one client frame. Returns `false` when the connection should end.
async fn process_message(msg: Message, state: &mut ConnectionState, ctx: &SessionContext) -> bool {
    match msg {
        Message::Text(text) => {
            debug!("Received text message: {} bytes", text.len());

            match serde_json::from_str::<IncomingMessage>(&text) {
                Ok(incoming) => handle_incoming_message(incoming, state, ctx).await,
                Err(e) => {
                    warn!("Failed to parse incoming message: {}", e);
                    let error = WebSocketError::InvalidMessage(e.to_string());
                    ctx.send(OutgoingMessage::error(error.to_message())).await;
                }
            }
            true
        }
        Message::Binary(data) => {
            match classify_binary_frame(data) {
                BinaryFrame::Audio(audio) => {
                    debug!("Received audio frame: {} bytes", audio.len());
                    handle_audio_message(audio, state);
                }
                BinaryFrame::Control(Ok(incoming)) => {
                    handle_incoming_message(incoming, state, ctx).await;
                }
                BinaryFrame::Control(Err(e)) => {
                    warn!("Unrecognised binary control frame: {}", e);
                    let error = WebSocketError::InvalidMessage(e.to_string());
                    ctx.send(OutgoingMessage::error(error.to_message())).await;
                }
            }
            true
        }
        // Ping/Pong is handled automatically by axum
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("WebSocket connection closed by client");
            false
        }
    }
}
