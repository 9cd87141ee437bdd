//! Twilio Media Stream WebSocket handler
//!
//! Each connection becomes one bridge session. Outbound Twilio frames are
//! queued on a channel and written by a dedicated sender task so the session
//! loop never waits on the socket.

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::core::telephony::TwilioOutgoing;
use crate::state::AppState;

/// Buffer for outbound Twilio frames
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Media Stream WebSocket handler
///
/// Upgrades the connection and bridges it to a new realtime session.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_stream(socket, state))
}

async fn handle_media_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, receiver) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<TwilioOutgoing>(CHANNEL_BUFFER_SIZE);

    let session = match state.sessions.create_session(frame_tx) {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejecting media stream: {}", e);
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };
    let session_id = session.id().to_string();

    // Sender task for outgoing Twilio frames
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let json = match frame.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize {} frame: {}", frame.event_name(), e);
                    continue;
                }
            };

            if let Err(e) = sender.send(Message::Text(json.into())).await {
                warn!("Failed to send media stream frame: {}", e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    session.run(receiver).await;

    // The session dropped its frame sender; the task exits once the queue drains.
    if let Err(e) = sender_task.await {
        error!(session_id = %session_id, "Media stream sender task failed: {}", e);
    }
    info!(session_id = %session_id, "Media stream closed");
}
