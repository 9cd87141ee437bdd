//! WebSocket mock of the OpenAI Realtime API
//!
//! Accepts one connection, announces `session.created`, records every client
//! event and forwards server events pushed by the test.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Handle to a running mock realtime server
pub struct RealtimeMock {
    /// `ws://` endpoint to configure as the realtime URL
    pub url: String,
    received: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<Value>,
}

impl RealtimeMock {
    /// Start the mock on a random local port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (push, mut push_rx) = mpsc::unbounded_channel::<Value>();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws_stream) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws_stream.split();

            let created = json!({
                "type": "session.created",
                "event_id": "event_mock_1",
                "session": {
                    "id": "sess_mock",
                    "model": "gpt-4o-realtime-preview-2024-10-01",
                    "voice": "alloy"
                }
            });
            if write
                .send(Message::Text(created.to_string().into()))
                .await
                .is_err()
            {
                return;
            }

            loop {
                tokio::select! {
                    outgoing = push_rx.recv() => {
                        let Some(event) = outgoing else { break };
                        if write.send(Message::Text(event.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                                    let _ = received_tx.send(value);
                                }
                            }
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        }
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            received,
            push,
        }
    }

    /// Send a server event to the connected client
    pub fn push(&self, event: Value) {
        self.push.send(event).unwrap();
    }

    /// Next client event, if one arrives within `wait`
    pub async fn next_event(&mut self, wait: Duration) -> Option<Value> {
        timeout(wait, self.received.recv()).await.ok().flatten()
    }

    /// Wait for the next client event of type `event_type`, skipping others
    pub async fn expect_event(&mut self, event_type: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let event = self
                .next_event(remaining)
                .await
                .unwrap_or_else(|| panic!("timed out waiting for {event_type}"));
            if event["type"] == event_type {
                return event;
            }
        }
    }

    /// Drain client events received so far
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event(Duration::from_millis(50)).await {
            events.push(event);
        }
        events
    }
}
