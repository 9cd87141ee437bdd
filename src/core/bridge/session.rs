//! Bridge session: one phone call wired to one voice-AI link.
//!
//! The session task owns the [`BridgeState`] and `select!`s over the Twilio
//! socket and the realtime link's event channel, so every state change for a
//! call happens on this one task. Outbound Twilio frames go through an mpsc
//! channel drained by the socket's sender task.

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use super::registry::SessionGuard;
use super::state::{BridgeAction, BridgeState};
use crate::core::realtime::{BoxedRealtime, ClientEvent, RealtimeEvent};
use crate::core::telephony::{TwilioIncoming, TwilioOutgoing};

/// A single call in progress.
pub struct BridgeSession {
    id: String,
    state: BridgeState,
    realtime: BoxedRealtime,
    telephony_tx: mpsc::Sender<TwilioOutgoing>,
    _guard: Option<SessionGuard>,
}

impl BridgeSession {
    pub fn new(
        id: impl Into<String>,
        realtime: BoxedRealtime,
        telephony_tx: mpsc::Sender<TwilioOutgoing>,
        log_timing_math: bool,
    ) -> Self {
        Self {
            id: id.into(),
            state: BridgeState::new(log_timing_math),
            realtime,
            telephony_tx,
            _guard: None,
        }
    }

    /// Tie the session's registry slot to its lifetime.
    pub(crate) fn with_guard(mut self, guard: SessionGuard) -> Self {
        self._guard = Some(guard);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    /// Run the call until the Twilio side goes away.
    ///
    /// The realtime link closing does not end the call; caller audio is
    /// dropped from then on.
    pub async fn run<S>(self, telephony: S)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    {
        let span = info_span!("bridge_session", session_id = %self.id);
        self.run_inner(telephony).instrument(span).await
    }

    async fn run_inner<S>(mut self, mut telephony: S)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    {
        info!("Client connected");

        let (mut realtime_events, mut realtime_finished) = match self.realtime.connect().await {
            Ok(rx) => (rx, false),
            Err(e) => {
                error!("Failed to start realtime link: {}", e);
                let (_tx, rx) = mpsc::channel(1);
                (rx, true)
            }
        };

        loop {
            tokio::select! {
                msg = telephony.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.on_telephony_text(text.as_str()).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            debug!(len = data.len(), "Ignoring binary frame on media stream");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "Media stream closed by Twilio");
                            break;
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Err(e)) => {
                            warn!("Media stream error: {}", e);
                            break;
                        }
                        None => {
                            info!("Media stream ended");
                            break;
                        }
                    }
                }

                event = realtime_events.recv(), if !realtime_finished => {
                    match event {
                        Some(RealtimeEvent::Opened) => {
                            info!("Realtime session configured");
                            self.state.set_realtime_open(true);
                        }
                        Some(RealtimeEvent::Server(server_event)) => {
                            let actions = self.state.handle_realtime(server_event);
                            if !self.execute(actions).await {
                                break;
                            }
                        }
                        Some(RealtimeEvent::Error(e)) => {
                            error!("Realtime link error: {}", e);
                        }
                        Some(RealtimeEvent::Closed) | None => {
                            info!("Disconnected from the OpenAI Realtime API");
                            self.state.set_realtime_open(false);
                            realtime_finished = true;
                        }
                    }
                }
            }
        }

        self.state.set_realtime_open(false);
        if let Err(e) = self.realtime.disconnect().await {
            warn!("Failed to close realtime link: {}", e);
        }
        info!("Client disconnected");
    }

    /// Returns false once the Twilio sender is gone.
    async fn on_telephony_text(&mut self, text: &str) -> bool {
        match TwilioIncoming::parse(text) {
            Ok(event) => {
                trace!(event = event.event_name(), "Media stream event");
                let actions = self.state.handle_telephony(event);
                self.execute(actions).await
            }
            Err(e) => {
                warn!("Dropping media stream frame: {}", e);
                true
            }
        }
    }

    async fn execute(&mut self, actions: Vec<BridgeAction>) -> bool {
        for action in actions {
            match action {
                BridgeAction::Telephony(frame) => {
                    trace!(event = frame.event_name(), "Sending to Twilio");
                    if self.telephony_tx.send(frame).await.is_err() {
                        debug!("Twilio sender closed");
                        return false;
                    }
                }
                BridgeAction::Realtime(ClientEvent::InputAudioBufferAppend { audio }) => {
                    if let Err(e) = self.realtime.send_audio(audio).await {
                        trace!("Caller audio not forwarded: {}", e);
                    }
                }
                BridgeAction::Realtime(event) => {
                    let event_type = event.event_type();
                    if let Err(e) = self.realtime.send_event(event).await {
                        warn!("Failed to send {} to realtime link: {}", event_type, e);
                    }
                }
            }
        }
        true
    }
}
