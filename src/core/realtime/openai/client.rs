//! OpenAI Realtime API client implementation.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: G.711 u-law, base64 encoded, relayed untouched from the phone leg
//!
//! # Session bootstrap
//!
//! The session is configured exactly once per connection. `session.update` is
//! sent as soon as the server's `session.created` arrives, or when the
//! configured ready timeout elapses first. The optional greeting
//! (`conversation.item.create` + `response.create`) follows immediately, and
//! only then does the link report [`RealtimeEvent::Opened`].
//!
//! There is no reconnection: once the socket closes the link is finished and
//! the call continues without the assistant.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::{Modality, OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice};
use super::messages::{ClientEvent, ConversationItem, ServerEvent, SessionConfig, TurnDetection};
use crate::core::realtime::base::{
    BaseRealtime, ConnectionState, RealtimeConfig, RealtimeError, RealtimeEvent, RealtimeResult,
    SharedConnectionState, TurnDetectionConfig,
};

/// Outgoing event queue depth between the bridge and the socket task.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Incoming event queue depth between the socket task and the bridge.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on the WebSocket handshake with the provider.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `disconnect` waits for the socket task to send its close frame.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// Session Bootstrap
// =============================================================================

/// Events that configure a fresh session, released exactly once.
#[derive(Debug)]
struct SessionBootstrap {
    pending: Option<Vec<ClientEvent>>,
}

impl SessionBootstrap {
    fn new(session: SessionConfig, greeting: Option<&str>) -> Self {
        let mut events = vec![ClientEvent::SessionUpdate { session }];
        if let Some(text) = greeting.filter(|t| !t.trim().is_empty()) {
            events.push(ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(text),
            });
            events.push(ClientEvent::ResponseCreate);
        }
        Self {
            pending: Some(events),
        }
    }

    fn is_done(&self) -> bool {
        self.pending.is_none()
    }

    fn take(&mut self) -> Vec<ClientEvent> {
        self.pending.take().unwrap_or_default()
    }
}

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API link for a single call.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    voice: OpenAIRealtimeVoice,
    audio_format: OpenAIRealtimeAudioFormat,
    state: SharedConnectionState,
    ws_sender: Option<mpsc::Sender<ClientEvent>>,
    connection_handle: Option<JoinHandle<()>>,
}

impl OpenAIRealtime {
    /// Validate the configuration and create an unconnected link.
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let voice = match config.voice.as_deref() {
            Some(v) => v
                .parse::<OpenAIRealtimeVoice>()
                .map_err(RealtimeError::InvalidConfiguration)?,
            None => OpenAIRealtimeVoice::default(),
        };

        let audio_format = match config.audio_format.as_deref() {
            Some(f) => f
                .parse::<OpenAIRealtimeAudioFormat>()
                .map_err(RealtimeError::InvalidConfiguration)?,
            None => OpenAIRealtimeAudioFormat::default(),
        };

        Ok(Self {
            config,
            voice,
            audio_format,
            state: SharedConnectionState::default(),
            ws_sender: None,
            connection_handle: None,
        })
    }

    pub fn voice(&self) -> OpenAIRealtimeVoice {
        self.voice
    }

    pub fn audio_format(&self) -> OpenAIRealtimeAudioFormat {
        self.audio_format
    }

    /// Endpoint with the `model` query parameter applied.
    pub fn build_ws_url(&self) -> RealtimeResult<Url> {
        let mut url = Url::parse(&self.config.url).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!(
                "invalid realtime URL '{}': {e}",
                self.config.url
            ))
        })?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(RealtimeError::InvalidConfiguration(format!(
                    "realtime URL must use ws:// or wss://, got {other}://"
                )));
            }
        }
        url.query_pairs_mut().append_pair("model", &self.config.model);
        Ok(url)
    }

    /// Session configuration sent in the bootstrap `session.update`.
    pub fn build_session_config(&self) -> SessionConfig {
        let turn_detection = match self.config.turn_detection.clone().unwrap_or_default() {
            TurnDetectionConfig::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
            } => Some(TurnDetection::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
            }),
            TurnDetectionConfig::SemanticVad { eagerness } => {
                Some(TurnDetection::SemanticVad { eagerness })
            }
            TurnDetectionConfig::None => None,
        };

        SessionConfig {
            modalities: Some(
                self.config
                    .modalities
                    .clone()
                    .unwrap_or_else(Modality::call_defaults),
            ),
            instructions: self.config.instructions.clone(),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some(self.audio_format.as_str().to_string()),
            output_audio_format: Some(self.audio_format.as_str().to_string()),
            turn_detection: Some(turn_detection),
            temperature: self.config.temperature,
        }
    }

    fn build_request(&self) -> RealtimeResult<Request<()>> {
        let url = self.build_ws_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key.as_str()))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        Ok(request)
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    async fn connect(&mut self) -> RealtimeResult<mpsc::Receiver<RealtimeEvent>> {
        if self.connection_handle.is_some() {
            return Err(RealtimeError::InvalidState(
                "link already connected".to_string(),
            ));
        }

        let request = self.build_request()?;
        let (tx, rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RealtimeEvent>(EVENT_CHANNEL_CAPACITY);

        let task = ConnectionTask {
            outgoing: rx,
            events: event_tx,
            state: self.state.clone(),
            bootstrap: SessionBootstrap::new(
                self.build_session_config(),
                self.config.initial_greeting.as_deref(),
            ),
            ready_timeout: Duration::from_millis(self.config.session_ready_timeout_ms),
        };

        self.state.set(ConnectionState::Connecting);
        self.ws_sender = Some(tx);
        self.connection_handle = Some(tokio::spawn(task.run(request)));

        Ok(event_rx)
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        // Dropping the sender ends the task's outgoing stream, which closes the socket.
        self.ws_sender = None;

        if let Some(mut handle) = self.connection_handle.take()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
        {
            warn!("Realtime connection task did not stop in time, aborting");
            handle.abort();
        }

        self.state.set(ConnectionState::Disconnected);
        debug!("Disconnected from OpenAI Realtime API");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state.get() == ConnectionState::Connected
    }

    fn get_connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        let sender = self.ws_sender.as_ref().ok_or(RealtimeError::NotConnected)?;
        sender
            .send(event)
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }

    async fn send_audio(&self, payload: String) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        let sender = self.ws_sender.as_ref().ok_or(RealtimeError::NotConnected)?;
        match sender.try_send(ClientEvent::audio_append(payload)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Realtime outgoing queue full, dropping caller audio frame");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RealtimeError::NotConnected),
        }
    }
}

impl Drop for OpenAIRealtime {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Connection Task
// =============================================================================

struct ConnectionTask {
    outgoing: mpsc::Receiver<ClientEvent>,
    events: mpsc::Sender<RealtimeEvent>,
    state: SharedConnectionState,
    bootstrap: SessionBootstrap,
    ready_timeout: Duration,
}

impl ConnectionTask {
    async fn run(mut self, request: Request<()>) {
        let ws_stream =
            match tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request))
                .await
            {
                Ok(Ok((ws_stream, _response))) => ws_stream,
                Ok(Err(e)) => {
                    let err = classify_connect_error(e);
                    error!("Failed to connect to OpenAI Realtime API: {}", err);
                    self.fail(err).await;
                    return;
                }
                Err(_) => {
                    error!("Timed out connecting to OpenAI Realtime API");
                    self.fail(RealtimeError::ConnectionFailed(
                        "handshake timed out".to_string(),
                    ))
                    .await;
                    return;
                }
            };

        info!("Connected to OpenAI Realtime API");
        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let ready_deadline = tokio::time::sleep(self.ready_timeout);
        tokio::pin!(ready_deadline);

        // Server event waiting for room in the bridge's queue. The socket is
        // not read while it is held, but outgoing events keep draining.
        let mut inbound: Option<RealtimeEvent> = None;
        let mut failure: Option<RealtimeError> = None;
        let events = self.events.clone();

        loop {
            tokio::select! {
                _ = &mut ready_deadline, if !self.bootstrap.is_done() => {
                    warn!(
                        "No session.created within {}ms, configuring session anyway",
                        self.ready_timeout.as_millis()
                    );
                    if !self.configure_session(&mut ws_sink).await {
                        break;
                    }
                }

                permit = events.reserve(), if inbound.is_some() => {
                    let Ok(permit) = permit else {
                        debug!("Realtime event receiver dropped");
                        break;
                    };
                    if let Some(event) = inbound.take() {
                        permit.send(event);
                    }
                }

                maybe_event = self.outgoing.recv() => {
                    let Some(event) = maybe_event else {
                        debug!("Realtime link closed by owner");
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    };
                    if let Err(e) = send_json(&mut ws_sink, &event).await {
                        error!("Failed to send {}: {}", event.event_type(), e);
                        failure = Some(e);
                        break;
                    }
                }

                maybe_msg = ws_stream.next(), if inbound.is_none() => {
                    match maybe_msg {
                        Some(Ok(Message::Text(text))) => {
                            let event = match serde_json::from_str::<ServerEvent>(&text) {
                                Ok(event) => event,
                                Err(e) => {
                                    warn!("Failed to parse realtime event: {}", e);
                                    continue;
                                }
                            };

                            if matches!(event, ServerEvent::SessionCreated { .. })
                                && !self.bootstrap.is_done()
                                && !self.configure_session(&mut ws_sink).await
                            {
                                break;
                            }

                            inbound = Some(RealtimeEvent::Server(event));
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                warn!("Failed to send pong: {}", e);
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("OpenAI Realtime API closed the connection: {:?}", frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Realtime WebSocket error: {}", e);
                            failure = Some(RealtimeError::WebSocketError(e.to_string()));
                            break;
                        }
                        None => {
                            info!("Realtime WebSocket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        self.outgoing.close();
        self.state.set(ConnectionState::Disconnected);
        if let Some(event) = inbound.take() {
            let _ = self.events.send(event).await;
        }
        if let Some(err) = failure {
            let _ = self.events.send(RealtimeEvent::Error(err)).await;
        }
        let _ = self.events.send(RealtimeEvent::Closed).await;
    }

    async fn fail(&mut self, err: RealtimeError) {
        self.outgoing.close();
        self.state.set(ConnectionState::Failed);
        let _ = self.events.send(RealtimeEvent::Error(err)).await;
        let _ = self.events.send(RealtimeEvent::Closed).await;
    }

    /// Flush the bootstrap events and report the link open. Returns false if
    /// the socket failed underneath.
    async fn configure_session<S>(&mut self, ws_sink: &mut S) -> bool
    where
        S: SinkExt<Message, Error = tungstenite::Error> + Unpin,
    {
        for event in self.bootstrap.take() {
            if let Err(e) = send_json(ws_sink, &event).await {
                error!("Failed to send {}: {}", event.event_type(), e);
                let _ = self.events.send(RealtimeEvent::Error(e)).await;
                return false;
            }
            debug!("Sent {}", event.event_type());
        }

        self.state.set(ConnectionState::Connected);
        self.events.send(RealtimeEvent::Opened).await.is_ok()
    }
}

async fn send_json<S>(ws_sink: &mut S, event: &ClientEvent) -> RealtimeResult<()>
where
    S: SinkExt<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(event)
        .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
    ws_sink
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
}

fn classify_connect_error(err: tungstenite::Error) -> RealtimeError {
    match err {
        tungstenite::Error::Http(response) if response.status().as_u16() == 401 => {
            RealtimeError::AuthenticationFailed("provider rejected the API key".to_string())
        }
        other => RealtimeError::ConnectionFailed(other.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
