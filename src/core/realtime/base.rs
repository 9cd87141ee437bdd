//! Base traits and types for the voice-AI link.
//!
//! A realtime provider owns one outbound WebSocket per call. Rather than
//! invoking callbacks, the connection task reports everything it sees as a
//! [`RealtimeEvent`] on a channel, so the owning bridge session can multiplex
//! it with the telephony socket and keep all state mutation on one task.
//!
//! # Audio Format
//!
//! Telephony bridging uses G.711 u-law at 8kHz end to end; payloads are passed
//! through as the base64 strings received from the caller side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

use super::openai::{ClientEvent, DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, ServerEvent};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur on the voice-AI link.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// The link was used in a way its lifecycle does not allow
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Default wait for the provider's `session.created` acknowledgment before the
/// session configuration is sent anyway.
pub const DEFAULT_SESSION_READY_TIMEOUT_MS: u64 = 250;

/// Configuration for one voice-AI link.
///
/// Built once per call from the process-wide server configuration; the link
/// never mutates it.
#[derive(Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key presented as a bearer credential, wiped on drop
    pub api_key: Zeroizing<String>,

    /// WebSocket endpoint, without the `model` query parameter
    pub url: String,

    /// Model to use (e.g., "gpt-4o-realtime-preview-2024-10-01")
    pub model: String,

    /// Voice for assistant audio
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions / persona text
    #[serde(default)]
    pub instructions: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Audio format for both directions (e.g., "g711_ulaw")
    #[serde(default)]
    pub audio_format: Option<String>,

    /// Response modalities (text, audio)
    #[serde(default)]
    pub modalities: Option<Vec<String>>,

    /// Turn detection configuration
    #[serde(default)]
    pub turn_detection: Option<TurnDetectionConfig>,

    /// How long to wait for `session.created` before configuring the session
    /// regardless (milliseconds)
    #[serde(default = "default_session_ready_timeout_ms")]
    pub session_ready_timeout_ms: u64,

    /// Prompt used to make the assistant speak first. When set, it is sent
    /// once as a user message followed by `response.create`.
    #[serde(default)]
    pub initial_greeting: Option<String>,
}

fn default_session_ready_timeout_ms() -> u64 {
    DEFAULT_SESSION_READY_TIMEOUT_MS
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: Zeroizing::default(),
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: None,
            instructions: None,
            temperature: None,
            audio_format: None,
            modalities: None,
            turn_detection: None,
            session_ready_timeout_ms: DEFAULT_SESSION_READY_TIMEOUT_MS,
            initial_greeting: None,
        }
    }
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("api_key", &"[REDACTED]")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("instructions", &self.instructions)
            .field("temperature", &self.temperature)
            .field("audio_format", &self.audio_format)
            .field("modalities", &self.modalities)
            .field("turn_detection", &self.turn_detection)
            .field("session_ready_timeout_ms", &self.session_ready_timeout_ms)
            .field("initial_greeting", &self.initial_greeting)
            .finish()
    }
}

/// Configuration for turn detection (VAD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default)]
        threshold: Option<f32>,
        /// Amount of audio to include before voice detection (ms)
        #[serde(default)]
        prefix_padding_ms: Option<u32>,
        /// Silence duration before end of turn (ms)
        #[serde(default)]
        silence_duration_ms: Option<u32>,
    },
    /// Semantic-aware turn detection
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        /// Eagerness level (low, medium, high, auto)
        #[serde(default)]
        eagerness: Option<String>,
    },
    /// No automatic turn detection
    #[serde(rename = "none")]
    None,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

impl TurnDetectionConfig {
    /// Parse the short mode names accepted in configuration files.
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode.to_lowercase().as_str() {
            "server_vad" | "server" | "vad" => Some(Self::default()),
            "semantic_vad" | "semantic" => Some(Self::SemanticVad { eagerness: None }),
            "none" | "manual" => Some(Self::None),
            _ => None,
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of a realtime link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected = 0,
    /// Socket handshake or session configuration in progress
    Connecting = 1,
    /// Session configured and accepting events
    Connected = 2,
    /// Connection attempt failed
    Failed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

/// Lock-free connection state shared between a link and its connection task.
#[derive(Debug, Clone, Default)]
pub struct SharedConnectionState(Arc<AtomicU8>);

impl SharedConnectionState {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

// =============================================================================
// Link Events
// =============================================================================

/// Everything a realtime connection task reports to its owner.
#[derive(Debug)]
pub enum RealtimeEvent {
    /// Session is configured; input audio may now be appended
    Opened,
    /// A decoded event from the provider
    Server(ServerEvent),
    /// Transport or provider error; the link may still be open
    Error(RealtimeError),
    /// The link is closed for good
    Closed,
}

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for voice-AI links.
///
/// `connect` starts the connection in the background and returns the event
/// channel immediately; [`RealtimeEvent::Opened`] marks the point from which
/// `is_ready` is true.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Start connecting and return the channel the link reports on.
    async fn connect(&mut self) -> RealtimeResult<mpsc::Receiver<RealtimeEvent>>;

    /// Close the link. Safe to call more than once.
    async fn disconnect(&mut self) -> RealtimeResult<()>;

    /// Whether the session is configured and open.
    fn is_ready(&self) -> bool;

    /// Current connection state.
    fn get_connection_state(&self) -> ConnectionState;

    /// Queue an event for the provider.
    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()>;

    /// Append a base64 audio payload to the provider's input buffer.
    ///
    /// Implementations must not wait for queue space: a frame that does not
    /// fit is dropped.
    async fn send_audio(&self, payload: String) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.send_event(ClientEvent::audio_append(payload)).await
    }
}

/// Boxed realtime link as held by a bridge session.
pub type BoxedRealtime = Box<dyn BaseRealtime>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_detection_from_mode() {
        assert_eq!(
            TurnDetectionConfig::from_mode("server_vad"),
            Some(TurnDetectionConfig::default())
        );
        assert_eq!(
            TurnDetectionConfig::from_mode("Semantic"),
            Some(TurnDetectionConfig::SemanticVad { eagerness: None })
        );
        assert_eq!(
            TurnDetectionConfig::from_mode("manual"),
            Some(TurnDetectionConfig::None)
        );
        assert_eq!(TurnDetectionConfig::from_mode("push_to_talk"), None);
    }

    #[test]
    fn test_shared_connection_state() {
        let state = SharedConnectionState::default();
        assert_eq!(state.get(), ConnectionState::Disconnected);

        let handle = state.clone();
        handle.set(ConnectionState::Connected);
        assert_eq!(state.get(), ConnectionState::Connected);

        handle.set(ConnectionState::Failed);
        assert_eq!(state.get().to_string(), "Failed");
    }

    #[test]
    fn test_realtime_config_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.url, OPENAI_REALTIME_URL);
        assert_eq!(config.model, DEFAULT_REALTIME_MODEL);
        assert_eq!(
            config.session_ready_timeout_ms,
            DEFAULT_SESSION_READY_TIMEOUT_MS
        );
        assert!(config.initial_greeting.is_none());
    }
}
