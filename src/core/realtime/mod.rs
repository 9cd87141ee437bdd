//! Voice-AI link.
//!
//! A [`BaseRealtime`] implementation holds the outbound WebSocket for one call
//! and reports provider events as [`RealtimeEvent`]s on a channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge_gateway::core::realtime::{create_realtime_provider, RealtimeConfig, RealtimeEvent};
//!
//! let config = RealtimeConfig {
//!     api_key: "sk-...".to_string().into(),
//!     voice: Some("alloy".to_string()),
//!     ..Default::default()
//! };
//!
//! let mut link = create_realtime_provider(config)?;
//! let mut events = link.connect().await?;
//! while let Some(event) = events.recv().await {
//!     if let RealtimeEvent::Closed = event {
//!         break;
//!     }
//! }
//! ```

mod base;
pub mod openai;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, DEFAULT_SESSION_READY_TIMEOUT_MS,
    RealtimeConfig, RealtimeError, RealtimeEvent, RealtimeResult, SharedConnectionState,
    TurnDetectionConfig,
};
pub use openai::{
    ClientEvent, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeVoice, ServerEvent,
};

/// Create the voice-AI link for one call.
pub fn create_realtime_provider(config: RealtimeConfig) -> RealtimeResult<BoxedRealtime> {
    Ok(Box::new(OpenAIRealtime::new(config)?))
}
