//! OpenAI Realtime API link.
//!
//! Connects one call to `wss://api.openai.com/v1/realtime`, configures the
//! session for G.711 u-law in both directions with server-side VAD, and relays
//! provider events back to the bridge.
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse

mod client;
mod config;
mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    DEFAULT_REALTIME_MODEL, Modality, OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeVoice, TELEPHONY_SAMPLE_RATE,
};
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, ServerEvent, Session, SessionConfig,
    TurnDetection,
};
