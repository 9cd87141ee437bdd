//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `incoming_call` - TwiML call-setup webhook
//! - `media_stream` - Twilio Media Stream WebSocket

pub mod api;
pub mod incoming_call;
pub mod media_stream;

pub use api::health_check;
pub use incoming_call::incoming_call_handler;
pub use media_stream::media_stream_handler;
