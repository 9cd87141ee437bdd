//! Telephony link: Twilio Media Streams framing and call-setup TwiML.

pub mod messages;
pub mod twiml;

pub use messages::{
    MarkPayload, MediaPayload, RESPONSE_MARK_NAME, StartPayload, TelephonyError,
    TelephonyResult, TwilioIncoming, TwilioOutgoing,
};
pub use twiml::{CallScript, MEDIA_STREAM_PATH, connect_stream_twiml, media_stream_url};
