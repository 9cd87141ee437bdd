//! Twilio Media Streams message types.
//!
//! Every frame on a Media Stream WebSocket is a JSON text message tagged by
//! its `"event"` field.
//!
//! Inbound (Twilio -> gateway): `connected`, `start`, `media`, `mark`,
//! `dtmf`, `stop`. Outbound (gateway -> Twilio): `media`, `mark`, `clear`.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Name given to every outbound mark; Twilio echoes it back once the
/// preceding audio has played.
pub const RESPONSE_MARK_NAME: &str = "responsePart";

/// Errors decoding or encoding Media Stream frames.
#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("Invalid media stream frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to encode media stream frame: {0}")]
    Encode(String),
}

pub type TelephonyResult<T> = Result<T, TelephonyError>;

// =============================================================================
// Incoming Messages (Twilio -> Gateway)
// =============================================================================

/// Inbound Media Stream events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioIncoming {
    /// First frame on every stream
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },

    /// Stream metadata; carries the stream SID used on every outbound frame
    Start { start: StartPayload },

    /// One chunk of caller audio
    Media { media: MediaPayload },

    /// Playback acknowledgment for a mark we sent earlier
    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },

    /// Keypad digit pressed by the caller
    Dtmf {
        #[serde(default)]
        dtmf: Option<DtmfPayload>,
    },

    /// Stream ended (caller hung up or the call was redirected)
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },

    /// Any event this gateway does not know about
    #[serde(other)]
    Unknown,
}

impl TwilioIncoming {
    /// Decode one text frame.
    pub fn parse(text: &str) -> TelephonyResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Event name, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            TwilioIncoming::Connected { .. } => "connected",
            TwilioIncoming::Start { .. } => "start",
            TwilioIncoming::Media { .. } => "media",
            TwilioIncoming::Mark { .. } => "mark",
            TwilioIncoming::Dtmf { .. } => "dtmf",
            TwilioIncoming::Stop { .. } => "stop",
            TwilioIncoming::Unknown => "unknown",
        }
    }
}

/// `start` event metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    #[serde(alias = "streamId")]
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
    /// Tracks being streamed (inbound, outbound)
    #[serde(default)]
    pub tracks: Vec<String>,
    /// `<Parameter>` values from the TwiML `<Stream>` element
    #[serde(default)]
    pub custom_parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

/// Audio encoding announced in `start`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    /// e.g. "audio/x-mulaw"
    pub encoding: String,
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_channels() -> u16 {
    1
}

/// `media` event body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    #[serde(default)]
    pub track: Option<String>,
    /// Milliseconds since the stream started. Twilio sends this as a
    /// decimal string; plain integers are accepted too.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: u64,
    /// Base64 audio in the stream's encoding
    pub payload: String,
}

/// Name of a mark, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// `dtmf` event body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub track: Option<String>,
    pub digit: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{s}': {e}"))),
    }
}

// =============================================================================
// Outgoing Messages (Gateway -> Twilio)
// =============================================================================

/// Outbound Media Stream events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioOutgoing {
    /// Audio to play to the caller
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutgoingMedia,
    },

    /// Ask Twilio to report back once everything sent so far has played
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },

    /// Drop all audio buffered but not yet played
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Outbound `media` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMedia {
    pub payload: String,
}

impl TwilioOutgoing {
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        TwilioOutgoing::Media {
            stream_sid: stream_sid.into(),
            media: OutgoingMedia {
                payload: payload.into(),
            },
        }
    }

    /// Mark carrying the fixed [`RESPONSE_MARK_NAME`] token.
    pub fn response_mark(stream_sid: impl Into<String>) -> Self {
        TwilioOutgoing::Mark {
            stream_sid: stream_sid.into(),
            mark: MarkPayload {
                name: RESPONSE_MARK_NAME.to_string(),
            },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        TwilioOutgoing::Clear {
            stream_sid: stream_sid.into(),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            TwilioOutgoing::Media { .. } => "media",
            TwilioOutgoing::Mark { .. } => "mark",
            TwilioOutgoing::Clear { .. } => "clear",
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> TelephonyResult<String> {
        serde_json::to_string(self).map_err(|e| TelephonyError::Encode(e.to_string()))
    }
}
