//! OpenAI Realtime API configuration types.
//!
//! Voices and audio formats are parsed strictly: a typo in the gateway
//! configuration is rejected at startup instead of silently falling back to a
//! default voice mid-call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model requested when none is configured.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Sample rate of the telephony leg (G.711, 8kHz).
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

// =============================================================================
// Voices
// =============================================================================

/// Voices the Realtime API can speak with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    const ALL: [OpenAIRealtimeVoice; 8] = [
        Self::Alloy,
        Self::Ash,
        Self::Ballad,
        Self::Coral,
        Self::Echo,
        Self::Sage,
        Self::Shimmer,
        Self::Verse,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Get all available voices.
    pub fn all() -> &'static [OpenAIRealtimeVoice] {
        &Self::ALL
    }
}

impl FromStr for OpenAIRealtimeVoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|voice| voice.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                format!("unknown voice '{s}', expected one of: {}", names.join(", "))
            })
    }
}

impl fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio formats accepted by the Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAIRealtimeAudioFormat {
    /// PCM 16-bit signed little-endian at 24kHz
    #[serde(rename = "pcm16")]
    Pcm16,
    /// G.711 u-law at 8kHz, what Twilio Media Streams carry
    #[default]
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 a-law at 8kHz
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

impl OpenAIRealtimeAudioFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16 => 24000,
            Self::G711Ulaw | Self::G711Alaw => TELEPHONY_SAMPLE_RATE,
        }
    }

    /// Whether payloads in this format can be relayed to a Twilio stream
    /// without transcoding.
    #[inline]
    pub fn is_telephony_passthrough(&self) -> bool {
        matches!(self, Self::G711Ulaw)
    }
}

impl FromStr for OpenAIRealtimeAudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "g711_ulaw" | "ulaw" | "mulaw" => Ok(Self::G711Ulaw),
            "g711_alaw" | "alaw" => Ok(Self::G711Alaw),
            "pcm16" | "pcm" | "linear16" => Ok(Self::Pcm16),
            other => Err(format!("unknown audio format '{other}'")),
        }
    }
}

impl fmt::Display for OpenAIRealtimeAudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Modalities
// =============================================================================

/// Output modalities for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

impl Modality {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }

    /// Modalities requested for a phone call: audio to play back, text for
    /// transcripts in logs.
    pub fn call_defaults() -> Vec<String> {
        vec![Self::Text.as_str().to_string(), Self::Audio.as_str().to_string()]
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parse() {
        assert_eq!(
            "alloy".parse::<OpenAIRealtimeVoice>(),
            Ok(OpenAIRealtimeVoice::Alloy)
        );
        assert_eq!(
            " SHIMMER ".parse::<OpenAIRealtimeVoice>(),
            Ok(OpenAIRealtimeVoice::Shimmer)
        );

        let err = "robot".parse::<OpenAIRealtimeVoice>().unwrap_err();
        assert!(err.contains("robot"));
        assert!(err.contains("verse"));
    }

    #[test]
    fn test_voice_all() {
        let voices = OpenAIRealtimeVoice::all();
        assert_eq!(voices.len(), 8);
        assert_eq!(voices[0], OpenAIRealtimeVoice::default());
    }

    #[test]
    fn test_audio_format_parse() {
        assert_eq!(
            "mulaw".parse::<OpenAIRealtimeAudioFormat>(),
            Ok(OpenAIRealtimeAudioFormat::G711Ulaw)
        );
        assert_eq!(
            "linear16".parse::<OpenAIRealtimeAudioFormat>(),
            Ok(OpenAIRealtimeAudioFormat::Pcm16)
        );
        assert!("opus".parse::<OpenAIRealtimeAudioFormat>().is_err());
    }

    #[test]
    fn test_audio_format_defaults_to_telephony() {
        let format = OpenAIRealtimeAudioFormat::default();
        assert_eq!(format.as_str(), "g711_ulaw");
        assert_eq!(format.sample_rate(), TELEPHONY_SAMPLE_RATE);
        assert!(format.is_telephony_passthrough());
        assert!(!OpenAIRealtimeAudioFormat::Pcm16.is_telephony_passthrough());
    }

    #[test]
    fn test_call_modalities() {
        assert_eq!(Modality::call_defaults(), vec!["text", "audio"]);
    }
}
