//! Configuration module for the Callbridge gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use callbridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

use zeroize::Zeroizing;

use crate::core::bridge::BridgeSettings;
use crate::core::realtime::{RealtimeConfig, TurnDetectionConfig};
use crate::core::telephony::CallScript;

pub use yaml::YamlConfig;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 5050;

/// Persona given to the assistant when no system message is configured
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful and bubbly AI assistant who loves \
to chat about anything the user is interested about and is prepared to offer them facts. \
You have a penchant for dad jokes, owl jokes, and rickrolling, subtly. \
Always stay positive, but work in a joke when appropriate.";

/// Default voice
pub const DEFAULT_VOICE: &str = "alloy";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Default audio format on both legs
pub const DEFAULT_AUDIO_FORMAT: &str = "g711_ulaw";

/// Default turn detection mode
pub const DEFAULT_TURN_DETECTION: &str = "server_vad";

/// Spoken before the stream is connected
pub const DEFAULT_CALL_INTRO_MESSAGE: &str = "Please wait while we connect your call to the \
A. I. voice assistant, powered by Twilio and the Open-A.I. Realtime API";

/// Spoken right before the stream is connected
pub const DEFAULT_CALL_READY_MESSAGE: &str = "O.K. you can start talking!";

/// Pause between the two messages (seconds)
pub const DEFAULT_CALL_PAUSE_SECONDS: u32 = 1;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS, public host for TwiML)
/// - OpenAI Realtime settings (credential, endpoint, model, persona)
/// - Call setup wording
/// - Security settings (CORS, rate limiting, session limit)
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Host name Twilio should use to reach `/media-stream`. When unset the
    /// `Host` header of the webhook request is used.
    pub public_host: Option<String>,

    // Provider credentials
    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,

    // Realtime session settings
    pub realtime_url: String,
    pub realtime_model: String,
    pub voice: String,
    /// System instructions sent in `session.update`
    pub system_message: String,
    pub temperature: f32,
    pub audio_format: String,
    /// Turn detection mode: server_vad, semantic_vad or none
    pub turn_detection: String,
    /// Wait for `session.created` before configuring the session anyway (ms)
    pub session_ready_timeout_ms: u64,
    /// Prompt that makes the assistant speak first
    pub initial_greeting: Option<String>,
    /// Log the barge-in timestamp arithmetic
    pub show_timing_math: bool,

    // Call setup
    pub call_intro_message: String,
    pub call_ready_message: String,
    pub call_pause_seconds: u32,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    /// Maximum concurrent calls
    /// Default: None (unlimited)
    pub max_sessions: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
            public_host: None,
            openai_api_key: None,
            realtime_url: crate::core::realtime::OPENAI_REALTIME_URL.to_string(),
            realtime_model: crate::core::realtime::openai::DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            audio_format: DEFAULT_AUDIO_FORMAT.to_string(),
            turn_detection: DEFAULT_TURN_DETECTION.to_string(),
            session_ready_timeout_ms: crate::core::realtime::DEFAULT_SESSION_READY_TIMEOUT_MS,
            initial_greeting: None,
            show_timing_math: false,
            call_intro_message: DEFAULT_CALL_INTRO_MESSAGE.to_string(),
            call_ready_message: DEFAULT_CALL_READY_MESSAGE.to_string(),
            call_pause_seconds: DEFAULT_CALL_PAUSE_SECONDS,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_sessions: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("public_host", &self.public_host)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("realtime_url", &self.realtime_url)
            .field("realtime_model", &self.realtime_model)
            .field("voice", &self.voice)
            .field("system_message", &self.system_message)
            .field("temperature", &self.temperature)
            .field("audio_format", &self.audio_format)
            .field("turn_detection", &self.turn_detection)
            .field("session_ready_timeout_ms", &self.session_ready_timeout_ms)
            .field("initial_greeting", &self.initial_greeting)
            .field("show_timing_math", &self.show_timing_math)
            .field("call_intro_message", &self.call_intro_message)
            .field("call_ready_message", &self.call_ready_message)
            .field("call_pause_seconds", &self.call_pause_seconds)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field(
                "rate_limit_requests_per_second",
                &self.rate_limit_requests_per_second,
            )
            .field("rate_limit_burst_size", &self.rate_limit_burst_size)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded into the process environment by main.rs before this runs.
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// The OpenAI API key, or an error naming the missing setting.
    pub fn openai_api_key(&self) -> Result<&str, String> {
        self.openai_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                "Missing the OpenAI API key. Please set OPENAI_API_KEY or providers.openai_api_key"
                    .to_string()
            })
    }

    /// Milliseconds to replenish one rate-limit token, derived from
    /// `rate_limit_requests_per_second`. Never zero.
    pub fn rate_limit_replenish_ms(&self) -> u64 {
        (1000 / u64::from(self.rate_limit_requests_per_second.max(1))).max(1)
    }

    /// Realtime link configuration shared by every call.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: Zeroizing::new(self.openai_api_key.clone().unwrap_or_default()),
            url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            voice: Some(self.voice.clone()),
            instructions: Some(self.system_message.clone()),
            temperature: Some(self.temperature),
            audio_format: Some(self.audio_format.clone()),
            modalities: None,
            turn_detection: TurnDetectionConfig::from_mode(&self.turn_detection),
            session_ready_timeout_ms: self.session_ready_timeout_ms,
            initial_greeting: self.initial_greeting.clone(),
        }
    }

    /// Settings every bridge session is created with.
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            realtime: self.realtime_config(),
            log_timing_math: self.show_timing_math,
        }
    }

    /// Wording of the call-setup TwiML.
    pub fn call_script(&self) -> CallScript {
        CallScript {
            intro_message: self.call_intro_message.clone(),
            pause_seconds: self.call_pause_seconds,
            ready_message: self.call_ready_message.clone(),
        }
    }
}
