use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file take precedence over environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5050
///   public_host: "calls.example.com"
///   tls:
///     enabled: true
///     cert_path: "/etc/certs/cert.pem"
///     key_path: "/etc/certs/key.pem"
///
/// providers:
///   openai_api_key: "your-openai-key"
///
/// realtime:
///   model: "gpt-4o-realtime-preview-2024-10-01"
///   voice: "alloy"
///   instructions: "You are a helpful assistant."
///   temperature: 0.8
///   audio_format: "g711_ulaw"
///   turn_detection: "server_vad"
///   session_ready_timeout_ms: 250
///   initial_greeting: "Greet the caller and ask how you can help."
///   log_timing_math: false
///
/// call:
///   intro_message: "Please wait while we connect your call."
///   pause_seconds: 1
///   ready_message: "O.K. you can start talking!"
///
/// security:
///   max_sessions: 100
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   cors_allowed_origins: "*"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub call: Option<CallYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Host name advertised in the TwiML `<Stream>` URL
    pub public_host: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider API keys from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,
}

/// Realtime session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub temperature: Option<f32>,
    pub audio_format: Option<String>,
    /// server_vad, semantic_vad or none
    pub turn_detection: Option<String>,
    pub session_ready_timeout_ms: Option<u64>,
    pub initial_greeting: Option<String>,
    pub log_timing_math: Option<bool>,
}

/// Call-setup wording from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CallYaml {
    pub intro_message: Option<String>,
    pub ready_message: Option<String>,
    pub pause_seconds: Option<u32>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub max_sessions: Option<usize>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
