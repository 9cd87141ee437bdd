//! Checks run on the fully merged configuration.

use std::str::FromStr;

use super::ServerConfig;
use crate::core::realtime::{OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, TurnDetectionConfig};

/// Allowed sampling temperature range for the Realtime API
pub(crate) const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.6..=1.2;

/// Upper bound for the `session.created` wait
pub(crate) const MAX_SESSION_READY_TIMEOUT_MS: u64 = 10_000;

/// Validate a merged configuration.
///
/// The OpenAI API key is not checked here; startup requires it separately so
/// configurations can be loaded and inspected without credentials.
pub(crate) fn validate_config(config: &ServerConfig) -> Result<(), String> {
    if config.port == 0 {
        return Err("port must be greater than 0".to_string());
    }

    if !TEMPERATURE_RANGE.contains(&config.temperature) {
        return Err(format!(
            "temperature must be between {} and {}, got {}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end(),
            config.temperature
        ));
    }

    if config.session_ready_timeout_ms > MAX_SESSION_READY_TIMEOUT_MS {
        return Err(format!(
            "session_ready_timeout_ms must be at most {MAX_SESSION_READY_TIMEOUT_MS}, got {}",
            config.session_ready_timeout_ms
        ));
    }

    validate_realtime_url(&config.realtime_url)?;

    if config.realtime_model.trim().is_empty() {
        return Err("realtime model must not be empty".to_string());
    }

    OpenAIRealtimeVoice::from_str(&config.voice).map_err(|e| format!("Invalid voice: {e}"))?;
    OpenAIRealtimeAudioFormat::from_str(&config.audio_format)
        .map_err(|e| format!("Invalid audio_format: {e}"))?;

    if TurnDetectionConfig::from_mode(&config.turn_detection).is_none() {
        return Err(format!(
            "Invalid turn_detection '{}', expected server_vad, semantic_vad or none",
            config.turn_detection
        ));
    }

    if let Some(tls) = &config.tls
        && (tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty())
    {
        return Err("TLS cert_path and key_path must both be set".to_string());
    }

    if let Some(host) = &config.public_host {
        validate_public_host(host)?;
    }

    if config.rate_limit_requests_per_second == 0 {
        return Err("rate_limit_requests_per_second must be greater than 0".to_string());
    }
    if config.rate_limit_burst_size == 0 {
        return Err("rate_limit_burst_size must be greater than 0".to_string());
    }

    if config.max_sessions == Some(0) {
        return Err("max_sessions must be greater than 0 when set".to_string());
    }

    Ok(())
}

fn validate_realtime_url(raw: &str) -> Result<(), String> {
    let url = url::Url::parse(raw).map_err(|e| format!("Invalid realtime url '{raw}': {e}"))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!(
            "Invalid realtime url '{raw}': scheme must be ws or wss, got {other}"
        )),
    }
}

/// `public_host` is a bare authority such as `calls.example.com` or `host:8443`.
fn validate_public_host(host: &str) -> Result<(), String> {
    if host.contains("://") || host.contains('/') {
        return Err(format!(
            "public_host must be a host name without scheme or path, got '{host}'"
        ));
    }
    host.parse::<http::uri::Authority>()
        .map(|_| ())
        .map_err(|e| format!("Invalid public_host '{host}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_temperature_bounds() {
        let mut config = ServerConfig::default();
        config.temperature = 0.6;
        assert!(validate_config(&config).is_ok());
        config.temperature = 1.2;
        assert!(validate_config(&config).is_ok());

        config.temperature = 0.5;
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("temperature"));
        config.temperature = 1.3;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_realtime_url_scheme() {
        let mut config = ServerConfig::default();
        config.realtime_url = "https://api.openai.com/v1/realtime".to_string();
        assert!(validate_config(&config).unwrap_err().contains("ws or wss"));

        config.realtime_url = "ws://localhost:9000/v1/realtime".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_enumerated_settings() {
        let mut config = ServerConfig::default();
        config.voice = "robot".to_string();
        assert!(validate_config(&config).unwrap_err().contains("voice"));

        let mut config = ServerConfig::default();
        config.audio_format = "mp3".to_string();
        assert!(validate_config(&config).unwrap_err().contains("audio_format"));

        let mut config = ServerConfig::default();
        config.turn_detection = "push_to_talk".to_string();
        assert!(validate_config(&config).unwrap_err().contains("turn_detection"));

        let mut config = ServerConfig::default();
        config.turn_detection = "semantic_vad".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_session_ready_timeout_bound() {
        let mut config = ServerConfig::default();
        config.session_ready_timeout_ms = MAX_SESSION_READY_TIMEOUT_MS + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_public_host() {
        let mut config = ServerConfig::default();
        config.public_host = Some("calls.example.com:8443".to_string());
        assert!(validate_config(&config).is_ok());

        config.public_host = Some("https://calls.example.com".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_tls_paths_must_be_non_empty() {
        let mut config = ServerConfig::default();
        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("/c.pem"),
            key_path: PathBuf::new(),
        });
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_limits() {
        let mut config = ServerConfig::default();
        config.rate_limit_burst_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ServerConfig::default();
        config.max_sessions = Some(0);
        assert!(validate_config(&config).is_err());
    }
}
