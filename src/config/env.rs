use std::path::PathBuf;

use super::utils::{env_bool, env_parse, env_string};
use super::{ServerConfig, TlsConfig, validation};

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Values missing from the environment fall back to defaults. The
    /// resulting configuration is validated before it is returned.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_from_env()?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

/// Build a configuration from environment variables without validating it.
pub(crate) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse::<u16>("PORT")? {
        config.port = port;
    }
    config.public_host = env_string("PUBLIC_HOST");

    // TLS needs both paths.
    config.tls = match (env_string("TLS_CERT_PATH"), env_string("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        (Some(_), None) => return Err("TLS_CERT_PATH is set but TLS_KEY_PATH is missing".into()),
        (None, Some(_)) => return Err("TLS_KEY_PATH is set but TLS_CERT_PATH is missing".into()),
    };

    config.openai_api_key = env_string("OPENAI_API_KEY");

    if let Some(url) = env_string("OPENAI_REALTIME_URL") {
        config.realtime_url = url;
    }
    if let Some(model) = env_string("OPENAI_REALTIME_MODEL") {
        config.realtime_model = model;
    }
    if let Some(voice) = env_string("VOICE") {
        config.voice = voice;
    }
    if let Some(message) = env_string("SYSTEM_MESSAGE") {
        config.system_message = message;
    }
    if let Some(temperature) = env_parse::<f32>("TEMPERATURE")? {
        config.temperature = temperature;
    }
    if let Some(format) = env_string("AUDIO_FORMAT") {
        config.audio_format = format;
    }
    if let Some(mode) = env_string("TURN_DETECTION") {
        config.turn_detection = mode;
    }
    if let Some(timeout) = env_parse::<u64>("SESSION_READY_TIMEOUT_MS")? {
        config.session_ready_timeout_ms = timeout;
    }
    config.initial_greeting = env_string("INITIAL_GREETING");
    if let Some(show) = env_bool("SHOW_TIMING_MATH")? {
        config.show_timing_math = show;
    }

    if let Some(message) = env_string("CALL_INTRO_MESSAGE") {
        config.call_intro_message = message;
    }
    if let Some(message) = env_string("CALL_READY_MESSAGE") {
        config.call_ready_message = message;
    }
    if let Some(pause) = env_parse::<u32>("CALL_PAUSE_SECONDS")? {
        config.call_pause_seconds = pause;
    }

    config.cors_allowed_origins = env_string("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = env_parse::<u32>("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse::<u32>("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    config.max_sessions = env_parse::<usize>("MAX_SESSIONS")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::super::tests::cleanup_env_vars;
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5050);
        assert!(config.openai_api_key.is_none());
        assert!(config.tls.is_none());
        assert_eq!(config.turn_detection, "server_vad");
        assert!(config.max_sessions.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "6060");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("VOICE", "sage");
            env::set_var("TEMPERATURE", "1.1");
            env::set_var("SHOW_TIMING_MATH", "true");
            env::set_var("INITIAL_GREETING", "Hi there");
            env::set_var("MAX_SESSIONS", "3");
            env::set_var("TLS_CERT_PATH", "/certs/cert.pem");
            env::set_var("TLS_KEY_PATH", "/certs/key.pem");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 6060);
        assert_eq!(config.openai_api_key().unwrap(), "sk-env");
        assert_eq!(config.voice, "sage");
        assert_eq!(config.temperature, 1.1);
        assert!(config.show_timing_math);
        assert_eq!(config.initial_greeting.as_deref(), Some("Hi there"));
        assert_eq!(config.max_sessions, Some(3));
        assert_eq!(
            config.tls.as_ref().unwrap().cert_path,
            PathBuf::from("/certs/cert.pem")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-number");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_half_tls_pair() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/certs/cert.pem");
        }

        assert!(ServerConfig::from_env().is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_voice() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOICE", "robot");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("voice"));

        cleanup_env_vars();
    }
}
