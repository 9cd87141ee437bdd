use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Merge YAML values over the environment-based configuration.
///
/// Every value present in `yaml` replaces the one loaded from the
/// environment. `server.tls.enabled: false` turns TLS off even when the
/// environment supplies certificate paths.
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if server.public_host.is_some() {
            config.public_host = server.public_host;
        }
        if let Some(tls) = server.tls {
            config.tls = merge_tls(config.tls.take(), tls)?;
        }
    }

    if let Some(providers) = yaml.providers
        && providers.openai_api_key.is_some()
    {
        config.openai_api_key = providers.openai_api_key;
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(url) = realtime.url {
            config.realtime_url = url;
        }
        if let Some(model) = realtime.model {
            config.realtime_model = model;
        }
        if let Some(voice) = realtime.voice {
            config.voice = voice;
        }
        if let Some(instructions) = realtime.instructions {
            config.system_message = instructions;
        }
        if let Some(temperature) = realtime.temperature {
            config.temperature = temperature;
        }
        if let Some(format) = realtime.audio_format {
            config.audio_format = format;
        }
        if let Some(mode) = realtime.turn_detection {
            config.turn_detection = mode;
        }
        if let Some(timeout) = realtime.session_ready_timeout_ms {
            config.session_ready_timeout_ms = timeout;
        }
        if realtime.initial_greeting.is_some() {
            config.initial_greeting = realtime.initial_greeting;
        }
        if let Some(show) = realtime.log_timing_math {
            config.show_timing_math = show;
        }
    }

    if let Some(call) = yaml.call {
        if let Some(message) = call.intro_message {
            config.call_intro_message = message;
        }
        if let Some(message) = call.ready_message {
            config.call_ready_message = message;
        }
        if let Some(pause) = call.pause_seconds {
            config.call_pause_seconds = pause;
        }
    }

    if let Some(security) = yaml.security {
        if security.max_sessions.is_some() {
            config.max_sessions = security.max_sessions;
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
    }

    Ok(config)
}

fn merge_tls(
    from_env: Option<TlsConfig>,
    yaml: super::yaml::TlsYaml,
) -> Result<Option<TlsConfig>, String> {
    if yaml.enabled == Some(false) {
        return Ok(None);
    }

    let cert_path = yaml
        .cert_path
        .map(PathBuf::from)
        .or_else(|| from_env.as_ref().map(|tls| tls.cert_path.clone()));
    let key_path = yaml
        .key_path
        .map(PathBuf::from)
        .or_else(|| from_env.as_ref().map(|tls| tls.key_path.clone()));

    match (cert_path, key_path) {
        (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
            cert_path,
            key_path,
        })),
        (None, None) if yaml.enabled != Some(true) => Ok(None),
        _ => Err("TLS requires both server.tls.cert_path and server.tls.key_path".to_string()),
    }
}
