//! Helpers for reading typed values from the environment.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Read an environment variable, treating empty values as unset.
pub(crate) fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse an environment variable.
///
/// Returns `Ok(None)` when the variable is unset and an error naming the
/// variable when the value does not parse.
pub(crate) fn env_parse<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} ('{raw}'): {e}")),
        None => Ok(None),
    }
}

/// Read a boolean flag. Accepts true/false, 1/0, yes/no and on/off.
pub(crate) fn env_bool(name: &str) -> Result<Option<bool>, String> {
    match env_string(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid boolean for {name}: '{raw}'")),
        None => Ok(None),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
