//! Runtime configuration
//!
//! Defaults come from [`crate::constants`]; `EngineConfig::from_env`
//! overrides them from the process environment. Binaries load `.env`
//! with `dotenvy` before calling it.

use crate::{
    constants::{
        DEFAULT_RATE_LIMIT_KEYS, DEFAULT_RATE_LIMIT_PHRASES, DEV_FALLBACK_TTL_SECS,
        DEV_QUOTE_TTL_SECS, EXCHANGE_TIMEOUT_SECS, FALLBACK_TTL_SECS, HISTORY_TTL_SECS,
        MAX_TIMEOUT_SECS, QUOTE_TTL_SECS, RATE_LIMIT_COOLDOWN_SECS, REQUEST_TIMEOUT_SECS,
    },
    error::ConfigError,
};
use std::str::FromStr;
use std::time::Duration;

/// How the primary API's HTTP 200 throttling bodies are recognised
///
/// Provider wording changes without notice, so both lists are
/// configurable rather than baked into the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitMarkers {
    /// Top-level JSON keys that signal throttling
    pub keys: Vec<String>,
    /// Case-insensitive phrases that signal throttling anywhere in the body
    pub phrases: Vec<String>,
}

impl Default for RateLimitMarkers {
    fn default() -> Self {
        Self {
            keys: DEFAULT_RATE_LIMIT_KEYS.iter().map(|k| k.to_string()).collect(),
            phrases: DEFAULT_RATE_LIMIT_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl RateLimitMarkers {
    /// True if the parsed body carries a throttling marker
    pub fn matches(&self, body: &serde_json::Value, raw: &str) -> bool {
        if let Some(object) = body.as_object() {
            if self.keys.iter().any(|key| object.contains_key(key)) {
                return true;
            }
        }

        let lowered = raw.to_lowercase();
        self.phrases
            .iter()
            .any(|phrase| lowered.contains(&phrase.to_lowercase()))
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Key for the primary quote API; without it that source is skipped
    pub api_key: Option<String>,
    /// TTL for quotes served by a live source
    pub quote_ttl: Duration,
    /// TTL for quotes served from the static table
    pub fallback_ttl: Duration,
    /// TTL for price histories
    pub history_ttl: Duration,
    /// Per-call timeout for quote APIs and the scraper
    pub request_timeout: Duration,
    /// Per-call timeout for the exchange API
    pub exchange_timeout: Duration,
    /// How long a throttled source is skipped; zero disables cooldowns
    pub rate_limit_cooldown: Duration,
    /// Throttling markers for the primary API
    pub rate_limit_markers: RateLimitMarkers,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl EngineConfig {
    /// Production defaults
    pub fn production() -> Self {
        Self {
            api_key: None,
            quote_ttl: Duration::from_secs(QUOTE_TTL_SECS),
            fallback_ttl: Duration::from_secs(FALLBACK_TTL_SECS),
            history_ttl: Duration::from_secs(HISTORY_TTL_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            exchange_timeout: Duration::from_secs(EXCHANGE_TIMEOUT_SECS),
            rate_limit_cooldown: Duration::from_secs(RATE_LIMIT_COOLDOWN_SECS),
            rate_limit_markers: RateLimitMarkers::default(),
        }
    }

    /// Shorter cache lifetimes for interactive development
    pub fn development() -> Self {
        Self {
            quote_ttl: Duration::from_secs(DEV_QUOTE_TTL_SECS),
            fallback_ttl: Duration::from_secs(DEV_FALLBACK_TTL_SECS),
            ..Self::production()
        }
    }

    /// Reads configuration from the process environment
    ///
    /// Recognised variables: `ALPHA_VANTAGE_API_KEY`, `DEBUG`,
    /// `QUOTE_TTL_SECS`, `FALLBACK_TTL_SECS`, `HISTORY_TTL_SECS`,
    /// `REQUEST_TIMEOUT_SECS`, `EXCHANGE_TIMEOUT_SECS`,
    /// `RATE_LIMIT_COOLDOWN_SECS`, `PRIMARY_RATE_LIMIT_KEYS`,
    /// `PRIMARY_RATE_LIMIT_PHRASES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = match lookup("DEBUG") {
            Some(value) => parse_bool("DEBUG", &value)?,
            None => false,
        };

        let mut config = if debug {
            Self::development()
        } else {
            Self::production()
        };

        config.api_key = lookup("ALPHA_VANTAGE_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        if let Some(secs) = parse_var::<u64, _>(&lookup, "QUOTE_TTL_SECS")? {
            config.quote_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "FALLBACK_TTL_SECS")? {
            config.fallback_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "HISTORY_TTL_SECS")? {
            config.history_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = clamp_timeout(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "EXCHANGE_TIMEOUT_SECS")? {
            config.exchange_timeout = clamp_timeout(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "RATE_LIMIT_COOLDOWN_SECS")? {
            config.rate_limit_cooldown = Duration::from_secs(secs);
        }
        if let Some(keys) = lookup("PRIMARY_RATE_LIMIT_KEYS") {
            config.rate_limit_markers.keys = split_list(&keys);
        }
        if let Some(phrases) = lookup("PRIMARY_RATE_LIMIT_PHRASES") {
            config.rate_limit_markers.phrases = split_list(&phrases);
        }

        Ok(config)
    }

    /// Builder-style API key setter
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Per-call timeouts stay within 1..=9 seconds
fn clamp_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(1, MAX_TIMEOUT_SECS))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.quote_ttl, Duration::from_secs(QUOTE_TTL_SECS));
        assert_eq!(config.fallback_ttl, Duration::from_secs(FALLBACK_TTL_SECS));
        assert!(config.fallback_ttl < config.quote_ttl);
    }

    #[test]
    fn test_debug_switches_to_development_ttls() {
        let config = EngineConfig::from_lookup(lookup_from(&[("DEBUG", "True")])).unwrap();
        assert_eq!(config.quote_ttl, Duration::from_secs(DEV_QUOTE_TTL_SECS));
        assert_eq!(config.fallback_ttl, Duration::from_secs(DEV_FALLBACK_TTL_SECS));
    }

    #[test]
    fn test_overrides_and_clamping() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("ALPHA_VANTAGE_API_KEY", " demo "),
            ("QUOTE_TTL_SECS", "120"),
            ("REQUEST_TIMEOUT_SECS", "30"),
            ("EXCHANGE_TIMEOUT_SECS", "0"),
            ("PRIMARY_RATE_LIMIT_KEYS", "Note, Throttle ,"),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("demo"));
        assert_eq!(config.quote_ttl, Duration::from_secs(120));
        assert_eq!(config.request_timeout, Duration::from_secs(MAX_TIMEOUT_SECS));
        assert_eq!(config.exchange_timeout, Duration::from_secs(1));
        assert_eq!(config.rate_limit_markers.keys, vec!["Note", "Throttle"]);
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let config =
            EngineConfig::from_lookup(lookup_from(&[("ALPHA_VANTAGE_API_KEY", "  ")])).unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[("QUOTE_TTL_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("QUOTE_TTL_SECS"));
        assert!(EngineConfig::from_lookup(lookup_from(&[("DEBUG", "maybe")])).is_err());
    }

    #[test]
    fn test_rate_limit_markers() {
        let markers = RateLimitMarkers::default();
        let note = serde_json::json!({"Note": "Thank you for using Alpha Vantage!"});
        assert!(markers.matches(&note, &note.to_string()));

        let raw = r#"{"message": "You have exceeded the Rate Limit"}"#;
        let body: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert!(markers.matches(&body, raw));

        let ok = serde_json::json!({"Global Quote": {}});
        assert!(!markers.matches(&ok, &ok.to_string()));
    }
}
