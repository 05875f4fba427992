//! Runtime configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REPLY_RETRIES: u32 = 1;
/// A publish is retried at most once before the engine counts as unavailable
const MAX_REPLY_RETRIES: u32 = 1;
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionConfig {
    /// How long the driver waits for a prompt before republishing
    pub reply_timeout: Duration,
    /// Republish attempts before the session is abandoned, 0 or 1
    pub reply_retries: u32,
    /// JSON-lines file receiving every exchange; disabled when None
    pub responses_path: Option<PathBuf>,
    /// Per-subscriber queue depth of the in-process channel
    pub channel_capacity: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(DEFAULT_REPLY_TIMEOUT_SECS),
            reply_retries: DEFAULT_REPLY_RETRIES,
            responses_path: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ReflectionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            reply_timeout: lookup("REFLECTION_REPLY_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map_or(defaults.reply_timeout, Duration::from_secs),
            reply_retries: lookup("REFLECTION_REPLY_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .map_or(defaults.reply_retries, |n: u32| n.min(MAX_REPLY_RETRIES)),
            responses_path: lookup("REFLECTION_RESPONSES_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            channel_capacity: lookup("REFLECTION_CHANNEL_CAPACITY")
                .and_then(|v| v.trim().parse().ok())
                .filter(|cap: &usize| *cap > 0)
                .unwrap_or(defaults.channel_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ReflectionConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ReflectionConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(config_from(&[]), ReflectionConfig::default());
    }

    #[test]
    fn test_values_are_read() {
        let config = config_from(&[
            ("REFLECTION_REPLY_TIMEOUT_SECS", "3"),
            ("REFLECTION_REPLY_RETRIES", "0"),
            ("REFLECTION_RESPONSES_PATH", "/tmp/responses.jsonl"),
            ("REFLECTION_CHANNEL_CAPACITY", "8"),
        ]);
        assert_eq!(config.reply_timeout, Duration::from_secs(3));
        assert_eq!(config.reply_retries, 0);
        assert_eq!(
            config.responses_path,
            Some(PathBuf::from("/tmp/responses.jsonl"))
        );
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn test_retries_capped_at_one() {
        let config = config_from(&[("REFLECTION_REPLY_RETRIES", "5")]);
        assert_eq!(config.reply_retries, 1);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("REFLECTION_REPLY_TIMEOUT_SECS", "0"),
            ("REFLECTION_REPLY_RETRIES", "many"),
            ("REFLECTION_RESPONSES_PATH", "  "),
            ("REFLECTION_CHANNEL_CAPACITY", "-4"),
        ]);
        assert_eq!(config, ReflectionConfig::default());
    }
}
