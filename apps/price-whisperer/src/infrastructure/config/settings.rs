//! Whisperer Configuration Settings
//!
//! Configuration types for the price whisperer, loaded from environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::narration::{
    MAX_RETRIES, MIN_SPEECH_INTERVAL, NarrationConfig, RETRY_DELAY, VoicePolicy,
};
use crate::domain::pricing::Instrument;

/// Default chain of the narrated token.
pub const DEFAULT_CHAIN: &str = "ethereum";

/// Default token contract (Lido staked ETH).
pub const DEFAULT_TOKEN_ADDRESS: &str = "0xae7ab96520de3a18e5e111b5eaab095312d7fe84";

/// Where ticks come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// Live WebSocket feed.
    WebSocket {
        /// Feed URL (`ws://` or `wss://`).
        url: String,
    },
    /// JSON-lines file played back at a fixed pace.
    Replay {
        /// File to replay.
        path: PathBuf,
        /// Delay between two ticks.
        interval: Duration,
    },
}

impl FeedSource {
    /// Short label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WebSocket { .. } => "websocket",
            Self::Replay { .. } => "replay",
        }
    }
}

/// Narration settings.
#[derive(Debug, Clone)]
pub struct NarrationSettings {
    /// Whether narration starts enabled.
    pub enabled: bool,
    /// Minimum time between two completed narrations.
    pub min_interval: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// Preferred voice name or id.
    pub voice: Option<String>,
    /// Speech synthesizer executable.
    pub command: String,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval: MIN_SPEECH_INTERVAL,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            voice: None,
            command: "espeak-ng".to_string(),
        }
    }
}

impl NarrationSettings {
    /// Engine tuning for these settings.
    #[must_use]
    pub fn engine_config(&self) -> NarrationConfig {
        NarrationConfig {
            min_interval: self.min_interval,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            voice_policy: VoicePolicy::new(self.voice.clone()),
        }
    }
}

/// Departing-price animation settings.
#[derive(Debug, Clone)]
pub struct AnimationSettings {
    /// Interval between two reaps.
    pub reap_interval: Duration,
    /// Length of the exit transition.
    pub fade: Duration,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            reap_interval: Duration::from_millis(1000),
            fade: Duration::from_millis(1500),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete whisperer configuration.
#[derive(Debug, Clone)]
pub struct WhispererConfig {
    /// Tick source.
    pub feed: FeedSource,
    /// Narrated instrument.
    pub instrument: Instrument,
    /// Narration settings.
    pub narration: NarrationSettings,
    /// Animation settings.
    pub animation: AnimationSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl WhispererConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if no feed is configured or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if no feed is configured or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let feed = match (env.get("WHISPER_FEED_URL"), env.get("WHISPER_REPLAY_FILE")) {
            (Some(url), None) => {
                let url = non_empty("WHISPER_FEED_URL", url)?;
                if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                    return Err(ConfigError::InvalidValue {
                        key: "WHISPER_FEED_URL".to_string(),
                        reason: "expected a ws:// or wss:// URL".to_string(),
                    });
                }
                FeedSource::WebSocket { url }
            }
            (None, Some(path)) => FeedSource::Replay {
                path: PathBuf::from(non_empty("WHISPER_REPLAY_FILE", path)?),
                interval: env.duration_millis("WHISPER_REPLAY_INTERVAL_MS", Duration::from_secs(1)),
            },
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflict(
                    "WHISPER_FEED_URL".to_string(),
                    "WHISPER_REPLAY_FILE".to_string(),
                ));
            }
            (None, None) => {
                return Err(ConfigError::MissingEnvVar(
                    "WHISPER_FEED_URL or WHISPER_REPLAY_FILE".to_string(),
                ));
            }
        };

        let instrument = Instrument::new(
            env.get("WHISPER_CHAIN")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CHAIN.to_string()),
            env.get("WHISPER_TOKEN_ADDRESS")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_ADDRESS.to_string()),
        );

        let defaults = NarrationSettings::default();
        let narration = NarrationSettings {
            enabled: env.bool("NARRATION_ENABLED", defaults.enabled),
            min_interval: env.duration_millis("NARRATION_MIN_INTERVAL_MS", defaults.min_interval),
            max_retries: env.parse("NARRATION_MAX_RETRIES", defaults.max_retries),
            retry_delay: env.duration_millis("NARRATION_RETRY_DELAY_MS", defaults.retry_delay),
            voice: env.get("NARRATION_VOICE").filter(|v| !v.trim().is_empty()),
            command: env
                .get("NARRATION_COMMAND")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.command),
        };

        let animation = AnimationSettings {
            reap_interval: env.duration_millis(
                "ANIMATION_REAP_INTERVAL_MS",
                AnimationSettings::default().reap_interval,
            ),
            fade: env.duration_millis("ANIMATION_FADE_MS", AnimationSettings::default().fade),
        };

        let server = ServerSettings {
            health_port: env.parse("WHISPER_HEALTH_PORT", ServerSettings::default().health_port),
        };

        Ok(Self {
            feed,
            instrument,
            narration,
            animation,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Two mutually exclusive variables are both set.
    #[error("environment variables {0} and {1} cannot both be set")]
    Conflict(String, String),
}

fn non_empty(key: &str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(trimmed.to_string())
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|millis| *millis > 0)
            .map_or(default, Duration::from_millis)
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<WhispererConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        WhispererConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn websocket_feed_with_defaults() {
        let config = config(&[("WHISPER_FEED_URL", "wss://feed.example/ws")]).unwrap();

        assert_eq!(
            config.feed,
            FeedSource::WebSocket {
                url: "wss://feed.example/ws".to_string()
            }
        );
        assert_eq!(config.instrument.chain, "ethereum");
        assert_eq!(config.instrument.token_address, DEFAULT_TOKEN_ADDRESS);
        assert!(config.narration.enabled);
        assert_eq!(config.narration.min_interval, Duration::from_millis(2000));
        assert_eq!(config.narration.max_retries, 3);
        assert_eq!(config.narration.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.narration.command, "espeak-ng");
        assert!(config.narration.voice.is_none());
        assert_eq!(config.animation.reap_interval, Duration::from_millis(1000));
        assert_eq!(config.animation.fade, Duration::from_millis(1500));
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn replay_feed() {
        let config = config(&[
            ("WHISPER_REPLAY_FILE", "ticks.jsonl"),
            ("WHISPER_REPLAY_INTERVAL_MS", "250"),
        ])
        .unwrap();

        assert_eq!(
            config.feed,
            FeedSource::Replay {
                path: PathBuf::from("ticks.jsonl"),
                interval: Duration::from_millis(250),
            }
        );
        assert_eq!(config.feed.as_str(), "replay");
    }

    #[test]
    fn missing_feed_is_an_error() {
        let err = config(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn both_feeds_conflict() {
        let err = config(&[
            ("WHISPER_FEED_URL", "ws://localhost:9000"),
            ("WHISPER_REPLAY_FILE", "ticks.jsonl"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Conflict(_, _)));
    }

    #[test]
    fn empty_feed_url_is_an_error() {
        let err = config(&[("WHISPER_FEED_URL", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(_)));
    }

    #[test]
    fn non_websocket_url_is_rejected() {
        let err = config(&[("WHISPER_FEED_URL", "https://feed.example")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("WHISPER_FEED_URL"));
    }

    #[test]
    fn narration_overrides() {
        let config = config(&[
            ("WHISPER_FEED_URL", "ws://localhost:9000"),
            ("NARRATION_ENABLED", "off"),
            ("NARRATION_MIN_INTERVAL_MS", "5000"),
            ("NARRATION_MAX_RETRIES", "1"),
            ("NARRATION_RETRY_DELAY_MS", "200"),
            ("NARRATION_VOICE", "en-gb"),
            ("NARRATION_COMMAND", "espeak"),
        ])
        .unwrap();

        assert!(!config.narration.enabled);
        let engine = config.narration.engine_config();
        assert_eq!(engine.min_interval, Duration::from_secs(5));
        assert_eq!(engine.max_retries, 1);
        assert_eq!(engine.retry_delay, Duration::from_millis(200));
        assert_eq!(engine.voice_policy.preferred(), Some("en-gb"));
        assert_eq!(config.narration.command, "espeak");
    }

    #[test]
    fn unparsable_values_fall_back_to_defaults() {
        let config = config(&[
            ("WHISPER_FEED_URL", "ws://localhost:9000"),
            ("NARRATION_ENABLED", "maybe"),
            ("NARRATION_MAX_RETRIES", "-1"),
            ("WHISPER_HEALTH_PORT", "99999"),
        ])
        .unwrap();

        assert!(config.narration.enabled);
        assert_eq!(config.narration.max_retries, 3);
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let config = config(&[
            ("WHISPER_REPLAY_FILE", "ticks.jsonl"),
            ("WHISPER_REPLAY_INTERVAL_MS", "0"),
            ("ANIMATION_REAP_INTERVAL_MS", "0"),
        ])
        .unwrap();

        assert_eq!(
            config.feed,
            FeedSource::Replay {
                path: PathBuf::from("ticks.jsonl"),
                interval: Duration::from_secs(1),
            }
        );
        assert_eq!(config.animation.reap_interval, Duration::from_millis(1000));
    }
}
