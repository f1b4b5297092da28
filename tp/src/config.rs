//! TripPlanner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::ClockTime;

/// Main TripPlanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error); CLI flag wins
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Intent parser selection
    pub intent: IntentConfig,

    /// External data providers
    pub providers: ProvidersConfig,

    /// Itinerary shaping and pricing
    pub planning: PlanningConfig,

    /// Session lifecycle
    pub sessions: SessionsConfig,

    /// Share links
    pub sharing: SharingConfig,

    /// Progress stream limits
    pub progress: ProgressConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tripplanner.yml
        let local_config = PathBuf::from(".tripplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tripplanner/tripplanner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripplanner").join("tripplanner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentParserKind {
    Rules,
    Llm,
}

/// Intent parser selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// "rules" (offline) or "llm"
    pub parser: IntentParserKind,

    /// Upper bound for a single parse
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            parser: IntentParserKind::Rules,
            timeout_ms: 30_000,
        }
    }
}

impl IntentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Template,
    Http,
}

/// External data providers; every call has its own deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// "template" (offline) or "http"
    pub kind: ProviderKind,

    /// Base URL of the provider service for the http kind
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "flights-timeout-ms")]
    pub flights_timeout_ms: u64,

    #[serde(rename = "hotels-timeout-ms")]
    pub hotels_timeout_ms: u64,

    #[serde(rename = "weather-timeout-ms")]
    pub weather_timeout_ms: u64,

    #[serde(rename = "activities-timeout-ms")]
    pub activities_timeout_ms: u64,

    #[serde(rename = "alternatives-timeout-ms")]
    pub alternatives_timeout_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Template,
            base_url: "http://localhost:8088".to_string(),
            flights_timeout_ms: 20_000,
            hotels_timeout_ms: 20_000,
            weather_timeout_ms: 10_000,
            activities_timeout_ms: 45_000,
            alternatives_timeout_ms: 15_000,
        }
    }
}

/// Per-call deadlines derived from [`ProvidersConfig`]
#[derive(Debug, Clone, Copy)]
pub struct ProviderTimeouts {
    pub flights: Duration,
    pub hotels: Duration,
    pub weather: Duration,
    pub activities: Duration,
    pub alternatives: Duration,
}

impl ProvidersConfig {
    pub fn timeouts(&self) -> ProviderTimeouts {
        ProviderTimeouts {
            flights: Duration::from_millis(self.flights_timeout_ms),
            hotels: Duration::from_millis(self.hotels_timeout_ms),
            weather: Duration::from_millis(self.weather_timeout_ms),
            activities: Duration::from_millis(self.activities_timeout_ms),
            alternatives: Duration::from_millis(self.alternatives_timeout_ms),
        }
    }
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        ProvidersConfig::default().timeouts()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviserKind {
    Heuristic,
    Llm,
}

/// Itinerary shaping and pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Currency for estimates
    pub currency: String,

    /// Time after landing before the first activity on day 1
    #[serde(rename = "arrival-buffer-minutes")]
    pub arrival_buffer_minutes: u16,

    /// Time before the return flight when the last day ends
    #[serde(rename = "departure-buffer-minutes")]
    pub departure_buffer_minutes: u16,

    /// Hotel checkout, used to pace the last day when no flight is known
    #[serde(rename = "checkout-time")]
    pub checkout_time: ClockTime,

    /// Local transport estimate per day, whole party
    #[serde(rename = "daily-transport-estimate")]
    pub daily_transport_estimate: f64,

    /// "heuristic" or "llm"
    pub reviser: ReviserKind,

    /// Precipitation chance at which a day counts as wet
    #[serde(rename = "rain-threshold")]
    pub rain_threshold: f32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            arrival_buffer_minutes: 90,
            departure_buffer_minutes: 180,
            checkout_time: ClockTime::from_minutes(11 * 60),
            daily_transport_estimate: 15.0,
            reviser: ReviserKind::Heuristic,
            rain_threshold: 0.6,
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Inactivity after which `sessions expire` removes a session
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { ttl_secs: 7 * 24 * 3600 }
    }
}

/// Share links
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    /// Prefix for share URLs
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Length of generated share tokens
    #[serde(rename = "token-length")]
    pub token_length: usize,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/shared".to_string(),
            token_length: 22,
        }
    }
}

/// Progress stream limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Hard ceiling for one progress subscription
    #[serde(rename = "ceiling-secs")]
    pub ceiling_secs: u64,

    /// Buffered events per subscriber
    #[serde(rename = "channel-capacity")]
    pub channel_capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            ceiling_secs: 120,
            channel_capacity: 64,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the TripStore database
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/tripplanner/store on Linux)
        let path = dirs::data_local_dir()
            .map(|d| d.join("tripplanner").join("store"))
            .unwrap_or_else(|| PathBuf::from(".tripstore"))
            .to_string_lossy()
            .into_owned();

        Self { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.intent.parser, IntentParserKind::Rules);
        assert_eq!(config.providers.kind, ProviderKind::Template);
        assert_eq!(config.planning.arrival_buffer_minutes, 90);
        assert_eq!(config.planning.departure_buffer_minutes, 180);
        assert_eq!(config.planning.checkout_time.to_string(), "11:00");
        assert_eq!(config.sharing.token_length, 22);
        assert_eq!(config.progress.ceiling_secs, 120);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

llm:
  provider: openai
  model: gpt-4o
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  max-tokens: 2048
  timeout-ms: 10000

intent:
  parser: llm
  timeout-ms: 5000

providers:
  kind: http
  base-url: http://providers.internal
  flights-timeout-ms: 1000

planning:
  currency: USD
  checkout-time: "10:30"
  reviser: llm
  rain-threshold: 0.5

sharing:
  base-url: https://trips.example.com/s
  token-length: 32
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.intent.parser, IntentParserKind::Llm);
        assert_eq!(config.intent.timeout(), Duration::from_secs(5));
        assert_eq!(config.providers.kind, ProviderKind::Http);
        assert_eq!(config.providers.timeouts().flights, Duration::from_secs(1));
        assert_eq!(config.providers.hotels_timeout_ms, 20_000);
        assert_eq!(config.planning.currency, "USD");
        assert_eq!(config.planning.checkout_time.to_string(), "10:30");
        assert_eq!(config.planning.reviser, ReviserKind::Llm);
        assert_eq!(config.sharing.token_length, 32);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
planning:
  currency: TRY
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.planning.currency, "TRY");

        // Defaults for unspecified
        assert_eq!(config.planning.rain_threshold, 0.6);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.sessions.ttl_secs, 7 * 24 * 3600);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tp.yml");
        std::fs::write(&path, "storage:\n  path: /tmp/tp-store\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.storage.path, "/tmp/tp-store");

        let missing = dir.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
