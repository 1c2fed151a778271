//! Service configuration.
//!
//! Settings come from defaults, then environment variables, then CLI flags
//! applied through the `with_*` builders.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed fixture dataset file.
    #[error("Invalid fixture file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Where a task's result comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Replay a deterministic dataset with simulated progress.
    Fixture,
    /// Drive the collaborator pipeline against the text-generation provider.
    Live,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Fixture => "fixture",
            RunMode::Live => "live",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixture" | "mock" => Ok(RunMode::Fixture),
            "live" => Ok(RunMode::Live),
            other => Err(format!("unknown run mode '{}'", other)),
        }
    }
}

pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Configuration for the generation service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,

    // Provider settings
    /// API key for the text-generation provider.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint.
    pub api_base: String,
    pub model: String,
    pub temperature: f64,

    // Pipeline settings
    /// Maximum collaborator rounds per run.
    pub max_rounds: u32,
    /// Cap on a single collaborator response.
    pub turn_timeout: Duration,
    /// Cap on a whole live run.
    pub run_timeout: Duration,
    /// End the exchange early once every kind resolves.
    pub stop_when_satisfied: bool,

    // Fixture settings
    pub fixture_step_delay: Duration,
    /// Optional YAML dataset replacing the built-in fixture.
    pub fixture_path: Option<PathBuf>,

    // Server settings
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Fixture,

            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.4,

            max_rounds: 3,
            turn_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(900),
            stop_when_satisfied: true,

            fixture_step_delay: Duration::from_secs(1),
            fixture_path: None,

            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `USE_MOCK_DATA`: Fixture mode when true (default: true)
    /// - `GROQ_API_KEY`: Provider API key, falling back to `LITELLM_API_KEY`
    /// - `LLM_API_BASE`: Provider base URL (default: Groq)
    /// - `LLM_MODEL`: Model identifier
    /// - `LLM_TEMPERATURE`: Sampling temperature (default: 0.4)
    /// - `LEAD_FORGE_MAX_ROUNDS`: Maximum rounds (default: 3)
    /// - `LEAD_FORGE_TURN_TIMEOUT_SECS`: Per-turn timeout (default: 120)
    /// - `LEAD_FORGE_RUN_TIMEOUT_SECS`: Whole-run timeout (default: 900)
    /// - `LEAD_FORGE_STOP_WHEN_SATISFIED`: Early stop (default: true)
    /// - `LEAD_FORGE_STEP_DELAY_MS`: Fixture step delay (default: 1000)
    /// - `LEAD_FORGE_FIXTURE_PATH`: YAML fixture dataset
    /// - `LEAD_FORGE_HOST` / `LEAD_FORGE_PORT`: Listen address (default: 0.0.0.0:8000)
    ///
    /// A missing API key is not an error here; live runs report it per task.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("USE_MOCK_DATA") {
            config.mode = if parse_env_bool(&val, "USE_MOCK_DATA")? {
                RunMode::Fixture
            } else {
                RunMode::Live
            };
        }

        config.api_key = lookup("GROQ_API_KEY")
            .or_else(|| lookup("LITELLM_API_KEY"))
            .filter(|key| !key.trim().is_empty());

        if let Some(val) = lookup("LLM_API_BASE") {
            config.api_base = val;
        }

        if let Some(val) = lookup("LLM_MODEL") {
            config.model = val;
        }

        if let Some(val) = lookup("LLM_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "LLM_TEMPERATURE")?;
        }

        if let Some(val) = lookup("LEAD_FORGE_MAX_ROUNDS") {
            config.max_rounds = parse_env_value(&val, "LEAD_FORGE_MAX_ROUNDS")?;
        }

        if let Some(val) = lookup("LEAD_FORGE_TURN_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "LEAD_FORGE_TURN_TIMEOUT_SECS")?;
            config.turn_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("LEAD_FORGE_RUN_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "LEAD_FORGE_RUN_TIMEOUT_SECS")?;
            config.run_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("LEAD_FORGE_STOP_WHEN_SATISFIED") {
            config.stop_when_satisfied = parse_env_bool(&val, "LEAD_FORGE_STOP_WHEN_SATISFIED")?;
        }

        if let Some(val) = lookup("LEAD_FORGE_STEP_DELAY_MS") {
            let ms: u64 = parse_env_value(&val, "LEAD_FORGE_STEP_DELAY_MS")?;
            config.fixture_step_delay = Duration::from_millis(ms);
        }

        if let Some(val) = lookup("LEAD_FORGE_FIXTURE_PATH") {
            config.fixture_path = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("LEAD_FORGE_HOST") {
            config.host = val;
        }

        if let Some(val) = lookup("LEAD_FORGE_PORT") {
            config.port = parse_env_value(&val, "LEAD_FORGE_PORT")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_rounds must be greater than 0".to_string(),
            ));
        }

        if self.turn_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "turn_timeout must be greater than 0".to_string(),
            ));
        }

        if self.run_timeout < self.turn_timeout {
            return Err(ConfigError::ValidationFailed(
                "run_timeout cannot be shorter than turn_timeout".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.api_base.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "api_base cannot be empty".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Listen address for the HTTP service.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_stop_when_satisfied(mut self, enabled: bool) -> Self {
        self.stop_when_satisfied = enabled;
        self
    }

    pub fn with_fixture_step_delay(mut self, delay: Duration) -> Self {
        self.fixture_step_delay = delay;
        self
    }

    pub fn with_fixture_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixture_path = Some(path.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.mode, RunMode::Fixture);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_defaults_to_fixture() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.mode, RunMode::Fixture);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_from_lookup_live_mode() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("USE_MOCK_DATA", "false"),
            ("GROQ_API_KEY", "gsk-test"),
            ("LEAD_FORGE_MAX_ROUNDS", "5"),
            ("LEAD_FORGE_STEP_DELAY_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.mode, RunMode::Live);
        assert_eq!(config.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.max_rounds, 5);
        assert!(config.fixture_step_delay.is_zero());
    }

    #[test]
    fn test_api_key_fallback() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("LITELLM_API_KEY", "sk-fallback")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-fallback"));

        let config = AppConfig::from_lookup(lookup_from(&[("GROQ_API_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_env_value() {
        let err = AppConfig::from_lookup(lookup_from(&[("LEAD_FORGE_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LEAD_FORGE_PORT"));

        let err = AppConfig::from_lookup(lookup_from(&[("USE_MOCK_DATA", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("USE_MOCK_DATA"));
    }

    #[test]
    fn test_validation_rejects_zero_rounds() {
        let err = AppConfig::default().with_max_rounds(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_rounds"));
    }

    #[test]
    fn test_validation_rejects_short_run_timeout() {
        let config = AppConfig::default()
            .with_turn_timeout(Duration::from_secs(60))
            .with_run_timeout(Duration::from_secs(10));
        assert!(config.validate().unwrap_err().to_string().contains("run_timeout"));
    }

    #[test]
    fn test_validation_invalid_temperature() {
        let result = AppConfig::default().with_temperature(3.0).validate();
        assert!(result.unwrap_err().to_string().contains("temperature"));
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("true", "test").unwrap());
        assert!(parse_env_bool("ON", "test").unwrap());
        assert!(!parse_env_bool("0", "test").unwrap());
        assert!(parse_env_bool("invalid", "test").is_err());
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!("mock".parse::<RunMode>().unwrap(), RunMode::Fixture);
        assert_eq!("Live".parse::<RunMode>().unwrap(), RunMode::Live);
        assert!("batch".parse::<RunMode>().is_err());
    }
}
