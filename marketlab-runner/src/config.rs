//! Agent configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables (after `.env` has been read with dotenvy). Every value is checked
//! once here; the rest of the runner trusts an `AgentConfig`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on plan length regardless of configuration.
pub const MAX_PLAN_STEPS: usize = 6;

pub const DEFAULT_UNIVERSE: [&str; 15] = [
    "AAPL", "MSFT", "NVDA", "GOOGL", "AMZN", "META", "TSLA", "NFLX", "AMD", "AVGO", "ADBE", "COST",
    "PEP", "ORCL", "LIN",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Where price data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// Yahoo chart API prices, RSS headlines, VADER sentiment.
    #[default]
    Live,
    /// Deterministic random walks, no news.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Remote tool service. `None` runs the tools in-process.
    pub api_base: Option<String>,
    pub ollama_base: String,
    pub ollama_model: String,
    pub max_steps: usize,
    pub confidence_threshold: f64,
    pub default_days: u32,
    pub reports_dir: PathBuf,
    pub planner_timeout_secs: u64,
    pub universe: Vec<String>,
    pub data_mode: DataMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            ollama_base: "http://127.0.0.1:11434".into(),
            ollama_model: "llama3.1".into(),
            max_steps: MAX_PLAN_STEPS,
            confidence_threshold: 0.60,
            default_days: 365,
            reports_dir: PathBuf::from("reports"),
            planner_timeout_secs: 120,
            universe: DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
            data_mode: DataMode::Live,
        }
    }
}

impl AgentConfig {
    /// Defaults, then the TOML file (if given), then `.env` + process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        dotenvy::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `KEY=value` overrides from `lookup`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("API_BASE") {
            self.api_base = Some(v);
        }
        if let Some(v) = get("OLLAMA_BASE") {
            self.ollama_base = v;
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            self.ollama_model = v;
        }
        if let Some(v) = get("MAX_STEPS") {
            self.max_steps = parse_key("MAX_STEPS", &v)?;
        }
        if let Some(v) = get("CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = parse_key("CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = get("DEFAULT_DAYS") {
            self.default_days = parse_key("DEFAULT_DAYS", &v)?;
        }
        if let Some(v) = get("REPORTS_DIR") {
            self.reports_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PLANNER_TIMEOUT_SECS") {
            self.planner_timeout_secs = parse_key("PLANNER_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    /// Range checks; clamps `max_steps` into [1, 6].
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.max_steps = self.max_steps.clamp(1, MAX_PLAN_STEPS);
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::invalid(
                "CONFIDENCE_THRESHOLD",
                format!("{} is outside [0, 1]", self.confidence_threshold),
            ));
        }
        if self.default_days == 0 {
            return Err(ConfigError::invalid("DEFAULT_DAYS", "must be positive"));
        }
        if self.planner_timeout_secs == 0 {
            return Err(ConfigError::invalid("PLANNER_TIMEOUT_SECS", "must be positive"));
        }
        if let Some(base) = &self.api_base {
            reqwest::Url::parse(base)
                .map_err(|e| ConfigError::invalid("API_BASE", e.to_string()))?;
        }
        self.universe = self
            .universe
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if self.universe.is_empty() {
            return Err(ConfigError::invalid("universe", "must contain at least one symbol"));
        }
        Ok(())
    }
}

fn parse_key<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("{value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let mut c = AgentConfig::default();
        c.validate().unwrap();
        assert_eq!(c.max_steps, 6);
        assert_eq!(c.universe.len(), 15);
        assert_eq!(c.api_base, None);
    }

    #[test]
    fn env_overrides_and_clamps() {
        let mut c = AgentConfig::default();
        c.apply_overrides(env(&[
            ("MAX_STEPS", "12"),
            ("CONFIDENCE_THRESHOLD", "0.7"),
            ("API_BASE", "http://127.0.0.1:8000"),
            ("OLLAMA_MODEL", "  "),
        ]))
        .unwrap();
        c.validate().unwrap();
        assert_eq!(c.max_steps, 6);
        assert_eq!(c.confidence_threshold, 0.7);
        assert_eq!(c.api_base.as_deref(), Some("http://127.0.0.1:8000"));
        assert_eq!(c.ollama_model, "llama3.1");
    }

    #[test]
    fn zero_steps_clamped_up() {
        let mut c = AgentConfig {
            max_steps: 0,
            ..AgentConfig::default()
        };
        c.validate().unwrap();
        assert_eq!(c.max_steps, 1);
    }

    #[test]
    fn bad_numbers_are_reported_with_key() {
        let mut c = AgentConfig::default();
        let err = c.apply_overrides(env(&[("DEFAULT_DAYS", "lots")])).unwrap_err();
        assert!(err.to_string().contains("DEFAULT_DAYS"));
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut c = AgentConfig {
            confidence_threshold: 1.5,
            ..AgentConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn toml_partial_file() {
        let c = AgentConfig::from_toml(
            r#"
            data_mode = "synthetic"
            universe = ["spy", "qqq"]
            default_days = 500
            "#,
        )
        .unwrap();
        assert_eq!(c.data_mode, DataMode::Synthetic);
        assert_eq!(c.default_days, 500);
        assert_eq!(c.ollama_base, "http://127.0.0.1:11434");
        let mut c = c;
        c.validate().unwrap();
        assert_eq!(c.universe, vec!["SPY", "QQQ"]);
    }
}
