use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{MatcherError, MatcherResult};

/// Thresholds and iteration limits for the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Lowest composite score a pair may be accepted with.
    pub min_score: f64,
    /// Required lead of the best candidate over the runner-up, relative to the best score.
    pub min_relative_margin: f64,
    /// Rounds per level before giving up on a fixed point.
    pub max_rounds: usize,
    /// Outer passes over all levels.
    pub max_passes: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { min_score: 0.5, min_relative_margin: 0.01, max_rounds: 32, max_passes: 8 }
    }
}

/// Options for building the class environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvOptions {
    /// Internal-name prefixes of runtime types that are never part of the input.
    pub platform_prefixes: Vec<String>,
    /// Treat input classes that are byte-for-byte identical records on both
    /// sides as shared context.
    pub auto_share_identical: bool,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            platform_prefixes: ["java/", "javax/", "jdk/", "sun/"].map(String::from).to_vec(),
            auto_share_identical: false,
        }
    }
}

/// Complete configuration of a matching run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub matcher: MatcherConfig,
    pub environment: EnvOptions,
    /// Classifier weight overrides by classifier name.
    pub weights: BTreeMap<String, f64>,
}

impl MatchConfig {
    pub fn validate(&self) -> MatcherResult<()> {
        let m = &self.matcher;
        if !(0.0..=1.0).contains(&m.min_score) {
            return Err(MatcherError::Config(format!("min_score {} is outside [0, 1]", m.min_score)));
        }
        if !(0.0..=1.0).contains(&m.min_relative_margin) {
            return Err(MatcherError::Config(format!(
                "min_relative_margin {} is outside [0, 1]",
                m.min_relative_margin
            )));
        }
        if m.max_rounds == 0 || m.max_passes == 0 {
            return Err(MatcherError::Config("max_rounds and max_passes must be positive".into()));
        }
        if let Some((name, w)) = self.weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(MatcherError::Config(format!("weight for {name} must be non-negative, got {w}")));
        }
        Ok(())
    }
}

/// Load a [`MatchConfig`] from a JSON or YAML file, chosen by extension.
pub fn load_config(path: &Path) -> Result<MatchConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let config: MatchConfig = parse_by_extension(path, &body)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Deserialize `body` as YAML for `.yaml`/`.yml` paths and as JSON otherwise.
pub fn parse_by_extension<T: serde::de::DeserializeOwned>(path: &Path, body: &str) -> Result<T> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
        Ok(serde_yaml::from_str(body)?)
    } else {
        Ok(serde_json::from_str(body)?)
    }
}
