use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::parse_by_extension;
use crate::error::{MatcherError, MatcherResult};
use crate::model::EntityKey;
use crate::plugin::{Plugin, PluginContext, PLUGIN_API_VERSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSpec {
    pub a: EntityKey,
    pub b: EntityKey,
}

fn default_api_version() -> u32 {
    PLUGIN_API_VERSION
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// Declarative plugin read from a JSON or YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestPlugin {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub force: Vec<PairSpec>,
    #[serde(default)]
    pub veto: Vec<PairSpec>,
}

impl ManifestPlugin {
    pub fn load(path: &Path) -> MatcherResult<Self> {
        let plugin = path.display().to_string();
        let body = std::fs::read_to_string(path).map_err(|e| MatcherError::PluginLoad {
            plugin: plugin.clone(),
            reason: e.to_string(),
        })?;
        parse_by_extension(path, &body)
            .map_err(|e| MatcherError::PluginLoad { plugin, reason: format!("invalid manifest: {e}") })
    }
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn api_version(&self) -> u32 {
        self.api_version
    }

    fn init(&self, _api_version: u32, ctx: &mut PluginContext) -> Result<(), String> {
        if let Some((name, w)) = self.weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(format!("weight for {name} must be non-negative, got {w}"));
        }
        for (name, weight) in &self.weights {
            ctx.set_weight(name.clone(), *weight);
        }
        for pair in &self.force {
            ctx.force_pair(pair.a.clone(), pair.b.clone());
        }
        for pair in &self.veto {
            ctx.veto_pair(pair.a.clone(), pair.b.clone());
        }
        Ok(())
    }
}
