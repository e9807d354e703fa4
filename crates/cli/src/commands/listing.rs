use std::path::Path;

use anyhow::Result;
use matcher_core::classifier::{ClassifierInfo, ClassifierRegistry};
use matcher_core::plugin::{builtin_plugins, PluginInfo, PluginSet, PLUGIN_API_VERSION};
use serde::Serialize;
use tracing::warn;

use crate::load_config_or_default;

/// List classifiers with their effective weights after plugins and config.
pub fn classifiers_command(
    config: Option<&Path>,
    plugins: &[String],
    json: bool,
) -> Result<Vec<ClassifierInfo>> {
    let config = load_config_or_default(config)?;
    let mut set = PluginSet::load(plugins);
    let mut registry = ClassifierRegistry::builtin();
    for err in set.install_classifiers(&mut registry) {
        warn!("{err}");
    }
    registry.apply_weights(&config.weights)?;
    let infos = registry.infos();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        println!("Classifiers ({}):", infos.len());
        for info in &infos {
            println!("  - {:<24} {:?} weight {}", info.name, info.kind, info.weight);
        }
    }
    Ok(infos)
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginListing {
    pub api_version: u32,
    pub builtin: Vec<String>,
    pub loaded: Vec<PluginInfo>,
    pub failures: Vec<String>,
}

/// Show built-in plugins and the outcome of loading `plugins`.
pub fn plugins_command(plugins: &[String], json: bool) -> Result<PluginListing> {
    let set = PluginSet::load(plugins);
    let listing = PluginListing {
        api_version: PLUGIN_API_VERSION,
        builtin: builtin_plugins().iter().map(|p| p.name().to_string()).collect(),
        loaded: set.loaded().to_vec(),
        failures: set.failures().iter().map(ToString::to_string).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("Plugin API version: {}", listing.api_version);
        println!("Built-in plugins:");
        for name in &listing.builtin {
            println!("  - {name}");
        }
        if !listing.loaded.is_empty() {
            println!("Loaded:");
            for info in &listing.loaded {
                println!("  - {} {} ({})", info.name, info.version, info.source);
            }
        }
        if !listing.failures.is_empty() {
            println!("Failed:");
            for failure in &listing.failures {
                println!("  - {failure}");
            }
        }
    }
    Ok(listing)
}
