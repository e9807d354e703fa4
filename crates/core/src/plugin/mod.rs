//! Plugin API.
//!
//! A [`Plugin`] contributes classifiers, pair filters, weight overrides and
//! forced or vetoed pairs through a [`PluginContext`]. Each plugin is
//! initialised in its own context, which is merged only when initialisation
//! succeeds, so one broken plugin never affects the others.

mod builtin;
mod manifest;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::{Classifier, ClassifierRegistry};
use crate::error::{MatcherError, MatcherResult};
use crate::matcher::{Matcher, PairFilter, VetoSet};
use crate::model::{EntityKey, Side};

pub use builtin::{builtin_plugins, PackageHintPlugin};
pub use manifest::{ManifestPlugin, PairSpec};

/// Plugin API version implemented by this crate.
pub const PLUGIN_API_VERSION: u32 = 1;

pub trait Plugin {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// API version the plugin was written against.
    fn api_version(&self) -> u32;

    fn init(&self, api_version: u32, ctx: &mut PluginContext) -> Result<(), String>;
}

/// Registrations collected from plugins.
#[derive(Default)]
pub struct PluginContext {
    classifiers: Vec<Box<dyn Classifier>>,
    filters: Vec<Box<dyn PairFilter>>,
    weights: BTreeMap<String, f64>,
    forced: Vec<(EntityKey, EntityKey)>,
    vetoed: Vec<(EntityKey, EntityKey)>,
}

impl PluginContext {
    pub fn register_classifier(&mut self, classifier: Box<dyn Classifier>) {
        self.classifiers.push(classifier);
    }

    pub fn register_filter(&mut self, filter: Box<dyn PairFilter>) {
        self.filters.push(filter);
    }

    pub fn set_weight(&mut self, classifier: impl Into<String>, weight: f64) {
        self.weights.insert(classifier.into(), weight);
    }

    /// Lock `a` (side A) to `b` (side B) before matching starts.
    pub fn force_pair(&mut self, a: EntityKey, b: EntityKey) {
        self.forced.push((a, b));
    }

    /// Never match `a` (side A) with `b` (side B).
    pub fn veto_pair(&mut self, a: EntityKey, b: EntityKey) {
        self.vetoed.push((a, b));
    }

    /// Take over the filters and pairs of `other`.
    fn merge(&mut self, other: PluginContext) {
        self.filters.extend(other.filters);
        self.forced.extend(other.forced);
        self.vetoed.extend(other.vetoed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub api_version: u32,
    /// Identifier the plugin was loaded from.
    pub source: String,
}

/// Plugins loaded for one run.
#[derive(Default)]
pub struct PluginSet {
    loaded: Vec<PluginInfo>,
    failures: Vec<MatcherError>,
    /// Classifiers and weight overrides, tagged with the contributing plugin.
    classifiers: Vec<(String, Box<dyn Classifier>)>,
    weights: Vec<(String, String, f64)>,
    context: PluginContext,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load plugins by identifier: a built-in plugin name or a manifest file
    /// (`.json`, `.yaml`, `.yml`). Failures are collected per plugin.
    pub fn load(identifiers: &[String]) -> Self {
        let mut set = Self::new();
        for id in identifiers {
            match resolve_identifier(id) {
                Ok(plugin) => set.add(plugin.as_ref(), id),
                Err(err) => {
                    warn!("{err}");
                    set.failures.push(err);
                }
            }
        }
        set
    }

    /// Initialise one plugin in a fresh context.
    pub fn add(&mut self, plugin: &dyn Plugin, source: &str) {
        let name = plugin.name().to_string();
        if plugin.api_version() != PLUGIN_API_VERSION {
            let err = MatcherError::PluginLoad {
                plugin: name,
                reason: format!(
                    "plugin targets API version {}, host provides {PLUGIN_API_VERSION}",
                    plugin.api_version()
                ),
            };
            warn!("{err}");
            self.failures.push(err);
            return;
        }
        let mut ctx = PluginContext::default();
        if let Err(reason) = plugin.init(PLUGIN_API_VERSION, &mut ctx) {
            let err = MatcherError::PluginLoad { plugin: name, reason };
            warn!("{err}");
            self.failures.push(err);
            return;
        }
        info!(plugin = %name, version = plugin.version(), "plugin loaded");
        for classifier in std::mem::take(&mut ctx.classifiers) {
            self.classifiers.push((name.clone(), classifier));
        }
        for (classifier, weight) in std::mem::take(&mut ctx.weights) {
            self.weights.push((name.clone(), classifier, weight));
        }
        self.context.merge(ctx);
        self.loaded.push(PluginInfo {
            name,
            version: plugin.version().to_string(),
            api_version: plugin.api_version(),
            source: source.to_string(),
        });
    }

    pub fn loaded(&self) -> &[PluginInfo] {
        &self.loaded
    }

    pub fn failures(&self) -> &[MatcherError] {
        &self.failures
    }

    /// Move plugin classifiers and weight overrides into `registry`.
    pub fn install_classifiers(&mut self, registry: &mut ClassifierRegistry) -> Vec<MatcherError> {
        let mut errors = Vec::new();
        for (plugin, classifier) in std::mem::take(&mut self.classifiers) {
            let name = classifier.name().to_string();
            if let Err(err) = registry.register(classifier) {
                errors.push(MatcherError::PluginLoad { plugin, reason: format!("classifier '{name}': {err}") });
            }
        }
        for (plugin, name, weight) in std::mem::take(&mut self.weights) {
            if let Err(err) = registry.set_weight(&name, weight) {
                errors.push(MatcherError::PluginLoad { plugin, reason: format!("weight for '{name}': {err}") });
            }
        }
        errors
    }

    /// Install filters, vetoes and forced pairs. A pair naming an unknown
    /// entity is skipped and returned as an error.
    pub fn install_constraints(mut self, matcher: &mut Matcher<'_>) -> Vec<MatcherError> {
        let mut errors = Vec::new();
        for filter in std::mem::take(&mut self.context.filters) {
            matcher.add_filter(filter);
        }

        let env = matcher.env();
        let mut vetoes = VetoSet::new("plugin-vetoes");
        for (a, b) in &self.context.vetoed {
            match (env.resolve(Side::A, a), env.resolve(Side::B, b)) {
                (Ok(a), Ok(b)) => vetoes.insert(crate::classifier::Pair { a, b }),
                (Err(err), _) | (_, Err(err)) => errors.push(err),
            }
        }
        if !vetoes.is_empty() {
            matcher.add_filter(Box::new(vetoes));
        }

        for (a, b) in &self.context.forced {
            if let Err(err) = matcher.lock_keys(a, b) {
                errors.push(err);
            }
        }
        errors
    }
}

fn resolve_identifier(id: &str) -> MatcherResult<Box<dyn Plugin>> {
    let path = Path::new(id);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    if matches!(ext.as_str(), "json" | "yaml" | "yml") {
        return Ok(Box::new(ManifestPlugin::load(path)?));
    }
    builtin_plugins()
        .into_iter()
        .find(|p| p.name() == id)
        .ok_or_else(|| MatcherError::PluginLoad { plugin: id.to_string(), reason: "unknown plugin".into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Plugin for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn api_version(&self) -> u32 {
            PLUGIN_API_VERSION
        }

        fn init(&self, _api_version: u32, ctx: &mut PluginContext) -> Result<(), String> {
            ctx.set_weight("class-kind", 0.0);
            Err("refusing to start".into())
        }
    }

    #[test]
    fn failed_init_leaves_no_registrations() {
        let mut set = PluginSet::new();
        set.add(&Broken, "broken");
        assert!(set.loaded().is_empty());
        assert_eq!(set.failures().len(), 1);

        let mut registry = ClassifierRegistry::builtin();
        assert!(set.install_classifiers(&mut registry).is_empty());
        let kind = registry.infos().into_iter().find(|i| i.name == "class-kind").unwrap();
        assert_eq!(kind.weight, 20.0);
    }

    struct Impostor;

    impl Classifier for Impostor {
        fn name(&self) -> &str {
            "class-kind"
        }

        fn kind(&self) -> crate::model::EntityKind {
            crate::model::EntityKind::Class
        }

        fn default_weight(&self) -> f64 {
            1.0
        }

        fn score(&self, _pair: crate::classifier::Pair, _ctx: &crate::classifier::ScoreContext<'_>) -> Option<f64> {
            None
        }
    }

    /// Registers a classifier name the registry already has.
    struct Clashing;

    impl Plugin for Clashing {
        fn name(&self) -> &str {
            "clashing"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn api_version(&self) -> u32 {
            PLUGIN_API_VERSION
        }

        fn init(&self, _api_version: u32, ctx: &mut PluginContext) -> Result<(), String> {
            ctx.register_classifier(Box::new(Impostor));
            ctx.set_weight("no-such-classifier", 1.0);
            Ok(())
        }
    }

    #[test]
    fn registration_errors_name_the_contributing_plugin() {
        let mut set = PluginSet::new();
        set.add(&Clashing, "clashing");
        let mut registry = ClassifierRegistry::builtin();
        let errors = set.install_classifiers(&mut registry);

        assert_eq!(errors.len(), 2);
        for err in &errors {
            assert!(matches!(err, MatcherError::PluginLoad { plugin, .. } if plugin == "clashing"), "{err}");
        }
        assert!(errors[0].to_string().contains("class-kind"));
        assert!(errors[1].to_string().contains("no-such-classifier"));
    }

    #[test]
    fn unknown_identifier_is_a_load_failure() {
        let set = PluginSet::load(&["no-such-plugin".to_string()]);
        assert!(matches!(set.failures(), [MatcherError::PluginLoad { .. }]));
    }
}
