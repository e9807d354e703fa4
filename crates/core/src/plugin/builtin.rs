use crate::classifier::{Classifier, Pair, ScoreContext};
use crate::model::{EntityKind, EntityRef};
use crate::plugin::{Plugin, PluginContext, PLUGIN_API_VERSION};

/// Plugins that ship with the crate and can be enabled by name.
pub fn builtin_plugins() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(PackageHintPlugin)]
}

/// Registers `class-package-hint`, which favours classes in the same package.
///
/// Useful when the obfuscator keeps the package layout.
pub struct PackageHintPlugin;

impl Plugin for PackageHintPlugin {
    fn name(&self) -> &str {
        "package-hint"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn api_version(&self) -> u32 {
        PLUGIN_API_VERSION
    }

    fn init(&self, _api_version: u32, ctx: &mut PluginContext) -> Result<(), String> {
        ctx.register_classifier(Box::new(PackageHint));
        Ok(())
    }
}

struct PackageHint;

impl Classifier for PackageHint {
    fn name(&self) -> &str {
        "class-package-hint"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Class
    }

    fn default_weight(&self) -> f64 {
        4.0
    }

    fn score(&self, pair: Pair, ctx: &ScoreContext<'_>) -> Option<f64> {
        let (EntityRef::Class(a), EntityRef::Class(b)) = (pair.a, pair.b) else { return None };
        match (ctx.a().class(a).package(), ctx.b().class(b).package()) {
            (None, None) => None,
            (pa, pb) => Some(if pa == pb { 1.0 } else { 0.0 }),
        }
    }
}
