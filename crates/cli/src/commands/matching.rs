use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use matcher_core::classifier::ClassifierRegistry;
use matcher_core::config::parse_by_extension;
use matcher_core::env::{ClassEnvironment, EnvInputs};
use matcher_core::input::{resolve_all, CurlFetcher, DownloadCache, InputSets};
use matcher_core::matcher::{MatchReport, Matcher};
use matcher_core::plugin::PluginSet;
use tracing::{info, warn};

use crate::{load_config_or_default, write_json};

/// Options of the `match` command.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    pub a: Vec<PathBuf>,
    pub b: Vec<PathBuf>,
    pub shared: Vec<PathBuf>,
    /// Descriptor sets file (`InputSets`, JSON or YAML).
    pub inputs: Option<PathBuf>,
    pub input_dirs: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub plugins: Vec<String>,
    /// Parent directory for the download cache.
    pub cache_dir: Option<PathBuf>,
    /// Transfer limit for downloads, in seconds.
    pub max_time: Option<u64>,
    pub report: Option<PathBuf>,
    pub json: bool,
}

/// Load an `InputSets` file; relative input dirs are taken relative to the file.
pub fn load_input_sets(path: &Path) -> Result<InputSets> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input sets at {}", path.display()))?;
    let mut sets: InputSets = parse_by_extension(path, &body)
        .with_context(|| format!("Failed to parse input sets {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for dir in &mut sets.input_dirs {
        if dir.is_relative() {
            *dir = base.join(&*dir);
        }
    }
    Ok(sets)
}

/// Resolve inputs, build the environment, run the matcher and print a summary.
pub fn match_command(options: &MatchOptions) -> Result<MatchReport> {
    let config = load_config_or_default(options.config.as_deref())?;

    let mut a = options.a.clone();
    let mut b = options.b.clone();
    let mut shared = options.shared.clone();
    // the cache lives until the environment is built, then is removed
    let mut cache = match &options.cache_dir {
        Some(dir) => DownloadCache::in_dir(dir),
        None => DownloadCache::new(),
    };
    if let Some(inputs_path) = &options.inputs {
        let sets = load_input_sets(inputs_path)?;
        let mut dirs = options.input_dirs.clone();
        dirs.extend(sets.input_dirs.iter().cloned());
        let fetcher = CurlFetcher { max_time: options.max_time };
        a.extend(resolve_all(&sets.a, &dirs, &mut cache, &fetcher).context("Failed to resolve side A inputs")?);
        b.extend(resolve_all(&sets.b, &dirs, &mut cache, &fetcher).context("Failed to resolve side B inputs")?);
        shared.extend(
            resolve_all(&sets.shared, &dirs, &mut cache, &fetcher).context("Failed to resolve shared inputs")?,
        );
    }
    if a.is_empty() || b.is_empty() {
        bail!("Both sides need at least one input (use --a/--b or --inputs)");
    }

    let inputs = EnvInputs::load(&a, &b, &shared).context("Failed to load inputs")?;
    let env = ClassEnvironment::build(inputs, &config.environment);
    drop(cache);

    let mut plugins = PluginSet::load(&options.plugins);
    for failure in plugins.failures() {
        warn!("{failure}");
    }
    let mut registry = ClassifierRegistry::builtin();
    for err in plugins.install_classifiers(&mut registry) {
        warn!("{err}");
    }
    registry.apply_weights(&config.weights).context("Invalid classifier weights")?;

    let mut matcher = Matcher::new(&env, registry, config.matcher.clone());
    for err in plugins.install_constraints(&mut matcher) {
        warn!("{err}");
    }
    let report = matcher.run();

    if let Some(path) = &options.report {
        write_json(path, &report)?;
        info!("wrote report to {}", path.display());
    }
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(report)
}

fn print_summary(report: &MatchReport) {
    let stats = &report.stats;
    println!("class-matcher v{} ({})", matcher_core::version(), chrono::Utc::now().to_rfc3339());
    println!("Matched:");
    println!("  Classes: {}", report.classes.len());
    println!("  Methods: {}", report.methods.len());
    println!("  Fields: {}", report.fields.len());
    println!("Confirmed: {} (locked {}, context {})", stats.confirmed, stats.locked, stats.context);
    println!("Ambiguous: {}", stats.ambiguous);
    println!("Unmatched: A {} / B {}", stats.unmatched_a, stats.unmatched_b);
    println!("Unresolved: A {} / B {}", stats.unresolved_a, stats.unresolved_b);
    println!("Issues: {}", report.issues.len());
    println!("Passes: {}, rounds: {}", stats.passes, stats.rounds);
}
