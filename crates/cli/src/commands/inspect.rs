use std::path::PathBuf;

use anyhow::{Context, Result};
use matcher_core::config::EnvOptions;
use matcher_core::loader::{load_path, LoadedClasses};
use matcher_core::model::{BuildIssue, ClassOrigin, GraphBuilder, Side};
use serde::Serialize;

/// Structure summary of one input set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectSummary {
    pub classes: usize,
    pub placeholders: usize,
    pub methods: usize,
    pub fields: usize,
    pub unresolved: usize,
    pub load_failures: Vec<String>,
    pub issues: Vec<BuildIssue>,
}

/// Load `paths` as one side and report what the graph contains.
pub fn inspect_command(paths: &[PathBuf], json: bool) -> Result<InspectSummary> {
    let mut loaded = LoadedClasses::default();
    for path in paths {
        loaded.extend(load_path(path).with_context(|| format!("Failed to load {}", path.display()))?);
    }
    let load_failures = loaded.failures.iter().map(ToString::to_string).collect();

    let options = EnvOptions::default();
    let mut builder = GraphBuilder::new(Side::A, &options.platform_prefixes);
    builder.add_classes(loaded.records, ClassOrigin::Input);
    let (graph, issues) = builder.finish();

    let unresolved = graph
        .class_ids()
        .filter(|c| graph.class(*c).is_input() && !graph.class(*c).hierarchy_resolved)
        .count();
    let summary = InspectSummary {
        classes: graph.count_origin(ClassOrigin::Input),
        placeholders: graph.count_origin(ClassOrigin::Placeholder),
        methods: graph.method_count(),
        fields: graph.field_count(),
        unresolved,
        load_failures,
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Classes: {}", summary.classes);
        println!("Placeholders: {}", summary.placeholders);
        println!("Methods: {}", summary.methods);
        println!("Fields: {}", summary.fields);
        println!("Unresolved hierarchies: {}", summary.unresolved);
        if !summary.load_failures.is_empty() {
            println!("Load failures:");
            for failure in &summary.load_failures {
                println!("  - {failure}");
            }
        }
        if !summary.issues.is_empty() {
            println!("Issues:");
            for issue in &summary.issues {
                println!("  - {:?} {}: {}", issue.kind, issue.class, issue.message);
            }
        }
    }
    Ok(summary)
}
