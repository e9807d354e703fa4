//! Class environment: both sides' graphs and the shared context between them.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use tracing::info;

use crate::config::EnvOptions;
use crate::error::{MatcherError, MatcherResult};
use crate::loader::{load_path, ClassRecord, LoadedClasses};
use crate::model::{
    descriptor, BuildIssue, ClassGraph, ClassId, ClassOrigin, EntityKey, EntityRef, GraphBuilder,
    IssueKind, Side,
};

/// Class records for one run, before graph construction.
#[derive(Debug, Default, Clone)]
pub struct EnvInputs {
    pub a: Vec<ClassRecord>,
    pub b: Vec<ClassRecord>,
    /// Records present unchanged in both programs (libraries, runtime stubs).
    pub shared: Vec<ClassRecord>,
    /// Per-class load failures, carried into the environment's issues.
    pub load_issues: Vec<BuildIssue>,
}

impl EnvInputs {
    /// Load every path into its set. A path that cannot be read at all is an
    /// error; individual broken classes inside archives become issues.
    pub fn load(a: &[PathBuf], b: &[PathBuf], shared: &[PathBuf]) -> MatcherResult<Self> {
        let mut inputs = EnvInputs::default();
        inputs.a = Self::load_set(a, Side::A, &mut inputs.load_issues)?;
        inputs.b = Self::load_set(b, Side::B, &mut inputs.load_issues)?;
        inputs.shared = Self::load_set(shared, Side::A, &mut inputs.load_issues)?;
        Ok(inputs)
    }

    fn load_set(paths: &[PathBuf], side: Side, issues: &mut Vec<BuildIssue>) -> MatcherResult<Vec<ClassRecord>> {
        let mut loaded = LoadedClasses::default();
        for path in paths {
            loaded.extend(load_path(path)?);
        }
        for failure in &loaded.failures {
            let origin = match failure {
                MatcherError::MalformedBinary { origin, .. } => origin.clone(),
                other => other.to_string(),
            };
            issues.push(BuildIssue::new(side, IssueKind::Malformed, origin, failure));
        }
        Ok(loaded.records)
    }
}

/// Both sides' class graphs plus the shared class set.
#[derive(Debug)]
pub struct ClassEnvironment {
    a: ClassGraph,
    b: ClassGraph,
    shared: BTreeSet<String>,
    issues: Vec<BuildIssue>,
}

impl ClassEnvironment {
    /// Build both sides in parallel. Shared records are added to each side.
    pub fn build(inputs: EnvInputs, options: &EnvOptions) -> Self {
        let EnvInputs { mut a, mut b, mut shared, load_issues } = inputs;

        if options.auto_share_identical {
            let b_by_name: HashMap<&str, &ClassRecord> =
                b.iter().map(|r| (r.binary_name.as_str(), r)).collect();
            let identical: BTreeSet<String> = a
                .iter()
                .filter(|r| b_by_name.get(r.binary_name.as_str()).is_some_and(|other| *other == *r))
                .map(|r| r.binary_name.clone())
                .collect();
            if !identical.is_empty() {
                info!("treating {} identical classes as shared", identical.len());
                shared.extend(a.iter().filter(|r| identical.contains(&r.binary_name)).cloned());
                a.retain(|r| !identical.contains(&r.binary_name));
                b.retain(|r| !identical.contains(&r.binary_name));
            }
        }

        let shared_names: BTreeSet<String> = shared.iter().map(|r| r.binary_name.clone()).collect();
        let prefixes = &options.platform_prefixes;
        let shared_b = shared.clone();
        let ((graph_a, issues_a), (graph_b, issues_b)) = rayon::join(
            || build_side(Side::A, a, shared, prefixes),
            || build_side(Side::B, b, shared_b, prefixes),
        );

        let mut issues = load_issues;
        issues.extend(issues_a);
        issues.extend(issues_b);
        info!(
            a_classes = graph_a.count_origin(ClassOrigin::Input),
            b_classes = graph_b.count_origin(ClassOrigin::Input),
            shared = shared_names.len(),
            issues = issues.len(),
            "class environment ready"
        );
        Self { a: graph_a, b: graph_b, shared: shared_names, issues }
    }

    pub fn graph(&self, side: Side) -> &ClassGraph {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn a(&self) -> &ClassGraph {
        &self.a
    }

    pub fn b(&self) -> &ClassGraph {
        &self.b
    }

    pub fn shared_names(&self) -> &BTreeSet<String> {
        &self.shared
    }

    pub fn issues(&self) -> &[BuildIssue] {
        &self.issues
    }

    /// Whether a class on `side` takes part in matching.
    pub fn is_candidate(&self, side: Side, cid: ClassId) -> bool {
        let class = self.graph(side).class(cid);
        class.is_input() && class.hierarchy_resolved
    }

    /// Number of input classes excluded because their hierarchy is incomplete.
    pub fn unresolved_count(&self, side: Side) -> usize {
        let graph = self.graph(side);
        graph.class_ids().filter(|c| graph.class(*c).is_input() && !graph.class(*c).hierarchy_resolved).count()
    }

    /// Pairs that are known to correspond before any scoring: shared classes
    /// with their members, and placeholders of the same type on both sides.
    ///
    /// Array placeholders only qualify when their element type is not an input class.
    pub fn context_pairs(&self) -> Vec<(EntityRef, EntityRef)> {
        let mut pairs = Vec::new();
        for a_id in self.a.class_ids() {
            let a_class = self.a.class(a_id);
            if a_class.origin == ClassOrigin::Input {
                continue;
            }
            let Some(b_id) = self.b.lookup(&a_class.id) else { continue };
            let b_class = self.b.class(b_id);
            if b_class.origin != a_class.origin {
                continue;
            }
            if a_class.origin == ClassOrigin::Placeholder
                && (self.element_is_input(&self.a, a_id) || self.element_is_input(&self.b, b_id))
            {
                continue;
            }
            pairs.push((EntityRef::Class(a_id), EntityRef::Class(b_id)));

            for &m in &a_class.methods {
                let method = self.a.method(m);
                if let Some(bm) = self.b.declared_method(b_id, &method.name, &method.descriptor) {
                    pairs.push((EntityRef::Method(m), EntityRef::Method(bm)));
                }
            }
            for &f in &a_class.fields {
                let field = self.a.field(f);
                if let Some(bf) = self.b.declared_field(b_id, &field.name, &field.descriptor) {
                    pairs.push((EntityRef::Field(f), EntityRef::Field(bf)));
                }
            }
        }
        pairs
    }

    fn element_is_input(&self, graph: &ClassGraph, cid: ClassId) -> bool {
        match graph.class(cid).array {
            Some((_, element)) => graph.class(element).is_input(),
            None => false,
        }
    }

    /// Resolve a name-based key on one side.
    pub fn resolve(&self, side: Side, key: &EntityKey) -> MatcherResult<EntityRef> {
        self.graph(side)
            .resolve_key(key)
            .ok_or_else(|| MatcherError::UnknownEntity(format!("{key} on side {side}")))
    }

    /// Whether a type id names a class defined on both sides as shared context.
    pub fn is_shared(&self, type_id: &str) -> bool {
        self.shared.contains(descriptor::display_name(type_id))
    }
}

fn build_side(
    side: Side,
    input: Vec<ClassRecord>,
    shared: Vec<ClassRecord>,
    prefixes: &[String],
) -> (ClassGraph, Vec<BuildIssue>) {
    let mut builder = GraphBuilder::new(side, prefixes);
    builder.add_classes(shared, ClassOrigin::Shared);
    builder.add_classes(input, ClassOrigin::Input);
    builder.finish()
}
