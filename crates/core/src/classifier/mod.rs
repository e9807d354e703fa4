//! Classifier framework.
//!
//! A [`Classifier`] scores one candidate pair in `[0, 1]` or declares itself
//! not applicable. The [`ClassifierRegistry`] keeps classifiers in
//! registration order together with their weights and folds their scores into
//! a weighted average. Built-in classifiers live in the `class`, `method` and
//! `field` submodules; plugins append their own through the same registry.

mod class;
mod field;
mod method;

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::env::ClassEnvironment;
use crate::error::{MatcherError, MatcherResult};
use crate::matcher::MatchMap;
use crate::model::{ClassGraph, ClassId, EntityKind, EntityRef, FieldId, MethodId, Side};

/// A candidate pair: an entity on side A and one of the same kind on side B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pair {
    pub a: EntityRef,
    pub b: EntityRef,
}

impl Pair {
    pub fn new(a: impl Into<EntityRef>, b: impl Into<EntityRef>) -> Self {
        Self { a: a.into(), b: b.into() }
    }

    pub fn kind(&self) -> EntityKind {
        self.a.kind()
    }
}

/// Relation of two entities under the current match state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefState {
    /// Matched to each other.
    Same,
    /// At least one is matched elsewhere.
    Different,
    /// Neither is matched yet.
    Unknown,
}

impl RefState {
    pub fn score(self) -> f64 {
        match self {
            RefState::Same => 1.0,
            RefState::Different => 0.0,
            RefState::Unknown => 0.5,
        }
    }
}

/// Read-only view handed to classifiers during a round.
#[derive(Clone, Copy)]
pub struct ScoreContext<'a> {
    pub env: &'a ClassEnvironment,
    pub state: &'a MatchMap,
}

impl<'a> ScoreContext<'a> {
    pub fn new(env: &'a ClassEnvironment, state: &'a MatchMap) -> Self {
        Self { env, state }
    }

    pub fn a(&self) -> &'a ClassGraph {
        self.env.a()
    }

    pub fn b(&self) -> &'a ClassGraph {
        self.env.b()
    }

    pub fn relation(&self, a: impl Into<EntityRef>, b: impl Into<EntityRef>) -> RefState {
        let (a, b) = (a.into(), b.into());
        match (self.state.counterpart(Side::A, a), self.state.counterpart(Side::B, b)) {
            (Some(other), _) if other == b => RefState::Same,
            (None, None) => RefState::Unknown,
            _ => RefState::Different,
        }
    }

    /// Overlap of two handle lists under the match state.
    ///
    /// Matched elements count fully, still-unmatched elements that could pair
    /// up count half. `None` when both lists are empty.
    pub fn set_similarity<T>(&self, a: &[T], b: &[T]) -> Option<f64>
    where
        T: Copy + Into<EntityRef>,
    {
        if a.is_empty() && b.is_empty() {
            return None;
        }
        if a.is_empty() || b.is_empty() {
            return Some(0.0);
        }
        let b_set: HashSet<EntityRef> = b.iter().map(|x| (*x).into()).collect();
        let mut matched = 0usize;
        let mut unknown_a = 0usize;
        for x in a {
            match self.state.counterpart(Side::A, (*x).into()) {
                Some(other) if b_set.contains(&other) => matched += 1,
                Some(_) => {}
                None => unknown_a += 1,
            }
        }
        let unknown_b = b.iter().filter(|y| !self.state.is_matched(Side::B, (**y).into())).count();
        let total = a.len().max(b.len()) as f64;
        Some((matched as f64 + 0.5 * unknown_a.min(unknown_b) as f64) / total)
    }
}

/// Jaccard overlap of two sorted string lists; `None` when both are empty.
pub fn string_overlap(a: &[String], b: &[String]) -> Option<f64> {
    if a.is_empty() && b.is_empty() {
        return None;
    }
    let a_set: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b_set: HashSet<&str> = b.iter().map(String::as_str).collect();
    let common = a_set.intersection(&b_set).count() as f64;
    let union = a_set.union(&b_set).count() as f64;
    Some(common / union)
}

/// `min / max` of two counts, 1.0 when both are zero.
pub fn count_ratio(a: usize, b: usize) -> f64 {
    if a == b {
        1.0
    } else {
        a.min(b) as f64 / a.max(b) as f64
    }
}

/// Scoring function over one kind of entity pair.
pub trait Classifier: Send + Sync {
    /// Unique name, used for weight overrides.
    fn name(&self) -> &str;

    fn kind(&self) -> EntityKind;

    fn applies_to(&self, kind: EntityKind) -> bool {
        kind == self.kind()
    }

    fn default_weight(&self) -> f64;

    /// Score in `[0, 1]`, or `None` when the classifier cannot judge this pair.
    fn score(&self, pair: Pair, ctx: &ScoreContext<'_>) -> Option<f64>;
}

/// Function shape of a built-in rule.
#[derive(Clone, Copy)]
pub(crate) enum Rule {
    Class(fn(ClassId, ClassId, &ScoreContext<'_>) -> Option<f64>),
    Method(fn(MethodId, MethodId, &ScoreContext<'_>) -> Option<f64>),
    Field(fn(FieldId, FieldId, &ScoreContext<'_>) -> Option<f64>),
}

/// A classifier backed by a plain function.
pub(crate) struct BuiltinClassifier {
    pub(crate) name: &'static str,
    pub(crate) weight: f64,
    pub(crate) rule: Rule,
}

impl Classifier for BuiltinClassifier {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> EntityKind {
        match self.rule {
            Rule::Class(_) => EntityKind::Class,
            Rule::Method(_) => EntityKind::Method,
            Rule::Field(_) => EntityKind::Field,
        }
    }

    fn default_weight(&self) -> f64 {
        self.weight
    }

    fn score(&self, pair: Pair, ctx: &ScoreContext<'_>) -> Option<f64> {
        match (self.rule, pair.a, pair.b) {
            (Rule::Class(f), EntityRef::Class(a), EntityRef::Class(b)) => f(a, b, ctx),
            (Rule::Method(f), EntityRef::Method(a), EntityRef::Method(b)) => f(a, b, ctx),
            (Rule::Field(f), EntityRef::Field(a), EntityRef::Field(b)) => f(a, b, ctx),
            _ => None,
        }
    }
}

struct Registered {
    classifier: Box<dyn Classifier>,
    weight: f64,
}

/// Description of a registered classifier, for listings and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierInfo {
    pub name: String,
    pub kind: EntityKind,
    pub weight: f64,
}

/// One classifier's contribution to a composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDetail {
    pub name: String,
    pub weight: f64,
    pub score: Option<f64>,
}

/// Ordered classifiers with their effective weights.
#[derive(Default)]
pub struct ClassifierRegistry {
    entries: Vec<Registered>,
}

impl ClassifierRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// All built-in classifiers at their default weights.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for c in class::builtins().into_iter().chain(method::builtins()).chain(field::builtins()) {
            registry.entries.push(Registered { weight: c.weight, classifier: Box::new(c) });
        }
        registry
    }

    /// Built-ins with configured weight overrides applied.
    pub fn with_weights(weights: &BTreeMap<String, f64>) -> MatcherResult<Self> {
        let mut registry = Self::builtin();
        registry.apply_weights(weights)?;
        Ok(registry)
    }

    pub fn register(&mut self, classifier: Box<dyn Classifier>) -> MatcherResult<()> {
        if self.entries.iter().any(|e| e.classifier.name() == classifier.name()) {
            return Err(MatcherError::Config(format!(
                "classifier {} is already registered",
                classifier.name()
            )));
        }
        let weight = classifier.default_weight();
        self.entries.push(Registered { classifier, weight });
        Ok(())
    }

    pub fn set_weight(&mut self, name: &str, weight: f64) -> MatcherResult<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(MatcherError::Config(format!("weight for {name} must be non-negative")));
        }
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.classifier.name() == name)
            .ok_or_else(|| MatcherError::Config(format!("unknown classifier {name}")))?;
        entry.weight = weight;
        Ok(())
    }

    pub fn apply_weights(&mut self, weights: &BTreeMap<String, f64>) -> MatcherResult<()> {
        for (name, weight) in weights {
            self.set_weight(name, *weight)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn infos(&self) -> Vec<ClassifierInfo> {
        self.entries
            .iter()
            .map(|e| ClassifierInfo {
                name: e.classifier.name().to_string(),
                kind: e.classifier.kind(),
                weight: e.weight,
            })
            .collect()
    }

    fn applicable(&self, kind: EntityKind) -> impl Iterator<Item = &Registered> {
        self.entries.iter().filter(move |e| e.weight > 0.0 && e.classifier.applies_to(kind))
    }

    /// Weighted average of applicable classifier scores, clamped to `[0, 1]`.
    ///
    /// Classifiers that return `None` are left out of both numerator and
    /// denominator. A pair nothing applies to scores 0.
    pub fn composite(&self, pair: Pair, ctx: &ScoreContext<'_>) -> f64 {
        let mut total = 0.0;
        let mut weights = 0.0;
        for entry in self.applicable(pair.kind()) {
            if let Some(score) = entry.classifier.score(pair, ctx) {
                total += entry.weight * score.clamp(0.0, 1.0);
                weights += entry.weight;
            }
        }
        if weights > 0.0 {
            (total / weights).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Per-classifier scores for one pair, in registration order.
    pub fn breakdown(&self, pair: Pair, ctx: &ScoreContext<'_>) -> Vec<ScoreDetail> {
        self.entries
            .iter()
            .filter(|e| e.classifier.applies_to(pair.kind()))
            .map(|e| ScoreDetail {
                name: e.classifier.name().to_string(),
                weight: e.weight,
                score: e.classifier.score(pair, ctx),
            })
            .collect()
    }
}
