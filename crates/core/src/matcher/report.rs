use serde::{Deserialize, Serialize};

use crate::model::{BuildIssue, EntityKey, Side};

/// A confirmed pair in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub a: EntityKey,
    pub b: EntityKey,
    pub score: f64,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityReason {
    /// Two or more candidates share the top score.
    Tie,
    /// The best candidate does not lead the runner-up by the required margin.
    Margin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub key: EntityKey,
    pub score: f64,
}

/// An entity left unmatched because its best candidates could not be told apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub side: Side,
    pub entity: EntityKey,
    pub reason: AmbiguityReason,
    /// Top candidates, best first.
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub passes: usize,
    pub rounds: usize,
    pub confirmed: usize,
    pub locked: usize,
    pub context: usize,
    pub ambiguous: usize,
    pub unmatched_a: usize,
    pub unmatched_b: usize,
    pub unresolved_a: usize,
    pub unresolved_b: usize,
}

/// Outcome of a matching run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub classes: Vec<MatchedPair>,
    pub methods: Vec<MatchedPair>,
    pub fields: Vec<MatchedPair>,
    pub ambiguous: Vec<Ambiguity>,
    pub unmatched_a: Vec<EntityKey>,
    pub unmatched_b: Vec<EntityKey>,
    pub issues: Vec<BuildIssue>,
    pub stats: MatchStats,
}

impl MatchReport {
    /// Side B key matched to `a`, if any.
    pub fn counterpart(&self, a: &EntityKey) -> Option<&EntityKey> {
        self.classes
            .iter()
            .chain(&self.methods)
            .chain(&self.fields)
            .find(|p| &p.a == a)
            .map(|p| &p.b)
    }

    pub fn pair(&self, a: &EntityKey) -> Option<&MatchedPair> {
        self.classes.iter().chain(&self.methods).chain(&self.fields).find(|p| &p.a == a)
    }

    pub fn is_ambiguous(&self, side: Side, key: &EntityKey) -> bool {
        self.ambiguous.iter().any(|amb| amb.side == side && &amb.entity == key)
    }
}
