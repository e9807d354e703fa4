//! Matcher: iterative mutual-best selection over classes, then members.
//!
//! Each round scores every open candidate pair against a frozen
//! [`MatchMap`] in parallel, then commits the accepted pairs in one
//! sequential step. A pair is accepted only when it is the unique mutual best,
//! clears `min_score`, and leads each side's runner-up by
//! `min_relative_margin`. Rounds repeat per level until nothing changes;
//! levels repeat as outer passes, since member matches feed back into class
//! scores.

mod report;
mod state;

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::classifier::{ClassifierRegistry, Pair, ScoreContext, ScoreDetail};
use crate::config::MatcherConfig;
use crate::env::ClassEnvironment;
use crate::error::{MatcherError, MatcherResult};
use crate::model::{ClassId, EntityKey, EntityKind, EntityRef, Side};

pub use report::{Ambiguity, AmbiguityReason, Candidate, MatchReport, MatchStats, MatchedPair};
pub use state::{MatchEntry, MatchMap, MatchStatus};

/// Predicate that can exclude candidate pairs before scoring.
pub trait PairFilter: Send + Sync {
    fn name(&self) -> &str;

    fn allows(&self, pair: Pair, ctx: &ScoreContext<'_>) -> bool;
}

/// Filter that forbids a fixed set of pairs.
#[derive(Debug, Clone, Default)]
pub struct VetoSet {
    name: String,
    pairs: HashSet<Pair>,
}

impl VetoSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), pairs: HashSet::new() }
    }

    pub fn insert(&mut self, pair: Pair) {
        self.pairs.insert(pair);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl PairFilter for VetoSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn allows(&self, pair: Pair, _ctx: &ScoreContext<'_>) -> bool {
        !self.pairs.contains(&pair)
    }
}

/// Candidates competing with each other in one selection.
struct Group {
    a: Vec<EntityRef>,
    b: Vec<EntityRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Classes,
    Members,
}

/// Best entries of one row or column of a score matrix.
#[derive(Default)]
struct Top {
    best: f64,
    tied: Vec<usize>,
    second: Option<(usize, f64)>,
}

impl Top {
    fn of(scores: impl Iterator<Item = Option<f64>>) -> Self {
        let scored: Vec<(usize, f64)> =
            scores.enumerate().filter_map(|(i, s)| s.map(|s| (i, s))).collect();
        let Some(best) = scored.iter().map(|(_, s)| *s).reduce(f64::max) else {
            return Self::default();
        };
        let tied = scored.iter().filter(|(_, s)| *s == best).map(|(i, _)| *i).collect();
        let second = scored
            .iter()
            .filter(|(_, s)| *s < best)
            .copied()
            .reduce(|x, y| if y.1 > x.1 { y } else { x });
        Self { best, tied, second }
    }

    fn unique(&self) -> Option<usize> {
        match self.tied.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn clears_margin(&self, margin: f64) -> bool {
        self.second.map_or(true, |(_, s)| self.best - s >= margin * self.best)
    }
}

#[derive(Default)]
struct Selection {
    accepted: Vec<(EntityRef, EntityRef, f64)>,
    ambiguous: Vec<Ambiguity>,
}

/// Drives matching over one class environment.
pub struct Matcher<'env> {
    env: &'env ClassEnvironment,
    registry: ClassifierRegistry,
    filters: Vec<Box<dyn PairFilter>>,
    config: MatcherConfig,
    state: MatchMap,
    passes: usize,
    rounds: usize,
}

impl<'env> Matcher<'env> {
    /// Create a matcher with the environment's context pairs already linked.
    pub fn new(env: &'env ClassEnvironment, registry: ClassifierRegistry, config: MatcherConfig) -> Self {
        let mut state = MatchMap::new(env);
        let context = env.context_pairs();
        for (a, b) in &context {
            state.link(*a, *b, 1.0, MatchStatus::Context);
        }
        debug!(pairs = context.len(), "seeded context matches");
        Self { env, registry, filters: Vec::new(), config, state, passes: 0, rounds: 0 }
    }

    pub fn add_filter(&mut self, filter: Box<dyn PairFilter>) {
        self.filters.push(filter);
    }

    pub fn env(&self) -> &'env ClassEnvironment {
        self.env
    }

    pub fn registry(&self) -> &ClassifierRegistry {
        &self.registry
    }

    pub fn state(&self) -> &MatchMap {
        &self.state
    }

    fn context(&self) -> ScoreContext<'_> {
        ScoreContext::new(self.env, &self.state)
    }

    /// Composite score of a pair under the current state.
    pub fn score(&self, pair: Pair) -> f64 {
        self.registry.composite(pair, &self.context())
    }

    pub fn explain(&self, pair: Pair) -> Vec<ScoreDetail> {
        self.registry.breakdown(pair, &self.context())
    }

    fn owner_is_input(&self, side: Side, entity: EntityRef) -> MatcherResult<()> {
        let graph = self.env.graph(side);
        let in_range = match entity {
            EntityRef::Class(id) => id.index() < graph.class_count(),
            EntityRef::Method(id) => id.index() < graph.method_count(),
            EntityRef::Field(id) => id.index() < graph.field_count(),
        };
        if !in_range {
            return Err(MatcherError::UnknownEntity(format!("{entity:?} on side {side}")));
        }
        if !graph.class(graph.owner_of(entity)).is_input() {
            return Err(MatcherError::Config(format!(
                "{} on side {side} is not an input entity",
                graph.key(entity)
            )));
        }
        Ok(())
    }

    /// Force `(a, b)` to a locked match, releasing any prior automatic match
    /// of either entity. Releasing a class match also releases the automatic
    /// matches of its members.
    pub fn lock(&mut self, a: EntityRef, b: EntityRef) -> MatcherResult<()> {
        if a.kind() != b.kind() {
            return Err(MatcherError::Config(format!("cannot lock {:?} to {:?}", a.kind(), b.kind())));
        }
        self.owner_is_input(Side::A, a)?;
        self.owner_is_input(Side::B, b)?;
        if let Some(entry) = self.state.entry(Side::A, a) {
            if entry.other == b {
                // already paired; members stay matched
                if entry.status != MatchStatus::Locked {
                    self.state.set_status(a, MatchStatus::Locked);
                    info!(a = %self.env.a().key(a), b = %self.env.b().key(b), "locked match");
                }
                return Ok(());
            }
        }
        self.release(Side::A, a);
        self.release(Side::B, b);
        let score = self.score(Pair { a, b });
        self.state.link(a, b, score, MatchStatus::Locked);
        info!(a = %self.env.a().key(a), b = %self.env.b().key(b), "locked match");
        Ok(())
    }

    pub fn lock_keys(&mut self, a: &EntityKey, b: &EntityKey) -> MatcherResult<()> {
        let a = self.env.resolve(Side::A, a)?;
        let b = self.env.resolve(Side::B, b)?;
        self.lock(a, b)
    }

    /// Release the match of `entity`, locked or automatic.
    pub fn unmatch(&mut self, side: Side, entity: EntityRef) -> MatcherResult<()> {
        self.owner_is_input(side, entity)?;
        self.release(side, entity);
        Ok(())
    }

    fn release(&mut self, side: Side, entity: EntityRef) {
        let Some(entry) = self.state.unlink(side, entity) else { return };
        if let (EntityRef::Class(this), EntityRef::Class(other)) = (entity, entry.other) {
            self.release_members(side, this);
            self.release_members(side.other(), other);
        }
    }

    fn release_members(&mut self, side: Side, class: ClassId) {
        let env = self.env;
        let node = env.graph(side).class(class);
        let members = node
            .methods
            .iter()
            .map(|m| EntityRef::Method(*m))
            .chain(node.fields.iter().map(|f| EntityRef::Field(*f)));
        for member in members {
            if self.state.entry(side, member).is_some_and(|e| e.status == MatchStatus::Auto) {
                self.state.unlink(side, member);
            }
        }
    }

    /// Run passes until a fixed point and return the report.
    pub fn run(&mut self) -> MatchReport {
        for _ in 0..self.config.max_passes {
            self.passes += 1;
            let mut changed = self.run_level(Level::Classes);
            changed += self.run_level(Level::Members);
            changed += self.match_arrays();
            debug!(pass = self.passes, changed, "pass finished");
            if changed == 0 {
                break;
            }
        }
        self.refresh_scores();
        let report = self.report();
        info!(
            confirmed = report.stats.confirmed,
            ambiguous = report.stats.ambiguous,
            unmatched_a = report.stats.unmatched_a,
            unmatched_b = report.stats.unmatched_b,
            "matching finished"
        );
        report
    }

    fn run_level(&mut self, level: Level) -> usize {
        let mut total = 0;
        for _ in 0..self.config.max_rounds {
            let groups = self.groups(level);
            if groups.is_empty() {
                break;
            }
            self.rounds += 1;
            let accepted: Vec<(EntityRef, EntityRef, f64)> = {
                let ctx = self.context();
                groups
                    .par_iter()
                    .flat_map_iter(|g| self.select(g, &ctx, false).accepted)
                    .collect()
            };
            if accepted.is_empty() {
                break;
            }
            debug!(?level, round = self.rounds, accepted = accepted.len(), "round committed");
            total += accepted.len();
            for (a, b, score) in accepted {
                if let (EntityRef::Method(ma), EntityRef::Method(mb)) = (a, b) {
                    trace!(a = %self.env.a().method_display(ma), b = %self.env.b().method_display(mb), score, "method matched");
                }
                self.state.link(a, b, score, MatchStatus::Auto);
            }
        }
        total
    }

    fn open_classes(&self, side: Side) -> Vec<EntityRef> {
        let graph = self.env.graph(side);
        graph
            .class_ids()
            .filter(|c| self.env.is_candidate(side, *c))
            .map(EntityRef::Class)
            .filter(|e| !self.state.is_matched(side, *e))
            .collect()
    }

    fn open_members(&self, side: Side, class: ClassId, kind: EntityKind) -> Vec<EntityRef> {
        let node = self.env.graph(side).class(class);
        let members: Vec<EntityRef> = match kind {
            EntityKind::Method => node.methods.iter().map(|m| EntityRef::Method(*m)).collect(),
            EntityKind::Field => node.fields.iter().map(|f| EntityRef::Field(*f)).collect(),
            EntityKind::Class => Vec::new(),
        };
        members.into_iter().filter(|m| !self.state.is_matched(side, *m)).collect()
    }

    fn groups(&self, level: Level) -> Vec<Group> {
        match level {
            Level::Classes => {
                let group = Group { a: self.open_classes(Side::A), b: self.open_classes(Side::B) };
                if group.a.is_empty() || group.b.is_empty() {
                    Vec::new()
                } else {
                    vec![group]
                }
            }
            Level::Members => {
                let mut groups = Vec::new();
                for (a, entry) in self.state.pairs(EntityKind::Class) {
                    if entry.status == MatchStatus::Context {
                        continue;
                    }
                    let (EntityRef::Class(ca), EntityRef::Class(cb)) = (a, entry.other) else { continue };
                    if !self.env.graph(Side::A).class(ca).is_input() {
                        continue;
                    }
                    for kind in [EntityKind::Method, EntityKind::Field] {
                        let group = Group {
                            a: self.open_members(Side::A, ca, kind),
                            b: self.open_members(Side::B, cb, kind),
                        };
                        if !group.a.is_empty() && !group.b.is_empty() {
                            groups.push(group);
                        }
                    }
                }
                groups
            }
        }
    }

    fn select(&self, group: &Group, ctx: &ScoreContext<'_>, diagnose: bool) -> Selection {
        let rows: Vec<Vec<Option<f64>>> = group
            .a
            .par_iter()
            .map(|&a| {
                group
                    .b
                    .iter()
                    .map(|&b| {
                        let pair = Pair { a, b };
                        self.filters
                            .iter()
                            .all(|f| f.allows(pair, ctx))
                            .then(|| self.registry.composite(pair, ctx))
                    })
                    .collect()
            })
            .collect();
        let row_tops: Vec<Top> = rows.iter().map(|r| Top::of(r.iter().copied())).collect();
        let col_tops: Vec<Top> =
            (0..group.b.len()).map(|j| Top::of(rows.iter().map(|r| r[j]))).collect();

        let min_score = self.config.min_score;
        let margin = self.config.min_relative_margin;
        let mut selection = Selection::default();
        let mut accepted_rows = HashSet::new();
        let mut accepted_cols = HashSet::new();

        for (i, row) in row_tops.iter().enumerate() {
            let Some(j) = row.unique() else { continue };
            let col = &col_tops[j];
            if col.unique() != Some(i) || row.best < min_score {
                continue;
            }
            if row.clears_margin(margin) && col.clears_margin(margin) {
                selection.accepted.push((group.a[i], group.b[j], row.best));
                accepted_rows.insert(i);
                accepted_cols.insert(j);
            }
        }
        if !diagnose {
            return selection;
        }

        for (i, row) in row_tops.iter().enumerate() {
            if accepted_rows.contains(&i) || row.tied.is_empty() || row.best < min_score {
                continue;
            }
            let verdict = self.verdict(row, &col_tops, i, margin, |j| group.b[j]);
            if let Some((reason, candidates)) = verdict {
                selection.ambiguous.push(self.ambiguity(Side::A, group.a[i], reason, candidates));
            }
        }
        for (j, col) in col_tops.iter().enumerate() {
            if accepted_cols.contains(&j) || col.tied.is_empty() || col.best < min_score {
                continue;
            }
            let verdict = self.verdict(col, &row_tops, j, margin, |i| group.a[i]);
            if let Some((reason, candidates)) = verdict {
                selection.ambiguous.push(self.ambiguity(Side::B, group.b[j], reason, candidates));
            }
        }
        selection
    }

    /// Why an unaccepted entity with a strong candidate stayed open, if it
    /// was a tie or a margin failure rather than losing to a better pair.
    fn verdict(
        &self,
        own: &Top,
        others: &[Top],
        index: usize,
        margin: f64,
        entity: impl Fn(usize) -> EntityRef,
    ) -> Option<(AmbiguityReason, Vec<(EntityRef, f64)>)> {
        if own.tied.len() > 1 {
            let candidates = own.tied.iter().map(|k| (entity(*k), own.best)).collect();
            return Some((AmbiguityReason::Tie, candidates));
        }
        let best = own.unique()?;
        let other = &others[best];
        if other.unique() != Some(index) {
            return None;
        }
        if own.clears_margin(margin) && other.clears_margin(margin) {
            return None;
        }
        let mut candidates = vec![(entity(best), own.best)];
        if let Some((runner, score)) = own.second {
            candidates.push((entity(runner), score));
        }
        Some((AmbiguityReason::Margin, candidates))
    }

    fn ambiguity(
        &self,
        side: Side,
        entity: EntityRef,
        reason: AmbiguityReason,
        candidates: Vec<(EntityRef, f64)>,
    ) -> Ambiguity {
        let own = self.env.graph(side);
        let other = self.env.graph(side.other());
        Ambiguity {
            side,
            entity: own.key(entity),
            reason,
            candidates: candidates
                .into_iter()
                .map(|(e, score)| Candidate { key: other.key(e), score })
                .collect(),
        }
    }

    /// Match array placeholders whose element types are matched.
    fn match_arrays(&mut self) -> usize {
        let env = self.env;
        let (ga, gb) = (env.a(), env.b());
        let mut linked = 0;
        for cid in ga.class_ids() {
            let Some((dims, element)) = ga.class(cid).array else { continue };
            if self.state.is_matched(Side::A, EntityRef::Class(cid)) {
                continue;
            }
            let Some(entry) = self.state.entry(Side::A, EntityRef::Class(element)).copied() else {
                continue;
            };
            let EntityRef::Class(element_b) = entry.other else { continue };
            let type_id = format!("{}{}", "[".repeat(dims as usize), gb.class(element_b).id);
            let Some(target) = gb.lookup(&type_id) else { continue };
            if self.state.is_matched(Side::B, EntityRef::Class(target)) {
                continue;
            }
            self.state.link(EntityRef::Class(cid), EntityRef::Class(target), entry.score, MatchStatus::Auto);
            linked += 1;
        }
        linked
    }

    /// Recompute automatic match scores against the final state.
    fn refresh_scores(&mut self) {
        for kind in [EntityKind::Class, EntityKind::Method, EntityKind::Field] {
            let updates: Vec<(EntityRef, f64)> = {
                let ctx = self.context();
                self.state
                    .pairs(kind)
                    .into_par_iter()
                    .filter(|(a, entry)| entry.status == MatchStatus::Auto && !self.is_array(*a))
                    .map(|(a, entry)| (a, self.registry.composite(Pair { a, b: entry.other }, &ctx)))
                    .collect()
            };
            for (a, score) in updates {
                self.state.set_score(a, score);
            }
        }
        // arrays inherit the refreshed score of their element
        let ga = self.env.a();
        for (a, entry) in self.state.pairs(EntityKind::Class) {
            let EntityRef::Class(cid) = a else { continue };
            let Some((_, element)) = ga.class(cid).array else { continue };
            if entry.status != MatchStatus::Auto {
                continue;
            }
            if let Some(element_entry) = self.state.entry(Side::A, EntityRef::Class(element)).copied() {
                self.state.set_score(a, element_entry.score);
            }
        }
    }

    fn is_array(&self, a: EntityRef) -> bool {
        matches!(a, EntityRef::Class(cid) if self.env.a().class(cid).array.is_some())
    }

    fn ambiguities(&self) -> Vec<Ambiguity> {
        let ctx = self.context();
        let mut groups = self.groups(Level::Classes);
        groups.extend(self.groups(Level::Members));
        groups.par_iter().flat_map_iter(|g| self.select(g, &ctx, true).ambiguous).collect()
    }

    fn unmatched(&self, side: Side) -> Vec<EntityKey> {
        let graph = self.env.graph(side);
        let mut keys = Vec::new();
        for cid in graph.class_ids().filter(|c| self.env.is_candidate(side, *c)) {
            let class = graph.class(cid);
            let entities = std::iter::once(EntityRef::Class(cid))
                .chain(class.methods.iter().map(|m| EntityRef::Method(*m)))
                .chain(class.fields.iter().map(|f| EntityRef::Field(*f)));
            for entity in entities {
                if !self.state.is_matched(side, entity) {
                    keys.push(graph.key(entity));
                }
            }
        }
        keys
    }

    /// Snapshot of the current state as a report.
    pub fn report(&self) -> MatchReport {
        let (ga, gb) = (self.env.a(), self.env.b());
        let mut stats = MatchStats { passes: self.passes, rounds: self.rounds, ..MatchStats::default() };
        let mut lists: [Vec<MatchedPair>; 3] = Default::default();
        for (slot, kind) in [EntityKind::Class, EntityKind::Method, EntityKind::Field].into_iter().enumerate() {
            for (a, entry) in self.state.pairs(kind) {
                match entry.status {
                    MatchStatus::Context => stats.context += 1,
                    MatchStatus::Auto | MatchStatus::Locked => {
                        if entry.status == MatchStatus::Locked {
                            stats.locked += 1;
                        } else {
                            stats.confirmed += 1;
                        }
                        lists[slot].push(MatchedPair {
                            a: ga.key(a),
                            b: gb.key(entry.other),
                            score: entry.score,
                            locked: entry.status == MatchStatus::Locked,
                        });
                    }
                }
            }
        }
        let [classes, methods, fields] = lists;
        let ambiguous = self.ambiguities();
        let unmatched_a = self.unmatched(Side::A);
        let unmatched_b = self.unmatched(Side::B);
        stats.ambiguous = ambiguous.len();
        stats.unmatched_a = unmatched_a.len();
        stats.unmatched_b = unmatched_b.len();
        stats.unresolved_a = self.env.unresolved_count(Side::A);
        stats.unresolved_b = self.env.unresolved_count(Side::B);
        MatchReport {
            classes,
            methods,
            fields,
            ambiguous,
            unmatched_a,
            unmatched_b,
            issues: self.env.issues().to_vec(),
            stats,
        }
    }
}
