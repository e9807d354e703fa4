use serde::{Deserialize, Serialize};

use crate::env::ClassEnvironment;
use crate::model::{ClassId, EntityKind, EntityRef, FieldId, MethodId, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Accepted by the automatic rounds.
    Auto,
    /// Forced by a caller or plugin; never re-scored away.
    Locked,
    /// Known before matching (shared classes, identical placeholders).
    Context,
}

/// One side's view of a match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchEntry {
    pub other: EntityRef,
    pub score: f64,
    pub status: MatchStatus,
}

#[derive(Debug, Clone, Default)]
struct SideState {
    classes: Vec<Option<MatchEntry>>,
    methods: Vec<Option<MatchEntry>>,
    fields: Vec<Option<MatchEntry>>,
}

impl SideState {
    fn sized(classes: usize, methods: usize, fields: usize) -> Self {
        Self { classes: vec![None; classes], methods: vec![None; methods], fields: vec![None; fields] }
    }

    fn slot(&self, entity: EntityRef) -> &Option<MatchEntry> {
        match entity {
            EntityRef::Class(id) => &self.classes[id.index()],
            EntityRef::Method(id) => &self.methods[id.index()],
            EntityRef::Field(id) => &self.fields[id.index()],
        }
    }

    fn slot_mut(&mut self, entity: EntityRef) -> &mut Option<MatchEntry> {
        match entity {
            EntityRef::Class(id) => &mut self.classes[id.index()],
            EntityRef::Method(id) => &mut self.methods[id.index()],
            EntityRef::Field(id) => &mut self.fields[id.index()],
        }
    }
}

/// Symmetric match state for both sides.
///
/// Every write updates both sides at once, so `a -> b` holds exactly when
/// `b -> a` holds.
#[derive(Debug, Clone)]
pub struct MatchMap {
    a: SideState,
    b: SideState,
}

impl MatchMap {
    pub(crate) fn new(env: &ClassEnvironment) -> Self {
        let sized = |side: Side| {
            let g = env.graph(side);
            SideState::sized(g.class_count(), g.method_count(), g.field_count())
        };
        Self { a: sized(Side::A), b: sized(Side::B) }
    }

    fn side(&self, side: Side) -> &SideState {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideState {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    pub fn entry(&self, side: Side, entity: EntityRef) -> Option<&MatchEntry> {
        self.side(side).slot(entity).as_ref()
    }

    pub fn counterpart(&self, side: Side, entity: EntityRef) -> Option<EntityRef> {
        self.entry(side, entity).map(|e| e.other)
    }

    pub fn is_matched(&self, side: Side, entity: EntityRef) -> bool {
        self.entry(side, entity).is_some()
    }

    pub(crate) fn link(&mut self, a: EntityRef, b: EntityRef, score: f64, status: MatchStatus) {
        debug_assert_eq!(a.kind(), b.kind());
        debug_assert!(!self.is_matched(Side::A, a) && !self.is_matched(Side::B, b));
        *self.a.slot_mut(a) = Some(MatchEntry { other: b, score, status });
        *self.b.slot_mut(b) = Some(MatchEntry { other: a, score, status });
    }

    /// Remove the match of `entity` on `side` and of its counterpart.
    pub(crate) fn unlink(&mut self, side: Side, entity: EntityRef) -> Option<MatchEntry> {
        let entry = self.side_mut(side).slot_mut(entity).take()?;
        *self.side_mut(side.other()).slot_mut(entry.other) = None;
        Some(entry)
    }

    /// Change the status of an existing pair, given by its side A entity.
    pub(crate) fn set_status(&mut self, a: EntityRef, status: MatchStatus) {
        if let Some(entry) = self.a.slot_mut(a) {
            entry.status = status;
            let b = entry.other;
            if let Some(back) = self.b.slot_mut(b) {
                back.status = status;
            }
        }
    }

    /// Update the score of an existing pair, given by its side A entity.
    pub(crate) fn set_score(&mut self, a: EntityRef, score: f64) {
        if let Some(entry) = self.a.slot_mut(a) {
            entry.score = score;
            let b = entry.other;
            if let Some(back) = self.b.slot_mut(b) {
                back.score = score;
            }
        }
    }

    /// All pairs of one kind, as side A entity plus its entry, in handle order.
    pub fn pairs(&self, kind: EntityKind) -> Vec<(EntityRef, MatchEntry)> {
        let (slots, wrap): (&[Option<MatchEntry>], fn(u32) -> EntityRef) = match kind {
            EntityKind::Class => (self.a.classes.as_slice(), |i| EntityRef::Class(ClassId(i))),
            EntityKind::Method => (self.a.methods.as_slice(), |i| EntityRef::Method(MethodId(i))),
            EntityKind::Field => (self.a.fields.as_slice(), |i| EntityRef::Field(FieldId(i))),
        };
        slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|entry| (wrap(i as u32), entry)))
            .collect()
    }

    /// Compare the match state of two maps, ignoring scores.
    pub fn same_pairs(&self, other: &MatchMap) -> bool {
        [EntityKind::Class, EntityKind::Method, EntityKind::Field].iter().all(|kind| {
            let mine: Vec<_> = self.pairs(*kind).into_iter().map(|(a, e)| (a, e.other, e.status)).collect();
            let theirs: Vec<_> = other.pairs(*kind).into_iter().map(|(a, e)| (a, e.other, e.status)).collect();
            mine == theirs
        })
    }
}
