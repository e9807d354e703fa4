mod common;

use common::{env, foo_bar_side_a, foo_bar_side_b, sample_program, twin_methods};
use matcher_core::classifier::ClassifierRegistry;
use matcher_core::config::MatcherConfig;
use matcher_core::env::ClassEnvironment;
use matcher_core::loader::ClassRecord;
use matcher_core::matcher::{AmbiguityReason, MatchStatus, Matcher};
use matcher_core::model::{ClassId, EntityKey, EntityKind, EntityRef, MethodId, Side};
use matcher_core::MatcherError;

fn matcher(env: &ClassEnvironment) -> Matcher<'_> {
    Matcher::new(env, ClassifierRegistry::builtin(), MatcherConfig::default())
}

fn class_id(env: &ClassEnvironment, side: Side, name: &str) -> ClassId {
    env.graph(side).lookup_name(name).expect("class present")
}

fn method_id(env: &ClassEnvironment, side: Side, owner: &str, name: &str, desc: &str) -> MethodId {
    let graph = env.graph(side);
    graph.declared_method(class_id(env, side, owner), name, desc).expect("method present")
}

#[test]
fn identical_inputs_match_themselves_at_full_confidence() {
    let env = env(sample_program(), sample_program());
    let report = matcher(&env).run();

    assert!(report.unmatched_a.is_empty(), "unmatched A: {:?}", report.unmatched_a);
    assert!(report.unmatched_b.is_empty(), "unmatched B: {:?}", report.unmatched_b);
    assert!(report.ambiguous.is_empty());
    // four input classes plus the `[Lapp/Item;` array placeholder
    assert_eq!(report.classes.len(), 5);
    assert_eq!(report.methods.len(), 8);
    assert_eq!(report.fields.len(), 3);
    for pair in report.classes.iter().chain(&report.methods).chain(&report.fields) {
        assert_eq!(pair.a, pair.b);
        assert_eq!(pair.score, 1.0, "{} scored {}", pair.a, pair.score);
        assert!(!pair.locked);
    }
}

/// `foo(I)I` reading `bar:I` pairs with `a(I)I` reading `b:I` although no
/// name agrees.
#[test]
fn reference_graph_matches_renamed_members() {
    let env = env(foo_bar_side_a(), foo_bar_side_b());
    let report = matcher(&env).run();

    assert_eq!(report.counterpart(&EntityKey::class("p/Owner")), Some(&EntityKey::class("q/X")));
    assert_eq!(
        report.counterpart(&EntityKey::method("p/Owner", "foo", "(I)I")),
        Some(&EntityKey::method("q/X", "a", "(I)I"))
    );
    assert_eq!(
        report.counterpart(&EntityKey::field("p/Owner", "bar", "I")),
        Some(&EntityKey::field("q/X", "b", "I"))
    );
    assert_eq!(report.unmatched_b, vec![EntityKey::method("q/X", "c", "()V")]);
    assert!(report.unmatched_a.is_empty());
}

#[test]
fn declaration_position_breaks_structural_ties() {
    let env = env(vec![twin_methods("p/K", "first", "second")], vec![twin_methods("q/K", "a", "b")]);
    let report = matcher(&env).run();

    assert_eq!(
        report.counterpart(&EntityKey::method("p/K", "first", "()V")),
        Some(&EntityKey::method("q/K", "a", "()V"))
    );
    assert_eq!(
        report.counterpart(&EntityKey::method("p/K", "second", "()V")),
        Some(&EntityKey::method("q/K", "b", "()V"))
    );
}

#[test]
fn exact_ties_stay_ambiguous() {
    let env = env(vec![twin_methods("p/K", "first", "second")], vec![twin_methods("q/K", "a", "b")]);
    let mut registry = ClassifierRegistry::builtin();
    registry.set_weight("method-position", 0.0).expect("known classifier");
    let report = Matcher::new(&env, registry, MatcherConfig::default()).run();

    assert_eq!(report.classes.len(), 1);
    assert!(report.methods.is_empty());
    let first = EntityKey::method("p/K", "first", "()V");
    let second = EntityKey::method("p/K", "second", "()V");
    assert!(report.is_ambiguous(Side::A, &first));
    assert!(report.is_ambiguous(Side::A, &second));
    assert!(report.is_ambiguous(Side::B, &EntityKey::method("q/K", "a", "()V")));
    let tie = report.ambiguous.iter().find(|a| a.entity == first).expect("ambiguity for first");
    assert_eq!(tie.reason, AmbiguityReason::Tie);
    assert_eq!(tie.candidates.len(), 2);
    assert_eq!(report.stats.ambiguous, 4);
}

#[test]
fn matches_are_symmetric_and_members_stay_within_owners() {
    let env = env(foo_bar_side_a(), foo_bar_side_b());
    let mut m = matcher(&env);
    m.run();
    let state = m.state();

    for kind in [EntityKind::Class, EntityKind::Method, EntityKind::Field] {
        for (a, entry) in state.pairs(kind) {
            assert_eq!(state.counterpart(Side::B, entry.other), Some(a));
            if kind == EntityKind::Class {
                continue;
            }
            let owner_a = env.a().owner_of(a);
            let owner_b = env.b().owner_of(entry.other);
            assert_eq!(state.counterpart(Side::A, EntityRef::Class(owner_a)), Some(EntityRef::Class(owner_b)));
        }
    }
}

#[test]
fn repeated_runs_are_deterministic() {
    let env = env(sample_program(), sample_program());
    let mut first = matcher(&env);
    let mut second = matcher(&env);
    let report_first = first.run();
    let report_second = second.run();

    assert!(first.state().same_pairs(second.state()));
    assert_eq!(report_first, report_second);
}

#[test]
fn locked_pairs_survive_runs_and_displace_their_rivals() {
    let env = env(vec![twin_methods("p/K", "first", "second")], vec![twin_methods("q/K", "a", "b")]);
    let mut m = matcher(&env);
    let first = method_id(&env, Side::A, "p/K", "first", "()V");
    let b = method_id(&env, Side::B, "q/K", "b", "()V");
    m.lock(EntityRef::Method(first), EntityRef::Method(b)).expect("lock");

    let report = m.run();
    let locked = report.pair(&EntityKey::method("p/K", "first", "()V")).expect("locked pair reported");
    assert!(locked.locked);
    assert_eq!(locked.b, EntityKey::method("q/K", "b", "()V"));
    assert_eq!(
        report.counterpart(&EntityKey::method("p/K", "second", "()V")),
        Some(&EntityKey::method("q/K", "a", "()V"))
    );
    assert_eq!(report.stats.locked, 1);

    // a second run leaves the lock in place
    let again = m.run();
    assert!(again.pair(&EntityKey::method("p/K", "first", "()V")).expect("still locked").locked);
}

#[test]
fn locking_a_class_releases_automatic_member_matches() {
    let env = env(vec![twin_methods("p/K", "first", "second")], vec![twin_methods("q/K", "a", "b")]);
    let mut m = matcher(&env);
    m.run();
    let first = EntityRef::Method(method_id(&env, Side::A, "p/K", "first", "()V"));
    assert!(m.state().is_matched(Side::A, first));

    let (ka, kb) = (class_id(&env, Side::A, "p/K"), class_id(&env, Side::B, "q/K"));
    m.lock(EntityRef::Class(ka), EntityRef::Class(kb)).expect("lock class");
    assert!(!m.state().is_matched(Side::A, first));
    assert_eq!(m.state().entry(Side::A, EntityRef::Class(ka)).map(|e| e.status), Some(MatchStatus::Locked));

    let report = m.run();
    assert_eq!(report.methods.len(), 2);
    assert!(report.classes[0].locked);
}

#[test]
fn locking_a_confirmed_class_pair_keeps_its_members() {
    let env = env(vec![twin_methods("p/K", "first", "second")], vec![twin_methods("q/K", "a", "b")]);
    let mut m = matcher(&env);
    assert_eq!(m.run().methods.len(), 2);

    let (ka, kb) = (class_id(&env, Side::A, "p/K"), class_id(&env, Side::B, "q/K"));
    m.lock(EntityRef::Class(ka), EntityRef::Class(kb)).expect("lock confirmed pair");

    let report = m.report();
    assert!(report.classes[0].locked);
    assert_eq!(report.methods.len(), 2);
    assert_eq!(
        report.counterpart(&EntityKey::method("p/K", "first", "()V")),
        Some(&EntityKey::method("q/K", "a", "()V"))
    );
    assert_eq!(m.state().entry(Side::B, EntityRef::Class(kb)).map(|e| e.status), Some(MatchStatus::Locked));
}

/// A unique best that leads its runner-up by less than the relative margin
/// stays open on both sides.
#[test]
fn narrow_leads_are_reported_as_margin_ambiguities() {
    let a = vec![common::class("p/M", Vec::new(), vec![common::method("m", "()V", Vec::new(), 100)])];
    let b = vec![common::class(
        "q/M",
        Vec::new(),
        vec![common::method("x", "()V", Vec::new(), 100), common::method("y", "()V", Vec::new(), 99)],
    )];
    let env = env(a, b);
    let mut registry = ClassifierRegistry::builtin();
    registry.set_weight("method-position", 0.0).expect("known classifier");
    let config = MatcherConfig { min_relative_margin: 0.2, ..MatcherConfig::default() };
    let report = Matcher::new(&env, registry, config).run();

    assert_eq!(report.counterpart(&EntityKey::class("p/M")), Some(&EntityKey::class("q/M")));
    assert!(report.methods.is_empty());

    let m = EntityKey::method("p/M", "m", "()V");
    let x = EntityKey::method("q/M", "x", "()V");
    for (side, key) in [(Side::A, &m), (Side::B, &x)] {
        let found = report
            .ambiguous
            .iter()
            .find(|amb| amb.side == side && &amb.entity == key)
            .unwrap_or_else(|| panic!("no ambiguity for {key}"));
        assert_eq!(found.reason, AmbiguityReason::Margin);
        assert!(!found.candidates.is_empty());
    }
    let lead = report.ambiguous.iter().find(|amb| amb.entity == m).expect("ambiguity for m");
    assert_eq!(lead.candidates[0].key, x);
}

#[test]
fn unmatch_releases_both_sides() {
    let env = env(foo_bar_side_a(), foo_bar_side_b());
    let mut m = matcher(&env);
    m.run();
    let foo = EntityRef::Method(method_id(&env, Side::A, "p/Owner", "foo", "(I)I"));
    let a = EntityRef::Method(method_id(&env, Side::B, "q/X", "a", "(I)I"));
    assert_eq!(m.state().counterpart(Side::A, foo), Some(a));

    m.unmatch(Side::B, a).expect("unmatch");
    assert!(!m.state().is_matched(Side::A, foo));
    assert!(!m.state().is_matched(Side::B, a));
}

#[test]
fn context_entities_cannot_be_locked() {
    let env = env(foo_bar_side_a(), foo_bar_side_b());
    let mut m = matcher(&env);
    let int_a = env.a().lookup("I").expect("int placeholder");
    let int_b = env.b().lookup("I").expect("int placeholder");
    let err = m.lock(EntityRef::Class(int_a), EntityRef::Class(int_b)).expect_err("placeholder lock");
    assert!(matches!(err, MatcherError::Config(_)));

    let owner = EntityRef::Class(class_id(&env, Side::A, "p/Owner"));
    let foo = EntityRef::Method(method_id(&env, Side::B, "q/X", "a", "(I)I"));
    assert!(matches!(m.lock(owner, foo), Err(MatcherError::Config(_))));

    let missing = EntityKey::class("p/Nowhere");
    assert!(matches!(m.lock_keys(&missing, &EntityKey::class("q/X")), Err(MatcherError::UnknownEntity(_))));
}

#[test]
fn unresolved_classes_are_excluded_but_counted() {
    let mut a = foo_bar_side_a();
    a.push(ClassRecord { super_name: Some("lost/Base".to_string()), ..ClassRecord::new("p/Orphan") });
    let env = env(a, foo_bar_side_b());
    let report = matcher(&env).run();

    assert_eq!(report.stats.unresolved_a, 1);
    assert_eq!(report.stats.unresolved_b, 0);
    assert!(!report.unmatched_a.contains(&EntityKey::class("p/Orphan")));
    assert!(report.counterpart(&EntityKey::class("p/Orphan")).is_none());
    assert!(report.issues.iter().any(|i| i.class == "p/Orphan"));
}

#[test]
fn shared_classes_are_context_matches() {
    use matcher_core::config::EnvOptions;
    use matcher_core::env::EnvInputs;

    let shared = vec![common::class("lib/Util", Vec::new(), vec![common::method("help", "()V", Vec::new(), 1)])];
    let inputs = EnvInputs { a: foo_bar_side_a(), b: foo_bar_side_b(), shared, ..EnvInputs::default() };
    let env = ClassEnvironment::build(inputs, &EnvOptions::default());
    let m = matcher(&env);

    let util_a = EntityRef::Class(class_id(&env, Side::A, "lib/Util"));
    let entry = m.state().entry(Side::A, util_a).expect("shared class linked");
    assert_eq!(entry.status, MatchStatus::Context);
    let help = EntityRef::Method(method_id(&env, Side::A, "lib/Util", "help", "()V"));
    assert!(m.state().is_matched(Side::A, help));
    assert!(env.is_shared("Llib/Util;"));
}
