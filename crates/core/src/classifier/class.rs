use std::collections::BTreeSet;

use crate::classifier::{count_ratio, string_overlap, BuiltinClassifier, Rule, ScoreContext};
use crate::model::{
    ClassGraph, ClassId, ACC_ABSTRACT, ACC_ANNOTATION, ACC_ENUM, ACC_FINAL, ACC_INTERFACE,
    ACC_SYNTHETIC,
};

const KIND_FLAGS: u16 = ACC_INTERFACE | ACC_ABSTRACT | ACC_ENUM | ACC_ANNOTATION | ACC_FINAL | ACC_SYNTHETIC;

pub(crate) fn builtins() -> Vec<BuiltinClassifier> {
    vec![
        BuiltinClassifier { name: "class-kind", weight: 20.0, rule: Rule::Class(kind) },
        BuiltinClassifier { name: "class-name-hint", weight: 8.0, rule: Rule::Class(name_hint) },
        BuiltinClassifier { name: "class-hierarchy-depth", weight: 1.0, rule: Rule::Class(hierarchy_depth) },
        BuiltinClassifier { name: "class-superclass", weight: 10.0, rule: Rule::Class(superclass) },
        BuiltinClassifier { name: "class-interfaces", weight: 8.0, rule: Rule::Class(interfaces) },
        BuiltinClassifier { name: "class-method-count", weight: 3.0, rule: Rule::Class(method_count) },
        BuiltinClassifier { name: "class-field-count", weight: 3.0, rule: Rule::Class(field_count) },
        BuiltinClassifier { name: "class-signature-refs", weight: 6.0, rule: Rule::Class(signature_refs) },
        BuiltinClassifier { name: "class-field-type-refs", weight: 4.0, rule: Rule::Class(field_type_refs) },
        BuiltinClassifier { name: "class-outgoing-refs", weight: 6.0, rule: Rule::Class(outgoing_refs) },
        BuiltinClassifier { name: "class-strings", weight: 8.0, rule: Rule::Class(strings) },
        BuiltinClassifier { name: "class-subtypes", weight: 2.0, rule: Rule::Class(subtypes) },
    ]
}

fn kind(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let (ca, cb) = (ctx.a().class(a), ctx.b().class(b));
    let differing = ((ca.access ^ cb.access) & KIND_FLAGS).count_ones();
    Some(1.0 - differing as f64 / KIND_FLAGS.count_ones() as f64)
}

/// Under obfuscation every candidate differs in name alike, so only agreement moves the ranking.
fn name_hint(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    Some(if ctx.a().class(a).name == ctx.b().class(b).name { 1.0 } else { 0.0 })
}

fn hierarchy_depth(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    if ctx.a().class(a).is_interface() || ctx.b().class(b).is_interface() {
        return None;
    }
    Some(count_ratio(ctx.a().hierarchy_depth(a), ctx.b().hierarchy_depth(b)))
}

fn superclass(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    match (ctx.a().class(a).super_class, ctx.b().class(b).super_class) {
        (None, None) => None,
        (Some(sa), Some(sb)) => Some(ctx.relation(sa, sb).score()),
        _ => Some(0.0),
    }
}

fn interfaces(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().class(a).interfaces, &ctx.b().class(b).interfaces)
}

fn method_count(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    Some(count_ratio(ctx.a().class(a).methods.len(), ctx.b().class(b).methods.len()))
}

fn field_count(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    Some(count_ratio(ctx.a().class(a).fields.len(), ctx.b().class(b).fields.len()))
}

fn signature_refs(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().class(a).method_type_refs, &ctx.b().class(b).method_type_refs)
}

fn field_type_refs(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().class(a).field_type_refs, &ctx.b().class(b).field_type_refs)
}

/// Classes referenced from the bodies of a class's methods, excluding itself.
fn referenced_classes(graph: &ClassGraph, id: ClassId) -> Vec<ClassId> {
    let refs: BTreeSet<ClassId> = graph
        .class(id)
        .methods
        .iter()
        .flat_map(|m| graph.method(*m).class_refs.iter().copied())
        .filter(|c| *c != id)
        .collect();
    refs.into_iter().collect()
}

fn outgoing_refs(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&referenced_classes(ctx.a(), a), &referenced_classes(ctx.b(), b))
}

fn strings(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    string_overlap(&ctx.a().class(a).strings, &ctx.b().class(b).strings)
}

fn subtypes(a: ClassId, b: ClassId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let collect = |graph: &ClassGraph, id: ClassId| {
        let class = graph.class(id);
        let all: BTreeSet<ClassId> = class.children.iter().chain(&class.implementers).copied().collect();
        all.into_iter().collect::<Vec<_>>()
    };
    ctx.set_similarity(&collect(ctx.a(), a), &collect(ctx.b(), b))
}
