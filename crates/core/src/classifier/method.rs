use crate::classifier::{count_ratio, string_overlap, BuiltinClassifier, Rule, ScoreContext};
use crate::model::{
    MethodId, ACC_ABSTRACT, ACC_BRIDGE, ACC_FINAL, ACC_NATIVE, ACC_STATIC, ACC_SYNTHETIC,
    ACC_VARARGS,
};

const KIND_FLAGS: u16 =
    ACC_STATIC | ACC_ABSTRACT | ACC_NATIVE | ACC_FINAL | ACC_SYNTHETIC | ACC_BRIDGE | ACC_VARARGS;

pub(crate) fn builtins() -> Vec<BuiltinClassifier> {
    vec![
        BuiltinClassifier { name: "method-kind", weight: 10.0, rule: Rule::Method(kind) },
        BuiltinClassifier { name: "method-name-hint", weight: 6.0, rule: Rule::Method(name_hint) },
        BuiltinClassifier { name: "method-arg-types", weight: 10.0, rule: Rule::Method(arg_types) },
        BuiltinClassifier { name: "method-ret-type", weight: 5.0, rule: Rule::Method(ret_type) },
        BuiltinClassifier { name: "method-calls-out", weight: 10.0, rule: Rule::Method(calls_out) },
        BuiltinClassifier { name: "method-calls-in", weight: 6.0, rule: Rule::Method(calls_in) },
        BuiltinClassifier { name: "method-field-reads", weight: 8.0, rule: Rule::Method(field_reads) },
        BuiltinClassifier { name: "method-field-writes", weight: 8.0, rule: Rule::Method(field_writes) },
        BuiltinClassifier { name: "method-class-refs", weight: 4.0, rule: Rule::Method(class_refs) },
        BuiltinClassifier { name: "method-strings", weight: 6.0, rule: Rule::Method(strings) },
        BuiltinClassifier { name: "method-external-refs", weight: 6.0, rule: Rule::Method(external_refs) },
        BuiltinClassifier { name: "method-code-size", weight: 2.0, rule: Rule::Method(code_size) },
        BuiltinClassifier { name: "method-position", weight: 2.0, rule: Rule::Method(position) },
    ]
}

fn kind(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let (ma, mb) = (ctx.a().method(a), ctx.b().method(b));
    let special = |m: &crate::model::MethodInstance| (m.is_constructor(), m.is_static_init());
    if special(ma) != special(mb) {
        return Some(0.0);
    }
    let differing = ((ma.access ^ mb.access) & KIND_FLAGS).count_ones();
    Some(1.0 - differing as f64 / KIND_FLAGS.count_ones() as f64)
}

/// Names that survive obfuscation separate otherwise identical members.
/// Constructor and initialiser names are fixed and left to `method-kind`.
fn name_hint(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let (ma, mb) = (ctx.a().method(a), ctx.b().method(b));
    if !ma.is_name_obfuscatable() || !mb.is_name_obfuscatable() {
        return None;
    }
    Some(if ma.name == mb.name { 1.0 } else { 0.0 })
}

fn arg_types(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let (args_a, args_b) = (&ctx.a().method(a).args, &ctx.b().method(b).args);
    if args_a.is_empty() && args_b.is_empty() {
        return Some(1.0);
    }
    let same: f64 = args_a.iter().zip(args_b).map(|(x, y)| ctx.relation(*x, *y).score()).sum();
    Some(same / args_a.len().max(args_b.len()) as f64)
}

fn ret_type(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    Some(ctx.relation(ctx.a().method(a).ret, ctx.b().method(b).ret).score())
}

fn calls_out(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().method(a).refs_out, &ctx.b().method(b).refs_out)
}

fn calls_in(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().method(a).refs_in, &ctx.b().method(b).refs_in)
}

fn field_reads(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().method(a).field_reads, &ctx.b().method(b).field_reads)
}

fn field_writes(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().method(a).field_writes, &ctx.b().method(b).field_writes)
}

fn class_refs(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().method(a).class_refs, &ctx.b().method(b).class_refs)
}

fn strings(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    string_overlap(&ctx.a().method(a).strings, &ctx.b().method(b).strings)
}

fn external_refs(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    string_overlap(&ctx.a().method(a).external_refs, &ctx.b().method(b).external_refs)
}

fn code_size(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    match (ctx.a().method(a).code_size, ctx.b().method(b).code_size) {
        (Some(x), Some(y)) => Some(count_ratio(x as usize, y as usize)),
        (None, None) => None,
        _ => Some(0.0),
    }
}

fn position(a: MethodId, b: MethodId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let (ma, mb) = (ctx.a().method(a), ctx.b().method(b));
    let na = ctx.a().class(ma.owner).methods.len();
    let nb = ctx.b().class(mb.owner).methods.len();
    Some(relative_position(ma.position, na, mb.position, nb))
}

/// `1 - |ia - ib| / max(na, nb)`, 1.0 for single-member owners.
pub(crate) fn relative_position(ia: usize, na: usize, ib: usize, nb: usize) -> f64 {
    let n = na.max(nb);
    if n <= 1 {
        return 1.0;
    }
    1.0 - ia.abs_diff(ib) as f64 / n as f64
}
