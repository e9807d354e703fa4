use crate::classifier::method::relative_position;
use crate::classifier::{BuiltinClassifier, Rule, ScoreContext};
use crate::model::{FieldId, ACC_FINAL, ACC_STATIC, ACC_SYNTHETIC, ACC_TRANSIENT, ACC_VOLATILE};

const KIND_FLAGS: u16 = ACC_STATIC | ACC_FINAL | ACC_VOLATILE | ACC_TRANSIENT | ACC_SYNTHETIC;

pub(crate) fn builtins() -> Vec<BuiltinClassifier> {
    vec![
        BuiltinClassifier { name: "field-kind", weight: 10.0, rule: Rule::Field(kind) },
        BuiltinClassifier { name: "field-name-hint", weight: 6.0, rule: Rule::Field(name_hint) },
        BuiltinClassifier { name: "field-type", weight: 10.0, rule: Rule::Field(value_type) },
        BuiltinClassifier { name: "field-readers", weight: 8.0, rule: Rule::Field(readers) },
        BuiltinClassifier { name: "field-writers", weight: 8.0, rule: Rule::Field(writers) },
        BuiltinClassifier { name: "field-position", weight: 1.0, rule: Rule::Field(position) },
    ]
}

fn kind(a: FieldId, b: FieldId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let differing = ((ctx.a().field(a).access ^ ctx.b().field(b).access) & KIND_FLAGS).count_ones();
    Some(1.0 - differing as f64 / KIND_FLAGS.count_ones() as f64)
}

fn name_hint(a: FieldId, b: FieldId, ctx: &ScoreContext<'_>) -> Option<f64> {
    Some(if ctx.a().field(a).name == ctx.b().field(b).name { 1.0 } else { 0.0 })
}

fn value_type(a: FieldId, b: FieldId, ctx: &ScoreContext<'_>) -> Option<f64> {
    Some(ctx.relation(ctx.a().field(a).ty, ctx.b().field(b).ty).score())
}

fn readers(a: FieldId, b: FieldId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().field(a).readers, &ctx.b().field(b).readers)
}

fn writers(a: FieldId, b: FieldId, ctx: &ScoreContext<'_>) -> Option<f64> {
    ctx.set_similarity(&ctx.a().field(a).writers, &ctx.b().field(b).writers)
}

fn position(a: FieldId, b: FieldId, ctx: &ScoreContext<'_>) -> Option<f64> {
    let (fa, fb) = (ctx.a().field(a), ctx.b().field(b));
    let na = ctx.a().class(fa.owner).fields.len();
    let nb = ctx.b().class(fb.owner).fields.len();
    Some(relative_position(fa.position, na, fb.position, nb))
}
