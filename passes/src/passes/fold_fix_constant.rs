//! `float2fix(c)` over a float constant folds into an int8 initializer.
//!
//! Elements become `clamp(round(v * 2^fp), -128, 127)`. The folded
//! initializer is anchored to the `float2fix` output it replaces, carrying the
//! fix-point. A constant with a non-float payload is a data-validity problem:
//! it is reported with `warn` and left alone.

use graft_ir::{
    AnchorEvent, AnchorKind, Binder, ConstTensor, DOMAIN_GRAFT, FIX_POINT_ATTR, FLOAT2FIX, Graph, Pattern,
    PatternBuilder,
};
use tracing::warn;

use crate::context::PassContext;
use crate::registry::{RulePass, RuleSpec};

pub const PASS: RulePass = RulePass::new("fold_fix_constant", &RULES);

const RULES: [RuleSpec; 1] = [RuleSpec { name: "fold_constant", pattern: quantized_constant, action: fold_constant }];

fn quantized_constant() -> Pattern {
    let mut p = PatternBuilder::new();
    let c = p.constant();
    let c = p.named(c, "c");
    let root = p.node_in(DOMAIN_GRAFT, FLOAT2FIX, [c]);
    let root = p.named(root, "quant");
    p.build(root)
}

pub fn quantize(value: f32, fix_point: i64) -> i8 {
    let scale = 2f32.powi(fix_point.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
    (value * scale).round().clamp(-128.0, 127.0) as i8
}

fn fold_constant(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let (Some(c), Some(node)) = (binder.named_arg("c"), binder.named_node("quant")) else {
        return false;
    };
    let Some(fix_point) = graph.node(node).attr_int(FIX_POINT_ATTR) else { return false };
    let Some(out) = graph.node(node).output(0) else { return false };
    if graph.is_graph_output(out) {
        return false;
    }
    let Some(tensor) = graph.constant_value(c) else { return false };
    let name = graph.arg(c).name.clone();
    let values = match tensor.as_f32(&name) {
        Ok(values) => values,
        Err(e) => {
            warn!(pass = ctx.pass(), constant = %name, error = %e, "cannot fold non-float constant");
            return false;
        }
    };
    let folded = ConstTensor::i8(tensor.dims.clone(), values.iter().map(|v| quantize(*v, fix_point)).collect());

    let folded_name = graph.fresh_arg_name(&format!("{name}_fix"));
    let new = match graph.add_initializer(folded_name, folded) {
        Ok(arg) => arg,
        Err(e) => {
            warn!(pass = ctx.pass(), constant = %name, error = %e, "cannot add folded constant");
            return false;
        }
    };
    let event = AnchorEvent { from: Some(out), kind: AnchorKind::FixPoint { fix_point }, pass: ctx.pass().to_string() };
    graph.provenance_mut().record(new, event);
    graph.replace_all_uses(out, new);
    graph.remove_node(node);
    ctx.bump("constants_folded");
    true
}
