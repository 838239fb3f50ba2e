//! `DequantizeLinear(QuantizeLinear(x, s, zp), s, zp)` with a power-of-two
//! scalar scale and zero `int8` zero-points becomes `fix(x, fix_point = -log2(s))`.
//!
//! `fix` is signed 8-bit. An absent zero-point means `uint8` output, as does a
//! `uint8` one, so both keep the pair.

use graft_ir::pattern::helpers::{is_zero, power_of_two_exponent};
use graft_ir::{
    AnchorKind, Binder, ConstTensor, DOMAIN_GRAFT, ElemType, FIX, FIX_POINT_ATTR, Graph, NodeBuilder, Pattern,
    PatternBuilder,
};
use tracing::debug;

use crate::context::PassContext;
use crate::registry::{RulePass, RuleSpec};

pub const PASS: RulePass = RulePass::new("qdq_to_fix", &RULES);

const RULES: [RuleSpec; 1] = [RuleSpec { name: "qdq_to_fix", pattern: qdq, action: qdq_to_fix }];

fn qdq() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let scale = p.constant();
    let scale = p.named(scale, "scale");
    let zero_point = p.constant();
    let zero_point = p.named(zero_point, "zero_point");
    let quant = p.op("QuantizeLinear").operand(x).operand(scale).optional_operand(zero_point).finish();
    let quant = p.named(quant, "quant");

    let dq_scale = p.constant();
    let dq_scale = p.named(dq_scale, "dq_scale");
    let dq_zero_point = p.constant();
    let dq_zero_point = p.named(dq_zero_point, "dq_zero_point");
    let dequant = p.op("DequantizeLinear").operand(quant).operand(dq_scale).optional_operand(dq_zero_point).finish();
    let dequant = p.named(dequant, "dequant");
    p.build(dequant)
}

/// `fp` with `scale == 2^-fp`, for a positive finite scale.
pub fn scale_to_fix_point(scale: f32) -> Option<i64> {
    power_of_two_exponent(scale).map(|exp| -(exp as i64))
}

fn qdq_to_fix(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let (Some(x), Some(dequant)) = (binder.named_arg("x"), binder.named_node("dequant")) else {
        return false;
    };
    let scale = |name: &str| {
        binder.named_arg(name).and_then(|a| graph.constant_value(a)).and_then(ConstTensor::single_f32)
    };
    let (Some(scale), Some(dq_scale)) = (scale("scale"), scale("dq_scale")) else {
        return false;
    };
    if scale != dq_scale {
        return false;
    }
    let signed_zero = |name: &str| {
        binder.named_arg(name).is_some_and(|a| {
            graph.constant_value(a).is_some_and(|c| c.elem() == ElemType::Int8) && is_zero(graph, a)
        })
    };
    if !signed_zero("zero_point") || !signed_zero("dq_zero_point") {
        debug!("zero points are not int8 zeros");
        return false;
    }
    let Some(fix_point) = scale_to_fix_point(scale) else {
        debug!(scale, "scale is not a power of two");
        return false;
    };
    let Some(old) = graph.node(dequant).output(0) else { return false };

    let (_, outputs) = NodeBuilder::new(graph, ctx.pass())
        .set_domain(DOMAIN_GRAFT)
        .set_op_type(FIX)
        .set_input_node_args([x])
        .add(FIX_POINT_ATTR, fix_point)
        .set_anchor_point2(old, AnchorKind::FixPoint { fix_point })
        .build_ex();
    let Some(new) = outputs[0] else { return false };
    graph.replace_all_uses(old, new);
    graph.remove_node(dequant);
    ctx.bump("qdq_pairs_converted");
    true
}
