//! Redundant fixed-point conversions.
//!
//! - `fix2float(float2fix(x, a), a)` becomes `fix(x, a)`
//! - `float2fix(fix2float(x, a), a)` is bypassed to `x`
//! - `fix(fix(x, a), a)` collapses to the inner `fix`
//!
//! Mismatched fix-points are left alone.

use graft_ir::{
    ArgId, Binder, DOMAIN_GRAFT, FIX, FIX_POINT_ATTR, FIX2FLOAT, FLOAT2FIX, Graph, NodeBuilder, NodeId, Pattern,
    PatternBuilder,
};

use super::bypass;
use crate::context::PassContext;
use crate::registry::{RulePass, RuleSpec};

pub const PASS: RulePass = RulePass::new("fix_cleanup", &RULES);

const RULES: [RuleSpec; 3] = [
    RuleSpec { name: "fold_roundtrip", pattern: || pair(FLOAT2FIX, FIX2FLOAT), action: fold_roundtrip },
    RuleSpec { name: "bypass_reverse_roundtrip", pattern: || pair(FIX2FLOAT, FLOAT2FIX), action: bypass_to_input },
    RuleSpec { name: "collapse_double_fix", pattern: || pair(FIX, FIX), action: bypass_to_inner },
];

/// `outer(inner(x))` over the fixed-point ops, naming `x`, `inner` and `outer`.
fn pair(inner: &str, outer: &str) -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let inner = p.node_in(DOMAIN_GRAFT, inner, [x]);
    let inner = p.named(inner, "inner");
    let outer = p.node_in(DOMAIN_GRAFT, outer, [inner]);
    let outer = p.named(outer, "outer");
    p.build(outer)
}

/// Shared fix-point of both nodes, when they agree.
fn agreed_fix_point(graph: &Graph, inner: NodeId, outer: NodeId) -> Option<i64> {
    let fix_point = graph.node(inner).attr_int(FIX_POINT_ATTR)?;
    (graph.node(outer).attr_int(FIX_POINT_ATTR) == Some(fix_point)).then_some(fix_point)
}

struct Matched {
    x: ArgId,
    inner: NodeId,
    outer: NodeId,
    fix_point: i64,
}

fn matched(graph: &Graph, binder: &Binder) -> Option<Matched> {
    let x = binder.named_arg("x")?;
    let inner = binder.named_node("inner")?;
    let outer = binder.named_node("outer")?;
    let fix_point = agreed_fix_point(graph, inner, outer)?;
    Some(Matched { x, inner, outer, fix_point })
}

fn fold_roundtrip(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let Some(Matched { x, outer, fix_point, .. }) = matched(graph, binder) else { return false };
    let Some(old) = graph.node(outer).output(0) else { return false };

    let (_, outputs) = NodeBuilder::new(graph, ctx.pass())
        .set_domain(DOMAIN_GRAFT)
        .set_op_type(FIX)
        .set_input_node_args([x])
        .add(FIX_POINT_ATTR, fix_point)
        .set_anchor_point1(old)
        .build_ex();
    let Some(new) = outputs[0] else { return false };
    graph.replace_all_uses(old, new);
    graph.remove_node(outer);
    ctx.bump("roundtrips_folded");
    true
}

fn bypass_to_input(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let Some(Matched { x, outer, .. }) = matched(graph, binder) else { return false };
    let Some(out) = graph.node(outer).output(0) else { return false };
    let done = bypass(graph, outer, out, x);
    if done {
        ctx.bump("roundtrips_bypassed");
    }
    done
}

fn bypass_to_inner(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let Some(Matched { inner, outer, .. }) = matched(graph, binder) else { return false };
    let (Some(inner_out), Some(out)) = (graph.node(inner).output(0), graph.node(outer).output(0)) else {
        return false;
    };
    let done = bypass(graph, outer, out, inner_out);
    if done {
        ctx.bump("double_fix_collapsed");
    }
    done
}
