//! `Transpose(Transpose(x, p1), p2)` becomes `Transpose(x, p1∘p2)`, or `x`
//! when the composition is the identity.

use graft_dtype::{compose_permutations, is_identity_permutation};
use graft_ir::{AttrValue, Binder, Graph, NodeBuilder, Pattern, PatternBuilder};

use super::bypass;
use crate::context::PassContext;
use crate::registry::{RulePass, RuleSpec};

pub const PERM_ATTR: &str = "perm";

pub const PASS: RulePass = RulePass::new("merge_transpose", &RULES);

const RULES: [RuleSpec; 1] = [RuleSpec { name: "merge_transpose", pattern: double_transpose, action: merge }];

fn double_transpose() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let inner = p.node("Transpose", [x]);
    let inner = p.named(inner, "inner");
    let outer = p.node("Transpose", [inner]);
    let outer = p.named(outer, "outer");
    p.build(outer)
}

fn merge(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let (Some(x), Some(inner), Some(outer)) =
        (binder.named_arg("x"), binder.named_node("inner"), binder.named_node("outer"))
    else {
        return false;
    };
    let (Some(first), Some(second)) = (graph.node(inner).attr_ints(PERM_ATTR), graph.node(outer).attr_ints(PERM_ATTR))
    else {
        return false;
    };
    let Some(order) = compose_permutations(first, second) else { return false };
    let Some(old) = graph.node(outer).output(0) else { return false };

    if is_identity_permutation(&order) {
        let done = bypass(graph, outer, old, x);
        if done {
            ctx.bump("transposes_cancelled");
        }
        return done;
    }

    let (_, outputs) = NodeBuilder::new(graph, ctx.pass())
        .set_op_type("Transpose")
        .set_input_node_args([x])
        .add(PERM_ATTR, AttrValue::Ints(order.to_vec()))
        .set_anchor_point1(old)
        .build_ex();
    let Some(new) = outputs[0] else { return false };
    graph.replace_all_uses(old, new);
    graph.remove_node(outer);
    ctx.bump("transposes_merged");
    true
}
